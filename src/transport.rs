//! The transport seam: the engine and historic fetcher only ever see a
//! `send`/`recv`/`close` surface, never `tokio_tungstenite` directly.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::MaybeTlsStream;

use crate::errors::TvError;

/// An open duplex channel of text frames.
#[async_trait]
pub trait Transport: Send {
  async fn send(&mut self, payload: &str) -> Result<(), TvError>;
  /// Returns `None` when the peer closed the connection.
  async fn recv(&mut self) -> Result<Option<String>, TvError>;
  async fn close(&mut self);
}

type WsStream =
  tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct WsTransport {
  stream: WsStream,
}

impl WsTransport {
  /// `session_cookie`, when present, is sent as `Cookie: sessionid=<value>` so
  /// the upgrade is authenticated as a logged-in TradingView user; omitting it
  /// connects anonymously.
  pub async fn connect(
    host: &str,
    origin: &str,
    session_cookie: Option<&str>,
  ) -> Result<Self, TvError> {
    let url = format!("wss://{host}/socket.io/websocket");
    let mut request = url.clone().into_client_request()?;
    request.headers_mut().insert(
      "Origin",
      HeaderValue::from_str(origin)
        .map_err(|_| TvError::Protocol("invalid origin header".into()))?,
    );
    if let Some(session_id) = session_cookie {
      request.headers_mut().insert(
        "Cookie",
        HeaderValue::from_str(&format!("sessionid={session_id}"))
          .map_err(|_| TvError::Protocol("invalid session cookie".into()))?,
      );
    }
    let (stream, _response) = tokio_tungstenite::connect_async(request).await?;
    Ok(Self { stream })
  }
}

#[async_trait]
impl Transport for WsTransport {
  async fn send(&mut self, payload: &str) -> Result<(), TvError> {
    self.stream.send(Message::Text(payload.to_string())).await?;
    Ok(())
  }

  async fn recv(&mut self) -> Result<Option<String>, TvError> {
    loop {
      match self.stream.next().await {
        None => return Ok(None),
        Some(Ok(Message::Text(text))) => return Ok(Some(text)),
        Some(Ok(Message::Binary(bytes))) => {
          return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
        }
        Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
        Some(Ok(Message::Close(_))) => return Ok(None),
        Some(Ok(Message::Frame(_))) => continue,
        Some(Err(e)) => return Err(e.into()),
      }
    }
  }

  async fn close(&mut self) {
    let _ = self.stream.close(None).await;
  }
}
