//! Exercises handshake, subscribe, heartbeat-echo and decode end to end
//! against an in-memory transport double instead of a live socket.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use tv_streamer::{Event, Hub, Subscription, Transport, TvError, TvResult};

/// A transport backed by two channels: `inbound` feeds `recv()`, `outbound`
/// captures everything sent so assertions can inspect it.
struct MockTransport {
  inbound: mpsc::UnboundedReceiver<String>,
  outbound: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Transport for MockTransport {
  async fn send(&mut self, payload: &str) -> TvResult<()> {
    self
      .outbound
      .send(payload.to_string())
      .map_err(|_| TvError::Protocol("outbound closed".into()))
  }

  async fn recv(&mut self) -> TvResult<Option<String>> {
    Ok(self.inbound.recv().await)
  }

  async fn close(&mut self) {}
}

fn mock_pair() -> (MockTransport, mpsc::UnboundedSender<String>, mpsc::UnboundedReceiver<String>) {
  let (in_tx, in_rx) = mpsc::unbounded_channel();
  let (out_tx, out_rx) = mpsc::unbounded_channel();
  (
    MockTransport {
      inbound: in_rx,
      outbound: out_tx,
    },
    in_tx,
    out_rx,
  )
}

#[tokio::test]
async fn handshake_sends_frames_in_order_and_omits_ch_field() {
  let (mut transport, _in_tx, mut out_rx) = mock_pair();
  let session = tv_streamer::testing::session_state();

  tv_streamer::testing::handshake(&mut transport, &session, "mytoken")
    .await
    .unwrap();

  let frames: Vec<_> = std::iter::from_fn(|| out_rx.try_recv().ok()).collect();
  assert_eq!(frames.len(), 4);
  assert!(frames[0].contains("set_auth_token"));
  assert!(frames[0].contains("mytoken"));
  assert!(frames[1].contains("chart_create_session"));
  assert!(frames[2].contains("quote_create_session"));
  assert!(frames[3].contains("quote_set_fields"));
  assert!(!frames[3].contains("\"ch\""));
}

#[tokio::test]
async fn heartbeat_is_echoed_before_subsequent_frame_is_parsed() {
  let (mut transport, in_tx, mut out_rx) = mock_pair();
  let session = Arc::new(tv_streamer::testing::session_state());
  let hub = Hub::new(16);

  // "~h~123" is 6 bytes; the declared length must match or `split` treats
  // the whole buffer as an incomplete trailing frame.
  in_tx.send("~m~6~m~~h~123".to_string()).unwrap();
  drop(in_tx);

  let hub_clone = hub.clone();
  let handle = tokio::spawn(async move {
    tv_streamer::testing::read_loop(&mut transport, session, hub_clone, None).await
  });

  let echoed = out_rx.recv().await.unwrap();
  assert_eq!(echoed, "~m~6~m~~h~123");
  handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn subscribe_then_candle_frame_round_trips_through_hub() {
  let (mut transport, in_tx, _out_rx) = mock_pair();
  let session = tv_streamer::testing::session_state();
  let hub = Hub::new(16);
  let mut rx = hub.subscribe().await;

  let sub = Subscription::new("SYM", "1");
  let series_id = tv_streamer::testing::subscribe_one(&mut transport, &session, &sub, 300)
    .await
    .unwrap();
  let session = Arc::new(session);

  let payload = format!(
    r#"{{"m":"du","p":["cs_x",{{"{sid}":{{"s":[{{"i":0,"v":[1600000000,1,2,0.5,1.5,100]}}]}}}}]}}"#,
    sid = series_id
  );
  in_tx.send(format!("~m~{}~m~{}", payload.len(), payload)).unwrap();
  drop(in_tx);

  let session_for_loop = session.clone();
  let hub_clone = hub.clone();
  tokio::spawn(async move {
    let _ = tv_streamer::testing::read_loop(&mut transport, session_for_loop, hub_clone, None)
      .await;
  });

  let event = rx.recv().await.unwrap();
  match event {
    Event::Candle(c) => {
      assert_eq!(c.symbol, "SYM");
      assert!(!c.closed);
    }
    _ => panic!("expected candle event"),
  }
}
