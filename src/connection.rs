//! Owns one transport: runs the reader loop, echoes heartbeats, drives the
//! frame decoder, and feeds the hub. Handshake and subscribe framing live
//! here too since they need the same session state the reader reads from.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::decode;
use crate::errors::TvResult;
use crate::framing;
use crate::hub::Hub;
use crate::message;
use crate::models::Subscription;
use crate::session::SessionState;
use crate::transport::Transport;

/// Send the four handshake frames, gated by `session`'s handshake mutex so
/// concurrent callers only do this once per connection.
pub async fn handshake(
  transport: &mut dyn Transport,
  session: &SessionState,
  token: &str,
) -> TvResult<()> {
  session
    .ensure_handshake(|| async {
      log::debug!("sending handshake frames");
      transport.send(&message::set_auth_token(token)).await?;
      transport
        .send(&message::chart_create_session(&session.chart_session))
        .await?;
      transport
        .send(&message::quote_create_session(&session.quote_session))
        .await?;
      transport
        .send(&message::quote_set_fields(&session.quote_session))
        .await?;
      Ok(())
    })
    .await
}

/// Send the subscribe sequence for one subscription: `quote_add_symbols`
/// (only if new), `resolve_symbol`, `create_series`.
pub async fn subscribe_one(
  transport: &mut dyn Transport,
  session: &SessionState,
  sub: &Subscription,
  initial_bars: u32,
) -> TvResult<String> {
  if session.mark_quote_symbol(&sub.symbol).await {
    transport
      .send(&message::quote_add_symbols(&session.quote_session, &sub.symbol))
      .await?;
  }
  let series_id = session.register_series(sub.clone()).await;
  let alias = format!("a_{series_id}");
  transport
    .send(&message::resolve_symbol(&session.chart_session, &alias, &sub.symbol))
    .await?;
  transport
    .send(&message::create_series(
      &session.chart_session,
      &series_id,
      &alias,
      &sub.interval,
      initial_bars,
    ))
    .await?;
  log::info!("subscribed {sub} as series {series_id}");
  Ok(series_id)
}

pub async fn unsubscribe_one(
  transport: &mut dyn Transport,
  session: &SessionState,
  sub: &Subscription,
  series_id: &str,
) -> TvResult<()> {
  transport
    .send(&message::remove_series(&session.chart_session, series_id))
    .await?;
  transport
    .send(&message::quote_remove_symbols(&session.quote_session, &sub.symbol))
    .await?;
  session.remove_series(series_id).await;
  session.forget_quote_symbol(&sub.symbol).await;
  Ok(())
}

/// Drive the reader loop until the transport closes or errors. Every
/// decoded event is published to `hub`. `raw_tx`, if present, also receives
/// the undecoded payload (used by the historic fetcher to watch for
/// `series_completed`).
pub async fn read_loop(
  transport: &mut dyn Transport,
  session: Arc<SessionState>,
  hub: Hub,
  raw_tx: Option<mpsc::UnboundedSender<String>>,
) -> TvResult<()> {
  let mut buffer = String::new();
  loop {
    let Some(chunk) = transport.recv().await? else {
      log::info!("transport closed by peer");
      return Ok(());
    };
    buffer.push_str(&chunk);
    let (frames, remainder) = framing::split(&buffer);
    buffer = remainder;

    for payload in frames {
      if framing::is_heartbeat(&payload) {
        log::debug!("echoing heartbeat {payload}");
        transport.send(&framing::encode(&payload)).await?;
        continue;
      }
      if let Some(tx) = &raw_tx {
        let _ = tx.send(payload.clone());
      }
      for event in decode::decode(&payload, &session).await {
        hub.publish(event).await;
      }
    }
  }
}
