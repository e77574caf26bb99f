#![allow(clippy::large_enum_variant)]
#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]
#![doc(test(
  no_crate_inject,
  attr(deny(warnings, rust_2018_idioms), allow(dead_code, unused_variables))
))]

//! # tv-streamer
//!
//! An async client for TradingView's private streaming WebSocket protocol:
//! reconnecting chart/quote sessions, decimal-safe candle decoding, and a
//! one-shot historic-bar fetcher with a concurrency cap and a short TTL cache.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tv_streamer::{StreamingEngine, StreamerBuilder, Subscription};
//!
//! #[tokio::main]
//! async fn main() {
//!   let subs = vec![Subscription::new("NSE:SBIN", "1")];
//!   let options = StreamerBuilder::new().initial_bars(300).build();
//!   let engine = StreamingEngine::new(subs, options);
//!   let mut rx = engine.subscribe().await;
//!   while let Some(event) = rx.recv().await {
//!     println!("{event:?}");
//!   }
//! }
//! ```
//!
//! ## Callback subscription
//!
//! ```rust,no_run
//! use tv_streamer::{StreamingEngine, StreamerBuilder, Subscription};
//!
//! #[tokio::main]
//! async fn main() {
//!   let engine = StreamingEngine::new(Vec::new(), StreamerBuilder::new().build());
//!   let handle = engine
//!     .subscribe_callback(Subscription::new("NSE:SBIN", "1"), false, |event| {
//!       println!("{event:?}");
//!     })
//!     .await;
//!   // ... later, to stop receiving:
//!   handle.dispose();
//! }
//! ```
//!
//! ## Historic candles
//!
//! ```rust,no_run
//! use tv_streamer::{get_historic_candles, StreamerOptions};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tv_streamer::TvError> {
//!   let options = StreamerOptions::default();
//!   let candles =
//!     get_historic_candles("NSE:SBIN", "1", 300, Duration::from_secs(10), &options).await?;
//!   println!("{} bars", candles.len());
//!   Ok(())
//! }
//! ```

mod auth;
mod config;
mod connection;
mod decode;
mod engine;
mod errors;
mod framing;
mod historic;
mod hub;
mod interval;
mod message;
mod models;
mod session;
mod transport;

pub use auth::{discover_tv_cookies, AuthCookies};
pub use config::{StreamerBuilder, StreamerOptions};
pub use engine::{CallbackHandle, EngineState, StreamingEngine};
pub use errors::{TvError, TvResult};
pub use historic::{fetch_with_context, get_historic_candles, FetcherContext};
pub use hub::{EventReceiver, Hub};
pub use interval::normalize as normalize_interval;
pub use models::{BarBuffer, Candle, ControlEvent, Event, MetaEvent, Subscription, Tick};
pub use transport::{Transport, WsTransport};

/// Internals exposed only so integration tests can drive the protocol layer
/// against an in-memory [`Transport`] instead of a live socket.
#[doc(hidden)]
pub mod testing {
  pub use crate::connection::{handshake, read_loop, subscribe_one, unsubscribe_one};
  pub use crate::session::SessionState;

  pub fn session_state() -> SessionState {
    SessionState::new()
  }
}
