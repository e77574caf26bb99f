//! The error taxonomy returned from every fallible public entry point.

use thiserror::Error;

/// Everything that can go wrong while talking to TradingView.
#[derive(Debug, Error)]
pub enum TvError {
  #[error("invalid interval: {0}")]
  InvalidInterval(String),

  #[error("transport error: {0}")]
  Transport(#[from] tokio_tungstenite::tungstenite::Error),

  #[error("protocol error: {0}")]
  Protocol(String),

  #[error("server rejected handshake: {0}")]
  HandshakeRejected(String),

  #[error("server rejected subscribe for {symbol}: {reason}")]
  SubscribeRejected { symbol: String, reason: String },

  #[error("historic fetch timed out after {0:?}")]
  FetchTimeout(std::time::Duration),

  #[error("too many concurrent historic fetches in flight")]
  TooManyRequests,

  #[error("missing dependency: {0}")]
  MissingDependency(String),

  #[error("streamer already closed")]
  Closed,

  #[error(transparent)]
  Json(#[from] serde_json::Error),

  #[error("operation timed out: {0}")]
  Timeout(#[from] tokio::time::error::Elapsed),
}

pub type TvResult<T> = Result<T, TvError>;
