//! Options controlling a [`crate::engine::StreamingEngine`] or historic fetch.

use std::time::Duration;

/// Tunables for a streaming engine, with sensible defaults matching the
/// TradingView service's own expectations (minimum 300-bar history, etc).
#[derive(Debug, Clone)]
pub struct StreamerOptions {
  pub initial_bars: u32,
  pub token: String,
  /// TradingView `sessionid` cookie sent on the WS upgrade request. Without
  /// it the connection is made as an anonymous (unauthenticated) viewer.
  pub session_cookie: Option<String>,
  pub origin_header: String,
  pub host: String,
  pub reconnect_initial: Duration,
  pub reconnect_max: Duration,
  /// Bounded per-subscriber queue depth; `0` (the default) means unbounded.
  pub queue_capacity: usize,
  pub connect_timeout: Duration,
}

impl Default for StreamerOptions {
  fn default() -> Self {
    Self {
      initial_bars: 300,
      token: "unauthorized_user_token".to_string(),
      session_cookie: None,
      origin_header: "https://www.tradingview.com".to_string(),
      host: "prodata.tradingview.com".to_string(),
      reconnect_initial: Duration::from_secs(1),
      reconnect_max: Duration::from_secs(60),
      queue_capacity: 0,
      connect_timeout: Duration::from_secs(10),
    }
  }
}

/// Fluent builder mirroring the option set above.
#[derive(Debug, Default, Clone)]
pub struct StreamerBuilder {
  options: StreamerOptions,
}

impl StreamerBuilder {
  pub fn new() -> Self {
    Self {
      options: StreamerOptions::default(),
    }
  }

  pub fn initial_bars(mut self, n: u32) -> Self {
    self.options.initial_bars = n.max(300);
    self
  }

  pub fn token(mut self, token: impl Into<String>) -> Self {
    self.options.token = token.into();
    self
  }

  /// Set the `sessionid` cookie sent on the WS upgrade request, authenticating
  /// the connection as a logged-in user.
  pub fn session_cookie(mut self, session_id: impl Into<String>) -> Self {
    self.options.session_cookie = Some(session_id.into());
    self
  }

  pub fn origin_header(mut self, origin: impl Into<String>) -> Self {
    self.options.origin_header = origin.into();
    self
  }

  pub fn host(mut self, host: impl Into<String>) -> Self {
    self.options.host = host.into();
    self
  }

  pub fn reconnect_initial(mut self, d: Duration) -> Self {
    self.options.reconnect_initial = d;
    self
  }

  pub fn reconnect_max(mut self, d: Duration) -> Self {
    self.options.reconnect_max = d;
    self
  }

  pub fn queue_capacity(mut self, n: usize) -> Self {
    self.options.queue_capacity = n;
    self
  }

  pub fn connect_timeout(mut self, d: Duration) -> Self {
    self.options.connect_timeout = d;
    self
  }

  pub fn build(self) -> StreamerOptions {
    self.options
  }
}
