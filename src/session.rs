//! Per-connection session identifiers, series registry and the handshake gate.

use std::collections::{HashMap, HashSet};

use rand::Rng;
use tokio::sync::Mutex;

use crate::models::Subscription;

fn random_letters(n: usize) -> String {
  let mut rng = rand::thread_rng();
  (0..n)
    .map(|_| (b'a' + rng.gen_range(0..26)) as char)
    .collect()
}

fn random_digits(n: usize) -> String {
  let mut rng = rand::thread_rng();
  (0..n)
    .map(|_| char::from_digit(rng.gen_range(0..10), 10).unwrap())
    .collect()
}

/// State a single connection accumulates from handshake through subscribing.
pub struct SessionState {
  pub chart_session: String,
  pub quote_session: String,
  handshake_gate: Mutex<bool>,
  series: Mutex<HashMap<String, Subscription>>,
  quote_symbols: Mutex<HashSet<String>>,
}

impl SessionState {
  pub fn new() -> Self {
    Self {
      chart_session: format!("cs_{}", random_letters(12)),
      quote_session: format!("qs_{}", random_letters(12)),
      handshake_gate: Mutex::new(false),
      series: Mutex::new(HashMap::new()),
      quote_symbols: Mutex::new(HashSet::new()),
    }
  }

  /// Run `handshake` exactly once, even if called concurrently from
  /// multiple subscribe paths racing through this gate. A failed attempt
  /// leaves the gate open so a later call can retry.
  pub async fn ensure_handshake<F, Fut, E>(&self, handshake: F) -> Result<(), E>
  where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<(), E>>,
  {
    let mut done = self.handshake_gate.lock().await;
    if !*done {
      handshake().await?;
      *done = true;
    }
    Ok(())
  }

  /// Register a freshly generated series id for `sub`, returning the id.
  pub async fn register_series(&self, sub: Subscription) -> String {
    let id = format!("s{}", random_digits(4));
    self.series.lock().await.insert(id.clone(), sub);
    id
  }

  pub async fn series_subscription(&self, series_id: &str) -> Option<Subscription> {
    self.series.lock().await.get(series_id).cloned()
  }

  pub async fn remove_series(&self, series_id: &str) -> Option<Subscription> {
    self.series.lock().await.remove(series_id)
  }

  /// Returns `true` if this is the first time `symbol` has been announced
  /// on this session, i.e. the caller should send `quote_add_symbols`.
  pub async fn mark_quote_symbol(&self, symbol: &str) -> bool {
    self.quote_symbols.lock().await.insert(symbol.to_string())
  }

  pub async fn forget_quote_symbol(&self, symbol: &str) {
    self.quote_symbols.lock().await.remove(symbol);
  }
}

impl Default for SessionState {
  fn default() -> Self {
    Self::new()
  }
}
