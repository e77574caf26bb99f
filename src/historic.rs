//! One-shot fetch of the last N closed candles, with a process-wide
//! concurrency cap and a short-lived result cache.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex, Semaphore};

use crate::config::StreamerOptions;
use crate::connection;
use crate::errors::{TvError, TvResult};
use crate::hub::Hub;
use crate::interval;
use crate::models::{Candle, Event, Subscription};
use crate::session::SessionState;
use crate::transport::{Transport, WsTransport};

const MAX_CONCURRENT_FETCHES: usize = 3;
const CACHE_TTL: Duration = Duration::from_secs(60);
const CACHE_CAPACITY: usize = 128;

#[derive(Clone)]
struct CacheEntry {
  inserted_at: Instant,
  candles: Vec<Candle>,
}

/// Bundles the semaphore and cache so tests can use isolated instances
/// instead of sharing process-wide state.
pub struct FetcherContext {
  semaphore: Semaphore,
  cache: Mutex<HashMap<(String, String, u32), CacheEntry>>,
  order: Mutex<Vec<(String, String, u32)>>,
}

impl FetcherContext {
  pub fn new() -> Self {
    Self {
      semaphore: Semaphore::new(MAX_CONCURRENT_FETCHES),
      cache: Mutex::new(HashMap::new()),
      order: Mutex::new(Vec::new()),
    }
  }

  async fn cached(&self, key: &(String, String, u32)) -> Option<Vec<Candle>> {
    let cache = self.cache.lock().await;
    let entry = cache.get(key)?;
    if entry.inserted_at.elapsed() < CACHE_TTL {
      Some(entry.candles.clone())
    } else {
      None
    }
  }

  async fn insert(&self, key: (String, String, u32), candles: Vec<Candle>) {
    let mut cache = self.cache.lock().await;
    let mut order = self.order.lock().await;
    if !cache.contains_key(&key) {
      order.push(key.clone());
      if order.len() > CACHE_CAPACITY {
        let oldest = order.remove(0);
        cache.remove(&oldest);
      }
    }
    cache.insert(
      key,
      CacheEntry {
        inserted_at: Instant::now(),
        candles,
      },
    );
  }
}

impl Default for FetcherContext {
  fn default() -> Self {
    Self::new()
  }
}

fn global_context() -> &'static FetcherContext {
  static CONTEXT: OnceLock<FetcherContext> = OnceLock::new();
  CONTEXT.get_or_init(FetcherContext::new)
}

/// Fetch `limit` closed candles for `symbol`/`interval` using the process-wide
/// default [`FetcherContext`].
pub async fn get_historic_candles(
  symbol: &str,
  interval: &str,
  limit: u32,
  timeout: Duration,
  options: &StreamerOptions,
) -> TvResult<Vec<Candle>> {
  fetch_with_context(global_context(), symbol, interval, limit, timeout, options).await
}

pub async fn fetch_with_context(
  ctx: &FetcherContext,
  symbol: &str,
  interval_raw: &str,
  limit: u32,
  timeout: Duration,
  options: &StreamerOptions,
) -> TvResult<Vec<Candle>> {
  let normalized = interval::normalize(interval_raw)?;
  let key = (symbol.to_uppercase(), normalized.clone(), limit);

  if let Some(candles) = ctx.cached(&key).await {
    return Ok(candles);
  }

  let Ok(_permit) = ctx.semaphore.try_acquire() else {
    return Err(TvError::TooManyRequests);
  };

  let candles = tokio::time::timeout(
    timeout,
    fetch_from_network(&key.0, &normalized, limit, options),
  )
  .await
  .unwrap_or_else(|_| {
    log::warn!("historic fetch for {}@{} timed out", key.0, normalized);
    Ok(Vec::new())
  })?;

  ctx.insert(key, candles.clone()).await;
  Ok(candles)
}

async fn fetch_from_network(
  symbol: &str,
  interval: &str,
  limit: u32,
  options: &StreamerOptions,
) -> TvResult<Vec<Candle>> {
  let mut transport = WsTransport::connect(
    &options.host,
    &options.origin_header,
    options.session_cookie.as_deref(),
  )
  .await?;
  let session = Arc::new(SessionState::new());
  connection::handshake(&mut transport, &session, &options.token).await?;

  let sub = Subscription::new(symbol, interval);
  let history = limit.max(300);
  connection::subscribe_one(&mut transport, &session, &sub, history).await?;

  let hub = Hub::new(limit.max(16) as usize);
  let mut rx = hub.subscribe().await;
  let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();

  let session_for_loop = session.clone();
  let hub_for_loop = hub.clone();
  let reader = tokio::spawn(async move {
    let _ = connection::read_loop(
      &mut transport,
      session_for_loop,
      hub_for_loop,
      Some(raw_tx),
    )
    .await;
  });

  let mut candles: HashMap<chrono::DateTime<chrono::Utc>, Candle> = HashMap::new();
  loop {
    tokio::select! {
      event = rx.recv() => {
        match event {
          Some(Event::Candle(c)) => {
            candles.insert(c.ts_open, c);
            if candles.len() as u32 >= limit {
              break;
            }
          }
          Some(_) => {}
          None => break,
        }
      }
      raw = raw_rx.recv() => {
        match raw {
          Some(payload) if payload.contains("series_completed") => break,
          Some(_) => {}
          None => break,
        }
      }
    }
  }

  reader.abort();

  let mut result: Vec<Candle> = candles.into_values().collect();
  result.sort_by_key(|c| c.ts_open);
  if result.len() as u32 > limit {
    let drop = result.len() - limit as usize;
    result.drain(0..drop);
  }
  Ok(result)
}
