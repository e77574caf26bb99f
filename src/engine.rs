//! The reconnecting streaming engine: owns the connection lifecycle, replays
//! subscriptions on every reconnect, and fans decoded events out via a [`Hub`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::StreamerOptions;
use crate::connection;
use crate::hub::{EventReceiver, Hub};
use crate::models::{Event, Subscription};
use crate::session::SessionState;
use crate::transport::{Transport, WsTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
  Idle,
  Connecting,
  Handshaking,
  Subscribing,
  Streaming,
  Backoff,
  Closed,
}

/// Returned by [`StreamingEngine::subscribe_callback`]; disposes the
/// callback's forwarding task.
pub struct CallbackHandle {
  task: JoinHandle<()>,
}

impl CallbackHandle {
  /// Stop invoking the callback. Dropping the handle without calling this
  /// leaves the forwarding task running detached; always call `dispose`
  /// (or hold the handle and abort it yourself) to actually tear it down.
  pub fn dispose(self) {
    self.task.abort();
  }
}

/// A long-lived connection that multiplexes all of its subscriptions over a
/// single TradingView socket, reconnecting with exponential backoff.
pub struct StreamingEngine {
  subs: Arc<Mutex<Vec<Subscription>>>,
  hub: Hub,
  closed: Arc<AtomicBool>,
  state: Arc<Mutex<EngineState>>,
  task: JoinHandle<()>,
}

impl StreamingEngine {
  pub fn new(subscriptions: Vec<Subscription>, options: StreamerOptions) -> Self {
    let hub = Hub::new(options.queue_capacity);
    let subs = Arc::new(Mutex::new(subscriptions));
    let closed = Arc::new(AtomicBool::new(false));
    let state = Arc::new(Mutex::new(EngineState::Idle));

    let task = tokio::spawn(run_loop(
      options,
      subs.clone(),
      hub.clone(),
      closed.clone(),
      state.clone(),
    ));

    Self {
      subs,
      hub,
      closed,
      state,
      task,
    }
  }

  pub async fn subscribe(&self) -> EventReceiver {
    self.hub.subscribe().await
  }

  pub async fn add_subscription(&self, sub: Subscription) {
    self.subs.lock().await.push(sub);
  }

  /// Callback-style subscription variant. Registers `sub` with this engine
  /// (so it's replayed on every reconnect alongside the construction-time
  /// list) and spawns a task that invokes `callback` for every event this
  /// engine publishes. When `include_ticks` is false, `Tick` events are
  /// filtered out before reaching `callback`, mirroring the `{tick: bool}`
  /// option on the public facade. Drop the returned handle or call
  /// `CallbackHandle::dispose` to stop invoking `callback`.
  pub async fn subscribe_callback<F>(
    &self,
    sub: Subscription,
    include_ticks: bool,
    mut callback: F,
  ) -> CallbackHandle
  where
    F: FnMut(Event) + Send + 'static,
  {
    self.add_subscription(sub).await;
    let mut rx = self.hub.subscribe().await;
    let task = tokio::spawn(async move {
      while let Some(event) = rx.recv().await {
        if matches!(event, Event::Tick(_)) && !include_ticks {
          continue;
        }
        callback(event);
      }
    });
    CallbackHandle { task }
  }

  pub async fn state(&self) -> EngineState {
    *self.state.lock().await
  }

  pub fn dropped_events(&self) -> u64 {
    self.hub.dropped_count()
  }

  /// Idempotent: closing twice is a no-op. Aborts the background connection
  /// task immediately rather than waiting for it to notice `closed`, since it
  /// may be parked in `transport.recv()` with nothing left to wake it.
  pub async fn close(&self) {
    if !self.closed.swap(true, Ordering::SeqCst) {
      *self.state.lock().await = EngineState::Closed;
      self.task.abort();
      self.hub.close().await;
    }
  }
}

fn jittered_delay(attempt: u32, initial: Duration, max: Duration) -> Duration {
  let scaled = initial.as_secs_f64() * 2f64.powi(attempt as i32);
  let capped = scaled.min(max.as_secs_f64());
  let jitter = 0.8 + rand::thread_rng().gen_range(0.0..0.4);
  Duration::from_secs_f64(capped * jitter)
}

async fn run_loop(
  options: StreamerOptions,
  subs: Arc<Mutex<Vec<Subscription>>>,
  hub: Hub,
  closed: Arc<AtomicBool>,
  state: Arc<Mutex<EngineState>>,
) {
  let mut attempt: u32 = 0;

  while !closed.load(Ordering::SeqCst) {
    *state.lock().await = EngineState::Connecting;
    let connect = tokio::time::timeout(
      options.connect_timeout,
      WsTransport::connect(
        &options.host,
        &options.origin_header,
        options.session_cookie.as_deref(),
      ),
    )
    .await;

    let mut transport = match connect {
      Ok(Ok(t)) => t,
      Ok(Err(e)) => {
        log::warn!("connect failed: {e}");
        backoff(&mut attempt, &options, &closed, &state).await;
        continue;
      }
      Err(_) => {
        log::warn!("connect timed out");
        backoff(&mut attempt, &options, &closed, &state).await;
        continue;
      }
    };

    let session = Arc::new(SessionState::new());

    *state.lock().await = EngineState::Handshaking;
    if let Err(e) = connection::handshake(&mut transport, &session, &options.token).await
    {
      log::warn!("handshake failed: {e}");
      transport.close().await;
      backoff(&mut attempt, &options, &closed, &state).await;
      continue;
    }

    *state.lock().await = EngineState::Subscribing;
    let current_subs = subs.lock().await.clone();
    let mut transport_broken = false;
    for sub in &current_subs {
      if let Err(e) =
        connection::subscribe_one(&mut transport, &session, sub, options.initial_bars).await
      {
        log::warn!("subscribe failed for {sub}: {e}");
        // A transport-level failure means every subsequent send on this
        // socket will fail too, so it's worth a full reconnect. Anything
        // else (e.g. a server-side rejection) only costs this one
        // subscription; the rest still get their subscribe frames sent.
        if matches!(e, crate::errors::TvError::Transport(_)) {
          transport_broken = true;
          break;
        }
      }
    }
    if transport_broken {
      transport.close().await;
      backoff(&mut attempt, &options, &closed, &state).await;
      continue;
    }

    log::info!("streaming {} subscriptions", current_subs.len());
    *state.lock().await = EngineState::Streaming;
    attempt = 0;

    let result = connection::read_loop(&mut transport, session, hub.clone(), None).await;
    transport.close().await;

    if closed.load(Ordering::SeqCst) {
      break;
    }
    if let Err(e) = result {
      log::warn!("stream error: {e}");
    }
    backoff(&mut attempt, &options, &closed, &state).await;
  }
}

async fn backoff(
  attempt: &mut u32,
  options: &StreamerOptions,
  closed: &Arc<AtomicBool>,
  state: &Arc<Mutex<EngineState>>,
) {
  if closed.load(Ordering::SeqCst) {
    return;
  }
  *state.lock().await = EngineState::Backoff;
  let delay = jittered_delay(*attempt, options.reconnect_initial, options.reconnect_max);
  log::info!("reconnecting in {delay:?} (attempt {attempt})");
  *attempt += 1;
  tokio::time::sleep(delay).await;
}
