//! In-process broadcast registry: one publish fans out to N per-subscriber
//! queues, dropping events for a subscriber whose queue is full.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::models::Event;

enum SubscriberSender {
  Bounded(mpsc::Sender<Event>),
  Unbounded(mpsc::UnboundedSender<Event>),
}

struct Subscriber {
  tx: SubscriberSender,
}

/// A single subscriber's event stream. Bounded when the owning [`Hub`] was
/// constructed with a nonzero capacity, unbounded when constructed with `0`.
pub enum EventReceiver {
  Bounded(mpsc::Receiver<Event>),
  Unbounded(mpsc::UnboundedReceiver<Event>),
}

impl EventReceiver {
  pub async fn recv(&mut self) -> Option<Event> {
    match self {
      EventReceiver::Bounded(rx) => rx.recv().await,
      EventReceiver::Unbounded(rx) => rx.recv().await,
    }
  }
}

/// A broadcast hub. Cloning is cheap; all clones share the same subscriber set.
/// `capacity == 0` means unbounded per-subscriber queues; any other value is
/// the bounded queue depth, with overflow dropping the event for that
/// subscriber only.
#[derive(Clone)]
pub struct Hub {
  subscribers: Arc<Mutex<Vec<Subscriber>>>,
  capacity: usize,
  dropped: Arc<AtomicU64>,
}

impl Hub {
  pub fn new(capacity: usize) -> Self {
    Self {
      subscribers: Arc::new(Mutex::new(Vec::new())),
      capacity,
      dropped: Arc::new(AtomicU64::new(0)),
    }
  }

  pub async fn subscribe(&self) -> EventReceiver {
    if self.capacity == 0 {
      let (tx, rx) = mpsc::unbounded_channel();
      self
        .subscribers
        .lock()
        .await
        .push(Subscriber { tx: SubscriberSender::Unbounded(tx) });
      EventReceiver::Unbounded(rx)
    } else {
      let (tx, rx) = mpsc::channel(self.capacity);
      self
        .subscribers
        .lock()
        .await
        .push(Subscriber { tx: SubscriberSender::Bounded(tx) });
      EventReceiver::Bounded(rx)
    }
  }

  /// Non-blocking: snapshot the subscriber list, then try-send to each.
  /// A full bounded queue drops the event for that subscriber only.
  pub async fn publish(&self, event: Event) {
    let mut subs = self.subscribers.lock().await;
    subs.retain(|sub| match &sub.tx {
      SubscriberSender::Bounded(tx) => match tx.try_send(event.clone()) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
          self.dropped.fetch_add(1, Ordering::Relaxed);
          log::warn!("hub: dropping event, subscriber queue full");
          true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
      },
      SubscriberSender::Unbounded(tx) => tx.send(event.clone()).is_ok(),
    });
  }

  pub fn dropped_count(&self) -> u64 {
    self.dropped.load(Ordering::Relaxed)
  }

  /// Close the hub: drop all subscriber senders so every receiver's stream ends.
  pub async fn close(&self) {
    self.subscribers.lock().await.clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{ControlEvent, Event};

  fn event(n: &str) -> Event {
    Event::Control(ControlEvent {
      sub_key: n.to_string(),
      status: "completed".to_string(),
    })
  }

  #[tokio::test]
  async fn subscribers_receive_in_publish_order() {
    let hub = Hub::new(8);
    let mut rx = hub.subscribe().await;
    hub.publish(event("a")).await;
    hub.publish(event("b")).await;
    assert_eq!(rx.recv().await, Some(event("a")));
    assert_eq!(rx.recv().await, Some(event("b")));
  }

  #[tokio::test]
  async fn overflow_drops_for_subscribers_that_fall_behind() {
    let hub = Hub::new(1);
    let mut slow = hub.subscribe().await;
    let mut draining = hub.subscribe().await;

    hub.publish(event("1")).await;
    // `draining` keeps its queue empty by reading promptly; `slow` never does.
    assert_eq!(draining.recv().await, Some(event("1")));
    hub.publish(event("2")).await;

    assert_eq!(draining.recv().await, Some(event("2")));
    assert!(hub.dropped_count() >= 1);
    // `slow` still only has the first event queued; "2" was dropped for it.
    assert_eq!(slow.recv().await, Some(event("1")));
  }

  #[tokio::test]
  async fn close_ends_subscriber_streams() {
    let hub = Hub::new(4);
    let mut rx = hub.subscribe().await;
    hub.close().await;
    assert_eq!(rx.recv().await, None);
  }

  #[tokio::test]
  async fn zero_capacity_is_unbounded_and_never_drops() {
    let hub = Hub::new(0);
    let mut rx = hub.subscribe().await;
    for i in 0..1000 {
      hub.publish(event(&i.to_string())).await;
    }
    assert_eq!(hub.dropped_count(), 0);
    for i in 0..1000 {
      assert_eq!(rx.recv().await, Some(event(&i.to_string())));
    }
  }
}
