use std::collections::{HashMap, VecDeque};

use super::{Candle, Subscription};

/// A ring of at most `capacity` recent bars per `(symbol, interval)`.
#[derive(Debug)]
pub struct BarBuffer {
  capacity: usize,
  bars: HashMap<Subscription, VecDeque<Candle>>,
}

impl BarBuffer {
  pub fn new(capacity: usize) -> Self {
    Self {
      capacity: capacity.max(1),
      bars: HashMap::new(),
    }
  }

  pub fn push(&mut self, sub: Subscription, candle: Candle) {
    let ring = self.bars.entry(sub).or_insert_with(VecDeque::new);
    if ring.len() == self.capacity {
      ring.pop_front();
    }
    ring.push_back(candle);
  }

  /// Snapshot of the buffered bars for a subscription, oldest first.
  pub fn snapshot(&self, sub: &Subscription) -> Vec<Candle> {
    self
      .bars
      .get(sub)
      .map(|ring| ring.iter().cloned().collect())
      .unwrap_or_default()
  }
}
