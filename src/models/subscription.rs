use std::fmt;

/// A `(symbol, interval)` pair the engine streams.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
  pub symbol: String,
  pub interval: String,
}

impl Subscription {
  pub fn new(symbol: impl Into<String>, interval: impl Into<String>) -> Self {
    Self {
      symbol: symbol.into(),
      interval: interval.into(),
    }
  }
}

impl fmt::Display for Subscription {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}@{}", self.symbol, self.interval)
  }
}
