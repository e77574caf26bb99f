use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// A last-price / volume update, decoded from a `qsd` frame.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Tick {
  pub symbol: String,
  pub ts: DateTime<Utc>,
  pub price: Decimal,
  pub volume: Decimal,
}
