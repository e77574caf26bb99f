use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::interval;

/// One OHLCV bar, forming or closed.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Candle {
  pub symbol: String,
  pub interval_code: String,
  pub ts_open: DateTime<Utc>,
  pub ts_close: DateTime<Utc>,
  pub open: Decimal,
  pub high: Decimal,
  pub low: Decimal,
  pub close: Decimal,
  pub volume: Option<Decimal>,
  pub closed: bool,
}

impl Candle {
  /// Derive `ts_close` from an explicit close-time label when the wire
  /// provides one, otherwise from the interval's duration.
  pub fn close_time(
    interval_code: &str,
    ts_open: DateTime<Utc>,
    bar_close_time: Option<DateTime<Utc>>,
  ) -> DateTime<Utc> {
    bar_close_time.unwrap_or_else(|| ts_open + interval::duration(interval_code))
  }
}
