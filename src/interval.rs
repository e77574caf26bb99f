//! Normalize a user-supplied interval string into TradingView's resolution code.

use crate::errors::TvError;

const ALLOWED: &[&str] =
  &["1", "3", "5", "15", "30", "60", "120", "240", "D", "W", "M"];

/// Normalize `raw` into one of the allowed resolution codes, or fail.
///
/// Idempotent: `normalize(normalize(x)?)? == normalize(x)?` for every `x`
/// that normalizes successfully.
pub fn normalize(raw: &str) -> Result<String, TvError> {
  let trimmed = raw.trim().to_lowercase();

  let candidate = if let Some(prefix) = trimmed.strip_suffix("mo") {
    if prefix.chars().all(|c| c.is_ascii_digit()) && !prefix.is_empty() {
      "M".to_string()
    } else {
      trimmed.to_uppercase()
    }
  } else if let Some(prefix) = trimmed.strip_suffix('m') {
    prefix.to_string()
  } else if let Some(prefix) = trimmed.strip_suffix('h') {
    scale(prefix, 60).unwrap_or_else(|| trimmed.to_uppercase())
  } else if let Some(prefix) = trimmed.strip_suffix('d') {
    scale(prefix, 1440).unwrap_or_else(|| trimmed.to_uppercase())
  } else if let Some(prefix) = trimmed.strip_suffix('w') {
    scale(prefix, 10080).unwrap_or_else(|| trimmed.to_uppercase())
  } else {
    trimmed.to_uppercase()
  };

  if candidate.chars().all(|c| c.is_ascii_digit()) && !candidate.is_empty() {
    if ALLOWED.contains(&candidate.as_str()) {
      return Ok(candidate);
    }
  } else if ALLOWED.contains(&candidate.as_str()) {
    return Ok(candidate);
  }

  Err(TvError::InvalidInterval(raw.to_string()))
}

fn scale(prefix: &str, minutes_per_unit: u64) -> Option<String> {
  let n: u64 = prefix.parse().ok()?;
  Some((n * minutes_per_unit).to_string())
}

/// Duration covered by one bar of the given resolution code, used to derive
/// `tsClose` when the server omits an explicit close-time label.
pub fn duration(code: &str) -> chrono::Duration {
  match code {
    "D" => chrono::Duration::days(1),
    "W" => chrono::Duration::weeks(1),
    "M" => chrono::Duration::days(30),
    minutes => {
      let n: i64 = minutes.parse().unwrap_or(1);
      chrono::Duration::minutes(n)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn passthrough_minute_codes() {
    for code in ["1", "5", "15", "30", "60", "120", "240"] {
      assert_eq!(normalize(code).unwrap(), code);
    }
  }

  #[test]
  fn day_week_month_letters() {
    assert_eq!(normalize("d").unwrap(), "D");
    assert_eq!(normalize("w").unwrap(), "W");
    assert_eq!(normalize("1M").unwrap(), "M");
    assert!(normalize("mo").is_err());
  }

  #[test]
  fn hour_and_day_suffixes_scale_to_minutes() {
    assert_eq!(normalize("1h").unwrap(), "60");
    assert_eq!(normalize("2h").unwrap(), "120");
    assert_eq!(normalize("4h").unwrap(), "240");
  }

  #[test]
  fn month_suffix_collapses_to_m() {
    assert_eq!(normalize("1mo").unwrap(), "M");
  }

  #[test]
  fn rejects_unsupported() {
    assert!(normalize("7").is_err());
    assert!(normalize("banana").is_err());
  }

  #[test]
  fn idempotent_on_success() {
    for raw in ["1H", " D ", "W", "240"] {
      let once = normalize(raw).unwrap();
      let twice = normalize(&once).unwrap();
      assert_eq!(once, twice);
    }
  }
}
