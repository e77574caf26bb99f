//! Parses inbound JSON payloads into typed [`Event`]s.
//!
//! Dispatch is a match over the `"m"` method name of a parsed
//! [`serde_json::Value`] tree, never a regex or ad-hoc downcast.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::errors::TvError;
use crate::models::{Candle, ControlEvent, Event, MetaEvent, Subscription, Tick};
use crate::session::SessionState;

fn epoch_to_utc(n: i64) -> DateTime<Utc> {
  let millis = if n.abs() > 1_000_000_000_000 { n } else { n * 1000 };
  Utc.timestamp_millis_opt(millis).single().unwrap_or(Utc::now())
}

/// Relies on `serde_json`'s `arbitrary_precision` feature: with it enabled,
/// `Number` retains the wire's original numeric token verbatim, so
/// `n.to_string()` below never round-trips through `f64`.
fn value_to_decimal(v: &Value) -> Option<Decimal> {
  match v {
    Value::Number(n) => Decimal::from_str_exact(&n.to_string()).ok(),
    Value::String(s) => Decimal::from_str_exact(s).ok(),
    _ => None,
  }
}

/// Decode one already-unwrapped protocol payload. A single `du`/
/// `timescale_update` frame can carry many bars at once (e.g. the initial
/// history burst after `create_series`), so this returns a vec rather than
/// a single optional event.
pub async fn decode(payload: &str, session: &SessionState) -> Vec<Event> {
  let Ok(value) = serde_json::from_str::<Value>(payload) else {
    return Vec::new();
  };
  let Some(method) = value.get("m").and_then(Value::as_str) else {
    return Vec::new();
  };

  match method {
    "qsd" => decode_tick(&value).into_iter().collect(),
    "du" | "timescale_update" => decode_candles(&value, session).await,
    "series_completed" => decode_control(&value).into_iter().collect(),
    "symbol_resolved" => vec![Event::Meta(MetaEvent {
      info: value.get("p").cloned().unwrap_or(Value::Null),
    })],
    "critical_error" => {
      log_subscribe_rejected(&value);
      Vec::new()
    }
    _ => Vec::new(),
  }
}

/// The server sends `critical_error` when a subscribe-time request (most
/// often `resolve_symbol`) is rejected — an unknown ticker, a bad adjustment
/// option, and the like. Per policy this is logged and otherwise ignored:
/// the connection stays up and every other subscription keeps streaming.
fn log_subscribe_rejected(value: &Value) {
  let p = value.get("p").and_then(Value::as_array);
  let name = p
    .and_then(|p| p.get(1))
    .and_then(Value::as_str)
    .unwrap_or("unknown symbol")
    .to_string();
  let reason = p
    .and_then(|p| p.get(2))
    .and_then(Value::as_str)
    .unwrap_or("no reason given")
    .to_string();
  let err = TvError::SubscribeRejected {
    symbol: name,
    reason,
  };
  log::warn!("{err}");
}

fn decode_tick(value: &Value) -> Option<Event> {
  let p = value.get("p")?.as_array()?;
  let data = p.get(1)?;
  let symbol = data.get("n")?.as_str()?.to_string();
  let v = data.get("v")?;
  let price = value_to_decimal(v.get("lp")?)?;
  let volume = value_to_decimal(v.get("volume")?).unwrap_or(Decimal::ZERO);
  let upd = v.get("upd")?.as_i64()?;
  Some(Event::Tick(Tick {
    symbol,
    ts: epoch_to_utc(upd),
    price,
    volume,
  }))
}

async fn decode_candles(value: &Value, session: &SessionState) -> Vec<Event> {
  let mut out = Vec::new();
  let Some(series_map) = value.get("p").and_then(Value::as_array).and_then(|p| p.get(1)).and_then(Value::as_object) else {
    return out;
  };

  for (series_id, payload) in series_map {
    let Some(Subscription { symbol, interval }) = session.series_subscription(series_id).await
    else {
      continue;
    };
    let Some(bars) = payload.get("s").and_then(Value::as_array) else {
      continue;
    };
    for bar in bars {
      let Some(candle) = decode_one_bar(bar, &symbol, &interval) else {
        continue;
      };
      out.push(Event::Candle(candle));
    }
  }
  out
}

fn decode_one_bar(bar: &Value, symbol: &str, interval: &str) -> Option<Candle> {
  let v = bar.get("v")?.as_array()?;
  if v.len() < 6 {
    return None;
  }
  let ts_open = epoch_to_utc(v[0].as_i64()?);
  let open = value_to_decimal(&v[1])?;
  let high = value_to_decimal(&v[2])?;
  let low = value_to_decimal(&v[3])?;
  let close = value_to_decimal(&v[4])?;
  let volume = value_to_decimal(&v[5]);
  let closed = v.get(6).map(truthy).unwrap_or(false);

  let bar_close_time = bar
    .get("lbs")
    .and_then(|lbs| lbs.get("bar_close_time"))
    .and_then(Value::as_i64)
    .map(epoch_to_utc);
  let ts_close = Candle::close_time(interval, ts_open, bar_close_time);

  Some(Candle {
    symbol: symbol.to_string(),
    interval_code: interval.to_string(),
    ts_open,
    ts_close,
    open,
    high,
    low,
    close,
    volume,
    closed,
  })
}

fn truthy(v: &Value) -> bool {
  match v {
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
    Value::String(s) => !s.is_empty() && s != "0",
    Value::Null => false,
    _ => true,
  }
}

fn decode_control(value: &Value) -> Option<Event> {
  let p = value.get("p")?.as_array()?;
  let sub_key = p.get(1)?.as_str()?.to_string();
  Some(Event::Control(ControlEvent {
    sub_key,
    status: "completed".to_string(),
  }))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn decodes_candle_with_explicit_close_time() {
    let session = SessionState::new();
    let sub = Subscription::new("SYM", "1");
    let series_id = session.register_series(sub).await;

    let payload = format!(
      r#"{{"m":"du","p":["cs_x",{{"{sid}":{{"s":[{{"i":0,"v":[1600000000,1,2,0.5,1.5,100,0]}},"lbs":{{"bar_close_time":1600000060}}}}]}}}}]}}"#,
      sid = series_id
    );

    let events = decode(&payload, &session).await;
    assert_eq!(events.len(), 1);
    match &events[0] {
      Event::Candle(c) => {
        assert_eq!(c.symbol, "SYM");
        assert_eq!(c.interval_code, "1");
        assert_eq!(c.ts_open, Utc.timestamp_opt(1_600_000_000, 0).unwrap());
        assert_eq!(c.ts_close, Utc.timestamp_opt(1_600_000_060, 0).unwrap());
        assert_eq!(c.open, Decimal::from_str_exact("1").unwrap());
        assert_eq!(c.high, Decimal::from_str_exact("2").unwrap());
        assert_eq!(c.low, Decimal::from_str_exact("0.5").unwrap());
        assert_eq!(c.close, Decimal::from_str_exact("1.5").unwrap());
        assert_eq!(c.volume, Some(Decimal::from_str_exact("100").unwrap()));
        assert!(!c.closed);
      }
      _ => panic!("expected candle"),
    }
  }

  #[tokio::test]
  async fn decodes_every_bar_in_a_bulk_history_frame() {
    let session = SessionState::new();
    let sub = Subscription::new("SYM", "1");
    let series_id = session.register_series(sub).await;

    let payload = format!(
      r#"{{"m":"du","p":["cs_x",{{"{sid}":{{"s":[{{"i":0,"v":[1,1,2,0.5,1.5,10]}},{{"i":1,"v":[61,1.5,2.5,1,2,20]}}]}}}}]}}"#,
      sid = series_id
    );

    let events = decode(&payload, &session).await;
    assert_eq!(events.len(), 2);
  }

  #[tokio::test]
  async fn unknown_series_id_is_dropped_silently() {
    let session = SessionState::new();
    let payload = r#"{"m":"du","p":["cs_x",{"s9999":{"s":[{"i":0,"v":[1,1,1,1,1,1]}]}}]}"#;
    assert!(decode(payload, &session).await.is_empty());
  }

  #[tokio::test]
  async fn decodes_tick() {
    let session = SessionState::new();
    let payload = r#"{"m":"qsd","p":["qs_x",{"n":"NSE:SBIN","v":{"lp":123.45,"volume":900,"upd":1600000000000}}]}"#;
    let events = decode(payload, &session).await;
    match &events[0] {
      Event::Tick(t) => {
        assert_eq!(t.symbol, "NSE:SBIN");
        assert_eq!(t.price, Decimal::from_str_exact("123.45").unwrap());
      }
      _ => panic!("expected tick"),
    }
  }

  #[tokio::test]
  async fn non_object_or_unknown_method_yields_nothing() {
    let session = SessionState::new();
    assert!(decode("not json", &session).await.is_empty());
    assert!(decode(r#"{"m":"something_else","p":[]}"#, &session)
      .await
      .is_empty());
  }

  #[tokio::test]
  async fn critical_error_is_logged_and_yields_no_event() {
    let session = SessionState::new();
    let payload = r#"{"m":"critical_error","p":["cs_x","BOGUS:SYM","symbol not found"]}"#;
    // No event is published and, crucially, nothing here returns an error:
    // the caller's read loop simply moves on to the next frame.
    assert!(decode(payload, &session).await.is_empty());
  }

  #[tokio::test]
  async fn exact_decimal_values_survive_a_fractional_wire_token() {
    let session = SessionState::new();
    let sub = Subscription::new("SYM", "1");
    let series_id = session.register_series(sub).await;
    let payload = format!(
      r#"{{"m":"du","p":["cs_x",{{"{sid}":{{"s":[{{"i":0,"v":[1,100.1,100.2,100.05,100.15,1]}}]}}}}]}}"#,
      sid = series_id
    );
    let events = decode(&payload, &session).await;
    match &events[0] {
      Event::Candle(c) => {
        // 100.1 cannot be represented exactly in f64; if the value were ever
        // routed through `Value::as_f64`/`f64::to_string` this would fail.
        assert_eq!(c.open, Decimal::from_str_exact("100.1").unwrap());
        assert_eq!(c.low, Decimal::from_str_exact("100.05").unwrap());
      }
      _ => panic!("expected candle"),
    }
  }
}
