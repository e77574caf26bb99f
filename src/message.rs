//! Builds TradingView protocol method calls as framed envelopes.

use serde_json::json;

use crate::framing;

fn frame(method: &str, params: serde_json::Value) -> String {
  let body = json!({"m": method, "p": params}).to_string();
  framing::encode(&body)
}

pub fn set_auth_token(token: &str) -> String {
  frame("set_auth_token", json!([token]))
}

pub fn chart_create_session(chart_session: &str) -> String {
  frame("chart_create_session", json!([chart_session, ""]))
}

pub fn quote_create_session(quote_session: &str) -> String {
  frame("quote_create_session", json!([quote_session]))
}

/// The `ch` field is deliberately omitted; some server clusters close the
/// socket when it's present.
pub fn quote_set_fields(quote_session: &str) -> String {
  frame("quote_set_fields", json!([quote_session, "lp", "volume"]))
}

pub fn quote_add_symbols(quote_session: &str, symbol: &str) -> String {
  frame("quote_add_symbols", json!([quote_session, [symbol]]))
}

pub fn quote_remove_symbols(quote_session: &str, symbol: &str) -> String {
  frame("quote_remove_symbols", json!([quote_session, symbol]))
}

pub fn resolve_symbol(chart_session: &str, alias: &str, symbol: &str) -> String {
  let descriptor =
    json!({"symbol": symbol, "adjustment": "splits"}).to_string();
  let descriptor = format!("={descriptor}");
  frame("resolve_symbol", json!([chart_session, alias, descriptor]))
}

/// `history` is clamped to a minimum of 300; the server rejects lower values.
pub fn create_series(
  chart_session: &str,
  series_id: &str,
  alias: &str,
  resolution: &str,
  history: u32,
) -> String {
  let history = history.max(300);
  frame(
    "create_series",
    json!([chart_session, series_id, series_id, alias, resolution, history, ""]),
  )
}

pub fn remove_series(chart_session: &str, series_id: &str) -> String {
  frame("remove_series", json!([chart_session, series_id]))
}
