use super::{Candle, Tick};

/// A completion marker the historic fetcher waits on.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ControlEvent {
  pub sub_key: String,
  pub status: String,
}

/// Informational payload from a `symbol_resolved` frame. Consumers may ignore it.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MetaEvent {
  pub info: serde_json::Value,
}

/// Anything the frame decoder can produce from a single payload.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
  Tick(Tick),
  Candle(Candle),
  Control(ControlEvent),
  Meta(MetaEvent),
}
