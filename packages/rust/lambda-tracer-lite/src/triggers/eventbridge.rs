//! EventBridge events.

use super::{ParsedTrigger, TriggerError, TriggerKind};
use serde::Deserialize;
use serde_json::Value;

pub(super) const MAGIC_IDENTIFIER: &str = "detail-type";

#[derive(Deserialize)]
struct EventBridgeEvent {
    id: String,
    source: String,
    #[serde(rename = "detail-type")]
    detail_type: String,
    #[serde(default)]
    resources: Vec<String>,
    #[serde(default)]
    detail: Option<Value>,
}

pub(super) fn can_handle(event: &Value) -> bool {
    event.get("detail-type").is_some() && event.get("source").is_some()
}

pub(super) fn parse(event: &Value) -> Result<ParsedTrigger, TriggerError> {
    let event = EventBridgeEvent::deserialize(event)
        .map_err(TriggerError::shape(TriggerKind::EventBridge))?;

    let parsed = ParsedTrigger {
        message_ids: vec![event.id],
        ..Default::default()
    };
    Ok(parsed
        .with_extra("source", Some(event.source))
        .with_extra("detailType", Some(event.detail_type))
        .with_extra("resources", (!event.resources.is_empty()).then_some(event.resources)))
}

/// The detail document, which producers often fill with another event.
pub(super) fn nested_payloads(event: &Value) -> Vec<String> {
    match event.get("detail") {
        Some(Value::String(detail)) => vec![detail.clone()],
        Some(detail @ Value::Object(_)) => serde_json::to_string(detail).into_iter().collect(),
        _ => Vec::new(),
    }
}
