//! AppSync direct Lambda resolver events.

use super::{ParsedTrigger, TriggerError, TriggerKind};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

pub(super) const MAGIC_IDENTIFIER: &str = "parentTypeName";

#[derive(Deserialize)]
struct AppSyncEvent {
    info: ResolverInfo,
    #[serde(default)]
    request: Option<ResolverRequest>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolverInfo {
    field_name: String,
    parent_type_name: String,
}

#[derive(Deserialize)]
struct ResolverRequest {
    #[serde(default)]
    headers: HashMap<String, Option<String>>,
}

pub(super) fn can_handle(event: &Value) -> bool {
    event
        .get("info")
        .is_some_and(|info| info.get("parentTypeName").is_some() && info.get("fieldName").is_some())
}

pub(super) fn parse(event: &Value) -> Result<ParsedTrigger, TriggerError> {
    let event =
        AppSyncEvent::deserialize(event).map_err(TriggerError::shape(TriggerKind::AppSync))?;
    let mut headers = event.request.map(|r| r.headers).unwrap_or_default();
    let request_id = headers.remove("x-amzn-requestid").flatten();
    let host = headers.remove("host").flatten();

    let parsed = ParsedTrigger {
        message_ids: request_id.into_iter().collect(),
        ..Default::default()
    };
    Ok(parsed
        .with_extra("fieldName", Some(event.info.field_name))
        .with_extra("parentTypeName", Some(event.info.parent_type_name))
        .with_extra("api", host))
}
