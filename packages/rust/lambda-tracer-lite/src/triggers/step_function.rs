//! Step function state inputs carrying the tracer's execution marker.

use super::{ParsedTrigger, TriggerError, TriggerKind};
use crate::constants::markers::{STEP_FUNCTION_UID, TRACER_KEY};
use serde_json::Value;

pub(super) const MAGIC_IDENTIFIER: &str = STEP_FUNCTION_UID;

fn uid(event: &Value) -> Option<&str> {
    event.get(TRACER_KEY)?.get(STEP_FUNCTION_UID)?.as_str()
}

pub(super) fn can_handle(event: &Value) -> bool {
    uid(event).is_some()
}

pub(super) fn parse(event: &Value) -> Result<ParsedTrigger, TriggerError> {
    let uid = uid(event).ok_or(TriggerError::MissingField {
        kind: TriggerKind::StepFunction,
        field: STEP_FUNCTION_UID,
    })?;
    Ok(ParsedTrigger {
        message_ids: vec![uid.to_string()],
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_marker() {
        let event = json!({"order": 1, "_tracer": {"step_function_uid": "54589cfc-5ed8-4799-8fc0-5b45f6f225d1"}});
        assert!(can_handle(&event));
        assert_eq!(
            parse(&event).unwrap().message_ids,
            vec!["54589cfc-5ed8-4799-8fc0-5b45f6f225d1"]
        );
        assert!(!can_handle(&json!({"_tracer": {}})));
    }
}
