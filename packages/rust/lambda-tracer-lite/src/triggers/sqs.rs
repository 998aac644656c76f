//! SQS batches.

use super::{first_record_source, records, ParsedTrigger, TriggerError, TriggerKind};
use aws_lambda_events::sqs::SqsMessage;
use serde_json::Value;

pub(super) const MAGIC_IDENTIFIER: &str = "aws:sqs";

fn messages(event: &Value) -> Result<Vec<SqsMessage>, TriggerError> {
    records(event, TriggerKind::Sqs)
}

pub(super) fn can_handle(event: &Value) -> bool {
    first_record_source(event) == Some("aws:sqs")
}

pub(super) fn parse(event: &Value) -> Result<ParsedTrigger, TriggerError> {
    let messages = messages(event)?;
    let arn = messages.iter().find_map(|m| m.event_source_arn.clone());

    let parsed = ParsedTrigger {
        message_ids: messages.into_iter().filter_map(|m| m.message_id).collect(),
        ..Default::default()
    };
    Ok(parsed.with_extra("arn", arn))
}

pub(super) fn nested_payloads(event: &Value) -> Vec<String> {
    messages(event)
        .map(|messages| messages.into_iter().filter_map(|m| m.body).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sparse_and_malformed_records() {
        let event = json!({
            "Records": [
                {"eventSource": "aws:sqs", "body": "first"},
                {"eventSource": "aws:sqs", "messageId": "m2", "body": {"not": "a string"}},
                {
                    "eventSource": "aws:sqs",
                    "messageId": "m3",
                    "body": "third",
                    "eventSourceARN": "arn:aws:sqs:us-east-1:123456789012:orders"
                }
            ]
        });

        assert!(can_handle(&event));
        let parsed = parse(&event).unwrap();
        assert_eq!(parsed.message_ids, vec!["m3"]);
        assert_eq!(parsed.extra["arn"], "arn:aws:sqs:us-east-1:123456789012:orders");
        assert_eq!(nested_payloads(&event), vec!["first", "third"]);
    }
}
