//! SNS events, both the Lambda subscription shape (`Records[].Sns`) and the
//! raw notification document SNS delivers to SQS subscribers.

use super::{first_record_source, skip_record, ParsedTrigger, TriggerError, TriggerKind};
use aws_lambda_events::sns::{SnsMessage, SnsRecord};
use serde::Deserialize;
use serde_json::Value;

pub(super) const MAGIC_IDENTIFIER: &str = "TopicArn";

/// The parts of an SNS message the resolver reads.
///
/// Also the shape of the notification document in an SQS body, and the
/// fallback for subscription records lacking the signature fields
/// [`SnsRecord`] requires.
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Notification {
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    topic_arn: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl From<SnsMessage> for Notification {
    fn from(message: SnsMessage) -> Self {
        Self {
            message_id: Some(message.message_id),
            topic_arn: Some(message.topic_arn),
            message: Some(message.message),
        }
    }
}

fn is_notification(event: &Value) -> bool {
    event.get("Type").and_then(Value::as_str) == Some("Notification")
        && event.get("TopicArn").is_some()
}

fn record_message(record: &Value) -> Result<Notification, serde_json::Error> {
    match SnsRecord::deserialize(record) {
        Ok(record) => Ok(record.sns.into()),
        Err(_) => Notification::deserialize(record.get("Sns").unwrap_or(&Value::Null)),
    }
}

fn messages(event: &Value) -> Result<Vec<Notification>, TriggerError> {
    if is_notification(event) {
        let message =
            Notification::deserialize(event).map_err(TriggerError::shape(TriggerKind::Sns))?;
        return Ok(vec![message]);
    }

    let records = event
        .get("Records")
        .and_then(Value::as_array)
        .ok_or(TriggerError::MissingField {
            kind: TriggerKind::Sns,
            field: "Records",
        })?;
    Ok(records
        .iter()
        .filter_map(|record| skip_record(TriggerKind::Sns, record_message(record)))
        .collect())
}

pub(super) fn can_handle(event: &Value) -> bool {
    first_record_source(event) == Some("aws:sns") || is_notification(event)
}

pub(super) fn parse(event: &Value) -> Result<ParsedTrigger, TriggerError> {
    let messages = messages(event)?;
    let arn = messages
        .iter()
        .find_map(|m| m.topic_arn.clone())
        .ok_or(TriggerError::MissingField {
            kind: TriggerKind::Sns,
            field: "TopicArn",
        })?;

    let parsed = ParsedTrigger {
        message_ids: messages.into_iter().filter_map(|m| m.message_id).collect(),
        ..Default::default()
    };
    Ok(parsed.with_extra("arn", Some(arn)))
}

pub(super) fn nested_payloads(event: &Value) -> Vec<String> {
    messages(event)
        .map(|messages| messages.into_iter().filter_map(|m| m.message).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscription_record() {
        let event = json!({
            "Records": [{
                "EventVersion": "1.0",
                "EventSubscriptionArn": "arn:aws:sns:us-east-1:123456789012:orders:2bcfbf39-05c3-41de-beaa-fcfcc21c8f55",
                "EventSource": "aws:sns",
                "Sns": {
                    "SignatureVersion": "1",
                    "Timestamp": "2019-01-02T12:45:07.000Z",
                    "Signature": "tcc6faL2yUC6dgZdmrwh1Y4cGa/ebXEkAi6RibDsvpi+tE/1+82j==",
                    "SigningCertUrl": "https://sns.us-east-1.amazonaws.com/SimpleNotificationService-ac565b8b1a6c5d002d285f9598aa1d9b.pem",
                    "MessageId": "95df01b4-ee98-5cb9-9903-4c221d41eb5e",
                    "Message": "Hello from SNS!",
                    "MessageAttributes": {},
                    "Type": "Notification",
                    "UnsubscribeUrl": "https://sns.us-east-1.amazonaws.com/?Action=Unsubscribe",
                    "TopicArn": "arn:aws:sns:us-east-1:123456789012:orders",
                    "Subject": "TestInvoke"
                }
            }]
        });

        assert!(can_handle(&event));
        let parsed = parse(&event).unwrap();
        assert_eq!(parsed.message_ids, vec!["95df01b4-ee98-5cb9-9903-4c221d41eb5e"]);
        assert_eq!(parsed.extra["arn"], "arn:aws:sns:us-east-1:123456789012:orders");
        assert_eq!(nested_payloads(&event), vec!["Hello from SNS!"]);
    }

    #[test]
    fn test_sparse_records_are_kept() {
        let event = json!({
            "Records": [
                {"EventSource": "aws:sns", "Sns": {"MessageId": "m1", "TopicArn": "arn:t", "Message": "a"}},
                {"EventSource": "aws:sns", "Sns": {"TopicArn": "arn:t", "Message": "b"}},
                {"EventSource": "aws:sns", "Sns": {"MessageId": 42}}
            ]
        });

        let parsed = parse(&event).unwrap();
        assert_eq!(parsed.message_ids, vec!["m1"]);
        assert_eq!(parsed.extra["arn"], "arn:t");
        assert_eq!(nested_payloads(&event), vec!["a", "b"]);
    }

    #[test]
    fn test_notification_without_message_id() {
        let event = json!({"Type": "Notification", "TopicArn": "arn:t"});
        assert!(can_handle(&event));
        let parsed = parse(&event).unwrap();
        assert!(parsed.message_ids.is_empty());
        assert_eq!(parsed.extra["arn"], "arn:t");
    }

    #[test]
    fn test_malformed_notification_is_an_error() {
        let event = json!({"Type": "Notification", "TopicArn": 7});
        assert!(can_handle(&event));
        assert!(matches!(
            parse(&event),
            Err(TriggerError::Shape { kind: TriggerKind::Sns, .. })
        ));
    }
}
