//! S3 bucket notifications.

use super::{first_record_source, records, ParsedTrigger, TriggerError, TriggerKind};
use aws_lambda_events::s3::S3EventRecord;
use serde_json::Value;

pub(super) const MAGIC_IDENTIFIER: &str = "aws:s3";

pub(super) fn can_handle(event: &Value) -> bool {
    first_record_source(event) == Some("aws:s3")
}

pub(super) fn parse(event: &Value) -> Result<ParsedTrigger, TriggerError> {
    let batch: Vec<S3EventRecord> = records(event, TriggerKind::S3)?;
    let first = batch.first();
    let arn = first.and_then(|r| r.s3.bucket.arn.clone());
    let bucket = first.and_then(|r| r.s3.bucket.name.clone());
    let event_name = first.and_then(|r| r.event_name.clone());

    let parsed = ParsedTrigger {
        message_ids: batch
            .into_iter()
            .filter_map(|mut r| r.response_elements.remove("x-amz-request-id"))
            .collect(),
        ..Default::default()
    };
    Ok(parsed
        .with_extra("arn", arn)
        .with_extra("bucket", bucket)
        .with_extra("eventName", event_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bucket_notification() {
        let event = json!({
            "Records": [{
                "eventVersion": "2.0",
                "eventSource": "aws:s3",
                "awsRegion": "us-east-1",
                "eventTime": "1970-01-01T00:00:00.000Z",
                "eventName": "ObjectCreated:Put",
                "userIdentity": {"principalId": "EXAMPLE"},
                "requestParameters": {"sourceIPAddress": "127.0.0.1"},
                "responseElements": {
                    "x-amz-request-id": "C3D13FE58DE4C810",
                    "x-amz-id-2": "FMyUVURIY8/IgAtTv8xRjskZQpcIZ9KG4V5Wp6S7S/JRWeUWerMUE5JgHvANOjpD"
                },
                "s3": {
                    "s3SchemaVersion": "1.0",
                    "configurationId": "testConfigRule",
                    "bucket": {
                        "name": "uploads",
                        "ownerIdentity": {"principalId": "EXAMPLE"},
                        "arn": "arn:aws:s3:::uploads"
                    },
                    "object": {
                        "key": "photos/cat.png",
                        "size": 1024,
                        "eTag": "0123456789abcdef0123456789abcdef",
                        "sequencer": "0A1B2C3D4E5F678901"
                    }
                }
            }]
        });

        assert!(can_handle(&event));
        let parsed = parse(&event).unwrap();
        assert_eq!(parsed.message_ids, vec!["C3D13FE58DE4C810"]);
        assert_eq!(parsed.extra["bucket"], "uploads");
        assert_eq!(parsed.extra["arn"], "arn:aws:s3:::uploads");
        assert_eq!(parsed.extra["eventName"], "ObjectCreated:Put");
    }
}
