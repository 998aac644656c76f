//! DynamoDB stream batches.

use super::{first_record_source, records, ParsedTrigger, TriggerError, TriggerKind};
use aws_lambda_events::dynamodb::EventRecord;
use serde_json::Value;

pub(super) const MAGIC_IDENTIFIER: &str = "aws:dynamodb";

pub(super) fn can_handle(event: &Value) -> bool {
    first_record_source(event) == Some("aws:dynamodb")
}

/// Table ARN from a stream ARN (`.../table/orders/stream/2024-...`).
fn table_arn(stream_arn: &str) -> &str {
    stream_arn
        .split_once("/stream/")
        .map_or(stream_arn, |(table, _)| table)
}

pub(super) fn parse(event: &Value) -> Result<ParsedTrigger, TriggerError> {
    let batch: Vec<EventRecord> = records(event, TriggerKind::DynamoDb)?;
    let first = batch.first();
    let arn = first
        .and_then(|r| r.event_source_arn.as_deref())
        .map(table_arn)
        .map(str::to_string);
    // Epoch seconds; absent creation times deserialize to the epoch itself
    let created = first
        .map(|r| r.change.approximate_creation_date_time.timestamp())
        .filter(|seconds| *seconds > 0);

    let parsed = ParsedTrigger {
        message_ids: batch
            .into_iter()
            .map(|r| r.event_id)
            .filter(|id| !id.is_empty())
            .collect(),
        ..Default::default()
    };
    Ok(parsed
        .with_extra("arn", arn)
        .with_extra("approxEventCreationTime", created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(event_id: &str) -> Value {
        json!({
            "eventID": event_id,
            "eventName": "INSERT",
            "eventVersion": "1.1",
            "eventSource": "aws:dynamodb",
            "awsRegion": "us-east-1",
            "dynamodb": {
                "Keys": {"Id": {"N": "101"}},
                "NewImage": {"Message": {"S": "New item!"}, "Id": {"N": "101"}},
                "ApproximateCreationDateTime": 1479499740,
                "SequenceNumber": "4421584500000000017450439091",
                "SizeBytes": 26,
                "StreamViewType": "NEW_AND_OLD_IMAGES"
            },
            "eventSourceARN": "arn:aws:dynamodb:us-east-1:123456789012:table/orders/stream/2024-01-01T00:00:00.000"
        })
    }

    #[test]
    fn test_stream_batch() {
        let mut broken = record("broken");
        broken["dynamodb"] = json!("not a stream record");
        let event = json!({"Records": [record("c4ca4238a0b923820dcc509a6f75849b"), broken]});

        assert!(can_handle(&event));
        let parsed = parse(&event).unwrap();
        assert_eq!(parsed.message_ids, vec!["c4ca4238a0b923820dcc509a6f75849b"]);
        assert_eq!(
            parsed.extra["arn"],
            "arn:aws:dynamodb:us-east-1:123456789012:table/orders"
        );
        assert_eq!(parsed.extra["approxEventCreationTime"], 1479499740);
    }
}
