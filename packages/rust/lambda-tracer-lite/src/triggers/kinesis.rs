//! Kinesis stream batches. Record data often carries JSON produced upstream,
//! so it is offered as nested payloads.

use super::{first_record_source, records, ParsedTrigger, TriggerError, TriggerKind};
use aws_lambda_events::kinesis::KinesisEventRecord;
use serde_json::Value;

pub(super) const MAGIC_IDENTIFIER: &str = "aws:kinesis";

fn batch(event: &Value) -> Result<Vec<KinesisEventRecord>, TriggerError> {
    records(event, TriggerKind::Kinesis)
}

pub(super) fn can_handle(event: &Value) -> bool {
    first_record_source(event) == Some("aws:kinesis")
}

pub(super) fn parse(event: &Value) -> Result<ParsedTrigger, TriggerError> {
    let batch = batch(event)?;
    let arn = batch.iter().find_map(|r| r.event_source_arn.clone());
    let shard_id = batch
        .iter()
        .find_map(|r| r.event_id.as_deref())
        .and_then(|id| id.split_once(':'))
        .map(|(shard, _)| shard.to_string());

    let parsed = ParsedTrigger {
        message_ids: batch
            .into_iter()
            .map(|r| r.kinesis.sequence_number)
            .filter(|sequence| !sequence.is_empty())
            .collect(),
        ..Default::default()
    };
    Ok(parsed.with_extra("arn", arn).with_extra("shardId", shard_id))
}

pub(super) fn nested_payloads(event: &Value) -> Vec<String> {
    batch(event)
        .map(|batch| {
            batch
                .iter()
                .map(|r| String::from_utf8_lossy(&r.kinesis.data.0).into_owned())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde_json::json;

    fn record(sequence: &str, data: &str) -> Value {
        json!({
            "kinesis": {
                "kinesisSchemaVersion": "1.0",
                "partitionKey": "1",
                "sequenceNumber": sequence,
                "data": data,
                "approximateArrivalTimestamp": 1545084650.987
            },
            "eventSource": "aws:kinesis",
            "eventVersion": "1.0",
            "eventID": format!("shardId-000000000006:{}", sequence),
            "eventName": "aws:kinesis:record",
            "invokeIdentityArn": "arn:aws:iam::123456789012:role/lambda-role",
            "awsRegion": "us-east-2",
            "eventSourceARN": "arn:aws:kinesis:us-east-2:123456789012:stream/lambda-stream"
        })
    }

    #[test]
    fn test_invalid_base64_record_is_skipped() {
        let event = json!({
            "Records": [record("1", "!!!"), record("2", &STANDARD.encode("ok"))]
        });

        assert!(can_handle(&event));
        assert_eq!(nested_payloads(&event), vec!["ok"]);
        let parsed = parse(&event).unwrap();
        assert_eq!(parsed.message_ids, vec!["2"]);
        assert_eq!(parsed.extra["shardId"], "shardId-000000000006");
        assert_eq!(
            parsed.extra["arn"],
            "arn:aws:kinesis:us-east-2:123456789012:stream/lambda-stream"
        );
    }
}
