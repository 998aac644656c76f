//! Trigger-chain resolution.
//!
//! Works out which upstream event source(s) invoked the function by matching
//! the invocation event against every known event shape. A matched event can
//! carry further serialized events (an SNS notification inside an SQS body, a
//! JSON document inside a Kinesis record, ...). Those nested payloads are
//! resolved recursively, producing a forest of [`Trigger`]s linked through
//! `target_id`.
//!
//! Resolution is bounded twice: levels at or beyond `max_depth` are not
//! explored, and at most `max_width` nested payloads are explored per trigger.
//! Only payloads containing at least one matcher's magic identifier are parsed
//! at all. Any failure (bad JSON, missing fields, a panicking matcher) skips
//! just that branch.

mod api_gateway;
mod appsync;
mod dynamodb;
mod eventbridge;
mod kinesis;
mod s3;
mod sns;
mod sqs;
mod step_function;

use crate::{
    constants::defaults,
    hook::{try_run, try_run_result},
    logger::Logger,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::{
    collections::{HashMap, HashSet},
    fmt,
    str::FromStr,
    sync::OnceLock,
};
use thiserror::Error;

static LOGGER: Logger = Logger::const_new("triggers");

/// Event source that triggered (part of) an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[non_exhaustive]
pub enum TriggerKind {
    #[serde(rename = "apigw")]
    ApiGateway,
    #[serde(rename = "sns")]
    Sns,
    #[serde(rename = "sqs")]
    Sqs,
    #[serde(rename = "s3")]
    S3,
    #[serde(rename = "dynamodb")]
    DynamoDb,
    #[serde(rename = "kinesis")]
    Kinesis,
    #[serde(rename = "eventBridge")]
    EventBridge,
    #[serde(rename = "appsync")]
    AppSync,
    #[serde(rename = "stepFunction")]
    StepFunction,
    #[serde(rename = "invocation")]
    Invocation,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::ApiGateway => "apigw",
            TriggerKind::Sns => "sns",
            TriggerKind::Sqs => "sqs",
            TriggerKind::S3 => "s3",
            TriggerKind::DynamoDb => "dynamodb",
            TriggerKind::Kinesis => "kinesis",
            TriggerKind::EventBridge => "eventBridge",
            TriggerKind::AppSync => "appsync",
            TriggerKind::StepFunction => "stepFunction",
            TriggerKind::Invocation => "invocation",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerKind {
    type Err = TriggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "apigw" | "apigateway" => Ok(TriggerKind::ApiGateway),
            "sns" => Ok(TriggerKind::Sns),
            "sqs" => Ok(TriggerKind::Sqs),
            "s3" => Ok(TriggerKind::S3),
            "dynamodb" => Ok(TriggerKind::DynamoDb),
            "kinesis" => Ok(TriggerKind::Kinesis),
            "eventbridge" => Ok(TriggerKind::EventBridge),
            "appsync" => Ok(TriggerKind::AppSync),
            "stepfunction" | "stepfunctions" => Ok(TriggerKind::StepFunction),
            "invocation" => Ok(TriggerKind::Invocation),
            _ => Err(TriggerError::UnknownKind(s.to_string())),
        }
    }
}

/// Errors raised while resolving one branch of the trigger forest.
#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("{kind} event does not match the expected shape: {source}")]
    Shape {
        kind: TriggerKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} event has no {field}")]
    MissingField {
        kind: TriggerKind,
        field: &'static str,
    },

    #[error("nested payload is not JSON: {0}")]
    NestedPayload(#[source] serde_json::Error),

    #[error("unknown trigger kind {0:?}")]
    UnknownKind(String),
}

impl TriggerError {
    fn shape(kind: TriggerKind) -> impl FnOnce(serde_json::Error) -> TriggerError {
        move |source| TriggerError::Shape { kind, source }
    }
}

/// One node of the trigger forest.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub id: String,
    /// Id of the trigger whose payload carried this one; `None` for roots.
    pub target_id: Option<String>,
    pub triggered_by: TriggerKind,
    pub from_message_ids: Vec<String>,
    pub extra: Map<String, Value>,
}

impl Trigger {
    fn new(kind: TriggerKind, target_id: Option<&str>, parsed: ParsedTrigger) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            target_id: target_id.map(str::to_string),
            triggered_by: kind,
            from_message_ids: parsed.message_ids,
            extra: parsed.extra,
        }
    }

    /// Root trigger reported when no known event source matched.
    pub fn invocation() -> Self {
        Self::new(TriggerKind::Invocation, None, ParsedTrigger::default())
    }
}

/// What a matcher extracts from an event before it becomes a [`Trigger`].
#[derive(Debug, Default)]
pub(crate) struct ParsedTrigger {
    pub(crate) message_ids: Vec<String>,
    pub(crate) extra: Map<String, Value>,
}

impl ParsedTrigger {
    fn with_extra(mut self, key: &str, value: Option<impl Into<Value>>) -> Self {
        if let Some(value) = value {
            self.extra.insert(key.to_string(), value.into());
        }
        self
    }
}

/// Resolver bounds and reporting filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSettings {
    pub max_depth: usize,
    pub max_width: usize,
    /// Trigger kinds left out of the report.
    pub filter: Vec<TriggerKind>,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            max_depth: defaults::MAX_TRIGGER_DEPTH,
            max_width: defaults::MAX_TRIGGER_WIDTH,
            filter: Vec::new(),
        }
    }
}

/// Known event shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    ApiGateway,
    Sns,
    Sqs,
    S3,
    DynamoDb,
    Kinesis,
    EventBridge,
    AppSync,
    StepFunction,
}

impl Matcher {
    pub const ALL: [Matcher; 9] = [
        Matcher::ApiGateway,
        Matcher::Sns,
        Matcher::Sqs,
        Matcher::S3,
        Matcher::DynamoDb,
        Matcher::Kinesis,
        Matcher::EventBridge,
        Matcher::AppSync,
        Matcher::StepFunction,
    ];

    pub fn kind(&self) -> TriggerKind {
        match self {
            Matcher::ApiGateway => TriggerKind::ApiGateway,
            Matcher::Sns => TriggerKind::Sns,
            Matcher::Sqs => TriggerKind::Sqs,
            Matcher::S3 => TriggerKind::S3,
            Matcher::DynamoDb => TriggerKind::DynamoDb,
            Matcher::Kinesis => TriggerKind::Kinesis,
            Matcher::EventBridge => TriggerKind::EventBridge,
            Matcher::AppSync => TriggerKind::AppSync,
            Matcher::StepFunction => TriggerKind::StepFunction,
        }
    }

    pub fn can_handle(&self, event: &Value) -> bool {
        match self {
            Matcher::ApiGateway => api_gateway::can_handle(event),
            Matcher::Sns => sns::can_handle(event),
            Matcher::Sqs => sqs::can_handle(event),
            Matcher::S3 => s3::can_handle(event),
            Matcher::DynamoDb => dynamodb::can_handle(event),
            Matcher::Kinesis => kinesis::can_handle(event),
            Matcher::EventBridge => eventbridge::can_handle(event),
            Matcher::AppSync => appsync::can_handle(event),
            Matcher::StepFunction => step_function::can_handle(event),
        }
    }

    pub fn parse(&self, event: &Value, target_id: Option<&str>) -> Result<Trigger, TriggerError> {
        let parsed = match self {
            Matcher::ApiGateway => api_gateway::parse(event),
            Matcher::Sns => sns::parse(event),
            Matcher::Sqs => sqs::parse(event),
            Matcher::S3 => s3::parse(event),
            Matcher::DynamoDb => dynamodb::parse(event),
            Matcher::Kinesis => kinesis::parse(event),
            Matcher::EventBridge => eventbridge::parse(event),
            Matcher::AppSync => appsync::parse(event),
            Matcher::StepFunction => step_function::parse(event),
        }?;
        Ok(Trigger::new(self.kind(), target_id, parsed))
    }

    /// Serialized payloads carried by `event` that may hold further triggers.
    pub fn extract_nested_payloads(&self, event: &Value) -> Vec<String> {
        match self {
            Matcher::Sns => sns::nested_payloads(event),
            Matcher::Sqs => sqs::nested_payloads(event),
            Matcher::Kinesis => kinesis::nested_payloads(event),
            Matcher::EventBridge => eventbridge::nested_payloads(event),
            Matcher::ApiGateway
            | Matcher::S3
            | Matcher::DynamoDb
            | Matcher::AppSync
            | Matcher::StepFunction => Vec::new(),
        }
    }

    /// Substring that any payload of this kind contains.
    pub fn magic_identifier(&self) -> &'static str {
        match self {
            Matcher::ApiGateway => api_gateway::MAGIC_IDENTIFIER,
            Matcher::Sns => sns::MAGIC_IDENTIFIER,
            Matcher::Sqs => sqs::MAGIC_IDENTIFIER,
            Matcher::S3 => s3::MAGIC_IDENTIFIER,
            Matcher::DynamoDb => dynamodb::MAGIC_IDENTIFIER,
            Matcher::Kinesis => kinesis::MAGIC_IDENTIFIER,
            Matcher::EventBridge => eventbridge::MAGIC_IDENTIFIER,
            Matcher::AppSync => appsync::MAGIC_IDENTIFIER,
            Matcher::StepFunction => step_function::MAGIC_IDENTIFIER,
        }
    }
}

/// Union of every matcher's magic identifier, compiled once.
fn magic_identifiers() -> Option<&'static regex::Regex> {
    static UNION: OnceLock<Option<regex::Regex>> = OnceLock::new();
    UNION
        .get_or_init(|| {
            let pattern = Matcher::ALL
                .iter()
                .map(|m| regex::escape(m.magic_identifier()))
                .collect::<Vec<_>>()
                .join("|");
            regex::Regex::new(&pattern).ok()
        })
        .as_ref()
}

fn may_hold_trigger(payload: &str) -> bool {
    magic_identifiers().map_or(true, |re| re.is_match(payload))
}

/// Resolve the trigger forest of an invocation event.
///
/// Never fails: when nothing matches, the result is a single root
/// [`TriggerKind::Invocation`] trigger. The event filter is applied last.
pub fn resolve_triggers(event: &Value, settings: &TriggerSettings) -> Vec<Trigger> {
    let mut triggers = Vec::new();
    collect(event, None, 0, settings, &mut triggers);

    if triggers.is_empty() {
        triggers.push(Trigger::invocation());
    }
    apply_event_filter(triggers, &settings.filter)
}

fn collect(
    event: &Value,
    target_id: Option<&str>,
    depth: usize,
    settings: &TriggerSettings,
    out: &mut Vec<Trigger>,
) {
    if depth >= settings.max_depth {
        LOGGER.info(format!(
            "trigger depth limit {} reached, not exploring further",
            settings.max_depth
        ));
        return;
    }

    for matcher in Matcher::ALL {
        let label = matcher.kind().as_str();
        if !try_run(label, || matcher.can_handle(event)).unwrap_or(false) {
            continue;
        }

        let Some(trigger) = try_run_result(label, || matcher.parse(event, target_id)) else {
            continue;
        };
        let trigger_id = trigger.id.clone();
        out.push(trigger);

        let mut nested: Vec<String> = try_run(label, || matcher.extract_nested_payloads(event))
            .unwrap_or_default()
            .into_iter()
            .filter(|payload| may_hold_trigger(payload))
            .collect();

        if nested.len() > settings.max_width {
            LOGGER.info(format!(
                "{} nested payloads under {} trigger, exploring the first {}",
                nested.len(),
                label,
                settings.max_width
            ));
            nested.truncate(settings.max_width);
        }

        for payload in nested {
            match serde_json::from_str::<Value>(&payload) {
                Ok(inner) => collect(&inner, Some(&trigger_id), depth + 1, settings, out),
                Err(err) => LOGGER.debug(TriggerError::NestedPayload(err).to_string()),
            }
        }
    }
}

/// Drop filtered kinds, re-parenting their children to the nearest kept ancestor.
fn apply_event_filter(triggers: Vec<Trigger>, filter: &[TriggerKind]) -> Vec<Trigger> {
    if filter.is_empty() {
        return triggers;
    }

    let parents: HashMap<String, Option<String>> = triggers
        .iter()
        .map(|t| (t.id.clone(), t.target_id.clone()))
        .collect();
    let removed: HashSet<String> = triggers
        .iter()
        .filter(|t| filter.contains(&t.triggered_by))
        .map(|t| t.id.clone())
        .collect();

    triggers
        .into_iter()
        .filter(|t| !removed.contains(&t.id))
        .map(|mut t| {
            let mut target = t.target_id.take();
            while let Some(id) = target.as_ref().filter(|id| removed.contains(*id)) {
                target = parents.get(id).cloned().flatten();
            }
            t.target_id = target;
            t
        })
        .collect()
}

/// Shared helpers for the per-source matchers.
fn skip_record<T>(kind: TriggerKind, record: Result<T, serde_json::Error>) -> Option<T> {
    match record {
        Ok(record) => Some(record),
        Err(source) => {
            let err = TriggerError::Shape { kind, source };
            LOGGER.debug(format!("skipping record: {}", err));
            None
        }
    }
}

/// Deserialize every entry of `Records` on its own. Entries that do not fit
/// `T` are skipped; the rest of the batch still counts.
fn records<T: DeserializeOwned>(event: &Value, kind: TriggerKind) -> Result<Vec<T>, TriggerError> {
    let records = event
        .get("Records")
        .and_then(Value::as_array)
        .ok_or(TriggerError::MissingField {
            kind,
            field: "Records",
        })?;
    Ok(records
        .iter()
        .filter_map(|record| skip_record(kind, T::deserialize(record)))
        .collect())
}

fn first_record_source(event: &Value) -> Option<&str> {
    let record = event.get("Records")?.as_array()?.first()?;
    record
        .get("eventSource")
        .or_else(|| record.get("EventSource"))?
        .as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use serde_json::json;

    fn settings() -> TriggerSettings {
        TriggerSettings::default()
    }

    fn api_gateway_v1_event() -> Value {
        json!({
            "resource": "/orders/{id}",
            "path": "/orders/42",
            "httpMethod": "GET",
            "headers": {"Host": "abc123.execute-api.us-east-1.amazonaws.com"},
            "multiValueHeaders": {"Host": ["abc123.execute-api.us-east-1.amazonaws.com"]},
            "queryStringParameters": {"expand": "items"},
            "multiValueQueryStringParameters": {"expand": ["items"]},
            "pathParameters": {"id": "42"},
            "stageVariables": {},
            "requestContext": {
                "accountId": "123456789012",
                "resourceId": "123456",
                "stage": "prod",
                "requestId": "c6af9ac6-7b61-11e6-9a41-93e8deadbeef",
                "requestTime": "09/Apr/2015:12:34:56 +0000",
                "requestTimeEpoch": 1428582896000_i64,
                "identity": {
                    "sourceIp": "127.0.0.1",
                    "userAgent": "Custom User Agent String"
                },
                "path": "/prod/orders/42",
                "resourcePath": "/orders/{id}",
                "httpMethod": "GET",
                "apiId": "abc123",
                "protocol": "HTTP/1.1",
                "domainName": "abc123.execute-api.us-east-1.amazonaws.com"
            },
            "body": null,
            "isBase64Encoded": false
        })
    }

    fn sns_notification(message: &str) -> String {
        json!({
            "Type": "Notification",
            "MessageId": "sns-msg-1",
            "TopicArn": "arn:aws:sns:us-east-1:123456789012:orders",
            "Message": message,
            "Timestamp": "2024-01-01T00:00:00.000Z"
        })
        .to_string()
    }

    fn sqs_event(bodies: &[String]) -> Value {
        let records: Vec<Value> = bodies
            .iter()
            .enumerate()
            .map(|(i, body)| {
                json!({
                    "messageId": format!("sqs-msg-{}", i),
                    "body": body,
                    "eventSource": "aws:sqs",
                    "eventSourceARN": "arn:aws:sqs:us-east-1:123456789012:orders-queue",
                    "awsRegion": "us-east-1"
                })
            })
            .collect();
        json!({ "Records": records })
    }

    #[test]
    fn test_api_gateway_v1_single_root() {
        let triggers = resolve_triggers(&api_gateway_v1_event(), &settings());

        assert_eq!(triggers.len(), 1);
        let trigger = &triggers[0];
        assert_eq!(trigger.triggered_by, TriggerKind::ApiGateway);
        assert!(trigger.target_id.is_none());
        assert_eq!(
            trigger.from_message_ids,
            vec!["c6af9ac6-7b61-11e6-9a41-93e8deadbeef"]
        );
        assert_eq!(trigger.extra["httpMethod"], "GET");
        assert_eq!(trigger.extra["stage"], "prod");
        assert_eq!(
            trigger.extra["api"],
            "abc123.execute-api.us-east-1.amazonaws.com"
        );
    }

    #[test]
    fn test_sns_inside_sqs_is_nested() {
        let event = sqs_event(&[sns_notification("hello")]);
        let triggers = resolve_triggers(&event, &settings());

        assert_eq!(triggers.len(), 2);
        let sqs = &triggers[0];
        let sns = &triggers[1];
        assert_eq!(sqs.triggered_by, TriggerKind::Sqs);
        assert!(sqs.target_id.is_none());
        assert_eq!(sqs.from_message_ids, vec!["sqs-msg-0"]);

        assert_eq!(sns.triggered_by, TriggerKind::Sns);
        assert_eq!(sns.target_id.as_deref(), Some(sqs.id.as_str()));
        assert_eq!(sns.from_message_ids, vec!["sns-msg-1"]);
        assert_eq!(sns.extra["arn"], "arn:aws:sns:us-east-1:123456789012:orders");
    }

    #[test]
    fn test_sqs_inside_sns_is_nested() {
        let event = json!({
            "Records": [{
                "EventSource": "aws:sns",
                "Sns": {
                    "MessageId": "sns-msg-1",
                    "TopicArn": "arn:aws:sns:us-east-1:123456789012:orders",
                    "Message": r#"{"Records":[{"eventSource":"aws:sqs","body":"x"}]}"#
                }
            }]
        });
        let triggers = resolve_triggers(&event, &settings());

        assert_eq!(triggers.len(), 2);
        let sns = &triggers[0];
        let sqs = &triggers[1];
        assert_eq!(sns.triggered_by, TriggerKind::Sns);
        assert!(sns.target_id.is_none());
        assert_eq!(sqs.triggered_by, TriggerKind::Sqs);
        assert_eq!(sqs.target_id.as_deref(), Some(sns.id.as_str()));
        assert!(sqs.from_message_ids.is_empty());
    }

    #[test]
    fn test_bad_record_skips_only_that_record() {
        let mut event = sqs_event(&[sns_notification("kept"), "plain".to_string()]);
        event["Records"][0]
            .as_object_mut()
            .unwrap()
            .remove("messageId");
        event["Records"]
            .as_array_mut()
            .unwrap()
            .push(json!("not a record"));

        let triggers = resolve_triggers(&event, &settings());

        assert_eq!(triggers.len(), 2);
        let sqs = &triggers[0];
        assert_eq!(sqs.triggered_by, TriggerKind::Sqs);
        assert_eq!(sqs.from_message_ids, vec!["sqs-msg-1"]);
        assert_eq!(triggers[1].triggered_by, TriggerKind::Sns);
        assert_eq!(triggers[1].target_id.as_deref(), Some(sqs.id.as_str()));
    }

    #[test]
    fn test_unmatched_event_yields_invocation() {
        let triggers = resolve_triggers(&json!({"hello": "world"}), &settings());
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].triggered_by, TriggerKind::Invocation);
        assert!(triggers[0].target_id.is_none());
    }

    #[test]
    fn test_depth_bound() {
        // An SQS message whose body is an SQS event whose body is ... 10 levels deep
        let mut body = sns_notification("leaf");
        for _ in 0..10 {
            body = sqs_event(&[body]).to_string();
        }
        let event: Value = serde_json::from_str(&body).unwrap();

        let limited = TriggerSettings {
            max_depth: 3,
            ..settings()
        };
        let triggers = resolve_triggers(&event, &limited);
        assert_eq!(triggers.len(), 3);

        let ids: HashMap<&str, usize> = triggers
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.as_str(), i))
            .collect();
        for trigger in &triggers {
            let mut depth = 0;
            let mut target = trigger.target_id.as_deref();
            while let Some(id) = target {
                depth += 1;
                target = triggers[ids[id]].target_id.as_deref();
            }
            assert!(depth < 3);
        }
    }

    #[test]
    fn test_zero_depth_explores_nothing() {
        let limited = TriggerSettings {
            max_depth: 0,
            ..settings()
        };
        let triggers = resolve_triggers(&api_gateway_v1_event(), &limited);
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].triggered_by, TriggerKind::Invocation);
    }

    #[test]
    fn test_width_bound() {
        let bodies: Vec<String> = (0..20).map(|_| sns_notification("x")).collect();
        let event = sqs_event(&bodies);

        let limited = TriggerSettings {
            max_width: 5,
            ..settings()
        };
        let triggers = resolve_triggers(&event, &limited);

        let sqs_id = &triggers[0].id;
        let children = triggers
            .iter()
            .filter(|t| t.target_id.as_ref() == Some(sqs_id))
            .count();
        assert_eq!(children, 5);
        assert_eq!(triggers[0].from_message_ids.len(), 20);
    }

    #[test]
    fn test_bad_nested_payload_skips_branch_only() {
        let event = sqs_event(&[
            r#"{"TopicArn": "broken"#.to_string(),
            sns_notification("ok"),
            "plain text body".to_string(),
        ]);
        let triggers = resolve_triggers(&event, &settings());

        assert_eq!(triggers.len(), 2);
        assert_eq!(triggers[1].triggered_by, TriggerKind::Sns);
    }

    #[test]
    fn test_event_filter_reparents_children() {
        let inner_sqs = sqs_event(&[sns_notification("deep")]).to_string();
        let event = json!({
            "Records": [{
                "EventSource": "aws:sns",
                "Sns": {
                    "MessageId": "outer-sns",
                    "TopicArn": "arn:aws:sns:us-east-1:123456789012:outer",
                    "Message": inner_sqs
                }
            }]
        });

        let unfiltered = resolve_triggers(&event, &settings());
        assert_eq!(
            unfiltered.iter().map(|t| t.triggered_by).collect::<Vec<_>>(),
            vec![TriggerKind::Sns, TriggerKind::Sqs, TriggerKind::Sns]
        );

        let filtered = resolve_triggers(
            &event,
            &TriggerSettings {
                filter: vec![TriggerKind::Sqs],
                ..settings()
            },
        );
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[1].target_id.as_deref(), Some(filtered[0].id.as_str()));
    }

    #[test]
    fn test_kinesis_record_data_is_unwrapped() {
        let inner = sns_notification("from kinesis");
        let data = base64::engine::general_purpose::STANDARD.encode(inner);
        let event = json!({
            "Records": [{
                "eventSource": "aws:kinesis",
                "eventVersion": "1.0",
                "eventID": "shardId-000000000000:4954",
                "eventName": "aws:kinesis:record",
                "awsRegion": "us-east-1",
                "eventSourceARN": "arn:aws:kinesis:us-east-1:123456789012:stream/clicks",
                "kinesis": {
                    "kinesisSchemaVersion": "1.0",
                    "partitionKey": "p",
                    "sequenceNumber": "4954",
                    "data": data,
                    "approximateArrivalTimestamp": 1545084650.987
                }
            }]
        });

        let triggers = resolve_triggers(&event, &settings());
        assert_eq!(triggers.len(), 2);
        assert_eq!(triggers[0].triggered_by, TriggerKind::Kinesis);
        assert_eq!(triggers[0].extra["shardId"], "shardId-000000000000");
        assert_eq!(triggers[1].triggered_by, TriggerKind::Sns);
    }

    #[test]
    fn test_trigger_kind_from_str() {
        assert_eq!("SQS".parse::<TriggerKind>().unwrap(), TriggerKind::Sqs);
        assert_eq!(
            "api-gateway".parse::<TriggerKind>().unwrap(),
            TriggerKind::ApiGateway
        );
        assert_eq!(
            "step_functions".parse::<TriggerKind>().unwrap(),
            TriggerKind::StepFunction
        );
        assert!("carrier-pigeon".parse::<TriggerKind>().is_err());
    }

    #[test]
    fn test_magic_union_filters_payloads() {
        assert!(may_hold_trigger(r#"{"TopicArn":"x"}"#));
        assert!(may_hold_trigger(r#"{"eventSource":"aws:sqs"}"#));
        assert!(!may_hold_trigger(r#"{"order": 1}"#));
    }

    #[test]
    fn test_trigger_serialization() {
        let triggers = resolve_triggers(&api_gateway_v1_event(), &settings());
        let value = serde_json::to_value(&triggers[0]).unwrap();
        assert_eq!(value["triggeredBy"], "apigw");
        assert_eq!(value["targetId"], Value::Null);
        assert!(value["fromMessageIds"].is_array());
    }
}
