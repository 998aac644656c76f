//! The span record and its lifecycle.
//!
//! A span is opened by [`create_span`] and closed exactly once by
//! [`extend_span`]. Closed spans carry either a `result` or an `error`, never
//! both, which [`Outcome`] enforces at the type level.
//!
//! Spans serialize to the collector's JSON shape: camelCase keys, a `type`
//! tag and one type-specific payload object (`httpInfo`, `sqlInfo`, ...).

use crate::{logger::Logger, triggers::Trigger};
use bon::Builder;
use serde::Serialize;
use serde_json::Value;
use std::error::Error as StdError;

static LOGGER: Logger = Logger::const_new("span");

/// Kind of operation a span describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum SpanType {
    Function,
    Http,
    MongoDb,
    Sql,
    Redis,
}

/// Payload of the function (root) span.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInfo {
    pub name: String,
    pub version: String,
    pub region: String,
    pub memory_allocated: Option<String>,
    pub arn: String,
    pub aws_request_id: String,
    pub log_group_name: Option<String>,
    pub log_stream_name: Option<String>,
    pub cold_start: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    pub triggers: Vec<Trigger>,
    pub max_finish_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_value: Option<String>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub tags: serde_json::Map<String, Value>,
}

/// Payload of an outbound HTTP call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpInfo {
    pub host: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_headers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

/// Payload of a SQL query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlInfo {
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
}

/// Payload of a MongoDB command.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoInfo {
    pub database: String,
    pub collection: String,
    pub command_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// Payload of a Redis pipeline or command.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisInfo {
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub commands: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// Type-specific span payload, serialized as a single keyed object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SpanInfo {
    #[serde(rename = "functionInfo")]
    Function(Box<FunctionInfo>),
    #[serde(rename = "httpInfo")]
    Http(HttpInfo),
    #[serde(rename = "sqlInfo")]
    Sql(SqlInfo),
    #[serde(rename = "mongoInfo")]
    Mongo(MongoInfo),
    #[serde(rename = "redisInfo")]
    Redis(RedisInfo),
}

/// Serialized failure of the traced operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpanError {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<String>,
}

impl SpanError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            stacktrace: None,
        }
    }

    /// Capture an error and its source chain.
    pub fn from_error(kind: impl Into<String>, err: &(dyn StdError + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(format!("caused by: {}", cause));
            source = cause.source();
        }

        Self {
            kind: kind.into(),
            message: err.to_string(),
            stacktrace: (!chain.is_empty()).then(|| chain.join("\n")),
        }
    }
}

/// How a traced operation finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Failure(SpanError),
}

/// Everything needed to close a span.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub ended: i64,
    pub outcome: Outcome,
    /// Replaces the span payload when set, e.g. to add response details.
    pub info: Option<SpanInfo>,
}

impl Completion {
    /// Successful completion now.
    pub fn success(result: Value) -> Self {
        Self {
            ended: now_millis(),
            outcome: Outcome::Success(result),
            info: None,
        }
    }

    /// Failed completion now.
    pub fn failure(error: SpanError) -> Self {
        Self {
            ended: now_millis(),
            outcome: Outcome::Failure(error),
            info: None,
        }
    }

    pub fn with_info(mut self, info: SpanInfo) -> Self {
        self.info = Some(info);
        self
    }

    pub fn with_ended(mut self, ended: i64) -> Self {
        self.ended = ended;
        self
    }
}

/// Optional inputs of [`create_span`].
#[derive(Debug, Clone, Default, Builder)]
pub struct SpanMetadata {
    /// Fixed span id; a random id is generated when unset.
    #[builder(into)]
    pub id: Option<String>,
    /// Parent span id; defaults to the correlation id.
    #[builder(into)]
    pub parent_id: Option<String>,
    /// Start time in epoch milliseconds; defaults to now.
    pub started: Option<i64>,
    pub info: Option<SpanInfo>,
    /// When present the span is created closed.
    pub completion: Option<Completion>,
}

/// A traced operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    pub id: String,
    pub transaction_id: String,
    pub parent_id: Option<String>,
    pub reporter_aws_request_id: String,
    #[serde(rename = "type")]
    pub span_type: SpanType,
    pub started: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended: Option<i64>,
    #[serde(flatten)]
    pub info: Option<SpanInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SpanError>,
}

impl Span {
    pub fn is_open(&self) -> bool {
        self.ended.is_none()
    }
}

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Open a span, or create it closed when `metadata.completion` is set.
///
/// `correlation_id` is the Lambda request id of the invocation the span
/// belongs to.
pub fn create_span(
    span_type: SpanType,
    transaction_id: &str,
    correlation_id: &str,
    metadata: SpanMetadata,
) -> Span {
    let span = Span {
        id: metadata
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        transaction_id: transaction_id.to_string(),
        parent_id: metadata
            .parent_id
            .or_else(|| Some(correlation_id.to_string())),
        reporter_aws_request_id: correlation_id.to_string(),
        span_type,
        started: metadata.started.unwrap_or_else(now_millis),
        ended: None,
        info: metadata.info,
        result: None,
        error: None,
    };

    match metadata.completion {
        Some(completion) => extend_span(span, completion),
        None => span,
    }
}

/// Close a span. A span is closed once; later completions are ignored.
pub fn extend_span(mut span: Span, completion: Completion) -> Span {
    if span.ended.is_some() {
        LOGGER.debug(format!("span {} already closed, ignoring completion", span.id));
        return span;
    }

    span.ended = Some(completion.ended.max(span.started));
    match completion.outcome {
        Outcome::Success(result) => span.result = Some(result),
        Outcome::Failure(error) => span.error = Some(error),
    }
    if let Some(info) = completion.info {
        span.info = Some(info);
    }
    span
}
