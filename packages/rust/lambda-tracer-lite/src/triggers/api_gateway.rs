//! API Gateway REST (v1) and HTTP (v2) proxy events.

use super::{ParsedTrigger, TriggerError, TriggerKind};
use aws_lambda_events::apigw::{ApiGatewayProxyRequest, ApiGatewayV2httpRequest};
use serde::Deserialize;
use serde_json::Value;

pub(super) const MAGIC_IDENTIFIER: &str = "requestContext";

fn is_http_api(event: &Value) -> bool {
    event.pointer("/requestContext/http/method").is_some()
}

pub(super) fn can_handle(event: &Value) -> bool {
    let Some(context) = event.get("requestContext") else {
        return false;
    };
    // Load balancer events share the proxy shape
    if context.get("elb").is_some() {
        return false;
    }
    event.get("httpMethod").is_some() || is_http_api(event)
}

pub(super) fn parse(event: &Value) -> Result<ParsedTrigger, TriggerError> {
    if is_http_api(event) {
        let request = ApiGatewayV2httpRequest::deserialize(event)
            .map_err(TriggerError::shape(TriggerKind::ApiGateway))?;
        return Ok(from_http_api(request));
    }
    let request = ApiGatewayProxyRequest::deserialize(event)
        .map_err(TriggerError::shape(TriggerKind::ApiGateway))?;
    Ok(from_rest_api(request))
}

fn from_rest_api(request: ApiGatewayProxyRequest) -> ParsedTrigger {
    let method = request.http_method.as_str().to_string();
    let context = request.request_context;

    let parsed = ParsedTrigger {
        message_ids: context.request_id.into_iter().collect(),
        ..Default::default()
    };
    parsed
        .with_extra("httpMethod", Some(method))
        .with_extra("resource", request.resource)
        .with_extra("path", request.path)
        .with_extra("stage", context.stage)
        .with_extra("api", context.domain_name)
}

fn from_http_api(request: ApiGatewayV2httpRequest) -> ParsedTrigger {
    let context = request.request_context;
    let method = context.http.method.as_str().to_string();

    let parsed = ParsedTrigger {
        message_ids: context.request_id.into_iter().collect(),
        ..Default::default()
    };
    parsed
        .with_extra("httpMethod", Some(method))
        .with_extra("resource", request.route_key)
        .with_extra("path", request.raw_path.or(context.http.path))
        .with_extra("stage", context.stage)
        .with_extra("api", context.domain_name)
}
