use lambda_runtime::{service_fn, Error, LambdaEvent};
use lambda_tracer_lite::{
    hook_future, propagation::AWS_XRAY_TRACE_HEADER, span::HttpInfo, traced_handler, Completion,
    InvocationContext, SpanError, SpanInfo, SpanType, Tracer, TracerConfig,
};
use serde_json::{json, Value};
use tracing::info;

/// Minimal HTTP adapter: one span per GET, closed when the response arrives.
async fn traced_get(client: &reqwest::Client, url: &str) -> Result<u16, reqwest::Error> {
    let mut request = client.get(url);
    let invocation = InvocationContext::current();

    let span_id = invocation.as_ref().map(|invocation| {
        let parsed = reqwest::Url::parse(url).ok();
        let span = invocation.start_span(
            SpanType::Http,
            SpanInfo::Http(HttpInfo {
                host: parsed
                    .as_ref()
                    .and_then(|u| u.host_str().map(str::to_string))
                    .unwrap_or_default(),
                method: "GET".to_string(),
                path: parsed.as_ref().map(|u| u.path().to_string()),
                ..Default::default()
            }),
        );
        span.id
    });

    if let (Some(invocation), Some(id)) = (&invocation, &span_id) {
        if let Some(header) = invocation.child_trace_header(id) {
            request = request.header(AWS_XRAY_TRACE_HEADER, header);
        }
    }

    let on_response = {
        let invocation = invocation.clone();
        let span_id = span_id.clone();
        move |response: &reqwest::Response| {
            if let (Some(invocation), Some(id)) = (invocation, span_id) {
                let status = response.status().as_u16();
                invocation.finish_span(&id, Completion::success(json!({ "statusCode": status })));
            }
        }
    };
    let on_error = move |err: &reqwest::Error| {
        if let (Some(invocation), Some(id)) = (invocation, span_id) {
            invocation.finish_span(
                &id,
                Completion::failure(SpanError::from_error("HttpError", err)),
            );
        }
    };

    let response = hook_future(request.send(), on_response, on_error).await?;
    Ok(response.status().as_u16())
}

async fn handler(client: &reqwest::Client, event: LambdaEvent<Value>) -> Result<Value, Error> {
    info!(request_id = %event.context.request_id, "handling request");

    let status = traced_get(client, "https://checkip.amazonaws.com/").await?;
    Ok(json!({
        "statusCode": 200,
        "body": format!("upstream answered {}", status)
    }))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let tracer = Tracer::init(TracerConfig::default());
    let client = reqwest::Client::new();

    lambda_runtime::run(service_fn(|event: LambdaEvent<Value>| {
        let tracer = tracer.clone();
        let client = client.clone();
        async move { traced_handler(&tracer, event, |event| handler(&client, event)).await }
    }))
    .await
}
