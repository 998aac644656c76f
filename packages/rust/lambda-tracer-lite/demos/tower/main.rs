use lambda_runtime::{tower::ServiceBuilder, Error, LambdaEvent, Runtime};
use lambda_tracer_lite::{InvocationContext, Tracer, TracerConfig, TracerLayer};
use serde_json::Value;
use tracing::info;

/// Logs the resolved triggers and echoes the event.
async fn handler(event: LambdaEvent<Value>) -> Result<Value, Error> {
    if let Some(invocation) = InvocationContext::current() {
        for trigger in invocation.triggers() {
            info!(
                triggered_by = %trigger.triggered_by,
                messages = trigger.from_message_ids.len(),
                "trigger"
            );
        }
    }

    Ok(serde_json::json!({
        "statusCode": 200,
        "body": event.payload
    }))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let tracer = Tracer::init(TracerConfig::default());

    let service = ServiceBuilder::new()
        .layer(TracerLayer::new(tracer))
        .service_fn(handler);

    Runtime::new(service).run().await
}
