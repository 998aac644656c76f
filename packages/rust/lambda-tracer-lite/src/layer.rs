//! Tower middleware for traced Lambda services.
//!
//! [`TracerLayer`] performs the same steps as
//! [`traced_handler`](crate::traced_handler) around any
//! `Service<LambdaEvent<T>>`, which makes it composable with other Tower
//! layers.
//!
//! # Example
//!
//! ```no_run
//! use lambda_tracer_lite::{Tracer, TracerConfig, TracerLayer};
//! use lambda_runtime::{service_fn, Error, LambdaEvent, Runtime};
//! use serde_json::Value;
//! use tower::ServiceBuilder;
//!
//! async fn function_handler(event: LambdaEvent<Value>) -> Result<Value, Error> {
//!     Ok(event.payload)
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let tracer = Tracer::init(TracerConfig::default());
//!
//!     let service = ServiceBuilder::new()
//!         .layer(TracerLayer::new(tracer))
//!         .service_fn(function_handler);
//!
//!     Runtime::new(service).run().await
//! }
//! ```

use crate::{handler::TracedInvocation, tracer::Tracer};
use futures_util::future::BoxFuture;
use lambda_runtime::{Error, LambdaEvent};
use serde::Serialize;
use std::task::{self, Poll};
use tower::{Layer, Service};

/// Layer producing [`TracerService`].
#[derive(Clone, Debug)]
pub struct TracerLayer {
    tracer: Tracer,
}

impl TracerLayer {
    pub fn new(tracer: Tracer) -> Self {
        Self { tracer }
    }
}

impl<S> Layer<S> for TracerLayer {
    type Service = TracerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracerService {
            inner,
            tracer: self.tracer.clone(),
        }
    }
}

/// Service wrapping every call in a traced invocation.
///
/// Created by [`TracerLayer`].
#[derive(Clone, Debug)]
pub struct TracerService<S> {
    inner: S,
    tracer: Tracer,
}

impl<S, T, R> Service<LambdaEvent<T>> for TracerService<S>
where
    S: Service<LambdaEvent<T>, Response = R, Error = Error>,
    S::Future: Send + 'static,
    T: Serialize,
    R: Serialize + Send + 'static,
{
    type Response = R;
    type Error = Error;
    type Future = BoxFuture<'static, Result<R, Error>>;

    fn poll_ready(&mut self, cx: &mut task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, event: LambdaEvent<T>) -> Self::Future {
        let traced = TracedInvocation::start(&self.tracer, &event.payload, &event.context);
        let future = self.inner.call(event);

        Box::pin(async move {
            let Some(mut traced) = traced else {
                return future.await;
            };
            let result = traced.run(future).await;
            traced.complete(&result);
            traced.flush().await;
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::TracerConfig, invocation::InvocationContext};
    use async_trait::async_trait;
    use collector_span_exporter::{ExportError, SpanExporter};
    use lambda_runtime::Context;
    use serde_json::{json, Value};
    use serial_test::serial;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use tower::{service_fn, ServiceBuilder, ServiceExt};

    #[derive(Debug, Default)]
    struct CountingExporter {
        spans: AtomicUsize,
    }

    #[async_trait]
    impl SpanExporter for CountingExporter {
        async fn export(&self, payload: Vec<u8>) -> Result<(), ExportError> {
            let batch: Vec<Value> = serde_json::from_slice(&payload).unwrap();
            self.spans.fetch_add(batch.len(), Ordering::SeqCst);
            Ok(())
        }
    }

    fn event(request_id: &str, payload: Value) -> LambdaEvent<Value> {
        let mut context = Context::default();
        context.request_id = request_id.to_string();
        LambdaEvent::new(payload, context)
    }

    #[tokio::test]
    #[serial]
    async fn test_layer_traces_each_call() -> Result<(), Error> {
        let exporter = Arc::new(CountingExporter::default());
        let tracer = Tracer::with_exporter(TracerConfig::default().resolve(), Some(exporter.clone()));

        let mut service = ServiceBuilder::new()
            .layer(TracerLayer::new(tracer.clone()))
            .service(service_fn(|event: LambdaEvent<Value>| async move {
                let invocation = InvocationContext::current().ok_or("no invocation")?;
                assert_eq!(invocation.request_id(), event.context.request_id);
                Ok::<_, Error>(json!({"statusCode": 200}))
            }));

        let response = service
            .ready()
            .await?
            .call(event("req-1", json!({"requestContext": {}})))
            .await?;
        assert_eq!(response, json!({"statusCode": 200}));

        service.ready().await?.call(event("req-2", json!({}))).await?;

        // One function span per call
        assert_eq!(exporter.spans.load(Ordering::SeqCst), 2);
        assert!(tracer.container().is_empty());
        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn test_layer_passes_errors_through() {
        let tracer = Tracer::with_exporter(TracerConfig::default().resolve(), None);

        let mut service = ServiceBuilder::new()
            .layer(TracerLayer::new(tracer))
            .service(service_fn(|_event: LambdaEvent<Value>| async move {
                Err::<Value, Error>("boom".into())
            }));

        let err = service
            .ready()
            .await
            .unwrap()
            .call(event("req-3", json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
