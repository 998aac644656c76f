//! Lambda handler wrapper.
//!
//! [`traced_handler`] is the invocation boundary. Around the user handler it:
//!
//! 1. resets the span container and the agent's delivery history
//! 2. resolves the trigger forest of the event
//! 3. opens the function span (id = Lambda request id)
//! 4. schedules the deadline safety net, a flush `timeout_buffer` before the
//!    Lambda deadline that ships spans in whatever state they are in
//! 5. runs the handler inside the [`InvocationContext`] scope
//! 6. closes the function span with the return value or the error
//! 7. flushes and resets
//!
//! The handler's result is returned unchanged. Tracer failures are logged and
//! swallowed; a switched-off tracer calls the handler directly.
//!
//! For Tower-based services use [`TracerLayer`](crate::TracerLayer), which
//! performs the same steps.

use crate::{
    hook::try_run,
    invocation::InvocationContext,
    logger::Logger,
    sanitizer::to_json_or_fallback,
    span::{now_millis, Completion, SpanError, SpanInfo, SpanMetadata, SpanType},
    triggers::{resolve_triggers, Trigger},
    tracer::Tracer,
};
use lambda_runtime::{Context, Error, LambdaEvent};
use serde::Serialize;
use serde_json::Value;
use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::task::JoinHandle;

static LOGGER: Logger = Logger::const_new("handler");

static IS_COLD_START: AtomicBool = AtomicBool::new(true);

/// Kind recorded on the function span when the handler fails.
const HANDLER_ERROR_KIND: &str = "HandlerError";

/// Wraps a Lambda handler function with invocation tracing.
///
/// # Example
///
/// ```no_run
/// use lambda_tracer_lite::{traced_handler, Tracer, TracerConfig};
/// use lambda_runtime::{service_fn, Error, LambdaEvent};
/// use serde_json::{json, Value};
///
/// async fn function_handler(_event: LambdaEvent<Value>) -> Result<Value, Error> {
///     Ok(json!({ "statusCode": 200 }))
/// }
///
/// #[tokio::main]
/// async fn main() -> Result<(), Error> {
///     let tracer = Tracer::init(TracerConfig::default());
///
///     lambda_runtime::run(service_fn(|event| {
///         let tracer = tracer.clone();
///         async move { traced_handler(&tracer, event, function_handler).await }
///     }))
///     .await
/// }
/// ```
pub async fn traced_handler<T, R, F, Fut>(
    tracer: &Tracer,
    event: LambdaEvent<T>,
    handler_fn: F,
) -> Result<R, Error>
where
    T: Serialize,
    R: Serialize,
    F: FnOnce(LambdaEvent<T>) -> Fut,
    Fut: Future<Output = Result<R, Error>>,
{
    let Some(mut traced) = TracedInvocation::start(tracer, &event.payload, &event.context) else {
        return handler_fn(event).await;
    };

    let result = traced.run(handler_fn(event)).await;
    traced.complete(&result);
    traced.flush().await;
    result
}

/// One traced invocation, from function span to final flush.
pub(crate) struct TracedInvocation {
    tracer: Tracer,
    invocation: Arc<InvocationContext>,
    safety_net: Option<JoinHandle<()>>,
}

impl TracedInvocation {
    /// Set up tracing for an invocation. `None` means run untraced.
    pub(crate) fn start<T: Serialize>(
        tracer: &Tracer,
        payload: &T,
        context: &Context,
    ) -> Option<Self> {
        if tracer.config().switch_off {
            return None;
        }
        try_run("invocation start", || Self::open(tracer, payload, context))
    }

    fn open<T: Serialize>(tracer: &Tracer, payload: &T, context: &Context) -> Self {
        let container = Arc::clone(tracer.container());
        container.reset();
        tracer.agent().reset();

        let event = to_json_or_fallback(payload);
        let triggers = try_run("trigger resolution", || {
            resolve_triggers(&event, &tracer.config().trigger_settings())
        })
        .unwrap_or_else(|| vec![Trigger::invocation()]);

        let cold_start = IS_COLD_START.swap(false, Ordering::Relaxed);
        let invocation = Arc::new(InvocationContext::new(
            context.clone(),
            triggers.clone(),
            tracer.shared_config(),
            Arc::clone(&container),
        ));

        let mut info = tracer.resource().function_info(context, cold_start, triggers);
        info.event = Some(invocation.capture(&event).body);
        let parent_id = invocation
            .trace_header()
            .and_then(|header| header.parent.clone());

        invocation.record_span(
            SpanType::Function,
            SpanMetadata::builder()
                .id(context.request_id.clone())
                .maybe_parent_id(parent_id)
                .info(SpanInfo::Function(Box::new(info)))
                .build(),
        );
        LOGGER.debug(format!(
            "invocation {} started (cold start: {})",
            context.request_id, cold_start
        ));

        Self {
            safety_net: schedule_safety_net(tracer, context.deadline),
            tracer: tracer.clone(),
            invocation,
        }
    }

    /// Run `future` as the traced handler.
    pub(crate) async fn run<F: Future>(&self, future: F) -> F::Output {
        Arc::clone(&self.invocation).scope(future).await
    }

    /// Close the function span with the handler's result.
    pub(crate) fn complete<R: Serialize>(&mut self, result: &Result<R, Error>) {
        if let Some(safety_net) = self.safety_net.take() {
            safety_net.abort();
        }
        try_run("function span completion", || self.close_function_span(result));
    }

    /// Export the invocation's spans and reset for the next one.
    pub(crate) async fn flush(self) {
        let agent = self.tracer.agent();
        let container = self.tracer.container();
        agent.flush(container).await;
        container.reset();
        agent.reset();
    }

    fn close_function_span<R: Serialize>(&self, result: &Result<R, Error>) {
        let request_id = self.invocation.request_id();
        let Some(span) = self.invocation.container().get_span_by_id(request_id) else {
            return;
        };

        let completion = match result {
            Ok(response) => {
                let mut completion = Completion::success(Value::Null);
                if let Some(SpanInfo::Function(mut info)) = span.info {
                    let response = to_json_or_fallback(response);
                    info.return_value = Some(self.invocation.capture(&response).body);
                    completion = completion.with_info(SpanInfo::Function(info));
                }
                completion
            }
            Err(err) => {
                Completion::failure(SpanError::from_error(HANDLER_ERROR_KIND, &**err))
            }
        };
        self.invocation.finish_span(request_id, completion);
    }
}

impl Drop for TracedInvocation {
    fn drop(&mut self) {
        // Reached without `finish` only when the handler panicked or was cancelled
        if let Some(safety_net) = self.safety_net.take() {
            safety_net.abort();
        }
    }
}

/// Spawn the deadline flush. `deadline` is epoch milliseconds, 0 when unknown.
fn schedule_safety_net(tracer: &Tracer, deadline: u64) -> Option<JoinHandle<()>> {
    if deadline == 0 || !tracer.agent().is_enabled() {
        return None;
    }

    let buffer = tracer.config().timeout_buffer.as_millis() as i64;
    let fire_at = i64::try_from(deadline).unwrap_or(i64::MAX) - buffer;
    let delay = fire_at - now_millis();
    if delay <= 0 {
        LOGGER.debug("deadline too close, no safety net scheduled");
        return None;
    }

    let agent = Arc::clone(tracer.agent());
    let container = Arc::clone(tracer.container());
    Some(tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        LOGGER.info("deadline approaching, flushing spans");
        agent.flush(&container).await;
    }))
}
