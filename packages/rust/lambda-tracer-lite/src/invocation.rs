//! Per-invocation state shared with adapters.
//!
//! The handler wrapper creates one [`InvocationContext`] per invocation and
//! runs the user handler inside [`InvocationContext::scope`]. Adapters reach it
//! through [`InvocationContext::current`] from any code running on the
//! handler's task, or through an explicit `Arc` when they hop to another task.
//!
//! Outside a traced invocation `current()` returns `None` and adapters are
//! expected to call through without creating spans.

use crate::{
    config::ResolvedConfig,
    container::SpanContainer,
    propagation::{transaction_id, TraceHeader},
    sanitizer::{scrub_secrets, stringify_and_truncate, truncate_str, TruncatedBody},
    span::{create_span, extend_span, Completion, Span, SpanInfo, SpanMetadata, SpanType},
    triggers::Trigger,
};
use lambda_runtime::Context;
use serde_json::Value;
use std::{future::Future, sync::Arc};

tokio::task_local! {
    static CURRENT: Arc<InvocationContext>;
}

/// State of one invocation.
#[derive(Debug)]
pub struct InvocationContext {
    context: Context,
    transaction_id: String,
    trace_header: Option<TraceHeader>,
    triggers: Vec<Trigger>,
    config: Arc<ResolvedConfig>,
    container: Arc<SpanContainer>,
}

impl InvocationContext {
    pub fn new(
        context: Context,
        triggers: Vec<Trigger>,
        config: Arc<ResolvedConfig>,
        container: Arc<SpanContainer>,
    ) -> Self {
        let trace_header = TraceHeader::for_invocation(&context);
        let transaction_id = transaction_id(trace_header.as_ref());

        Self {
            context,
            transaction_id,
            trace_header,
            triggers,
            config,
            container,
        }
    }

    /// The invocation running on the current task, if any.
    pub fn current() -> Option<Arc<Self>> {
        CURRENT.try_with(Arc::clone).ok()
    }

    /// Run `future` with `self` as the current invocation.
    pub async fn scope<F: Future>(self: Arc<Self>, future: F) -> F::Output {
        CURRENT.scope(self, future).await
    }

    pub fn request_id(&self) -> &str {
        &self.context.request_id
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    pub fn lambda_context(&self) -> &Context {
        &self.context
    }

    pub fn trace_header(&self) -> Option<&TraceHeader> {
        self.trace_header.as_ref()
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn container(&self) -> &SpanContainer {
        &self.container
    }

    /// Open a span for an outbound call and store it.
    pub fn start_span(&self, span_type: SpanType, info: SpanInfo) -> Span {
        self.record_span(span_type, SpanMetadata::builder().info(info).build())
    }

    /// Create a span from full metadata and store it.
    pub fn record_span(&self, span_type: SpanType, metadata: SpanMetadata) -> Span {
        let span = create_span(span_type, &self.transaction_id, self.request_id(), metadata);
        self.container.add_span(&span);
        span
    }

    /// Close the stored span `id` and store the result.
    ///
    /// Returns `None` when the span is unknown, e.g. dropped at capacity or
    /// opened in an earlier invocation.
    pub fn finish_span(&self, id: &str, completion: Completion) -> Option<Span> {
        let span = extend_span(self.container.get_span_by_id(id)?, completion);
        self.container.add_span(&span);
        Some(span)
    }

    /// Serialize a captured payload: scrubbed, then bounded to `max_entry_size`.
    pub fn capture(&self, value: &Value) -> TruncatedBody {
        let rendered = stringify_and_truncate(value, usize::MAX).body;
        let scrubbed = scrub_secrets(&rendered, &self.config.secret_patterns);
        let kept = truncate_str(&scrubbed, self.config.max_entry_size);
        TruncatedBody {
            body: kept.to_string(),
            truncated: kept.len() < scrubbed.len(),
        }
    }

    /// Trace header to send on an outgoing call made from `span_id`.
    pub fn child_trace_header(&self, span_id: &str) -> Option<String> {
        self.trace_header
            .as_ref()
            .map(|header| header.child_header(span_id))
    }
}
