//! Lightweight distributed tracing for AWS Lambda functions.
//!
//! This crate records the external interactions of a Lambda invocation as
//! spans, correlates them with the event that triggered the function and ships
//! them to a remote collector when the invocation ends. It never changes what
//! the function returns: every piece of tracer code that runs in the call path
//! fails open.
//!
//! # Architecture
//!
//! - [`hook`]: call interception with fail-open before/after hooks, for
//!   synchronous calls, futures, streams and event emitters
//! - [`span`] and [`container`]: the span record and per-invocation storage
//! - [`triggers`]: resolution of the upstream trigger chain from the event
//! - [`sanitizer`]: truncation, secret scrubbing, tolerant serialization
//! - [`agent`]: batch assembly and time-bounded export
//! - [`invocation`]: per-invocation state reachable from adapters
//! - [`handler`] and [`layer`]: the invocation boundary, as a function
//!   wrapper or a Tower layer
//! - [`tracer`]: cold-start initialization
//!
//! # Quick Start
//!
//! ```no_run
//! use lambda_tracer_lite::{traced_handler, Tracer, TracerConfig};
//! use lambda_runtime::{service_fn, Error, LambdaEvent};
//! use serde_json::Value;
//!
//! async fn handler(event: LambdaEvent<Value>) -> Result<Value, Error> {
//!     Ok(event.payload)
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let tracer = Tracer::init(TracerConfig::default());
//!
//!     lambda_runtime::run(service_fn(|event| {
//!         let tracer = tracer.clone();
//!         async move { traced_handler(&tracer, event, handler).await }
//!     }))
//!     .await
//! }
//! ```
//!
//! # Writing an adapter
//!
//! An adapter wraps a client operation once with [`hook::hook`] and, in its
//! interceptor, opens a span through [`InvocationContext::current`] in `before`
//! and closes it in `after` (or when the returned future resolves, through
//! [`hook::hook_future`]).
//!
//! # Configuration
//!
//! Everything can be set in code through [`TracerConfig`] or through
//! `LAMBDA_TRACER_*` environment variables; see [`config`]. Export requires
//! `LAMBDA_TRACER_TOKEN` and `LAMBDA_TRACER_EDGE_HOST`.

pub use collector_span_exporter::{CollectorExporter, ExportError, SpanExporter};

pub mod agent;
pub mod config;
pub mod constants;
pub mod container;
pub mod handler;
pub mod hook;
pub mod invocation;
pub mod layer;
pub mod logger;
pub mod propagation;
pub mod resource;
pub mod sanitizer;
pub mod span;
pub mod tracer;
pub mod triggers;

pub use agent::ExportAgent;
pub use config::{ConfigError, ResolvedConfig, TracerConfig};
pub use container::SpanContainer;
pub use handler::traced_handler;
pub use hook::{hook, hook_constructor, hook_future, hook_stream, HookedEmitter, Interceptor};
pub use invocation::InvocationContext;
pub use layer::{TracerLayer, TracerService};
pub use propagation::TraceHeader;
pub use resource::FunctionResource;
pub use sanitizer::{scrub_query_params, scrub_secrets, stringify_and_truncate, SecretPatterns};
pub use span::{
    create_span, extend_span, Completion, Outcome, Span, SpanError, SpanInfo, SpanMetadata,
    SpanType,
};
pub use tracer::Tracer;
pub use triggers::{resolve_triggers, Trigger, TriggerKind};
