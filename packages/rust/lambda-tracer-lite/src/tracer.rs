//! Cold-start initialization.
//!
//! [`Tracer::init`] runs once, outside the handler. It resolves the
//! configuration, installs the `tracing` subscriber, builds the collector
//! exporter and owns the state shared by every invocation: the span container
//! and the export agent.
//!
//! Initialization never fails. Without a token and an edge host the tracer
//! still records spans but export is disabled.
//!
//! # Logging
//!
//! The subscriber filter comes from `RUST_LOG` when set. Otherwise it is
//! `debug` when the tracer is verbose, else `AWS_LAMBDA_LOG_LEVEL` (default
//! `info`). Output is JSON when `AWS_LAMBDA_LOG_FORMAT=JSON`, plain text
//! otherwise. If a global subscriber is already installed it is kept.
//!
//! # Example
//!
//! ```no_run
//! use lambda_tracer_lite::{traced_handler, Tracer, TracerConfig};
//! use lambda_runtime::{service_fn, Error, LambdaEvent};
//! use serde_json::Value;
//!
//! async fn function_handler(event: LambdaEvent<Value>) -> Result<Value, Error> {
//!     Ok(event.payload)
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let tracer = Tracer::init(TracerConfig::default());
//!
//!     lambda_runtime::run(service_fn(|event| {
//!         let tracer = tracer.clone();
//!         async move { traced_handler(&tracer, event, function_handler).await }
//!     }))
//!     .await
//! }
//! ```

use crate::{
    agent::ExportAgent,
    config::{json_log_format, ConfigError, ResolvedConfig, TracerConfig},
    container::SpanContainer,
    hook::install_quiet_panic_hook,
    logger::Logger,
    resource::FunctionResource,
};
use collector_span_exporter::{CollectorExporter, SpanExporter};
use std::{env, sync::Arc};
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, EnvFilter};

static LOGGER: Logger = Logger::const_new("tracer");

/// Handle to the tracer state. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Tracer {
    inner: Arc<TracerInner>,
}

#[derive(Debug)]
struct TracerInner {
    config: Arc<ResolvedConfig>,
    resource: FunctionResource,
    container: Arc<SpanContainer>,
    agent: Arc<ExportAgent>,
}

impl Tracer {
    /// Resolve `config`, install logging and the quiet panic hook, and build
    /// the exporter.
    pub fn init(config: TracerConfig) -> Self {
        let config = config.resolve();
        init_subscriber(config.verbose);
        install_quiet_panic_hook();
        Self::new(config)
    }

    /// Build a tracer exporting to the configured collector.
    ///
    /// Does not touch the global subscriber.
    pub fn new(config: ResolvedConfig) -> Self {
        let exporter = match build_exporter(&config) {
            Ok(exporter) => Some(Arc::new(exporter) as Arc<dyn SpanExporter>),
            Err(ConfigError::Missing(var)) => {
                LOGGER.info(format!("{} is not set, span export disabled", var));
                None
            }
            Err(err) => {
                LOGGER.warn(format!("span export disabled: {}", err));
                None
            }
        };
        Self::with_exporter(config, exporter)
    }

    /// Build a tracer around a given exporter; `None` disables export.
    pub fn with_exporter(config: ResolvedConfig, exporter: Option<Arc<dyn SpanExporter>>) -> Self {
        let agent = ExportAgent::builder()
            .maybe_exporter(exporter)
            .secret_patterns(config.secret_patterns.clone())
            .timeout(config.export_timeout)
            .max_batch_bytes(config.max_batch_bytes)
            .build();

        if config.switch_off {
            LOGGER.info("tracer switched off, invocations run untraced");
        }

        Self {
            inner: Arc::new(TracerInner {
                container: Arc::new(SpanContainer::new(config.max_spans)),
                resource: FunctionResource::from_env(),
                agent: Arc::new(agent),
                config: Arc::new(config),
            }),
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.inner.config
    }

    pub(crate) fn shared_config(&self) -> Arc<ResolvedConfig> {
        Arc::clone(&self.inner.config)
    }

    pub fn resource(&self) -> &FunctionResource {
        &self.inner.resource
    }

    pub fn container(&self) -> &Arc<SpanContainer> {
        &self.inner.container
    }

    pub fn agent(&self) -> &Arc<ExportAgent> {
        &self.inner.agent
    }
}

fn build_exporter(config: &ResolvedConfig) -> Result<CollectorExporter, ConfigError> {
    let endpoint = config.endpoint()?;
    let exporter = CollectorExporter::builder()
        .endpoint(endpoint)
        .maybe_token(config.token.clone())
        .timeout(config.export_timeout)
        .reuse_connection(config.reuse_connection)
        .build()?;
    LOGGER.debug(format!("exporting spans to {}", exporter.endpoint()));
    Ok(exporter)
}

fn env_filter(verbose: bool) -> EnvFilter {
    if env::var("RUST_LOG").is_ok() {
        return EnvFilter::builder()
            .with_env_var("RUST_LOG")
            .from_env_lossy();
    }
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("AWS_LAMBDA_LOG_LEVEL")
        .from_env_lossy()
}

fn init_subscriber(verbose: bool) {
    let subscriber = tracing_subscriber::registry::Registry::default().with(env_filter(verbose));

    let installed = if json_log_format() {
        tracing::subscriber::set_global_default(
            subscriber.with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .without_time()
                    .json(),
            ),
        )
    } else {
        tracing::subscriber::set_global_default(
            subscriber.with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .without_time()
                    .with_ansi(false),
            ),
        )
    };

    if installed.is_err() {
        LOGGER.debug("global subscriber already installed, keeping it");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::env_vars;
    use serial_test::serial;

    fn clear_env() {
        for var in [env_vars::TOKEN, env_vars::EDGE_HOST, env_vars::SWITCH_OFF] {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_export_disabled_without_credentials() {
        clear_env();
        let tracer = Tracer::new(TracerConfig::from_env());
        assert!(!tracer.agent().is_enabled());
        assert_eq!(tracer.container().capacity(), tracer.config().max_spans);
    }

    #[test]
    #[serial]
    fn test_export_enabled_with_credentials() {
        clear_env();
        let config = TracerConfig::builder()
            .token("t_123")
            .edge_host("collector.example.com")
            .max_spans(10)
            .build()
            .resolve();

        let tracer = Tracer::new(config);
        assert!(tracer.agent().is_enabled());
        assert_eq!(tracer.container().capacity(), 10);
    }

    #[test]
    #[serial]
    fn test_init_twice_is_tolerated() {
        clear_env();
        let first = Tracer::init(TracerConfig::builder().verbose(true).build());
        let second = Tracer::init(TracerConfig::default());
        assert!(first.config().verbose);
        assert!(!second.config().verbose);
    }

    #[test]
    #[serial]
    fn test_clones_share_state() {
        let tracer = Tracer::with_exporter(ResolvedConfig::default(), None);
        let clone = tracer.clone();
        assert!(Arc::ptr_eq(tracer.container(), clone.container()));
    }
}
