//! Tracer configuration.
//!
//! [`TracerConfig`] is built in code with a builder; every field left unset is
//! filled from its environment variable (see [`constants::env_vars`]) and then
//! from [`constants::defaults`] when [`TracerConfig::resolve`] runs. Values set
//! through the builder win over the environment.
//!
//! Resolution never fails. Malformed environment values are logged and
//! ignored, an invalid secret pattern list falls back to the default patterns.
//!
//! # Example
//!
//! ```
//! use lambda_tracer_lite::TracerConfig;
//! use std::time::Duration;
//!
//! let config = TracerConfig::builder()
//!     .edge_host("collector.example.com")
//!     .export_timeout(Duration::from_millis(500))
//!     .build()
//!     .resolve();
//!
//! assert_eq!(config.export_timeout, Duration::from_millis(500));
//! ```

use crate::{
    constants::{self, defaults, env_vars},
    logger::Logger,
    sanitizer::SecretPatterns,
    triggers::{TriggerKind, TriggerSettings},
};
use bon::Builder;
use collector_span_exporter::{endpoint_for_host, ExportError};
use std::{env, str::FromStr, time::Duration};
use thiserror::Error;

static LOGGER: Logger = Logger::const_new("config");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid secret pattern: {0}")]
    SecretPattern(#[from] regex::Error),

    #[error("{env_var} is not a JSON array of strings: {source}")]
    SecretPatternList {
        env_var: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("unusable collector endpoint: {0}")]
    Endpoint(#[from] ExportError),
}

/// Tracer settings as given in code. Unset fields come from the environment.
#[derive(Builder, Debug, Clone, Default)]
pub struct TracerConfig {
    /// Collector authentication token.
    #[builder(into)]
    pub token: Option<String>,

    /// Collector host, with or without scheme.
    #[builder(into)]
    pub edge_host: Option<String>,

    /// Bypass the tracer entirely.
    pub switch_off: Option<bool>,

    /// Log tracer diagnostics at debug level.
    pub verbose: Option<bool>,

    /// Trigger kinds left out of the report.
    pub event_filter: Option<Vec<TriggerKind>>,

    pub max_trigger_depth: Option<usize>,

    pub max_trigger_width: Option<usize>,

    /// Regexes replacing the default secret patterns.
    pub secret_scrub_patterns: Option<Vec<String>>,

    /// Keep collector connections alive between invocations.
    pub reuse_connection: Option<bool>,

    /// Hard timeout for one export.
    pub export_timeout: Option<Duration>,

    /// Maximum serialized size of one captured payload, in bytes.
    pub max_entry_size: Option<usize>,

    /// Maximum size of one export batch, in bytes.
    pub max_batch_bytes: Option<usize>,

    /// How long before the deadline the safety-net flush runs.
    pub timeout_buffer: Option<Duration>,

    /// Maximum number of spans held per invocation.
    pub max_spans: Option<usize>,
}

/// Fully resolved settings.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub token: Option<String>,
    pub edge_host: Option<String>,
    pub switch_off: bool,
    pub verbose: bool,
    pub event_filter: Vec<TriggerKind>,
    pub max_trigger_depth: usize,
    pub max_trigger_width: usize,
    pub secret_patterns: SecretPatterns,
    pub reuse_connection: bool,
    pub export_timeout: Duration,
    pub max_entry_size: usize,
    pub max_batch_bytes: usize,
    pub timeout_buffer: Duration,
    pub max_spans: usize,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        TracerConfig::default().resolve()
    }
}

impl TracerConfig {
    /// Resolve a configuration purely from the environment.
    pub fn from_env() -> ResolvedConfig {
        Self::default().resolve()
    }

    /// Fill unset fields from the environment, then from defaults.
    pub fn resolve(self) -> ResolvedConfig {
        let secret_patterns = match resolve_secret_patterns(self.secret_scrub_patterns) {
            Ok(patterns) => patterns,
            Err(err) => {
                LOGGER.warn(format!("{}, using default secret patterns", err));
                SecretPatterns::default()
            }
        };

        let config = ResolvedConfig {
            token: self.token.or_else(|| env_string(env_vars::TOKEN)),
            edge_host: self.edge_host.or_else(|| env_string(env_vars::EDGE_HOST)),
            switch_off: self
                .switch_off
                .or_else(|| env_bool(env_vars::SWITCH_OFF))
                .unwrap_or(false),
            verbose: self
                .verbose
                .or_else(|| env_bool(env_vars::VERBOSE))
                .unwrap_or(false),
            event_filter: self
                .event_filter
                .unwrap_or_else(|| env_event_filter(env_vars::EVENT_FILTER)),
            max_trigger_depth: self
                .max_trigger_depth
                .or_else(|| env_parse(env_vars::MAX_TRIGGER_DEPTH))
                .unwrap_or(defaults::MAX_TRIGGER_DEPTH),
            max_trigger_width: self
                .max_trigger_width
                .or_else(|| env_parse(env_vars::MAX_TRIGGER_WIDTH))
                .unwrap_or(defaults::MAX_TRIGGER_WIDTH),
            secret_patterns,
            reuse_connection: self
                .reuse_connection
                .or_else(|| env_bool(env_vars::REUSE_CONNECTION))
                .unwrap_or(false),
            export_timeout: self
                .export_timeout
                .or_else(|| env_parse(env_vars::EXPORT_TIMEOUT_MS).map(Duration::from_millis))
                .unwrap_or(Duration::from_millis(defaults::EXPORT_TIMEOUT_MS)),
            max_entry_size: self
                .max_entry_size
                .or_else(|| env_parse(env_vars::MAX_ENTRY_SIZE))
                .unwrap_or(defaults::MAX_ENTRY_SIZE),
            max_batch_bytes: self
                .max_batch_bytes
                .or_else(|| env_parse(env_vars::MAX_BATCH_BYTES))
                .unwrap_or(defaults::MAX_BATCH_BYTES),
            timeout_buffer: self
                .timeout_buffer
                .or_else(|| env_parse(env_vars::TIMEOUT_BUFFER_MS).map(Duration::from_millis))
                .unwrap_or(Duration::from_millis(defaults::TIMEOUT_BUFFER_MS)),
            max_spans: self
                .max_spans
                .or_else(|| env_parse(env_vars::MAX_SPANS))
                .unwrap_or(defaults::MAX_SPANS),
        };

        LOGGER.debug(format!(
            "resolved config: switch_off={} depth={} width={} timeout={:?} export={}",
            config.switch_off,
            config.max_trigger_depth,
            config.max_trigger_width,
            config.export_timeout,
            config.endpoint().is_ok()
        ));
        config
    }
}

impl ResolvedConfig {
    pub fn trigger_settings(&self) -> TriggerSettings {
        TriggerSettings {
            max_depth: self.max_trigger_depth,
            max_width: self.max_trigger_width,
            filter: self.event_filter.clone(),
        }
    }

    /// Collector endpoint. Export is possible only with both a token and a host.
    pub fn endpoint(&self) -> Result<String, ConfigError> {
        if self.token.is_none() {
            return Err(ConfigError::Missing(env_vars::TOKEN));
        }
        let host = self
            .edge_host
            .as_deref()
            .ok_or(ConfigError::Missing(env_vars::EDGE_HOST))?;
        Ok(endpoint_for_host(host)?)
    }
}

fn resolve_secret_patterns(configured: Option<Vec<String>>) -> Result<SecretPatterns, ConfigError> {
    let patterns = match configured {
        Some(patterns) => patterns,
        None => match env_string(env_vars::SECRET_MASKING_REGEX) {
            Some(raw) => serde_json::from_str::<Vec<String>>(&raw).map_err(|source| {
                ConfigError::SecretPatternList {
                    env_var: env_vars::SECRET_MASKING_REGEX,
                    source,
                }
            })?,
            None => return Ok(SecretPatterns::default()),
        },
    };
    Ok(SecretPatterns::new(patterns)?)
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
    let value = env_string(name)?;
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        other => {
            LOGGER.warn(format!("invalid boolean in {}: {}, using default", name, other));
            None
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let value = env_string(name)?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            LOGGER.warn(format!("invalid value in {}: {}, using default", name, value));
            None
        }
    }
}

fn env_event_filter(name: &str) -> Vec<TriggerKind> {
    let Some(value) = env_string(name) else {
        return Vec::new();
    };
    value
        .split(',')
        .filter(|kind| !kind.trim().is_empty())
        .filter_map(|kind| match kind.parse::<TriggerKind>() {
            Ok(kind) => Some(kind),
            Err(err) => {
                LOGGER.warn(format!("{} in {}, ignoring it", err, name));
                None
            }
        })
        .collect()
}

/// Whether the function's log format is JSON.
pub(crate) fn json_log_format() -> bool {
    env::var(constants::env_vars::AWS_LAMBDA_LOG_FORMAT)
        .unwrap_or_default()
        .eq_ignore_ascii_case("JSON")
}
