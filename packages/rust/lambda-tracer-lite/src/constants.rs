//! Constants for the lambda-tracer-lite package.
//!
//! This file centralizes all constants to ensure consistency across the codebase
//! and provide a single source of truth for configuration parameters.

/// Environment variable names for configuration.
pub mod env_vars {
    /// Collector authentication token. Export is disabled when unset.
    pub const TOKEN: &str = "LAMBDA_TRACER_TOKEN";

    /// Collector host (optionally with scheme). Export is disabled when unset.
    pub const EDGE_HOST: &str = "LAMBDA_TRACER_EDGE_HOST";

    /// Set to "true" to bypass the tracer entirely.
    pub const SWITCH_OFF: &str = "LAMBDA_TRACER_SWITCH_OFF";

    /// Set to "true" to enable debug diagnostics.
    pub const VERBOSE: &str = "LAMBDA_TRACER_VERBOSE";

    /// Comma-separated list of trigger kinds to leave out of the report.
    pub const EVENT_FILTER: &str = "LAMBDA_TRACER_EVENT_FILTER";

    /// Maximum nesting depth explored by the trigger resolver.
    pub const MAX_TRIGGER_DEPTH: &str = "LAMBDA_TRACER_MAX_TRIGGER_DEPTH";

    /// Maximum number of nested payloads explored per trigger.
    pub const MAX_TRIGGER_WIDTH: &str = "LAMBDA_TRACER_MAX_TRIGGER_WIDTH";

    /// JSON array of regexes replacing the default secret patterns.
    pub const SECRET_MASKING_REGEX: &str = "LAMBDA_TRACER_SECRET_MASKING_REGEX";

    /// Set to "true" to keep collector connections alive between invocations.
    pub const REUSE_CONNECTION: &str = "LAMBDA_TRACER_REUSE_CONNECTION";

    /// Hard timeout for one export, in milliseconds.
    pub const EXPORT_TIMEOUT_MS: &str = "LAMBDA_TRACER_EXPORT_TIMEOUT_MS";

    /// Maximum serialized size of one captured payload, in bytes.
    pub const MAX_ENTRY_SIZE: &str = "LAMBDA_TRACER_MAX_ENTRY_SIZE";

    /// Maximum size of one export batch, in bytes.
    pub const MAX_BATCH_BYTES: &str = "LAMBDA_TRACER_MAX_BATCH_BYTES";

    /// Time before the deadline at which the safety-net flush runs, in milliseconds.
    pub const TIMEOUT_BUFFER_MS: &str = "LAMBDA_TRACER_TIMEOUT_BUFFER_MS";

    /// Maximum number of spans held per invocation.
    pub const MAX_SPANS: &str = "LAMBDA_TRACER_MAX_SPANS";

    /// Log format selected for the function (`JSON` or `Text`).
    pub const AWS_LAMBDA_LOG_FORMAT: &str = "AWS_LAMBDA_LOG_FORMAT";

    /// X-Ray trace header injected by the Lambda runtime.
    pub const AMZN_TRACE_ID: &str = "_X_AMZN_TRACE_ID";
}

/// Default values for configuration parameters.
pub mod defaults {
    /// Default maximum depth of the trigger forest.
    pub const MAX_TRIGGER_DEPTH: usize = 7;

    /// Default maximum number of nested payloads explored per trigger.
    pub const MAX_TRIGGER_WIDTH: usize = 50;

    /// Default export timeout in milliseconds.
    pub const EXPORT_TIMEOUT_MS: u64 = 300;

    /// Default maximum payload size in bytes.
    pub const MAX_ENTRY_SIZE: usize = 2048;

    /// Default maximum export batch size in bytes.
    pub const MAX_BATCH_BYTES: usize = 1_000_000;

    /// Default safety-net buffer in milliseconds.
    pub const TIMEOUT_BUFFER_MS: u64 = 500;

    /// Default maximum number of spans per invocation.
    pub const MAX_SPANS: usize = 2048;

    /// Default secret-scrubbing patterns, matched case-insensitively against whole keys.
    pub const SECRET_PATTERNS: &[&str] = &[
        ".*pass.*",
        ".*key.*",
        ".*secret.*",
        ".*credential.*",
        ".*passphrase.*",
        "SessionToken",
        "x-amz-security-token",
        "Signature",
        "Authorization",
    ];

    /// Dotted key paths that are never scrubbed even when a pattern matches.
    pub const SECRET_EXEMPT_PATHS: &[&str] = &["Records.s3.object.key"];
}

/// Markers the tracer writes into or reads from payloads.
pub mod markers {
    /// Replacement for scrubbed values.
    pub const REDACTED: &str = "****";

    /// Key holding the tracer's own data in step function payloads.
    pub const TRACER_KEY: &str = "_tracer";

    /// Key under [`TRACER_KEY`] identifying a step function execution.
    pub const STEP_FUNCTION_UID: &str = "step_function_uid";

    /// Replacement for values nested beyond the serialization depth bound.
    pub const DEPTH_SENTINEL: &str = "[nested too deep]";

    /// Replacement for values that fail to serialize.
    pub const UNSERIALIZABLE: &str = "[unserializable]";
}
