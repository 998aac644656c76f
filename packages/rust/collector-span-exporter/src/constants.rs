//! Constants for the collector-span-exporter package.
//!
//! This file centralizes all constants to ensure consistency across the codebase
//! and provide a single source of truth for configuration parameters.

/// Default values for configuration parameters.
pub mod defaults {
    use std::time::Duration;

    /// Default request timeout. Kept sub-second so a slow collector never holds
    /// the function past its own latency budget.
    pub const TIMEOUT: Duration = Duration::from_millis(300);

    /// Path appended to the edge host when building the collector endpoint.
    pub const SPANS_PATH: &str = "/api/spans";

    /// TCP keep-alive interval used when connection reuse is enabled.
    pub const KEEP_ALIVE: Duration = Duration::from_secs(60);

    /// User agent sent with every export request.
    pub const USER_AGENT: &str = concat!("lambda-tracer-lite/", env!("CARGO_PKG_VERSION"));
}

/// HTTP header values used by the exporter.
pub mod headers {
    /// Content type of the exported span batch.
    pub const CONTENT_TYPE_JSON: &str = "application/json";
}
