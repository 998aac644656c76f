//! Prefixed diagnostics for lambda-tracer-lite.
//!
//! Every component logs through its own [`Logger`] so messages carry a
//! `[component]` prefix. Messages are emitted as `tracing` events under the
//! `lambda_tracer_lite` target, so level filtering is whatever the installed
//! subscriber decides (see [`Tracer::init`](crate::Tracer::init)).
//!
//! # Static Logger Example
//! ```
//! use lambda_tracer_lite::logger::Logger;
//!
//! static LOGGER: Logger = Logger::const_new("my_adapter");
//!
//! LOGGER.debug("hooked client");
//! ```

/// Logger with consistent prefixing
#[derive(Clone, Debug)]
pub struct Logger {
    prefix: &'static str,
}

impl Logger {
    /// Create a new logger with the given prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        let static_prefix = Box::leak(prefix.into().into_boxed_str());
        Self {
            prefix: static_prefix,
        }
    }

    /// Create a new logger with the given prefix that can be used in const contexts
    pub const fn const_new(prefix: &'static str) -> Self {
        Self { prefix }
    }

    /// The component prefix of this logger
    pub fn prefix(&self) -> &'static str {
        self.prefix
    }

    fn format_message(&self, message: &str) -> String {
        format!("[{}] {}", self.prefix, message)
    }

    /// Log a debug message
    pub fn debug(&self, message: impl AsRef<str>) {
        tracing::debug!(target: "lambda_tracer_lite", "{}", self.format_message(message.as_ref()));
    }

    /// Log an info message
    pub fn info(&self, message: impl AsRef<str>) {
        tracing::info!(target: "lambda_tracer_lite", "{}", self.format_message(message.as_ref()));
    }

    /// Log a warning message
    pub fn warn(&self, message: impl AsRef<str>) {
        tracing::warn!(target: "lambda_tracer_lite", "{}", self.format_message(message.as_ref()));
    }

    /// Log an error message
    pub fn error(&self, message: impl AsRef<str>) {
        tracing::error!(target: "lambda_tracer_lite", "{}", self.format_message(message.as_ref()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_message() {
        let logger = Logger::new("test");
        assert_eq!(logger.format_message("hello"), "[test] hello");
    }

    #[test]
    fn test_const_logger() {
        static LOGGER: Logger = Logger::const_new("static");
        assert_eq!(LOGGER.prefix(), "static");
        // Emitting without a subscriber is a no-op
        LOGGER.warn("nothing listens");
    }
}
