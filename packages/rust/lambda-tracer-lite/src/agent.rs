//! Span export with a failure-swallowing contract.
//!
//! The agent turns the spans of an invocation into one JSON batch and hands it
//! to a [`SpanExporter`]. It never returns an error and never blocks longer
//! than its timeout: a slow, failing or unreachable collector costs at most
//! `timeout` and a warning in the logs. Failed batches are dropped; there is
//! no retry queue.
//!
//! # Batch assembly
//!
//! 1. Spans already delivered in their closed state are skipped. Spans
//!    delivered while still open (by the deadline safety net) are sent again
//!    once closed.
//! 2. Each span is serialized and scrubbed of secrets.
//! 3. The function span goes first, the rest follow in container order until
//!    `max_batch_bytes` is reached; what does not fit is dropped and counted.
//!
//! # Example
//!
//! ```no_run
//! use lambda_tracer_lite::{ExportAgent, SpanContainer};
//! use collector_span_exporter::CollectorExporter;
//! use std::{sync::Arc, time::Duration};
//!
//! # async fn run() -> Result<(), collector_span_exporter::ExportError> {
//! let exporter = CollectorExporter::builder()
//!     .endpoint("https://collector.example.com/api/spans")
//!     .token("t_123".to_string())
//!     .build()?;
//!
//! let agent = ExportAgent::builder()
//!     .exporter(Arc::new(exporter))
//!     .timeout(Duration::from_millis(300))
//!     .build();
//!
//! let container = SpanContainer::new(2048);
//! agent.flush(&container).await;
//! # Ok(())
//! # }
//! ```

use crate::{
    constants::defaults,
    container::SpanContainer,
    logger::Logger,
    sanitizer::{scrub_value, SecretPatterns},
    span::{Span, SpanType},
};
use bon::bon;
use collector_span_exporter::SpanExporter;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

static LOGGER: Logger = Logger::const_new("agent");

/// Ships spans to the collector.
#[derive(Debug)]
pub struct ExportAgent {
    exporter: Option<Arc<dyn SpanExporter>>,
    secret_patterns: SecretPatterns,
    timeout: Duration,
    max_batch_bytes: usize,
    /// Delivered span ids, with whether the span was closed when delivered.
    delivered: Mutex<HashMap<String, bool>>,
}

#[bon]
impl ExportAgent {
    /// Creates a new agent. Without an exporter every export is a no-op.
    #[builder]
    pub fn new(
        exporter: Option<Arc<dyn SpanExporter>>,
        #[builder(default)] secret_patterns: SecretPatterns,
        timeout: Option<Duration>,
        max_batch_bytes: Option<usize>,
    ) -> Self {
        Self {
            exporter,
            secret_patterns,
            timeout: timeout.unwrap_or(Duration::from_millis(defaults::EXPORT_TIMEOUT_MS)),
            max_batch_bytes: max_batch_bytes.unwrap_or(defaults::MAX_BATCH_BYTES),
            delivered: Mutex::new(HashMap::new()),
        }
    }
}

impl ExportAgent {
    pub fn is_enabled(&self) -> bool {
        self.exporter.is_some()
    }

    /// Export every span currently held by `container`.
    pub async fn flush(&self, container: &SpanContainer) -> usize {
        self.export_spans(container.get_all_spans()).await
    }

    /// Forget delivery history. Called at every invocation boundary.
    pub fn reset(&self) {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Export `spans`, returning how many were delivered. Never fails.
    pub async fn export_spans(&self, spans: Vec<Span>) -> usize {
        let Some(exporter) = &self.exporter else {
            LOGGER.debug("export disabled, dropping spans");
            return 0;
        };

        let pending = self.pending(spans);
        if pending.is_empty() {
            return 0;
        }

        let (payload, batch) = self.assemble(pending);
        if batch.is_empty() {
            return 0;
        }

        match tokio::time::timeout(self.timeout, exporter.export(payload)).await {
            Ok(Ok(())) => {
                let mut delivered = self.delivered.lock().unwrap_or_else(PoisonError::into_inner);
                for (id, closed) in &batch {
                    delivered.insert(id.clone(), *closed);
                }
                LOGGER.debug(format!("delivered {} span(s)", batch.len()));
                batch.len()
            }
            Ok(Err(err)) => {
                LOGGER.warn(format!("failed to export {} span(s): {}", batch.len(), err));
                0
            }
            Err(_) => {
                LOGGER.warn(format!(
                    "export of {} span(s) timed out after {:?}",
                    batch.len(),
                    self.timeout
                ));
                0
            }
        }
    }

    /// Spans not yet delivered in their current state, function span first.
    fn pending(&self, spans: Vec<Span>) -> Vec<Span> {
        let delivered = self.delivered.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut functions, others): (Vec<Span>, Vec<Span>) = spans
            .into_iter()
            .filter(|span| match delivered.get(&span.id) {
                Some(true) => false,
                Some(false) => !span.is_open(),
                None => true,
            })
            .partition(|span| span.span_type == SpanType::Function);
        functions.extend(others);
        functions
    }

    /// Serialize, scrub and size-cap a batch.
    ///
    /// Returns the payload and the `(id, closed)` pairs it contains.
    fn assemble(&self, spans: Vec<Span>) -> (Vec<u8>, Vec<(String, bool)>) {
        let mut payload = Vec::with_capacity(1024);
        payload.push(b'[');
        let mut batch = Vec::with_capacity(spans.len());
        let mut dropped = 0usize;

        for span in spans {
            let mut value = match serde_json::to_value(&span) {
                Ok(value) => value,
                Err(err) => {
                    LOGGER.debug(format!("skipping unserializable span {}: {}", span.id, err));
                    continue;
                }
            };
            scrub_value(&mut value, &self.secret_patterns);
            let Ok(encoded) = serde_json::to_vec(&value) else {
                continue;
            };

            // One byte for the separator, one for the closing bracket
            if payload.len() + encoded.len() + 2 > self.max_batch_bytes {
                dropped += 1;
                continue;
            }
            if !batch.is_empty() {
                payload.push(b',');
            }
            payload.extend_from_slice(&encoded);
            batch.push((span.id.clone(), !span.is_open()));
        }

        payload.push(b']');
        if dropped > 0 {
            LOGGER.warn(format!(
                "batch limit of {} bytes reached, {} span(s) dropped",
                self.max_batch_bytes, dropped
            ));
        }
        (payload, batch)
    }
}
