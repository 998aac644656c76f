//! Per-invocation span storage.
//!
//! The container holds snapshots of spans keyed by id, in insertion order.
//! Writes are last-write-wins by id, so an adapter closes a span by adding the
//! extended copy under the same id. The container is bounded: once it holds
//! `capacity` distinct spans, new ids are dropped (updates of stored ids still
//! go through) and a warning is logged on the 1st and every 100th drop.

use crate::{logger::Logger, span::Span};
use indexmap::IndexMap;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex, MutexGuard, PoisonError,
};

static LOGGER: Logger = Logger::const_new("container");

#[derive(Debug)]
pub struct SpanContainer {
    spans: Mutex<IndexMap<String, Span>>,
    capacity: usize,
    dropped: AtomicUsize,
}

impl SpanContainer {
    pub fn new(capacity: usize) -> Self {
        Self {
            spans: Mutex::new(IndexMap::new()),
            capacity,
            dropped: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<String, Span>> {
        self.spans.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a snapshot of `span`, replacing any span with the same id.
    ///
    /// Returns false when the span was dropped because the container is full.
    pub fn add_span(&self, span: &Span) -> bool {
        let mut spans = self.lock();

        if !spans.contains_key(&span.id) && spans.len() >= self.capacity {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if dropped == 1 || dropped % 100 == 0 {
                LOGGER.warn(format!(
                    "span container full (capacity {}), {} span(s) dropped so far",
                    self.capacity, dropped
                ));
            }
            return false;
        }

        spans.insert(span.id.clone(), span.clone());
        true
    }

    pub fn get_span_by_id(&self, id: &str) -> Option<Span> {
        self.lock().get(id).cloned()
    }

    /// All stored spans in insertion order.
    pub fn get_all_spans(&self) -> Vec<Span> {
        self.lock().values().cloned().collect()
    }

    /// Forget every span and the drop count.
    pub fn reset(&self) {
        self.lock().clear();
        self.dropped.store(0, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Spans dropped since the last reset.
    pub fn dropped_count(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}
