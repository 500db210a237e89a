//! Per-unit accumulator for intercepted responses.
//!
//! A `Capture` is created when a unit of work starts, handed to the page as a
//! response handler, drained after the wait phase and dropped with the unit. Nothing
//! is shared across units, stages or runs.

use crate::browser::ResponseHandler;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

pub struct Capture<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T: Send + 'static> Capture<T> {
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handler that keeps every response body `map` turns into `Some`.
    pub fn handler<F>(&self, map: F) -> ResponseHandler
    where
        F: Fn(&str, Value) -> Option<T> + Send + Sync + 'static,
    {
        let items = Arc::clone(&self.items);
        Arc::new(move |url: &str, body: Value| {
            if let Some(item) = map(url, body) {
                items.lock().push(item);
            }
        })
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain everything captured so far, in arrival order.
    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.items.lock())
    }
}

impl<T: Send + 'static> Default for Capture<T> {
    fn default() -> Self {
        Self::new()
    }
}
