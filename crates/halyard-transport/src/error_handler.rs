//! Error sinks for failures that must not abort the caller.
//!
//! The poller reports close-time failures here and keeps going.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::error;

use crate::error::PollerError;

/// Sink for (context, failure) pairs
pub trait ErrorHandler: Send + Sync {
    /// Report a failure that happened while doing `context`
    fn on_error(&self, context: &str, error: &PollerError);
}

impl<F> ErrorHandler for F
where
    F: Fn(&str, &PollerError) + Send + Sync,
{
    fn on_error(&self, context: &str, error: &PollerError) {
        self(context, error)
    }
}

/// Reports every failure through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingErrorHandler;

impl ErrorHandler for LoggingErrorHandler {
    fn on_error(&self, context: &str, error: &PollerError) {
        error!(context, error = %error, "Poller error");
    }
}

/// Counts failures before forwarding them to another handler
pub struct CountedErrorHandler {
    inner: Arc<dyn ErrorHandler>,
    count: AtomicU64,
}

impl CountedErrorHandler {
    /// Wrap `inner`
    pub fn new(inner: Arc<dyn ErrorHandler>) -> Self {
        Self {
            inner,
            count: AtomicU64::new(0),
        }
    }

    /// Number of failures seen so far
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl ErrorHandler for CountedErrorHandler {
    fn on_error(&self, context: &str, error: &PollerError) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.inner.on_error(context, error);
    }
}

impl std::fmt::Debug for CountedErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountedErrorHandler")
            .field("count", &self.count())
            .finish()
    }
}
