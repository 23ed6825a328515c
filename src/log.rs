//! logging collaborator interface.
//!
//! records are emitted through [`tracing`] (the ambient logging crate used throughout this
//! codebase's teacher), but the spec's `LogSource`/`LogAggregator` vocabulary is kept as a thin
//! registry on top of it, mirroring `LogAggregator.cpp`/`LogSource.h` from the original
//! implementation. Unlike that original (and unlike an earlier draft of this module), the
//! registry is **not** a process-wide singleton: one `LogAggregator` is constructed at bootstrap
//! and threaded explicitly through [`crate::config::ServerConfig`] / the connection factory, the
//! same way the rest of this crate's collaborators are passed in rather than reached for
//! globally.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

pub use tracing::Level;

/// process-wide-in-practice, but explicitly owned, registry of active log sources. clone and pass
/// down from wherever `ServerConfig` is assembled; it is cheap to clone (an `Arc` around a mutex).
#[derive(Clone, Default, Debug)]
pub struct LogAggregator {
    sources: Arc<Mutex<HashMap<&'static str, usize>>>,
}

impl LogAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, target: &'static str) {
        *self.sources.lock().unwrap().entry(target).or_insert(0) += 1;
    }

    fn unregister(&self, target: &'static str) {
        let mut sources = self.sources.lock().unwrap();
        if let Some(count) = sources.get_mut(target) {
            *count -= 1;
            if *count == 0 {
                sources.remove(target);
            }
        }
    }

    /// true if at least one live [`LogSource`] is registered under `target`.
    pub fn has_source(&self, target: &str) -> bool {
        self.sources.lock().unwrap().contains_key(target)
    }

    /// construct a named source registered against this aggregator.
    pub fn source(&self, target: &'static str) -> LogSource {
        LogSource::new(target, self.clone())
    }
}

/// a named logging source. construction registers the name with its [`LogAggregator`]; dropping
/// it unregisters. the actual record sinks through `tracing`'s subscriber, keyed off `target`.
pub struct LogSource {
    target: &'static str,
    aggregator: LogAggregator,
}

impl LogSource {
    pub fn new(target: &'static str, aggregator: LogAggregator) -> Self {
        aggregator.register(target);
        Self { target, aggregator }
    }

    #[inline]
    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn trace(&self, msg: &str) {
        tracing::trace!(target: self.target, "{msg}");
    }

    pub fn debug(&self, msg: &str) {
        tracing::debug!(target: self.target, "{msg}");
    }

    pub fn info(&self, msg: &str) {
        tracing::info!(target: self.target, "{msg}");
    }

    pub fn warn(&self, msg: &str) {
        tracing::warn!(target: self.target, "{msg}");
    }

    pub fn error(&self, msg: &str) {
        tracing::error!(target: self.target, "{msg}");
    }
}

impl Drop for LogSource {
    fn drop(&mut self) {
        self.aggregator.unregister(self.target);
    }
}

/// cloning registers a second source under the same target (the aggregator's count is
/// reference-counted for exactly this reason) — used by `h1::channel` to hand a log handle to a
/// spawned handler-dispatch task that may outlive the channel's own borrow.
impl Clone for LogSource {
    fn clone(&self) -> Self {
        Self::new(self.target, self.aggregator.clone())
    }
}
