//! Error reporting capability supplied by the host application.
//!
//! Failures that must never reach an operation's result (credential store
//! reads/writes, best-effort remote logout) are handed to an `ErrorReporter`
//! instead.

use std::error::Error;

/// Sink for failures absorbed by the core.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &(dyn Error + 'static), context: &str);
}

/// Default reporter: logs through `tracing` at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, error: &(dyn Error + 'static), context: &str) {
        tracing::warn!(error = %error, context, "Absorbed failure");
    }
}
