//! Bootstrap errors.
//!
//! The pipeline itself has no recoverable failure modes: the only thing that
//! can fail is user code (lifecycle hooks). A hook failure aborts the
//! remaining stages and propagates synchronously to the instantiation caller.
//! Nothing is caught or retried.

use thiserror::Error;

/// Failure raised by a user lifecycle hook.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        HookError(message.into())
    }
}

/// Failure surfaced by instantiation or mounting.
#[derive(Debug, Error)]
pub enum InitError {
    /// A user hook failed; `hook` is the option key it was registered under.
    #[error("hook '{hook}' failed: {source}")]
    Hook {
        hook: String,
        #[source]
        source: HookError,
    },
}
