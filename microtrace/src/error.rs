use std::sync::PoisonError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by tracing-side operations.
///
/// These never propagate into the instrumented application's own call
/// paths; they surface only from flush/shutdown calls and exporter
/// internals, where the caller explicitly asked for a result.
#[derive(Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum TraceError {
    /// Shutdown was already invoked on this component.
    #[error("shutdown already invoked")]
    AlreadyShutdown,

    /// The operation did not complete within its deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Any other failure, e.g. a failed batch transmission.
    #[error("{0}")]
    InternalFailure(String),
}

/// A `Result` alias where the error case is a [`TraceError`].
pub type TraceResult<T> = Result<T, TraceError>;

impl<T> From<PoisonError<T>> for TraceError {
    fn from(err: PoisonError<T>) -> Self {
        TraceError::InternalFailure(format!("lock poisoned: {err}"))
    }
}
