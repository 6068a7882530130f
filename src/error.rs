use std::any::Any;

use thiserror::Error;

/// Boxed error type returned by scheduled task callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Faults produced while driving scheduled work.
///
/// None of these propagate as hard failures; they are recorded on the
/// owning observer or reported through `tracing` so the tick cadence
/// never stalls on one failing task.
#[derive(Debug, Error)]
pub enum TaskError {
    /// A task callback panicked; the payload is rendered best-effort.
    #[error("task callback panicked: {0}")]
    Panicked(String),
    /// A work item exceeded its configured abort timeout and was abandoned.
    #[error("work item `{0}` exceeded its abort timeout")]
    AbortTimeout(String),
}

/// Renders a `catch_unwind` payload into something printable.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
