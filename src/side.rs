//! The primitive used to run either side of an experiment.
//!
//! Both the control and the candidate go through [`run_side`], so timing and
//! failure capture are identical for the two.

use std::{
    any::Any,
    fmt,
    future::Future,
    panic::AssertUnwindSafe,
    time::{Duration, Instant},
};

use futures::FutureExt;

/// Payload of a panic caught while polling one side
pub type PanicPayload = Box<dyn Any + Send + 'static>;

/// What a single side produced. Exactly one variant holds per run.
pub enum SideOutcome<T, E> {
    /// The operation completed with a value
    Value(T),

    /// The operation returned an error
    Error(E),

    /// The operation panicked while being polled
    Panic(PanicPayload),
}

impl<T, E> SideOutcome<T, E> {
    pub fn value(&self) -> Option<&T> {
        match self {
            SideOutcome::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, SideOutcome::Value(_))
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for SideOutcome<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SideOutcome::Value(value) => f.debug_tuple("Value").field(value).finish(),
            SideOutcome::Error(error) => f.debug_tuple("Error").field(error).finish(),
            SideOutcome::Panic(payload) => f
                .debug_tuple("Panic")
                .field(&panic_message(payload))
                .finish(),
        }
    }
}

/// The captured outcome and wall-clock duration of one side
#[derive(Debug)]
pub struct SideResult<T, E> {
    pub outcome: SideOutcome<T, E>,
    pub duration: Duration,
}

/// Drive `operation` to completion once, timing it and capturing any error or
/// panic. This never panics itself.
pub async fn run_side<F, T, E>(operation: F) -> SideResult<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let outcome = match AssertUnwindSafe(operation).catch_unwind().await {
        Ok(Ok(value)) => SideOutcome::Value(value),
        Ok(Err(error)) => SideOutcome::Error(error),
        Err(payload) => SideOutcome::Panic(payload),
    };

    SideResult {
        outcome,
        duration: start.elapsed(),
    }
}

/// Best-effort text of a panic payload, for logs
pub(crate) fn panic_message(payload: &PanicPayload) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}
