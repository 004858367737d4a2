use thiserror::Error;

/// Failure reported by a [`Publisher`](crate::Publisher). These never reach the
/// caller of an experiment; dispatch logs them and moves on.
#[derive(Error, Debug)]
pub enum PublishError {
    /// The sink behind the publisher has gone away
    #[error("observation sink is closed")]
    Closed,

    #[error("failed to publish observation: {0}")]
    Failed(String),
}
