#![forbid(unsafe_code)]

//! Error type for slice evaluation.

use thiserror::Error;

/// Error raised when a selector fails to produce a slice.
///
/// Carried inside [`SliceUpdate::Failed`](crate::SliceUpdate::Failed) so a
/// failing selector reaches exactly the consumer that installed it, never
/// the store's notification loop. Cloneable because the same failure may be
/// delivered to a callback and returned from a render pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("selector failed: {message}")]
pub struct SelectError {
    message: String,
}

impl SelectError {
    /// Create a selector error with a human-readable cause.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
