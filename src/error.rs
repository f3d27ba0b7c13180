use thiserror::Error;

/// Result type for binding operations
pub type BindResult<T> = Result<T, BindError>;

/// Errors that can occur while synchronizing reactive state with storage.
///
/// The enum is `Clone` so outcomes can flow through shared resolutions that
/// are awaited from more than one place.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Invalid(String),

    /// Best-effort cancellation of an in-flight upload. Bindings never treat
    /// this as a failure.
    #[error("Operation canceled")]
    Canceled,

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Background task interrupted: {0}")]
    Interrupted(String),
}

impl BindError {
    /// Create a backend error from any error type
    pub fn backend<E: std::fmt::Display>(error: E) -> Self {
        Self::Backend(error.to_string())
    }

    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid(message.into())
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(path: S) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an interrupted error
    pub fn interrupted<S: Into<String>>(reason: S) -> Self {
        Self::Interrupted(reason.into())
    }

    /// True when the error represents a cancellation rather than a failure
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}
