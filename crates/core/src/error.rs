use crate::types::DbId;

/// Boxed error used to carry backend failures across crate boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[source] BoxError),

    #[error("External service `{service}` failed: {message}")]
    External {
        service: &'static str,
        message: String,
    },

    #[error("Operation `{operation}` failed: {source}")]
    OperationFailed {
        operation: &'static str,
        #[source]
        source: Box<CoreError>,
    },
}

impl CoreError {
    /// Shorthand for [`CoreError::NotFound`].
    pub fn not_found(entity: &'static str, id: DbId) -> Self {
        Self::NotFound { entity, id }
    }

    /// Wrap a backend error (e.g. `sqlx::Error`) as [`CoreError::Storage`].
    pub fn storage(err: impl Into<BoxError>) -> Self {
        Self::Storage(err.into())
    }

    /// Attach the name of the multi-step operation that was running.
    ///
    /// Infrastructure failures (`Storage`, `External`) become
    /// [`CoreError::OperationFailed`] carrying the original cause. Domain
    /// errors pass through unchanged so callers can still match on them.
    pub fn within(self, operation: &'static str) -> Self {
        match self {
            Self::Storage(_) | Self::External { .. } => Self::OperationFailed {
                operation,
                source: Box::new(self),
            },
            other => other,
        }
    }

    /// `true` for [`CoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// `true` when the whole operation may be retried by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
