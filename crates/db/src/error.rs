//! Translation of sqlx failures into [`CoreError`].

use strata_core::error::CoreError;

/// PostgreSQL unique constraint violation.
const UNIQUE_VIOLATION: &str = "23505";
/// PostgreSQL serialization failure under concurrent writers.
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// Classify a sqlx error.
///
/// - Unique constraint violations (constraint name starting with `uq_`) map
///   to [`CoreError::Conflict`].
/// - Serialization failures and deadlocks map to [`CoreError::Conflict`] so
///   the caller may retry the whole operation.
/// - Everything else is a [`CoreError::Storage`].
pub fn classify(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return CoreError::Conflict(format!(
                        "Duplicate value violates unique constraint: {constraint}"
                    ));
                }
            }
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                return CoreError::Conflict(format!("Concurrent update: {}", db_err.message()));
            }
            _ => {}
        }
    }
    tracing::error!(error = %err, "Database error");
    CoreError::storage(err)
}
