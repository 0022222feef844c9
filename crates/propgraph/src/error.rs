//! Error types for propgraph.
//!
//! [`ErrorKind`] names what went wrong. [`GraphError`] pairs that cause with
//! the [`Rollback`] the engine issued on the caller's transaction, so a failed
//! rollback is reported next to the failure that triggered it instead of being
//! dropped.

use std::fmt;

use rusqlite::{Connection, ErrorCode};
use thiserror::Error;
use tracing::warn;

/// Convenience alias used by every public operation.
pub type Result<T, E = GraphError> = std::result::Result<T, E>;

/// The failure taxonomy of the graph layer.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// The caller configured an operation incorrectly (empty upsert conflict
    /// target, bad table name, ...). Raised before any SQL runs.
    #[error("validation error: {0}")]
    Validation(String),

    /// A uniqueness or referential-integrity constraint enforced by the store.
    #[error("constraint violation: {0}")]
    Constraint(#[source] rusqlite::Error),

    /// Properties could not be encoded as JSON.
    #[error("serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Stored JSON could not be decoded into the requested property type.
    #[error("deserialization error: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Exactly one row was required and none matched.
    #[error("not found: no matching row in `{table}`")]
    NotFound { table: String },

    /// Beginning or committing a transaction failed.
    #[error("transaction error: {0}")]
    Transaction(#[source] rusqlite::Error),

    /// Any other failure reported by SQLite.
    #[error("store error: {0}")]
    Store(#[source] rusqlite::Error),
}

impl From<rusqlite::Error> for ErrorKind {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => ErrorKind::Constraint(err),
            _ => ErrorKind::Store(err),
        }
    }
}

/// What happened to the enclosing transaction when an operation failed.
#[derive(Debug)]
pub enum Rollback {
    /// No rollback was issued (validation failures never touch the store).
    NotAttempted,
    /// The transaction was rolled back.
    Completed,
    /// The rollback itself failed.
    Failed(rusqlite::Error),
}

impl Rollback {
    /// Returns `true` if the transaction was rolled back successfully.
    pub fn is_completed(&self) -> bool {
        matches!(self, Rollback::Completed)
    }

    /// The rollback's own error, if it failed.
    pub fn error(&self) -> Option<&rusqlite::Error> {
        match self {
            Rollback::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Rollback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rollback::NotAttempted => Ok(()),
            Rollback::Completed => write!(f, " (transaction rolled back)"),
            Rollback::Failed(err) => write!(f, " (rollback failed: {err})"),
        }
    }
}

/// An operation failure together with the rollback outcome.
#[derive(Debug, Error)]
#[error("{kind}{rollback}")]
pub struct GraphError {
    #[source]
    kind: ErrorKind,
    rollback: Rollback,
}

impl GraphError {
    pub fn new(kind: ErrorKind, rollback: Rollback) -> Self {
        GraphError { kind, rollback }
    }

    /// Issues `ROLLBACK` on `conn` and records its outcome next to `kind`.
    ///
    /// Validation failures are returned untouched: the store never saw them.
    pub(crate) fn abort(conn: &Connection, kind: ErrorKind) -> Self {
        if matches!(kind, ErrorKind::Validation(_)) {
            return GraphError::new(kind, Rollback::NotAttempted);
        }
        let rollback = match conn.execute_batch("ROLLBACK") {
            Ok(()) => {
                warn!(error = %kind, "operation failed, transaction rolled back");
                Rollback::Completed
            }
            Err(err) => {
                warn!(error = %kind, rollback_error = %err, "operation failed, rollback failed");
                Rollback::Failed(err)
            }
        };
        GraphError::new(kind, rollback)
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn rollback(&self) -> &Rollback {
        &self.rollback
    }

    pub fn into_parts(self) -> (ErrorKind, Rollback) {
        (self.kind, self.rollback)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound { .. })
    }

    pub fn is_constraint(&self) -> bool {
        matches!(self.kind, ErrorKind::Constraint(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.kind, ErrorKind::Validation(_))
    }
}

impl From<ErrorKind> for GraphError {
    fn from(kind: ErrorKind) -> Self {
        GraphError::new(kind, Rollback::NotAttempted)
    }
}

impl From<rusqlite::Error> for GraphError {
    fn from(err: rusqlite::Error) -> Self {
        GraphError::from(ErrorKind::from(err))
    }
}
