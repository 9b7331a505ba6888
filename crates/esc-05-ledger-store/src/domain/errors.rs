//! # Ledger Errors

use thiserror::Error;

/// Ledger store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Database unreachable or connection dropped.
    #[error("ledger connection error: {0}")]
    Connection(String),

    /// Statement failed.
    #[error("ledger query failed: {0}")]
    Query(String),

    /// Stored value cannot be mapped to the domain type.
    #[error("invalid stored value in {field}: {value}")]
    Decode {
        /// Column name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
}

impl LedgerError {
    /// Whether retrying after a delay may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Connection(_))
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => LedgerError::Connection(err.to_string()),
            other => LedgerError::Query(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_connection_errors_are_transient() {
        assert!(LedgerError::Connection("reset".into()).is_transient());
        assert!(!LedgerError::Query("syntax".into()).is_transient());
        assert!(!LedgerError::Decode {
            field: "Price",
            value: "abc".into()
        }
        .is_transient());
    }
}
