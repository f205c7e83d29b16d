//! Mapping from sqlx failures to [`RepositoryError`].
//!
//! | sqlx failure                                   | Maps to               |
//! |------------------------------------------------|-----------------------|
//! | I/O error, pool closed, worker crashed         | `ConnectionClosed`    |
//! | SQLSTATE class `08` (connection exception)     | `ConnectionClosed`    |
//! | SQLSTATE `57P01`..`57P03` (server going away)  | `ConnectionClosed`    |
//! | SQLSTATE class `25` (invalid transaction state)| `TransactionClosed`   |
//! | `RowNotFound`                                  | `NotFound`            |
//! | anything else                                  | `Database`            |

use orderstream_core::RepositoryError;

/// Classify a sqlx error for the retrying wrapper.
#[must_use]
pub fn classify(err: &sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
            RepositoryError::ConnectionClosed(err.to_string())
        }
        sqlx::Error::RowNotFound => RepositoryError::NotFound(err.to_string()),
        sqlx::Error::Database(db) => db.code().map_or_else(
            || RepositoryError::Database(err.to_string()),
            |code| classify_sqlstate(&code, err.to_string()),
        ),
        _ => RepositoryError::Database(err.to_string()),
    }
}

/// Classify a server-reported SQLSTATE code.
#[must_use]
pub fn classify_sqlstate(code: &str, message: String) -> RepositoryError {
    if code.starts_with("08") || matches!(code, "57P01" | "57P02" | "57P03") {
        RepositoryError::ConnectionClosed(message)
    } else if code.starts_with("25") {
        RepositoryError::TransactionClosed(message)
    } else {
        RepositoryError::Database(message)
    }
}
