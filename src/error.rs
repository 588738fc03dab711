use crate::options::IsolationLevel;
use sqlx::mysql::MySqlDatabaseError;

/// MySQL error number for `ER_LOCK_DEADLOCK`.
const ER_LOCK_DEADLOCK: u16 = 1213;
/// MySQL error number for `ER_LOCK_WAIT_TIMEOUT`.
const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
/// SQLSTATE class 40, serialization failure.
const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";

/// Error types for transaction management
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLx
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Transaction has already been consumed (committed or rolled back)
    #[error("Transaction has already been consumed")]
    AlreadyConsumed,

    /// The server cannot start a transaction with this isolation level
    #[error("Isolation level {0} is not supported by MySQL")]
    UnsupportedIsolation(IsolationLevel),
}

impl Error {
    /// Returns `true` if the error is a transient conflict worth retrying in a new
    /// transaction: deadlocks, lock wait timeouts and serialization failures.
    ///
    /// Every other error, including ones raised by this crate, is not retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Database(err) => is_retryable_sqlx(err),
            Error::AlreadyConsumed | Error::UnsupportedIsolation(_) => false,
        }
    }
}

/// Classifier form of [`Error::is_retryable`], usable with
/// [`TxOptions::check_retryable`](crate::TxOptions::check_retryable) and
/// [`RetryRegistry::set_default_check_retryable`](crate::RetryRegistry::set_default_check_retryable).
pub fn is_retryable(err: &Error) -> bool {
    err.is_retryable()
}

pub(crate) fn is_retryable_sqlx(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db_err) = err else {
        return false;
    };

    if let Some(mysql_err) = db_err.try_downcast_ref::<MySqlDatabaseError>() {
        if matches!(mysql_err.number(), ER_LOCK_DEADLOCK | ER_LOCK_WAIT_TIMEOUT) {
            return true;
        }
    }

    db_err
        .code()
        .is_some_and(|code| code == SQLSTATE_SERIALIZATION_FAILURE)
}

/// Result type alias for transaction operations
pub type Result<T> = std::result::Result<T, Error>;
