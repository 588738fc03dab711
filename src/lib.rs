//! # sqlx-transaction-retry
//!
//! Run SQLx units of work inside transactions with automatic commit/rollback and
//! retries for errors you classify as transient.
//!
//! ## Features
//!
//! - **Automatic Commit/Rollback**: Success commits, failure rolls back, and a panicking
//!   unit of work is rolled back before the panic continues
//! - **Classified Retries**: Deadlocks and serialization failures can be retried in a
//!   fresh transaction, with a bounded budget and an optional delay
//! - **Isolation Levels**: Request `READ COMMITTED`, `SERIALIZABLE` and friends per call
//! - **Shared Policy**: A [`RetryRegistry`] supplies the default classifier to every
//!   [`TxExecutor`] call that does not choose its own
//! - **Driver Agnostic Core**: The retry loop only sees the [`TxBeginner`] and
//!   [`TxHandle`] traits; `MySqlPool` implements them out of the box
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! sqlx = { version = "0.8", features = ["mysql", "runtime-tokio"] }
//! sqlx-transaction-retry = "0.1"
//! ```
//!
//! ## Examples
//!
//! ### Basic Transaction
//!
//! ```rust,no_run
//! use sqlx::MySqlPool;
//! use sqlx_transaction_retry::{execute, Error, TxOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = MySqlPool::connect("mysql://localhost/test").await?;
//!
//! execute(&pool, |tx| {
//!     Box::pin(async move {
//!         sqlx::query("INSERT INTO users (name) VALUES (?)")
//!             .bind("Alice")
//!             .execute(tx.as_executor())
//!             .await?;
//!         Ok::<_, Error>(())
//!     })
//! }, TxOptions::new()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Retrying Deadlocks
//!
//! The closure may run several times, each time in a new transaction, so it should
//! only depend on state it can rebuild.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use sqlx::MySqlPool;
//! use sqlx_transaction_retry::{execute, Error, IsolationLevel, TxOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let pool = MySqlPool::connect("mysql://localhost/test").await?;
//! let options = TxOptions::new()
//!     .isolation(IsolationLevel::Serializable)
//!     .max_retry_times(5)
//!     .retry_delay(Duration::from_millis(25))
//!     .check_retryable(Error::is_retryable);
//!
//! let balance = execute(&pool, |tx| {
//!     Box::pin(async move {
//!         sqlx::query("UPDATE accounts SET balance = balance - 10 WHERE id = ?")
//!             .bind(1)
//!             .execute(tx.as_executor())
//!             .await?;
//!
//!         let (balance,): (i64,) = sqlx::query_as("SELECT balance FROM accounts WHERE id = ?")
//!             .bind(1)
//!             .fetch_one(tx.as_executor())
//!             .await?;
//!
//!         Ok::<_, Error>(balance)
//!     })
//! }, options).await?;
//!
//! println!("Remaining balance: {}", balance);
//! # Ok(())
//! # }
//! ```
//!
//! ### Default Classifier
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sqlx::MySqlPool;
//! use sqlx_transaction_retry::{is_retryable, Error, RetryRegistry, TxExecutor, TxOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let pool = MySqlPool::connect("mysql://localhost/test").await?;
//! let registry = Arc::new(RetryRegistry::<Error>::new());
//! registry.set_default_check_retryable(is_retryable);
//! let executor = TxExecutor::with_registry(registry);
//!
//! // Inherits the registry classifier
//! executor.execute(&pool, |tx| {
//!     Box::pin(async move {
//!         sqlx::query("DELETE FROM sessions WHERE expires_at < NOW()")
//!             .execute(tx.as_executor())
//!             .await?;
//!         Ok(())
//!     })
//! }, TxOptions::new()).await?;
//!
//! // Opts out for this call only
//! executor.execute(&pool, |tx| {
//!     Box::pin(async move {
//!         sqlx::query("INSERT INTO audit_log (action) VALUES (?)")
//!             .bind("cleanup")
//!             .execute(tx.as_executor())
//!             .await?;
//!         Ok(())
//!     })
//! }, TxOptions::new().never_retry()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Manual Transaction Control
//!
//! For more control, use `TransactionContext` directly:
//!
//! ```rust,no_run
//! use sqlx::MySqlPool;
//! use sqlx_transaction_retry::TransactionContext;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let pool = MySqlPool::connect("mysql://localhost/test").await?;
//! let mut tx = TransactionContext::begin(&pool).await?;
//!
//! sqlx::query("INSERT INTO users (name) VALUES (?)")
//!     .bind("Eve")
//!     .execute(tx.as_executor())
//!     .await?;
//!
//! // Explicitly commit
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## How It Works
//!
//! 1. **Begin**: [`TxBeginner::begin_tx`] opens a transaction. If that fails the error is
//!    returned as is and nothing else happens
//! 2. **Run**: the closure receives `&mut` access to the open transaction
//! 3. **Finish**: `Ok` is committed; an error (including a failed commit) is rolled back
//! 4. **Retry**: if a classifier is set, accepts the error, and budget remains, the
//!    whole cycle starts again with a new transaction
//!
//! Rollback failures are swallowed: the caller always sees the error that caused the
//! rollback.
//!
//! ## Limitations
//!
//! - Only MySQL ships with a [`TxBeginner`] implementation
//! - A non-zero [`TxOptions::retry_delay`] sleeps with `tokio::time`, so the call must
//!   run inside a Tokio runtime (e.g. sqlx's `runtime-tokio`); on other runtimes keep
//!   the delay at zero
//! - MySQL has no `SNAPSHOT`, `WRITE COMMITTED` or `LINEARIZABLE` isolation; asking for
//!   them fails with [`Error::UnsupportedIsolation`]
//!
//! ## License
//!
//! Licensed under either of Apache License, Version 2.0 or MIT license at your option.

pub mod context;
pub mod error;
pub mod executor;
pub mod options;
pub mod registry;
pub mod source;

#[cfg(feature = "anyhow")]
pub mod anyhow_compat;

pub use context::TransactionContext;
pub use error::{is_retryable, Error, Result};
pub use executor::{execute, TxExecutor};
pub use options::{BeginOptions, CheckRetryable, IsolationLevel, TxOptions, DEFAULT_MAX_RETRY_TIMES};
pub use registry::RetryRegistry;
pub use source::{TxBeginner, TxHandle};

#[cfg(feature = "anyhow")]
pub use anyhow_compat::is_retryable_anyhow;

/// Convenience re-exports for common use cases
pub mod prelude {
    pub use crate::context::TransactionContext;
    pub use crate::error::{is_retryable, Error, Result};
    pub use crate::executor::{execute, TxExecutor};
    pub use crate::options::{IsolationLevel, TxOptions};
    pub use crate::registry::RetryRegistry;
    pub use crate::source::{TxBeginner, TxHandle};
}
