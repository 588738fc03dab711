use crate::options::{RetryConfig, TxOptions};
use crate::registry::RetryRegistry;
use crate::source::{TxBeginner, TxHandle};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Executes a function within a database transaction, retrying classified failures.
///
/// This function handles the transaction lifecycle automatically:
/// - Begins a transaction
/// - Executes the provided function
/// - Commits on success
/// - Rolls back on error, then either retries in a new transaction or returns the error
///
/// An attempt is retried only when `options` carries a classifier, that classifier
/// accepts the error and fewer than `max_retry_times` retries have happened. This
/// function has no default classifier; use [`TxExecutor`] to inherit one from a
/// [`RetryRegistry`].
///
/// # Type Parameters
///
/// * `S` - The transaction source, e.g. `MySqlPool`
/// * `F` - A function that takes the open transaction and returns a pinned future.
///   It is called once per attempt.
/// * `T` - The return type of the function
/// * `E` - The error type of the function. Begin and commit errors of the source
///   are converted into it with `From`.
///
/// # Errors
///
/// - A failure to begin is returned immediately, without calling `f`.
/// - Otherwise the error of the last attempt is returned. A failed rollback never
///   replaces it.
///
/// # Panics
///
/// If `f` panics, the transaction is rolled back and the panic is resumed with its
/// original payload. Panics are never retried.
///
/// # Cancellation
///
/// Dropping the returned future cancels the call, including while it waits for the
/// retry delay. A transaction that is open at that moment is dropped with it.
///
/// # Examples
///
/// ```rust,no_run
/// use std::time::Duration;
/// use sqlx::MySqlPool;
/// use sqlx_transaction_retry::{execute, Error, TxOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let pool = MySqlPool::connect("mysql://localhost/test").await?;
/// let options = TxOptions::new()
///     .max_retry_times(5)
///     .retry_delay(Duration::from_millis(20))
///     .check_retryable(Error::is_retryable);
///
/// execute(&pool, |tx| {
///     Box::pin(async move {
///         sqlx::query("UPDATE accounts SET balance = balance - ? WHERE id = ?")
///             .bind(100)
///             .bind(1)
///             .execute(tx.as_executor())
///             .await?;
///         Ok::<_, Error>(())
///     })
/// }, options).await?;
/// # Ok(())
/// # }
/// ```
pub async fn execute<S, F, T, E>(source: &S, f: F, options: TxOptions<E>) -> Result<T, E>
where
    S: TxBeginner,
    F: for<'t> FnMut(&'t mut S::Tx) -> BoxFuture<'t, Result<T, E>>,
    E: From<S::Error>,
{
    run(source, f, options.resolve(None)).await
}

/// Transaction runner bound to a [`RetryRegistry`].
///
/// Calls that leave the classifier unset in their [`TxOptions`] use the registry's
/// default classifier, read once at the start of the call.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx::MySqlPool;
/// use sqlx_transaction_retry::{is_retryable, Error, TxExecutor, TxOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let pool = MySqlPool::connect("mysql://localhost/test").await?;
/// let executor = TxExecutor::<Error>::new();
/// executor.registry().set_default_check_retryable(is_retryable);
///
/// executor.execute(&pool, |tx| {
///     Box::pin(async move {
///         sqlx::query("INSERT INTO users (name) VALUES (?)")
///             .bind("Alice")
///             .execute(tx.as_executor())
///             .await?;
///         Ok(())
///     })
/// }, TxOptions::new()).await?;
/// # Ok(())
/// # }
/// ```
pub struct TxExecutor<E> {
    registry: Arc<RetryRegistry<E>>,
}

impl<E> TxExecutor<E> {
    /// Creates an executor with its own, initially empty, registry.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(RetryRegistry::new()))
    }

    pub fn with_registry(registry: Arc<RetryRegistry<E>>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<RetryRegistry<E>> {
        &self.registry
    }

    /// Same as [`execute`], falling back to the registry's default classifier.
    pub async fn execute<S, F, T>(&self, source: &S, f: F, options: TxOptions<E>) -> Result<T, E>
    where
        S: TxBeginner,
        F: for<'t> FnMut(&'t mut S::Tx) -> BoxFuture<'t, Result<T, E>>,
        E: From<S::Error>,
    {
        let config = options.resolve(self.registry.default_check_retryable());
        run(source, f, config).await
    }
}

impl<E> Default for TxExecutor<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for TxExecutor<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E> fmt::Debug for TxExecutor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxExecutor")
            .field("registry", &self.registry)
            .finish()
    }
}

async fn run<S, F, T, E>(source: &S, mut f: F, config: RetryConfig<E>) -> Result<T, E>
where
    S: TxBeginner,
    F: for<'t> FnMut(&'t mut S::Tx) -> BoxFuture<'t, Result<T, E>>,
    E: From<S::Error>,
{
    let mut retries = 0;

    loop {
        let mut tx = source.begin_tx(config.begin).await?;

        let outcome = AssertUnwindSafe(async { f(&mut tx).await })
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                let _ = tx.rollback().await;
                panic::resume_unwind(payload);
            }
        };

        let err = match result {
            Ok(value) => match tx.commit().await {
                Ok(()) => {
                    tracing::debug!(attempt = retries + 1, "transaction committed");
                    return Ok(value);
                }
                Err(err) => E::from(err),
            },
            Err(err) => err,
        };

        // The original error wins over whatever the rollback reports.
        let _ = tx.rollback().await;
        drop(tx);

        if !config.should_retry(retries, &err) {
            return Err(err);
        }

        retries += 1;
        tracing::debug!(
            retry = retries,
            max_retry_times = config.max_retry_times,
            delay = ?config.retry_delay,
            "retrying transaction"
        );
        if !config.retry_delay.is_zero() {
            tokio::time::sleep(config.retry_delay).await;
        }
    }
}
