use crate::error::{is_retryable_sqlx, Error};

/// Retry classifier for units of work that return `anyhow::Result<T>`.
///
/// Walks the error chain and reports `true` when it contains a retryable
/// [`Error`] or `sqlx::Error` (deadlock, lock wait timeout, serialization failure).
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx::MySqlPool;
/// use sqlx_transaction_retry::{execute, is_retryable_anyhow, TxOptions};
///
/// # async fn example() -> anyhow::Result<()> {
/// # let pool = MySqlPool::connect("mysql://localhost/test").await?;
/// execute(&pool, |tx| {
///     Box::pin(async move {
///         sqlx::query("UPDATE counters SET value = value + 1 WHERE id = ?")
///             .bind(1)
///             .execute(tx.as_executor())
///             .await?;
///         Ok(())
///     })
/// }, TxOptions::new().check_retryable(is_retryable_anyhow)).await?;
/// # Ok(())
/// # }
/// ```
pub fn is_retryable_anyhow(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(err) = cause.downcast_ref::<Error>() {
            err.is_retryable()
        } else if let Some(err) = cause.downcast_ref::<sqlx::Error>() {
            is_retryable_sqlx(err)
        } else {
            false
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_errors_are_not_retryable() {
        assert!(!is_retryable_anyhow(&anyhow::anyhow!("validation failed")));
        assert!(!is_retryable_anyhow(&anyhow::Error::from(Error::AlreadyConsumed)));
        assert!(!is_retryable_anyhow(
            &anyhow::Error::from(sqlx::Error::RowNotFound).context("loading account")
        ));
    }
}
