use crate::error::Error;
use crate::options::{BeginOptions, IsolationLevel};
use crate::source::{TxBeginner, TxHandle};
use futures::future::BoxFuture;
use sqlx::pool::PoolConnection;
use sqlx::{Executor, MySql, MySqlConnection, MySqlPool};
use std::fmt;

/// Transaction context wrapper providing type-safe transaction boundaries.
///
/// The context owns a pooled connection on which a transaction has been started.
/// It is finished by [`commit`](Self::commit) or [`rollback`](Self::rollback).
///
/// # Safety
///
/// If this struct is dropped while the transaction is still open, the connection is
/// detached from the pool and closed, and the server discards the transaction. An
/// unfinished transaction can never leak back into the pool.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx::MySqlPool;
/// use sqlx_transaction_retry::TransactionContext;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let pool = MySqlPool::connect("mysql://localhost/test").await?;
/// let mut tx = TransactionContext::begin(&pool).await?;
///
/// // Perform database operations using tx.as_executor()
/// // sqlx::query("INSERT INTO ...").execute(tx.as_executor()).await?;
///
/// // Explicitly commit the transaction
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```
pub struct TransactionContext {
    conn: Option<PoolConnection<MySql>>,
}

impl TransactionContext {
    /// Begins a new transaction from the connection pool with server defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or transaction cannot be started.
    pub async fn begin(pool: &MySqlPool) -> crate::Result<Self> {
        Self::begin_with(pool, BeginOptions::default()).await
    }

    /// Begins a new transaction with an explicit isolation level and access mode.
    ///
    /// The isolation level only applies to this transaction; the session default of
    /// the pooled connection is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedIsolation`] for levels MySQL does not implement,
    /// before any connection is acquired.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use sqlx::MySqlPool;
    /// use sqlx_transaction_retry::{BeginOptions, IsolationLevel, TransactionContext};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let pool = MySqlPool::connect("mysql://localhost/test").await?;
    /// let options = BeginOptions {
    ///     isolation: IsolationLevel::Serializable,
    ///     read_only: true,
    /// };
    /// let mut tx = TransactionContext::begin_with(&pool, options).await?;
    /// let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
    ///     .fetch_one(tx.as_executor())
    ///     .await?;
    /// tx.commit().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn begin_with(pool: &MySqlPool, options: BeginOptions) -> crate::Result<Self> {
        let statements = begin_statements(options)?;

        // Owned by the context before the first statement runs, so an error or a
        // dropped future detaches the connection instead of pooling it.
        let mut ctx = Self {
            conn: Some(pool.acquire().await?),
        };
        for statement in &statements {
            ctx.as_executor().execute(statement.as_str()).await?;
        }

        tracing::debug!(isolation = %options.isolation, read_only = options.read_only, "transaction started");
        Ok(ctx)
    }

    /// Commits the transaction.
    ///
    /// On success the connection goes back to the pool. If the commit fails the
    /// transaction stays open so it can still be rolled back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyConsumed`] if the transaction was already finished, or
    /// the database error if the commit operation fails.
    pub async fn commit(&mut self) -> crate::Result<()> {
        self.finish("COMMIT").await
    }

    /// Explicitly rolls back the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback operation fails. The connection is closed in
    /// that case.
    pub async fn rollback(&mut self) -> crate::Result<()> {
        let result = self.finish("ROLLBACK").await;
        if result.is_err() {
            self.discard();
        }
        result
    }

    /// Returns `true` until the transaction is committed or rolled back.
    pub fn is_active(&self) -> bool {
        self.conn.is_some()
    }

    /// Returns a mutable reference to the underlying connection for use as an Executor.
    ///
    /// This method provides access to `&mut MySqlConnection`, which implements SQLx's
    /// `Executor` trait.
    ///
    /// # Panics
    ///
    /// Panics if the transaction has already been consumed (committed or rolled back).
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use sqlx::MySqlPool;
    /// use sqlx_transaction_retry::TransactionContext;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let pool = MySqlPool::connect("mysql://localhost/test").await?;
    /// let mut tx = TransactionContext::begin(&pool).await?;
    ///
    /// sqlx::query("INSERT INTO users (name) VALUES (?)")
    ///     .bind("Alice")
    ///     .execute(tx.as_executor())
    ///     .await?;
    ///
    /// tx.commit().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn as_executor(&mut self) -> &mut MySqlConnection {
        connection(
            self.conn
                .as_mut()
                .expect("Transaction has already been consumed"),
        )
    }

    async fn finish(&mut self, statement: &'static str) -> crate::Result<()> {
        let conn = self.conn.as_mut().ok_or(Error::AlreadyConsumed)?;
        connection(conn).execute(statement).await?;
        // Dropping the pooled connection returns it to the pool.
        self.conn = None;
        Ok(())
    }

    fn discard(&mut self) {
        if let Some(conn) = self.conn.take() {
            drop(conn.detach());
        }
    }
}

impl fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionContext")
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for TransactionContext {
    /// Closes the connection of a transaction that was never finished; the server
    /// rolls it back when the session ends.
    fn drop(&mut self) {
        self.discard();
    }
}

impl TxBeginner for MySqlPool {
    type Tx = TransactionContext;
    type Error = Error;

    fn begin_tx(&self, options: BeginOptions) -> BoxFuture<'_, crate::Result<TransactionContext>> {
        Box::pin(TransactionContext::begin_with(self, options))
    }
}

impl TxHandle for TransactionContext {
    type Error = Error;

    fn commit(&mut self) -> BoxFuture<'_, crate::Result<()>> {
        Box::pin(TransactionContext::commit(self))
    }

    fn rollback(&mut self) -> BoxFuture<'_, crate::Result<()>> {
        Box::pin(TransactionContext::rollback(self))
    }
}

fn connection(conn: &mut PoolConnection<MySql>) -> &mut MySqlConnection {
    conn
}

/// Statement that sets the isolation level of the next transaction only.
fn isolation_statement(level: IsolationLevel) -> crate::Result<Option<String>> {
    match level {
        IsolationLevel::Default => Ok(None),
        IsolationLevel::ReadUncommitted
        | IsolationLevel::ReadCommitted
        | IsolationLevel::RepeatableRead
        | IsolationLevel::Serializable => Ok(level
            .as_sql()
            .map(|sql| format!("SET TRANSACTION ISOLATION LEVEL {sql}"))),
        IsolationLevel::WriteCommitted | IsolationLevel::Snapshot | IsolationLevel::Linearizable => {
            Err(Error::UnsupportedIsolation(level))
        }
    }
}

/// Statements run, in order, on a freshly acquired connection to open a transaction.
fn begin_statements(options: BeginOptions) -> crate::Result<Vec<String>> {
    let mut statements = Vec::with_capacity(2);
    if let Some(set_isolation) = isolation_statement(options.isolation)? {
        statements.push(set_isolation);
    }
    statements.push(start_statement(options.read_only).to_string());
    Ok(statements)
}

fn start_statement(read_only: bool) -> &'static str {
    if read_only {
        "START TRANSACTION READ ONLY"
    } else {
        "START TRANSACTION"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_statement_for_supported_levels() {
        assert_eq!(isolation_statement(IsolationLevel::Default).unwrap(), None);
        assert_eq!(
            isolation_statement(IsolationLevel::ReadCommitted).unwrap().as_deref(),
            Some("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
        );
        assert_eq!(
            isolation_statement(IsolationLevel::Serializable).unwrap().as_deref(),
            Some("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        );
    }

    #[test]
    fn test_isolation_statement_rejects_unsupported_levels() {
        for level in [
            IsolationLevel::WriteCommitted,
            IsolationLevel::Snapshot,
            IsolationLevel::Linearizable,
        ] {
            assert!(matches!(
                isolation_statement(level),
                Err(Error::UnsupportedIsolation(l)) if l == level
            ));
        }
    }

    #[test]
    fn test_begin_statements_set_isolation_before_start() {
        let statements = begin_statements(BeginOptions {
            isolation: IsolationLevel::RepeatableRead,
            read_only: true,
        })
        .unwrap();
        assert_eq!(
            statements,
            vec![
                "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ".to_string(),
                "START TRANSACTION READ ONLY".to_string(),
            ]
        );

        assert_eq!(
            begin_statements(BeginOptions::default()).unwrap(),
            vec!["START TRANSACTION".to_string()]
        );
    }

    #[test]
    fn test_begin_statements_reject_unsupported_isolation() {
        let result = begin_statements(BeginOptions {
            isolation: IsolationLevel::Snapshot,
            read_only: false,
        });
        assert!(matches!(result, Err(Error::UnsupportedIsolation(IsolationLevel::Snapshot))));
    }

    /// Requires a MySQL server at `DATABASE_URL`.
    #[tokio::test]
    #[ignore]
    async fn test_abandoned_begin_does_not_pool_open_transaction() {
        dotenvy::dotenv().ok();
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "mysql://localhost/test".to_string());
        let pool = sqlx::mysql::MySqlPoolOptions::new()
            .max_connections(1)
            .connect(&database_url)
            .await
            .unwrap();

        let ctx = TransactionContext::begin_with(
            &pool,
            BeginOptions {
                isolation: IsolationLevel::Serializable,
                read_only: false,
            },
        )
        .await
        .unwrap();
        drop(ctx);

        // Cancel a begin at its first await point.
        let cancelled = tokio::time::timeout(
            std::time::Duration::ZERO,
            TransactionContext::begin(&pool),
        )
        .await;
        drop(cancelled);

        let mut conn = pool.acquire().await.unwrap();
        let (in_transaction,): (i64,) = sqlx::query_as("SELECT @@in_transaction")
            .fetch_one(connection(&mut conn))
            .await
            .unwrap();
        assert_eq!(in_transaction, 0);

        pool.close().await;
    }

    #[test]
    fn test_start_statement() {
        assert_eq!(start_statement(false), "START TRANSACTION");
        assert_eq!(start_statement(true), "START TRANSACTION READ ONLY");
    }
}
