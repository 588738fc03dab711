use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use sqlx::MySqlPool;
use sqlx_transaction_retry::{execute, is_retryable, Error, IsolationLevel, TxExecutor, TxOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Connect to database
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "mysql://localhost/test".to_string());
    let pool = MySqlPool::connect(&database_url).await?;

    println!("=== Transaction Retry Example ===\n");

    // Example 1: Simple INSERT, committed on success
    println!("1. Creating a user...");
    execute(&pool, |tx| {
        Box::pin(async move {
            sqlx::query("INSERT INTO users (name, email) VALUES (?, ?)")
                .bind("Alice")
                .bind("alice@example.com")
                .execute(tx.as_executor())
                .await?;
            Ok::<_, Error>(())
        })
    }, TxOptions::new())
    .await?;
    println!("   ✓ User created successfully\n");

    // Example 2: Error handling and automatic rollback
    println!("2. Testing automatic rollback on error...");
    let result = execute(&pool, |tx| {
        Box::pin(async move {
            sqlx::query("INSERT INTO users (name, email) VALUES (?, ?)")
                .bind("Charlie")
                .bind("charlie@example.com")
                .execute(tx.as_executor())
                .await?;

            // This will cause an error
            sqlx::query("SELECT * FROM non_existent_table")
                .execute(tx.as_executor())
                .await?;

            Ok::<_, Error>(())
        })
    }, TxOptions::new())
    .await;

    match result {
        Ok(_) => println!("   ✗ Should have failed!"),
        Err(e) => println!("   ✓ Transaction rolled back: {}\n", e),
    }

    // Example 3: Retrying deadlocks with the shared default classifier
    println!("3. Transferring funds with deadlock retries...");
    let executor = TxExecutor::<Error>::new();
    executor.registry().set_default_check_retryable(is_retryable);

    let attempts = AtomicU32::new(0);
    executor
        .execute(&pool, |tx| {
            attempts.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                sqlx::query("UPDATE accounts SET balance = balance - ? WHERE id = ?")
                    .bind(100)
                    .bind(1)
                    .execute(tx.as_executor())
                    .await?;
                sqlx::query("UPDATE accounts SET balance = balance + ? WHERE id = ?")
                    .bind(100)
                    .bind(2)
                    .execute(tx.as_executor())
                    .await?;
                Ok(())
            })
        }, TxOptions::new()
            .isolation(IsolationLevel::Serializable)
            .max_retry_times(5)
            .retry_delay(Duration::from_millis(50)))
        .await?;
    println!("   ✓ Transfer committed after {} attempt(s)\n", attempts.load(Ordering::SeqCst));

    // Example 4: Returning values from a read-only transaction
    println!("4. Returning values from transaction...");
    let (user_count, account_count): (i64, i64) = execute(&pool, |tx| {
        Box::pin(async move {
            let users: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
                .fetch_one(tx.as_executor())
                .await?;

            let accounts: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts")
                .fetch_one(tx.as_executor())
                .await?;

            Ok::<_, Error>((users.0, accounts.0))
        })
    }, TxOptions::new().read_only(true))
    .await?;
    println!("   Users: {}, Accounts: {}\n", user_count, account_count);

    println!("=== All examples completed successfully ===");

    pool.close().await;
    Ok(())
}
