use sqlx::MySqlPool;
use sqlx_ambient_tx::driver::SqlxSession;
use sqlx_ambient_tx::{Error, Scope};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // RUST_LOG=sqlx_ambient_tx=debug shows every begin/commit/rollback
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Connect to database
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "mysql://localhost/test".to_string());
    let pool = MySqlPool::connect(&database_url).await?;
    let db = SqlxSession::new(pool.clone());

    println!("=== Basic Transaction Example ===\n");

    // Example 1: Simple INSERT
    println!("1. Creating a user...");
    db.run_in_transaction(Scope::new(), |scope| {
        let db = db.clone();
        async move {
            db.executor(&scope)
                .execute(
                    sqlx::query("INSERT INTO users (name, email) VALUES (?, ?)")
                        .bind("Alice")
                        .bind("alice@example.com"),
                )
                .await?;
            Ok::<_, Error>(())
        }
    })
    .await?;
    println!("   ✓ User created successfully\n");

    // Example 2: Multiple operations in one transaction
    println!("2. Creating user with profile...");
    let user_id = db
        .run_in_transaction(Scope::new(), |scope| {
            let db = db.clone();
            async move {
                let result = db
                    .executor(&scope)
                    .execute(
                        sqlx::query("INSERT INTO users (name, email) VALUES (?, ?)")
                            .bind("Bob")
                            .bind("bob@example.com"),
                    )
                    .await?;

                let user_id = result.last_insert_id() as i64;

                // Same scope, same transaction
                db.executor(&scope)
                    .execute(
                        sqlx::query("INSERT INTO profiles (user_id, bio) VALUES (?, ?)")
                            .bind(user_id)
                            .bind("Software Developer"),
                    )
                    .await?;

                Ok::<_, Error>(user_id)
            }
        })
        .await?;
    println!("   ✓ User and profile created with ID: {}\n", user_id);

    // Example 3: Error causes rollback
    println!("3. Testing rollback on error...");
    let result = db
        .run_in_transaction(Scope::new(), |scope| {
            let db = db.clone();
            async move {
                db.executor(&scope)
                    .execute(
                        sqlx::query("INSERT INTO users (name, email) VALUES (?, ?)")
                            .bind("Charlie")
                            .bind("charlie@example.com"),
                    )
                    .await?;

                // This will fail and trigger rollback
                db.executor(&scope)
                    .execute(sqlx::query("INSERT INTO non_existent_table VALUES (1)"))
                    .await?;

                Ok::<_, Error>(())
            }
        })
        .await;

    match result {
        Ok(_) => println!("   ✗ Should have failed!"),
        Err(e) => println!("   ✓ Transaction rolled back: {}\n", e),
    }

    // Example 4: Reading outside any transaction
    println!("4. Counting users without a transaction...");
    let (count,): (i64,) = db
        .executor(&Scope::new())
        .fetch_one_as(sqlx::query_as("SELECT COUNT(*) FROM users"))
        .await?;
    println!("   ✓ {} users in the table\n", count);

    println!("=== All examples completed ===");

    pool.close().await;
    Ok(())
}
