use sqlx::MySqlPool;
use sqlx_ambient_tx::driver::SqlxSession;
use sqlx_ambient_tx::{Error, Scope};
use tracing_subscriber::EnvFilter;

type Db = SqlxSession<sqlx::MySql>;

/// Creates a user. Opens its own boundary, so it can run standalone or join
/// a caller's transaction.
async fn create_user(db: &Db, scope: Scope, name: &str, email: &str) -> Result<i64, Error> {
    db.run_in_transaction(scope, |scope| async move {
        let result = db
            .executor(&scope)
            .execute(
                sqlx::query("INSERT INTO users (name, email) VALUES (?, ?)")
                    .bind(name)
                    .bind(email),
            )
            .await?;
        Ok(result.last_insert_id() as i64)
    })
    .await
}

async fn record_audit(db: &Db, scope: Scope, user_id: i64, action: &str) -> Result<(), Error> {
    db.run_in_transaction(scope, |scope| async move {
        db.executor(&scope)
            .execute(
                sqlx::query("INSERT INTO audit_log (user_id, action) VALUES (?, ?)")
                    .bind(user_id)
                    .bind(action),
            )
            .await?;
        Ok(())
    })
    .await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Connect to database
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "mysql://localhost/test".to_string());
    let pool = MySqlPool::connect(&database_url).await?;
    let db = SqlxSession::new(pool.clone());

    println!("=== Nested Boundary Example ===\n");

    // Example 1: Standalone call opens and commits its own transaction
    println!("1. Standalone boundary...");
    let user_id = create_user(&db, Scope::new(), "David", "david@example.com").await?;
    println!("   ✓ Created user with ID {} in its own transaction\n", user_id);

    // Example 2: Nested boundaries join the outer transaction
    println!("2. Nested boundaries - both succeed...");
    db.run_in_transaction(Scope::new(), |scope| {
        let db = db.clone();
        async move {
            let user_id = create_user(&db, scope.clone(), "Eve", "eve@example.com").await?;
            println!("   Outer: Created user with ID {}", user_id);

            record_audit(&db, scope, user_id, "User created").await?;
            println!("   Nested: Created audit log");
            Ok::<_, Error>(())
        }
    })
    .await?;
    println!("   ✓ One transaction committed both rows\n");

    // Example 3: A failing nested boundary rolls back the whole chain
    println!("3. Nested boundary fails...");
    let result = db
        .run_in_transaction(Scope::new(), |scope| {
            let db = db.clone();
            async move {
                let user_id = create_user(&db, scope.clone(), "Frank", "frank@example.com").await?;
                println!("   Outer: Created user with ID {}", user_id);

                // This will fail
                db.run_in_transaction(scope, |scope| {
                    let db = db.clone();
                    async move {
                        db.executor(&scope)
                            .execute(sqlx::query("INSERT INTO non_existent_table VALUES (?)").bind(user_id))
                            .await?;
                        Ok::<_, Error>(())
                    }
                })
                .await
            }
        })
        .await;

    match result {
        Ok(_) => println!("   ✗ Should have failed!"),
        Err(e) => println!("   ✓ Whole chain rolled back, Frank was not created ({})\n", e),
    }

    println!("=== All nested boundary examples completed ===");

    pool.close().await;
    Ok(())
}
