//! # sqlx-ambient-tx
//!
//! Ambient transaction boundaries for SQLx: run a unit of work inside a
//! transaction without threading the transaction through every function
//! signature.
//!
//! ## Features
//!
//! - **Ambient Propagation**: The open transaction travels in an immutable [`Scope`] value
//! - **Single Physical Transaction**: Nested boundaries join the outermost one instead of nesting
//! - **Automatic Commit/Rollback**: The outermost boundary commits on success and rolls back on error
//! - **Panic Safety**: A panicking body is rolled back and the original panic keeps unwinding
//! - **Pluggable Storage Layers**: Any driver, ORM or query builder can plug in through [`Adapter`]
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! sqlx = { version = "0.8", features = ["mysql", "runtime-tokio"] }
//! sqlx-ambient-tx = "0.1"
//! ```
//!
//! ## Examples
//!
//! ### Basic Transaction
//!
//! ```rust,no_run
//! use sqlx::MySqlPool;
//! use sqlx_ambient_tx::driver::SqlxSession;
//! use sqlx_ambient_tx::{Error, Scope};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = MySqlPool::connect("mysql://localhost/test").await?;
//! let db = SqlxSession::new(pool);
//!
//! db.run_in_transaction(Scope::new(), |scope| {
//!     let db = db.clone();
//!     async move {
//!         db.executor(&scope)
//!             .execute(sqlx::query("INSERT INTO users (name) VALUES (?)").bind("Alice"))
//!             .await?;
//!         Ok::<_, Error>(())
//!     }
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Composing Boundaries
//!
//! Functions that need a transaction open their own boundary. When they are
//! called from inside another boundary they join it, so the caller decides
//! what commits together:
//!
//! ```rust,no_run
//! use sqlx::MySqlPool;
//! use sqlx_ambient_tx::driver::SqlxSession;
//! use sqlx_ambient_tx::{Error, Scope};
//!
//! type Db = SqlxSession<sqlx::MySql>;
//!
//! async fn create_user(db: &Db, scope: Scope, name: &str) -> Result<u64, Error> {
//!     db.run_in_transaction(scope, |scope| async move {
//!         let result = db
//!             .executor(&scope)
//!             .execute(sqlx::query("INSERT INTO users (name) VALUES (?)").bind(name))
//!             .await?;
//!         Ok(result.last_insert_id())
//!     })
//!     .await
//! }
//!
//! async fn create_profile(db: &Db, scope: Scope, user_id: u64) -> Result<(), Error> {
//!     db.run_in_transaction(scope, |scope| async move {
//!         db.executor(&scope)
//!             .execute(sqlx::query("INSERT INTO profiles (user_id) VALUES (?)").bind(user_id))
//!             .await?;
//!         Ok(())
//!     })
//!     .await
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let pool = MySqlPool::connect("mysql://localhost/test").await?;
//! let db = SqlxSession::new(pool);
//!
//! // One BEGIN, one COMMIT: both inserts land together or not at all.
//! db.run_in_transaction(Scope::new(), |scope| {
//!     let db = db.clone();
//!     async move {
//!         let user_id = create_user(&db, scope.clone(), "Bob").await?;
//!         create_profile(&db, scope, user_id).await
//!     }
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Transaction Options
//!
//! Isolation level and read-only mode apply to the physical transaction, so
//! only the outermost boundary's options are used:
//!
//! ```rust,no_run
//! use sqlx::MySqlPool;
//! use sqlx_ambient_tx::driver::SqlxSession;
//! use sqlx_ambient_tx::{Error, IsolationLevel, Scope, TransactionOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let pool = MySqlPool::connect("mysql://localhost/test").await?;
//! let db = SqlxSession::new(pool);
//! let options = TransactionOptions::new()
//!     .isolation(IsolationLevel::RepeatableRead)
//!     .read_only();
//!
//! let names: Vec<(String,)> = db
//!     .run_in_transaction_with(Scope::new(), options, |scope| {
//!         let db = db.clone();
//!         async move {
//!             db.executor(&scope)
//!                 .fetch_all_as(sqlx::query_as("SELECT name FROM users"))
//!                 .await
//!         }
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! A failing body is rolled back and its error comes back wrapped in
//! [`Error::Aborted`]. Failures of the transaction itself are reported as
//! [`Error::Begin`], [`Error::Commit`] or [`Error::Rollback`], and
//! [`Error::phase`] tells them apart:
//!
//! ```rust,no_run
//! use sqlx::MySqlPool;
//! use sqlx_ambient_tx::driver::SqlxSession;
//! use sqlx_ambient_tx::{Error, Scope};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let pool = MySqlPool::connect("mysql://localhost/test").await?;
//! let db = SqlxSession::new(pool);
//!
//! let result = db
//!     .run_in_transaction(Scope::new(), |scope| {
//!         let db = db.clone();
//!         async move {
//!             db.executor(&scope)
//!                 .execute(sqlx::query("INSERT INTO users (name) VALUES (?)").bind("Frank"))
//!                 .await?;
//!
//!             // This will cause a rollback
//!             Err::<(), _>(Error::other("user rejected"))
//!         }
//!     })
//!     .await;
//!
//! let err = result.unwrap_err();
//! assert!(err.phase().is_none());
//! assert_eq!(err.original().unwrap().to_string(), "user rejected");
//! // The INSERT was rolled back, "Frank" is not in the database
//! # Ok(())
//! # }
//! ```
//!
//! ## How It Works
//!
//! 1. **Scope**: An immutable chain of values; the open transaction sits in a reserved slot
//! 2. **Session**: Begins a transaction only when the scope has none, and only then commits or rolls back
//! 3. **Resolver**: Turns a scope into an executor, bound to the ambient transaction if there is one
//! 4. **Adapter**: The seam a storage layer implements; [`driver`] is the bundled SQLx one
//!
//! ## Limitations
//!
//! - Nested boundaries never create savepoints; an error anywhere rolls back the whole chain
//! - Options passed to a nested boundary are ignored
//! - A boundary whose future is dropped mid-way leaves the rollback to the driver
//!
//! ## License
//!
//! Licensed under either of Apache License, Version 2.0 or MIT license at your option.

pub mod adapter;
pub mod coordinator;
pub mod driver;
pub mod error;
pub mod options;
pub mod resolver;
pub mod scope;

#[cfg(feature = "anyhow")]
mod anyhow_compat;

pub use adapter::{Adapter, TransactionHandle, TransactionStore};
pub use coordinator::Session;
pub use error::{BoundaryError, BoxError, Error, Phase, Result};
pub use options::{IsolationLevel, TransactionOptions};
pub use resolver::Resolver;
pub use scope::Scope;

/// Convenience re-exports for common use cases
pub mod prelude {
    pub use crate::adapter::{Adapter, TransactionHandle, TransactionStore};
    pub use crate::coordinator::Session;
    pub use crate::driver::SqlxSession;
    pub use crate::error::{BoundaryError, Error, Result};
    pub use crate::options::{IsolationLevel, TransactionOptions};
    pub use crate::resolver::Resolver;
    pub use crate::scope::Scope;
}
