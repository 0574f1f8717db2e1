//! Support for bodies that return `anyhow::Result<T>`.
//!
//! With the `anyhow` feature enabled, `anyhow::Error` implements
//! [`BoundaryError`], so a body may return `anyhow::Result<T>` directly:
//!
//! ```rust,no_run
//! use sqlx::MySqlPool;
//! use sqlx_ambient_tx::driver::SqlxSession;
//! use sqlx_ambient_tx::Scope;
//!
//! # async fn example() -> anyhow::Result<()> {
//! # let pool = MySqlPool::connect("mysql://localhost/test").await?;
//! let db = SqlxSession::new(pool);
//!
//! db.run_in_transaction(Scope::new(), |scope| {
//!     let db = db.clone();
//!     async move {
//!         db.executor(&scope)
//!             .execute(sqlx::query("INSERT INTO users (name) VALUES (?)").bind("Alice"))
//!             .await?;
//!         anyhow::Ok(())
//!     }
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```
//!
//! Transactional failures keep the same wording as [`Error`]: the context
//! names the phase and the store's error stays in the source chain. When a
//! rollback fails after the body failed, the rollback error is the source and
//! the body's error is rendered into the context message.

use crate::error::{BoundaryError, BoxError, Error};

impl BoundaryError for anyhow::Error {
    fn begin_failed(cause: BoxError) -> Self {
        anyhow::anyhow!(cause).context("failed to begin transaction")
    }

    fn commit_failed(cause: BoxError) -> Self {
        anyhow::anyhow!(cause).context("commit error")
    }

    fn aborted(self) -> Self {
        self.context("transaction failed")
    }

    fn rollback_failed(self, cause: BoxError) -> Self {
        anyhow::anyhow!(cause).context(format!("rollback error (original error: {self:#})"))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.into())
    }
}
