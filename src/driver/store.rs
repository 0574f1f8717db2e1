use super::dialect::TransactionDialect;
use super::transaction::SqlxTransaction;
use crate::adapter::TransactionStore;
use crate::error::{Error, Result};
use crate::options::TransactionOptions;
use sqlx::Pool;

/// [`TransactionStore`] backed by a SQLx connection pool.
///
/// Each call to `begin` checks a connection out of the pool and starts a
/// transaction on it; the connection goes back to the pool once the
/// transaction is committed or rolled back.
#[derive(Debug)]
pub struct SqlxStore<DB: sqlx::Database> {
    pool: Pool<DB>,
}

impl<DB: sqlx::Database> SqlxStore<DB> {
    pub fn new(pool: Pool<DB>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<DB> {
        &self.pool
    }
}

impl<DB: sqlx::Database> Clone for SqlxStore<DB> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<DB: TransactionDialect> TransactionStore for SqlxStore<DB> {
    type Handle = SqlxTransaction<DB>;
    type Error = Error;

    /// Begins a new transaction from the connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails, the transaction
    /// cannot be started, or the dialect cannot express `options`.
    async fn begin(&self, options: &TransactionOptions) -> Result<SqlxTransaction<DB>> {
        let tx = match DB::begin_statement(options)? {
            Some(statement) => self.pool.begin_with(statement).await?,
            None => self.pool.begin().await?,
        };
        Ok(SqlxTransaction::new(tx))
    }
}
