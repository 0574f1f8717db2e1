use crate::adapter::TransactionHandle;
use sqlx::{Database, Transaction};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Shared handle to one open SQLx transaction.
///
/// This struct wraps SQLx's `Transaction` behind a mutex so that the boundary
/// that opened it and every executor bound to it can refer to the same
/// physical transaction. Clones are cheap and all observe the same state.
///
/// Once [`commit`](TransactionHandle::commit) or
/// [`rollback`](TransactionHandle::rollback) has run, the transaction is
/// consumed: further commits or rollbacks are no-ops and executors bound to
/// the handle fail with [`Error::AlreadyConsumed`](crate::Error::AlreadyConsumed).
///
/// # Safety
///
/// If the last clone is dropped while the transaction is still open, SQLx
/// rolls it back. This is what happens when a boundary's future is cancelled.
pub struct SqlxTransaction<DB: Database> {
    tx: Arc<Mutex<Option<Transaction<'static, DB>>>>,
}

impl<DB: Database> SqlxTransaction<DB> {
    pub(crate) fn new(tx: Transaction<'static, DB>) -> Self {
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Returns `true` until the transaction has been committed or rolled back.
    pub async fn is_active(&self) -> bool {
        self.tx.lock().await.is_some()
    }

    /// Locks the underlying transaction for the duration of one operation.
    ///
    /// The guard holds `None` once the transaction is consumed.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, Option<Transaction<'static, DB>>> {
        self.tx.lock().await
    }

    /// `true` if both handles refer to the same physical transaction.
    pub fn same_transaction(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.tx, &other.tx)
    }
}

impl<DB: Database> Clone for SqlxTransaction<DB> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<DB: Database> fmt::Debug for SqlxTransaction<DB> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlxTransaction")
            .field("database", &DB::NAME)
            .finish_non_exhaustive()
    }
}

impl<DB: Database> TransactionHandle for SqlxTransaction<DB> {
    type Error = sqlx::Error;

    async fn commit(&self) -> Result<(), sqlx::Error> {
        let tx = self.tx.lock().await.take();
        if let Some(tx) = tx {
            tx.commit().await?;
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), sqlx::Error> {
        let tx = self.tx.lock().await.take();
        if let Some(tx) = tx {
            tx.rollback().await?;
        }
        Ok(())
    }
}
