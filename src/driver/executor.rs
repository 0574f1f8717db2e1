use super::transaction::SqlxTransaction;
use crate::adapter::Adapter;
use crate::error::{Error, Result};
use crate::scope::Scope;
use sqlx::query::{Query, QueryAs};
use sqlx::{Database, FromRow, IntoArguments, Pool};
use std::fmt;

/// Query executor handed out by [`SqlxAdapter`].
///
/// `Root` runs every query on a fresh pool connection, outside any
/// transaction. `Bound` runs every query on the connection of one open
/// transaction; once that transaction has been committed or rolled back the
/// executor fails with [`Error::AlreadyConsumed`].
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx_ambient_tx::driver::SqlxExecutor;
///
/// async fn rename(executor: &SqlxExecutor<sqlx::MySql>, id: i64, name: &str) -> sqlx_ambient_tx::Result<()> {
///     executor
///         .execute(sqlx::query("UPDATE users SET name = ? WHERE id = ?").bind(name).bind(id))
///         .await?;
///     Ok(())
/// }
/// ```
pub enum SqlxExecutor<DB: Database> {
    Root(Pool<DB>),
    Bound(SqlxTransaction<DB>),
}

impl<DB: Database> SqlxExecutor<DB> {
    /// `true` if queries go through an open transaction.
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound(_))
    }

    /// The transaction this executor is bound to, if any.
    pub fn transaction(&self) -> Option<&SqlxTransaction<DB>> {
        match self {
            Self::Root(_) => None,
            Self::Bound(tx) => Some(tx),
        }
    }
}

impl<DB> SqlxExecutor<DB>
where
    DB: Database,
    for<'c> &'c mut DB::Connection: sqlx::Executor<'c, Database = DB>,
{
    /// Executes the query and returns the number of rows affected, among
    /// other backend-specific details.
    pub async fn execute<'q, A>(&self, query: Query<'q, DB, A>) -> Result<DB::QueryResult>
    where
        A: 'q + Send + IntoArguments<'q, DB>,
    {
        match self {
            Self::Root(pool) => Ok(query.execute(pool).await?),
            Self::Bound(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or(Error::AlreadyConsumed)?;
                Ok(query.execute(&mut **conn).await?)
            }
        }
    }

    pub async fn fetch_one<'q, A>(&self, query: Query<'q, DB, A>) -> Result<DB::Row>
    where
        A: 'q + Send + IntoArguments<'q, DB>,
    {
        match self {
            Self::Root(pool) => Ok(query.fetch_one(pool).await?),
            Self::Bound(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or(Error::AlreadyConsumed)?;
                Ok(query.fetch_one(&mut **conn).await?)
            }
        }
    }

    pub async fn fetch_optional<'q, A>(&self, query: Query<'q, DB, A>) -> Result<Option<DB::Row>>
    where
        A: 'q + Send + IntoArguments<'q, DB>,
    {
        match self {
            Self::Root(pool) => Ok(query.fetch_optional(pool).await?),
            Self::Bound(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or(Error::AlreadyConsumed)?;
                Ok(query.fetch_optional(&mut **conn).await?)
            }
        }
    }

    pub async fn fetch_all<'q, A>(&self, query: Query<'q, DB, A>) -> Result<Vec<DB::Row>>
    where
        A: 'q + Send + IntoArguments<'q, DB>,
    {
        match self {
            Self::Root(pool) => Ok(query.fetch_all(pool).await?),
            Self::Bound(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or(Error::AlreadyConsumed)?;
                Ok(query.fetch_all(&mut **conn).await?)
            }
        }
    }

    pub async fn fetch_one_as<'q, O, A>(&self, query: QueryAs<'q, DB, O, A>) -> Result<O>
    where
        O: Send + Unpin + for<'r> FromRow<'r, DB::Row>,
        A: 'q + Send + IntoArguments<'q, DB>,
    {
        match self {
            Self::Root(pool) => Ok(query.fetch_one(pool).await?),
            Self::Bound(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or(Error::AlreadyConsumed)?;
                Ok(query.fetch_one(&mut **conn).await?)
            }
        }
    }

    pub async fn fetch_optional_as<'q, O, A>(&self, query: QueryAs<'q, DB, O, A>) -> Result<Option<O>>
    where
        O: Send + Unpin + for<'r> FromRow<'r, DB::Row>,
        A: 'q + Send + IntoArguments<'q, DB>,
    {
        match self {
            Self::Root(pool) => Ok(query.fetch_optional(pool).await?),
            Self::Bound(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or(Error::AlreadyConsumed)?;
                Ok(query.fetch_optional(&mut **conn).await?)
            }
        }
    }

    pub async fn fetch_all_as<'q, O, A>(&self, query: QueryAs<'q, DB, O, A>) -> Result<Vec<O>>
    where
        O: Send + Unpin + for<'r> FromRow<'r, DB::Row>,
        A: 'q + Send + IntoArguments<'q, DB>,
    {
        match self {
            Self::Root(pool) => Ok(query.fetch_all(pool).await?),
            Self::Bound(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or(Error::AlreadyConsumed)?;
                Ok(query.fetch_all(&mut **conn).await?)
            }
        }
    }
}

impl<DB: Database> Clone for SqlxExecutor<DB> {
    fn clone(&self) -> Self {
        match self {
            Self::Root(pool) => Self::Root(pool.clone()),
            Self::Bound(tx) => Self::Bound(tx.clone()),
        }
    }
}

impl<DB: Database> fmt::Debug for SqlxExecutor<DB> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root(pool) => f.debug_tuple("Root").field(pool).finish(),
            Self::Bound(tx) => f.debug_tuple("Bound").field(tx).finish(),
        }
    }
}

/// [`Adapter`] producing [`SqlxExecutor`]s for one pool.
#[derive(Debug)]
pub struct SqlxAdapter<DB: Database> {
    pool: Pool<DB>,
}

impl<DB: Database> SqlxAdapter<DB> {
    pub fn new(pool: Pool<DB>) -> Self {
        Self { pool }
    }
}

impl<DB: Database> Clone for SqlxAdapter<DB> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<DB: Database> Adapter for SqlxAdapter<DB> {
    type Handle = SqlxTransaction<DB>;
    type Executor = SqlxExecutor<DB>;

    fn root_executor(&self, _scope: &Scope) -> SqlxExecutor<DB> {
        SqlxExecutor::Root(self.pool.clone())
    }

    fn bind(&self, _scope: &Scope, handle: &SqlxTransaction<DB>) -> SqlxExecutor<DB> {
        SqlxExecutor::Bound(handle.clone())
    }
}
