use super::dialect::TransactionDialect;
use super::executor::{SqlxAdapter, SqlxExecutor};
use super::store::SqlxStore;
use crate::coordinator::Session;
use crate::error::BoundaryError;
use crate::options::TransactionOptions;
use crate::resolver::Resolver;
use crate::scope::Scope;
use sqlx::Pool;
use std::future::Future;

/// A [`Session`] and a [`Resolver`] wired to the same SQLx pool.
///
/// This is the usual entry point for application code talking to a single
/// database: open boundaries with
/// [`run_in_transaction`](SqlxSession::run_in_transaction) and obtain the
/// executor for the current scope with [`executor`](SqlxSession::executor).
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx::MySqlPool;
/// use sqlx_ambient_tx::driver::SqlxSession;
/// use sqlx_ambient_tx::{Error, Scope};
///
/// async fn create_user(db: &SqlxSession<sqlx::MySql>, scope: Scope, name: &str) -> Result<(), Error> {
///     db.executor(&scope)
///         .execute(sqlx::query("INSERT INTO users (name) VALUES (?)").bind(name))
///         .await?;
///     Ok(())
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let pool = MySqlPool::connect("mysql://localhost/test").await?;
/// let db = SqlxSession::new(pool);
///
/// db.run_in_transaction(Scope::new(), |scope| {
///     let db = db.clone();
///     async move {
///         create_user(&db, scope.clone(), "Alice").await?;
///         create_user(&db, scope, "Bob").await?;
///         Ok::<_, Error>(())
///     }
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SqlxSession<DB: TransactionDialect> {
    session: Session<SqlxStore<DB>>,
    resolver: Resolver<SqlxAdapter<DB>>,
}

impl<DB: TransactionDialect> SqlxSession<DB> {
    pub fn new(pool: Pool<DB>) -> Self {
        Self {
            session: Session::new(SqlxStore::new(pool.clone())),
            resolver: Resolver::new(SqlxAdapter::new(pool)),
        }
    }

    pub fn pool(&self) -> &Pool<DB> {
        self.session.store().pool()
    }

    pub fn session(&self) -> &Session<SqlxStore<DB>> {
        &self.session
    }

    pub fn resolver(&self) -> &Resolver<SqlxAdapter<DB>> {
        &self.resolver
    }

    /// Returns the executor for `scope`: bound to the ambient transaction if
    /// there is one, running against the pool otherwise.
    pub fn executor(&self, scope: &Scope) -> SqlxExecutor<DB> {
        self.resolver.resolve(scope)
    }

    /// See [`Session::run_in_transaction`].
    pub async fn run_in_transaction<F, Fut, T, E>(&self, scope: Scope, body: F) -> Result<T, E>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: BoundaryError,
    {
        self.session.run_in_transaction(scope, body).await
    }

    /// See [`Session::run_in_transaction_with`].
    pub async fn run_in_transaction_with<F, Fut, T, E>(
        &self,
        scope: Scope,
        options: TransactionOptions,
        body: F,
    ) -> Result<T, E>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: BoundaryError,
    {
        self.session
            .run_in_transaction_with(scope, options, body)
            .await
    }
}

impl<DB: TransactionDialect> Clone for SqlxSession<DB> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            resolver: self.resolver.clone(),
        }
    }
}
