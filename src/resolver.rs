use crate::adapter::Adapter;
use crate::scope::Scope;

/// Resolves the executor a body should use for a given scope.
///
/// If the scope carries a handle of the adapter's handle type, the executor is
/// bound to it; otherwise the root executor is returned. A value of any other
/// type in the transaction slot counts as no handle at all.
///
/// `Resolver` holds nothing but the adapter, so it can be cloned freely and
/// used concurrently from independent call chains.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx::MySqlPool;
/// use sqlx_ambient_tx::driver::SqlxAdapter;
/// use sqlx_ambient_tx::{Resolver, Scope};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let pool = MySqlPool::connect("mysql://localhost/test").await?;
/// let resolver = Resolver::new(SqlxAdapter::new(pool));
///
/// // No boundary is open here, so this runs against the pool.
/// resolver
///     .resolve(&Scope::new())
///     .execute(sqlx::query("DELETE FROM sessions WHERE expired = 1"))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Resolver<A> {
    adapter: A,
}

impl<A: Adapter> Resolver<A> {
    pub fn new(adapter: A) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Returns the executor for `scope`.
    pub fn resolve(&self, scope: &Scope) -> A::Executor {
        match scope.handle::<A::Handle>() {
            Some(handle) => self.adapter.bind(scope, handle),
            None => self.adapter.root_executor(scope),
        }
    }
}
