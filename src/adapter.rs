//! The seam every storage binding implements to plug into [`Session`] and
//! [`Resolver`].
//!
//! A binding supplies three things:
//!
//! - a [`TransactionStore`] that opens physical transactions,
//! - the [`TransactionHandle`] it hands out, which commits or rolls back,
//! - an [`Adapter`] that turns "no handle" or "this handle" into a typed
//!   query executor.
//!
//! Connection pools, statement caching and row mapping all live behind these
//! traits. See [`crate::driver`] for the bundled SQLx binding.
//!
//! [`Session`]: crate::Session
//! [`Resolver`]: crate::Resolver

use crate::options::TransactionOptions;
use crate::scope::Scope;
use std::future::Future;

/// One open physical transaction.
///
/// Handles are shared: the boundary that opened the transaction keeps one
/// clone and the [`Scope`] handed to the body carries another. Exactly one of
/// [`commit`](TransactionHandle::commit) or
/// [`rollback`](TransactionHandle::rollback) is called by the owning
/// boundary; implementations should treat any later call as a no-op.
pub trait TransactionHandle: Clone + Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn commit(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn rollback(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// A store able to open physical transactions.
pub trait TransactionStore: Send + Sync {
    type Handle: TransactionHandle;
    type Error: std::error::Error + Send + Sync + 'static;

    fn begin(
        &self,
        options: &TransactionOptions,
    ) -> impl Future<Output = Result<Self::Handle, Self::Error>> + Send;
}

/// Maps the ambient transaction state of a scope to a query executor.
///
/// `Executor` is whatever the storage layer issues queries through: a pool
/// reference for a raw driver, a session object for an ORM, a builder for a
/// query DSL. The adapter is built once at wiring time and shared.
pub trait Adapter: Send + Sync {
    type Handle: Send + Sync + 'static;
    type Executor;

    /// Executor running against the root connection, outside any transaction.
    fn root_executor(&self, scope: &Scope) -> Self::Executor;

    /// Executor issuing every operation against `handle`.
    fn bind(&self, scope: &Scope, handle: &Self::Handle) -> Self::Executor;
}
