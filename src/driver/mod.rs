//! Bundled binding for SQLx connection pools.
//!
//! [`SqlxStore`] opens transactions, [`SqlxTransaction`] is the handle carried
//! in the [`Scope`](crate::Scope), and [`SqlxAdapter`] resolves a scope to a
//! [`SqlxExecutor`] that runs queries either on the pool or inside the ambient
//! transaction. [`SqlxSession`] wires all of it to one pool.
//!
//! Transaction options are translated per backend by [`TransactionDialect`],
//! which is implemented for MySQL (`mysql` feature), PostgreSQL (`postgres`)
//! and SQLite (`sqlite`).

mod dialect;
mod executor;
mod session;
mod store;
mod transaction;

pub use dialect::TransactionDialect;
pub use executor::{SqlxAdapter, SqlxExecutor};
pub use session::SqlxSession;
pub use store::SqlxStore;
pub use transaction::SqlxTransaction;
