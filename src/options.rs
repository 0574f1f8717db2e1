use std::fmt;

/// Transaction isolation levels understood by the bundled dialects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    /// Whatever the store uses when no level is requested.
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// SQL spelling of the level, or `None` for [`IsolationLevel::Default`].
    pub fn as_sql(self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::ReadUncommitted => Some("READ UNCOMMITTED"),
            Self::ReadCommitted => Some("READ COMMITTED"),
            Self::RepeatableRead => Some("REPEATABLE READ"),
            Self::Serializable => Some("SERIALIZABLE"),
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql().unwrap_or("DEFAULT"))
    }
}

/// Options passed to the store when a boundary opens a physical transaction.
///
/// Only the outermost boundary's options take effect. A nested boundary
/// reuses the transaction that is already open and drops its own options.
///
/// # Examples
///
/// ```rust
/// use sqlx_ambient_tx::{IsolationLevel, TransactionOptions};
///
/// let options = TransactionOptions::new()
///     .isolation(IsolationLevel::Serializable)
///     .read_only();
///
/// assert!(options.read_only);
/// assert!(!options.is_default());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TransactionOptions {
    pub isolation: IsolationLevel,
    pub read_only: bool,
}

impl TransactionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// `true` when these options ask for nothing beyond a plain `BEGIN`.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}
