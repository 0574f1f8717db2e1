/// Boxed error used for causes reported by a store or adapter.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error types for transaction management
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLx
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Transaction has already been consumed (committed or rolled back)
    #[error("Transaction has already been consumed")]
    AlreadyConsumed,

    /// The store cannot express the requested transaction options
    #[error("Unsupported transaction options: {0}")]
    UnsupportedOptions(String),

    /// The store refused to open a transaction; the body never ran
    #[error("failed to begin transaction: {0}")]
    Begin(#[source] BoxError),

    /// The body failed and the transaction was rolled back
    #[error("transaction failed: {0}")]
    Aborted(#[source] Box<Error>),

    /// The body failed and the rollback failed as well
    #[error("rollback error: {source} (original error: {original})")]
    Rollback {
        #[source]
        source: BoxError,
        original: Box<Error>,
    },

    /// The body succeeded but the transaction could not be committed
    #[error("commit error: {0}")]
    Commit(#[source] BoxError),

    /// Any other business error raised by a transaction body
    #[error(transparent)]
    Other(#[from] BoxError),
}

/// Transaction phase in which a boundary failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Begin,
    Commit,
    Rollback,
}

impl Error {
    /// Wraps an arbitrary error as a business error.
    pub fn other<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Other(err.into())
    }

    /// The phase whose failure this error reports, if it is a transactional
    /// failure rather than an error raised by the body.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Begin(_) => Some(Phase::Begin),
            Self::Commit(_) => Some(Phase::Commit),
            Self::Rollback { .. } => Some(Phase::Rollback),
            _ => None,
        }
    }

    /// The body's own error carried by [`Error::Aborted`] or [`Error::Rollback`].
    pub fn original(&self) -> Option<&Error> {
        match self {
            Self::Aborted(original) | Self::Rollback { original, .. } => Some(original),
            _ => None,
        }
    }

    /// Consumes the error and returns the body's own error, if any.
    pub fn into_original(self) -> Option<Error> {
        match self {
            Self::Aborted(original) | Self::Rollback { original, .. } => Some(*original),
            _ => None,
        }
    }
}

/// Result type alias for transaction operations
pub type Result<T> = std::result::Result<T, Error>;

/// Folds the failures of a transactional boundary into a body's error type.
///
/// A boundary returns the body's error type `E` at every nesting level. Only
/// the outermost boundary, which owns the physical transaction, calls these
/// constructors; nested boundaries hand the body's error back untouched.
///
/// Implemented for [`Error`] and, with the `anyhow` feature, for
/// `anyhow::Error`. Applications can implement it for their own error types.
pub trait BoundaryError: Sized {
    /// The store refused to begin a transaction.
    fn begin_failed(cause: BoxError) -> Self;

    /// The body succeeded but the commit failed.
    fn commit_failed(cause: BoxError) -> Self;

    /// The body failed with `self` and the transaction was rolled back.
    fn aborted(self) -> Self;

    /// The body failed with `self` and the rollback failed with `cause`.
    fn rollback_failed(self, cause: BoxError) -> Self;
}

impl BoundaryError for Error {
    fn begin_failed(cause: BoxError) -> Self {
        Self::Begin(cause)
    }

    fn commit_failed(cause: BoxError) -> Self {
        Self::Commit(cause)
    }

    fn aborted(self) -> Self {
        Self::Aborted(Box::new(self))
    }

    fn rollback_failed(self, cause: BoxError) -> Self {
        Self::Rollback {
            source: cause,
            original: Box::new(self),
        }
    }
}
