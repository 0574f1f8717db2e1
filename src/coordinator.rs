use crate::adapter::{TransactionHandle, TransactionStore};
use crate::error::BoundaryError;
use crate::options::TransactionOptions;
use crate::scope::Scope;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

/// Runs bodies of work inside ambient transactional boundaries.
///
/// A boundary opened on a [`Scope`] that carries no transaction begins a
/// physical transaction, hands the body a derived scope carrying the handle,
/// and commits or rolls back once the body finishes. A boundary opened on a
/// scope that already carries a transaction simply runs the body: the
/// outermost boundary keeps ownership of begin, commit and rollback, so a call
/// chain never holds more than one physical transaction.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx::MySqlPool;
/// use sqlx_ambient_tx::driver::{SqlxAdapter, SqlxStore};
/// use sqlx_ambient_tx::{Error, Resolver, Scope, Session};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let pool = MySqlPool::connect("mysql://localhost/test").await?;
/// let session = Session::new(SqlxStore::new(pool.clone()));
/// let resolver = Resolver::new(SqlxAdapter::new(pool));
///
/// session
///     .run_in_transaction(Scope::new(), |scope| async move {
///         resolver
///             .resolve(&scope)
///             .execute(sqlx::query("INSERT INTO users (name) VALUES (?)").bind("Alice"))
///             .await?;
///         Ok::<_, Error>(())
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Session<S> {
    store: S,
}

/// What a body produced.
enum Outcome<T, E> {
    Success(T),
    Failed(E),
    Fault(Box<dyn Any + Send>),
}

impl<T, E> Outcome<T, E> {
    async fn capture<Fut>(body: Fut) -> Self
    where
        Fut: Future<Output = Result<T, E>>,
    {
        match AssertUnwindSafe(body).catch_unwind().await {
            Ok(Ok(value)) => Self::Success(value),
            Ok(Err(err)) => Self::Failed(err),
            Err(payload) => Self::Fault(payload),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Active,
    Committing,
    RollingBack,
    Closed,
}

/// Tracks the state of the one boundary that owns a physical transaction.
struct Boundary {
    state: State,
}

impl Boundary {
    fn opened(options: &TransactionOptions) -> Self {
        tracing::debug!(
            isolation = %options.isolation,
            read_only = options.read_only,
            "transaction started"
        );
        Self {
            state: State::Active,
        }
    }

    fn transition(&mut self, next: State) {
        tracing::trace!(from = ?self.state, to = ?next, "transaction state");
        self.state = next;
    }
}

impl Drop for Boundary {
    fn drop(&mut self) {
        if self.state != State::Closed && !std::thread::panicking() {
            tracing::warn!(
                state = ?self.state,
                "transaction boundary dropped before completion; leaving rollback to the store"
            );
        }
    }
}

impl<S: TransactionStore> Session<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs `body` inside a transactional boundary with default options.
    ///
    /// See [`run_in_transaction_with`](Session::run_in_transaction_with).
    pub async fn run_in_transaction<F, Fut, T, E>(&self, scope: Scope, body: F) -> Result<T, E>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: BoundaryError,
    {
        self.run(scope, None, body).await
    }

    /// Runs `body` inside a transactional boundary.
    ///
    /// If `scope` already carries a transaction of this store's handle type,
    /// `body` runs on `scope` as is and its result, or panic, passes through
    /// untouched. `options` are ignored in that case.
    ///
    /// Otherwise a transaction is begun with `options` and `body` runs on a
    /// derived scope carrying it:
    ///
    /// - if `begin` fails, `body` never runs and
    ///   [`BoundaryError::begin_failed`] is returned;
    /// - if `body` succeeds the transaction is committed, and a commit failure
    ///   is reported through [`BoundaryError::commit_failed`];
    /// - if `body` fails the transaction is rolled back and the error comes
    ///   back through [`BoundaryError::aborted`], or
    ///   [`BoundaryError::rollback_failed`] if the rollback failed too;
    /// - if `body` panics the transaction is rolled back and the original
    ///   panic is resumed. A rollback failure at that point is only logged.
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
        self.run(scope, Some(options), body).await
    }

    async fn run<F, Fut, T, E>(
        &self,
        scope: Scope,
        options: Option<TransactionOptions>,
        body: F,
    ) -> Result<T, E>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: BoundaryError,
    {
        if scope.handle::<S::Handle>().is_some() {
            match options.filter(|options| !options.is_default()) {
                Some(options) => tracing::debug!(
                    isolation = %options.isolation,
                    read_only = options.read_only,
                    "joining active transaction; nested options ignored"
                ),
                None => tracing::debug!("joining active transaction"),
            }
            return body(scope).await;
        }

        let options = options.unwrap_or_default();
        let handle = match self.store.begin(&options).await {
            Ok(handle) => handle,
            Err(err) => {
                tracing::debug!(error = %err, "failed to begin transaction");
                return Err(E::begin_failed(Box::new(err)));
            }
        };
        let mut boundary = Boundary::opened(&options);

        let scope = scope.with_handle(handle.clone());
        let outcome = Outcome::capture(async move { body(scope).await }).await;

        match outcome {
            Outcome::Success(value) => {
                boundary.transition(State::Committing);
                let committed = handle.commit().await;
                boundary.transition(State::Closed);

                match committed {
                    Ok(()) => {
                        tracing::debug!("transaction committed");
                        Ok(value)
                    }
                    Err(err) => {
                        tracing::debug!(error = %err, "failed to commit transaction");
                        Err(E::commit_failed(Box::new(err)))
                    }
                }
            }
            Outcome::Failed(err) => {
                boundary.transition(State::RollingBack);
                let rolled_back = handle.rollback().await;
                boundary.transition(State::Closed);

                match rolled_back {
                    Ok(()) => {
                        tracing::debug!("transaction rolled back");
                        Err(err.aborted())
                    }
                    Err(rollback) => {
                        tracing::debug!(error = %rollback, "failed to roll back transaction");
                        Err(err.rollback_failed(Box::new(rollback)))
                    }
                }
            }
            Outcome::Fault(payload) => {
                boundary.transition(State::RollingBack);
                if let Err(rollback) = handle.rollback().await {
                    tracing::error!(error = %rollback, "rollback error during panic");
                } else {
                    tracing::debug!("transaction rolled back after panic");
                }
                boundary.transition(State::Closed);
                panic::resume_unwind(payload)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Phase};
    use crate::options::IsolationLevel;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct StoreError(&'static str);

    #[derive(Default)]
    struct Ledger {
        begins: AtomicUsize,
        commits: AtomicUsize,
        rollbacks: AtomicUsize,
        options: Mutex<Vec<TransactionOptions>>,
        fail_begin: AtomicBool,
        fail_commit: AtomicBool,
        fail_rollback: AtomicBool,
    }

    impl Ledger {
        fn counts(&self) -> (usize, usize, usize) {
            (
                self.begins.load(Ordering::SeqCst),
                self.commits.load(Ordering::SeqCst),
                self.rollbacks.load(Ordering::SeqCst),
            )
        }
    }

    #[derive(Clone, Default)]
    struct RecordingStore {
        ledger: Arc<Ledger>,
    }

    #[derive(Clone)]
    struct RecordingTx {
        id: usize,
        ledger: Arc<Ledger>,
    }

    impl TransactionHandle for RecordingTx {
        type Error = StoreError;

        async fn commit(&self) -> Result<(), StoreError> {
            self.ledger.commits.fetch_add(1, Ordering::SeqCst);
            if self.ledger.fail_commit.load(Ordering::SeqCst) {
                return Err(StoreError("commit refused"));
            }
            Ok(())
        }

        async fn rollback(&self) -> Result<(), StoreError> {
            self.ledger.rollbacks.fetch_add(1, Ordering::SeqCst);
            if self.ledger.fail_rollback.load(Ordering::SeqCst) {
                return Err(StoreError("rollback refused"));
            }
            Ok(())
        }
    }

    impl TransactionStore for RecordingStore {
        type Handle = RecordingTx;
        type Error = StoreError;

        async fn begin(&self, options: &TransactionOptions) -> Result<RecordingTx, StoreError> {
            if self.ledger.fail_begin.load(Ordering::SeqCst) {
                return Err(StoreError("begin refused"));
            }
            let id = self.ledger.begins.fetch_add(1, Ordering::SeqCst);
            self.ledger.options.lock().unwrap().push(*options);
            Ok(RecordingTx {
                id,
                ledger: self.ledger.clone(),
            })
        }
    }

    fn session() -> (Session<RecordingStore>, Arc<Ledger>) {
        let store = RecordingStore::default();
        let ledger = store.ledger.clone();
        (Session::new(store), ledger)
    }

    fn tx_id(scope: &Scope) -> Option<usize> {
        scope.handle::<RecordingTx>().map(|tx| tx.id)
    }

    #[tokio::test]
    async fn test_transaction_injected_into_scope() {
        let (session, ledger) = session();

        let seen = session
            .run_in_transaction(Scope::new(), |scope| async move { Ok::<_, Error>(tx_id(&scope)) })
            .await
            .unwrap();

        assert_eq!(seen, Some(0));
        assert_eq!(ledger.counts(), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_success_commits_once() {
        let (session, ledger) = session();

        let value = session
            .run_in_transaction(Scope::new(), |_| async { Ok::<_, Error>(42) })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(ledger.counts(), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_business_error_rolls_back_and_is_wrapped() {
        let (session, ledger) = session();

        let err = session
            .run_in_transaction(Scope::new(), |_| async {
                Err::<(), _>(Error::other("test error"))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Aborted(_)));
        assert_eq!(err.original().map(ToString::to_string).as_deref(), Some("test error"));
        assert_eq!(err.phase(), None);
        assert_eq!(ledger.counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_rollback_failure_preserves_both_errors() {
        let (session, ledger) = session();
        ledger.fail_rollback.store(true, Ordering::SeqCst);

        let err = session
            .run_in_transaction(Scope::new(), |_| async {
                Err::<(), _>(Error::other("test error"))
            })
            .await
            .unwrap_err();

        assert_eq!(err.phase(), Some(Phase::Rollback));
        assert_eq!(
            err.to_string(),
            "rollback error: rollback refused (original error: test error)"
        );
        assert_eq!(ledger.counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_commit_failure_is_reported() {
        let (session, ledger) = session();
        ledger.fail_commit.store(true, Ordering::SeqCst);

        let err = session
            .run_in_transaction(Scope::new(), |_| async { Ok::<_, Error>(()) })
            .await
            .unwrap_err();

        assert_eq!(err.phase(), Some(Phase::Commit));
        assert_eq!(err.to_string(), "commit error: commit refused");
        assert_eq!(ledger.counts(), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_begin_failure_skips_body() {
        let (session, ledger) = session();
        ledger.fail_begin.store(true, Ordering::SeqCst);
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();

        let err = session
            .run_in_transaction(Scope::new(), move |_| async move {
                flag.store(true, Ordering::SeqCst);
                Ok::<_, Error>(())
            })
            .await
            .unwrap_err();

        assert_eq!(err.phase(), Some(Phase::Begin));
        assert_eq!(err.to_string(), "failed to begin transaction: begin refused");
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(ledger.counts(), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_nested_boundaries_share_one_transaction() {
        let (session, ledger) = session();

        session
            .run_in_transaction(Scope::new(), |outer| {
                let session = session.clone();
                async move {
                    let outer_id = tx_id(&outer);
                    session
                        .run_in_transaction(outer, |inner| {
                            let session = session.clone();
                            async move {
                                assert_eq!(tx_id(&inner), outer_id);
                                session
                                    .run_in_transaction(inner, |innermost| async move {
                                        assert_eq!(tx_id(&innermost), outer_id);
                                        Ok::<_, Error>(())
                                    })
                                    .await
                            }
                        })
                        .await
                }
            })
            .await
            .unwrap();

        assert_eq!(ledger.counts(), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_nested_error_is_returned_unchanged_and_rolled_back_once() {
        let (session, ledger) = session();

        let err = session
            .run_in_transaction(Scope::new(), |outer| {
                let session = session.clone();
                let ledger = ledger.clone();
                async move {
                    let nested = session
                        .run_in_transaction(outer, |_| async {
                            Err::<(), _>(Error::other("inner failure"))
                        })
                        .await;

                    // The nested boundary neither wraps nor rolls back.
                    let nested = nested.unwrap_err();
                    assert!(matches!(nested, Error::Other(_)));
                    assert_eq!(ledger.counts(), (1, 0, 0));
                    Err::<(), _>(nested)
                }
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "transaction failed: inner failure");
        assert_eq!(ledger.counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_many_nested_calls_still_begin_once() {
        let (session, ledger) = session();

        session
            .run_in_transaction(Scope::new(), |scope| {
                let session = session.clone();
                async move {
                    for _ in 0..10 {
                        session
                            .run_in_transaction(scope.clone(), |_| async { Ok::<_, Error>(()) })
                            .await?;
                    }
                    Ok::<_, Error>(())
                }
            })
            .await
            .unwrap();

        assert_eq!(ledger.counts(), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_wrong_typed_handle_opens_new_transaction() {
        let (session, ledger) = session();

        session
            .run_in_transaction(Scope::new().with_handle("tx"), |scope| async move {
                assert_eq!(tx_id(&scope), Some(0));
                Ok::<_, Error>(())
            })
            .await
            .unwrap();

        assert_eq!(ledger.counts(), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_sequential_boundaries_open_separate_transactions() {
        let (session, ledger) = session();
        let scope = Scope::new();

        for expected in 0..3 {
            let id = session
                .run_in_transaction(scope.clone(), |scope| async move {
                    Ok::<_, Error>(tx_id(&scope))
                })
                .await
                .unwrap();
            assert_eq!(id, Some(expected));
        }

        assert!(tx_id(&scope).is_none());
        assert_eq!(ledger.counts(), (3, 3, 0));
    }

    #[tokio::test]
    async fn test_options_reach_store() {
        let (session, ledger) = session();
        let options = TransactionOptions::new()
            .isolation(IsolationLevel::Serializable)
            .read_only();

        session
            .run_in_transaction_with(Scope::new(), options, |_| async { Ok::<_, Error>(()) })
            .await
            .unwrap();

        assert_eq!(*ledger.options.lock().unwrap(), vec![options]);
    }

    #[tokio::test]
    async fn test_nested_options_are_ignored() {
        let (session, ledger) = session();

        session
            .run_in_transaction(Scope::new(), |scope| {
                let session = session.clone();
                async move {
                    session
                        .run_in_transaction_with(
                            scope,
                            TransactionOptions::new().read_only(),
                            |_| async { Ok::<_, Error>(()) },
                        )
                        .await
                }
            })
            .await
            .unwrap();

        assert_eq!(*ledger.options.lock().unwrap(), vec![TransactionOptions::default()]);
        assert_eq!(ledger.counts(), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_panic_rolls_back_and_propagates() {
        let (session, ledger) = session();

        let result = AssertUnwindSafe(
            session.run_in_transaction(Scope::new(), |_| async {
                if true {
                    panic!("test panic");
                }
                Ok::<_, Error>(())
            }),
        )
        .catch_unwind()
        .await;

        let payload = result.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"test panic"));
        assert_eq!(ledger.counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_panic_wins_over_rollback_failure() {
        let (session, ledger) = session();
        ledger.fail_rollback.store(true, Ordering::SeqCst);

        let result = AssertUnwindSafe(
            session.run_in_transaction(Scope::new(), |_| async {
                if true {
                    std::panic::panic_any(17_u32);
                }
                Ok::<_, Error>(())
            }),
        )
        .catch_unwind()
        .await;

        let payload = result.unwrap_err();
        assert_eq!(payload.downcast_ref::<u32>(), Some(&17));
        assert_eq!(ledger.counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_nested_panic_rolls_back_at_outer_boundary() {
        let (session, ledger) = session();

        let result = AssertUnwindSafe(session.run_in_transaction(Scope::new(), |scope| {
            let session = session.clone();
            async move {
                session
                    .run_in_transaction(scope, |_| async {
                        if true {
                            panic!("inner panic");
                        }
                        Ok::<_, Error>(())
                    })
                    .await
            }
        }))
        .catch_unwind()
        .await;

        assert_eq!(result.unwrap_err().downcast_ref::<&str>(), Some(&"inner panic"));
        assert_eq!(ledger.counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_panic_while_building_body_future_rolls_back() {
        let (session, ledger) = session();

        let result = AssertUnwindSafe(session.run_in_transaction(
            Scope::new(),
            |_| -> std::future::Ready<Result<(), Error>> { panic!("eager panic") },
        ))
        .catch_unwind()
        .await;

        assert!(result.is_err());
        assert_eq!(ledger.counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_independent_chains_do_not_share_transactions() {
        let (session, ledger) = session();

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let session = session.clone();
                tokio::spawn(async move {
                    session
                        .run_in_transaction(Scope::new(), |scope| async move {
                            tokio::task::yield_now().await;
                            Ok::<_, Error>(tx_id(&scope))
                        })
                        .await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap().unwrap());
        }
        ids.sort_unstable();

        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(ledger.counts(), (4, 4, 0));
    }
}
