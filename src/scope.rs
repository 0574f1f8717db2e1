use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Immutable, hierarchical carrier of ambient values for one call chain.
///
/// A `Scope` is a persistent linked list: deriving a child with
/// [`with_value`](Scope::with_value) or [`with_handle`](Scope::with_handle)
/// never mutates the parent, so a child sees everything its parent carries
/// while parents and siblings never see the child's additions.
///
/// Cloning a `Scope` is cheap (one `Arc` increment) and the clone observes
/// exactly the same values, which is how a scope is handed down to callees.
///
/// # Examples
///
/// ```rust
/// use sqlx_ambient_tx::Scope;
///
/// struct RequestId;
///
/// let root = Scope::new();
/// let child = root.with_value::<RequestId, _>(42_u64);
///
/// assert_eq!(child.value::<RequestId, u64>(), Some(&42));
/// assert_eq!(root.value::<RequestId, u64>(), None);
/// ```
#[derive(Clone, Default)]
pub struct Scope {
    head: Option<Arc<Entry>>,
}

struct Entry {
    key: TypeId,
    key_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Entry>>,
}

/// Slot key reserved for the ambient transaction handle.
struct TransactionSlot;

impl Scope {
    /// Creates an empty root scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a derived scope carrying `value` under the key type `K`.
    ///
    /// The new value shadows any value stored under `K` by an ancestor.
    pub fn with_value<K, V>(&self, value: V) -> Self
    where
        K: 'static,
        V: Any + Send + Sync,
    {
        Self {
            head: Some(Arc::new(Entry {
                key: TypeId::of::<K>(),
                key_name: type_name::<K>(),
                value: Arc::new(value),
                parent: self.head.clone(),
            })),
        }
    }

    /// Looks up the nearest value stored under the key type `K`.
    ///
    /// Returns `None` when no ancestor stored anything under `K`, and also when
    /// the nearest stored value is not a `V`. A wrong-typed value shadows
    /// whatever an older ancestor stored under the same key.
    pub fn value<K, V>(&self) -> Option<&V>
    where
        K: 'static,
        V: Any,
    {
        let key = TypeId::of::<K>();
        self.entries()
            .find(|entry| entry.key == key)
            .and_then(|entry| entry.value.downcast_ref::<V>())
    }

    /// Returns a derived scope carrying `handle` in the transaction slot.
    ///
    /// Any value is accepted; only [`handle`](Scope::handle) calls asking for
    /// the same type will ever see it.
    pub fn with_handle<H>(&self, handle: H) -> Self
    where
        H: Any + Send + Sync,
    {
        self.with_value::<TransactionSlot, H>(handle)
    }

    /// Returns the ambient transaction handle, if one of type `H` is attached.
    pub fn handle<H>(&self) -> Option<&H>
    where
        H: Any,
    {
        self.value::<TransactionSlot, H>()
    }

    /// Returns `true` if anything at all occupies the transaction slot.
    pub fn has_handle(&self) -> bool {
        let key = TypeId::of::<TransactionSlot>();
        self.entries().any(|entry| entry.key == key)
    }

    fn entries(&self) -> impl Iterator<Item = &Entry> {
        std::iter::successors(self.head.as_deref(), |entry| entry.parent.as_deref())
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries().map(|entry| entry.key_name))
            .finish()
    }
}
