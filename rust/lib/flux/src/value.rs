use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// A typed value that lives at a fixed path in the [`StateStore`].
///
/// [`StateStore`]: crate::StateStore
pub trait State: Any + Send + Sync {
    /// Well-known store path, e.g. `session/state`.
    const PATH: &'static str;
}

/// A type-erased, reference-counted state value.
///
/// Clone is an atomic increment; readers share the same allocation.
#[derive(Clone)]
pub struct StateValue {
    inner: Arc<dyn Any + Send + Sync>,
}

impl StateValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }

    /// Borrow the value as `T`, or `None` if the stored type differs.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Take a typed `Arc` sharing the same allocation.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn type_id(&self) -> TypeId {
        (*self.inner).type_id()
    }

    /// Number of live handles on the underlying value.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl fmt::Debug for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateValue")
            .field("type_id", &(*self.inner).type_id())
            .finish()
    }
}

/// Handle returned by `StateStore::subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);
