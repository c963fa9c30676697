use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::trace;

use crate::pattern::Pattern;
use crate::value::{State, StateValue, SubscriptionId};

/// Callback type for state change notifications.
pub type ChangeHandler = Arc<dyn Fn(&str, &StateValue) + Send + Sync>;

/// Per-path state store with pattern-matched change notifications.
///
/// - `set(value)` stores a [`State`] at its `PATH` and notifies subscribers.
/// - `set_versioned(value, version)` does the same unless a newer version
///   is already stored.
/// - `get::<T>()` reads the current value (Arc clone, cheap).
/// - `remove::<T>()` drops a value without notifying.
/// - `subscribe(pattern, handler)` registers a change handler.
///
/// No store lock is held while handlers run, so a handler may read the
/// store or call back into whoever published.
///
/// Values are kept in a `BTreeMap` so snapshots come out ordered by path.
pub struct StateStore {
    values: RwLock<BTreeMap<String, Entry>>,
    handlers: RwLock<Vec<HandlerEntry>>,
    next_id: AtomicU64,
}

struct Entry {
    value: StateValue,
    version: u64,
}

#[derive(Clone)]
struct HandlerEntry {
    id: SubscriptionId,
    pattern: Pattern,
    handler: ChangeHandler,
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(BTreeMap::new()),
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Store a typed value at `T::PATH` and notify matching subscribers.
    pub fn set<T: State>(&self, value: T) {
        self.set_value(T::PATH, StateValue::new(value));
    }

    /// Store a pre-built value at an arbitrary path and notify.
    ///
    /// Unconditional; the path keeps its current version.
    pub fn set_value(&self, path: &str, value: StateValue) {
        {
            let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
            match values.get_mut(path) {
                Some(entry) => entry.value = value.clone(),
                None => {
                    values.insert(path.to_string(), Entry { value: value.clone(), version: 0 });
                }
            }
        }
        trace!(path, "state updated");
        self.notify(path, &value);
    }

    /// Store `value` at `T::PATH` if `version` is newer than the stored one.
    ///
    /// Lets an owner build its snapshot under its own lock, release it, and
    /// publish afterwards: when two publishes race, the older one is
    /// dropped instead of overwriting the newer. Returns whether it was
    /// stored.
    pub fn set_versioned<T: State>(&self, value: T, version: u64) -> bool {
        self.set_value_versioned(T::PATH, StateValue::new(value), version)
    }

    pub fn set_value_versioned(&self, path: &str, value: StateValue, version: u64) -> bool {
        {
            let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
            match values.get_mut(path) {
                Some(entry) if entry.version >= version => {
                    trace!(path, version, stored = entry.version, "stale state dropped");
                    return false;
                }
                Some(entry) => {
                    entry.value = value.clone();
                    entry.version = version;
                }
                None => {
                    values.insert(path.to_string(), Entry { value: value.clone(), version });
                }
            }
        }
        trace!(path, version, "state updated");

        // A newer publish may have landed since; its own notify covers it.
        if self.version(path).is_some_and(|current| current > version) {
            return true;
        }
        self.notify(path, &value);
        true
    }

    /// Version recorded for `path`, if a value is stored.
    pub fn version(&self, path: &str) -> Option<u64> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.get(path).map(|entry| entry.version)
    }

    fn notify(&self, path: &str, value: &StateValue) {
        let matched: Vec<ChangeHandler> = {
            let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
            handlers
                .iter()
                .filter(|entry| entry.pattern.matches(path))
                .map(|entry| Arc::clone(&entry.handler))
                .collect()
        };
        for handler in matched {
            handler(path, value);
        }
    }

    /// Read the value at `T::PATH`.
    ///
    /// Returns `None` when nothing is stored or the stored type is not `T`.
    pub fn get<T: State>(&self) -> Option<Arc<T>> {
        self.get_value(T::PATH)?.downcast::<T>()
    }

    /// Read and clone the value at `T::PATH`.
    pub fn get_cloned<T: State + Clone>(&self) -> Option<T> {
        self.get::<T>().map(|v| (*v).clone())
    }

    pub fn get_value(&self, path: &str) -> Option<StateValue> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.get(path).map(|entry| entry.value.clone())
    }

    /// Remove the value at `T::PATH`. Does NOT notify subscribers.
    pub fn remove<T: State>(&self) -> Option<StateValue> {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.remove(T::PATH).map(|entry| entry.value)
    }

    pub fn contains(&self, path: &str) -> bool {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.contains_key(path)
    }

    pub fn len(&self) -> usize {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All paths and values, ordered by path.
    pub fn snapshot(&self) -> Vec<(String, StateValue)> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values
            .iter()
            .map(|(k, entry)| (k.clone(), entry.value.clone()))
            .collect()
    }

    /// Subscribe to changes on paths matching `pattern`.
    ///
    /// The handler runs synchronously on the thread that calls `set`,
    /// after the new value is visible through `get`.
    pub fn subscribe<F>(&self, pattern: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&str, &StateValue) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers.push(HandlerEntry {
            id,
            pattern: Pattern::parse(pattern),
            handler: Arc::new(handler),
        });
        id
    }

    /// Remove a subscription. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers.retain(|entry| entry.id != id);
    }

    pub fn subscriber_count(&self) -> usize {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        handlers.len()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
