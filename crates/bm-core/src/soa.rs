//! Service / listener / connector roles and the keyed store behind every
//! concrete service.
//!
//! A [`Service`] owns the latest record per key. Ingestion goes through
//! `on_message`, which replaces the stored record and then calls every
//! registered [`ServiceListener`] synchronously, in registration order. A
//! [`Connector`] is the outbound edge a service publishes to.
//!
//! [`ServiceCore`] never holds its store lock while listeners run, so a
//! listener (or a loopback connector) may call back into the same service.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use ahash::AHashMap;

use crate::error::{MeshError, Result};

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// Observer of a service's records.
///
/// Callbacks receive the just-updated record by reference and must not keep
/// it past the call; clone what you need.
pub trait ServiceListener<V>: Send + Sync {
    fn process_add(&self, data: &V);

    /// No component in the mesh ever removes a record.
    fn process_remove(&self, _data: &V) {}

    fn process_update(&self, data: &V);
}

/// Outbound sink for a service's records.
pub trait Connector<V>: Send + Sync {
    fn publish(&self, data: &V) -> Result<()>;
}

/// Keyed store of the latest record per key.
pub trait Service<K: ?Sized, V>: Send + Sync {
    /// Stored record for `key`; [`MeshError::UnknownKey`] if never ingested.
    fn get_data(&self, key: &K) -> Result<V>;

    /// Ingest one record from a connector.
    fn on_message(&self, data: V);

    fn add_listener(&self, listener: Arc<dyn ServiceListener<V>>);

    fn listeners(&self) -> Vec<Arc<dyn ServiceListener<V>>>;
}

/// Which listener hook a change is reported through.
///
/// Add and update are chosen by the caller, not by whether the key existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notify {
    Add,
    Update,
    Remove,
}

// ---------------------------------------------------------------------------
// ServiceCore
// ---------------------------------------------------------------------------

/// Recover the guard from a poisoned mutex. Every critical section in the
/// mesh is a single replace or in-place update, so the data stays coherent.
#[inline]
pub fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Store + listener list shared by every concrete service.
pub struct ServiceCore<V> {
    store: Mutex<AHashMap<String, V>>,
    listeners: RwLock<Vec<Arc<dyn ServiceListener<V>>>>,
}

impl<V: Clone> Default for ServiceCore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> ServiceCore<V> {
    pub fn new() -> Self {
        Self { store: Mutex::new(AHashMap::new()), listeners: RwLock::new(Vec::new()) }
    }

    pub fn get(&self, key: &str) -> Result<V> {
        lock(&self.store)
            .get(key)
            .cloned()
            .ok_or_else(|| MeshError::UnknownKey(key.to_string()))
    }

    /// Replace the record under `key`, then notify listeners.
    pub fn replace(&self, key: String, value: V, notify: Notify) {
        lock(&self.store).insert(key, value.clone());
        self.notify(&value, notify);
    }

    /// Store `value` without notifying anyone.
    pub fn store(&self, key: String, value: V) {
        lock(&self.store).insert(key, value);
    }

    /// Read-modify-write of one record under the store lock.
    ///
    /// `init` builds the record on first sight. Returns a copy of the updated
    /// record; the caller notifies once the lock is gone.
    pub fn update_with(&self, key: &str, init: impl FnOnce() -> V, f: impl FnOnce(&mut V)) -> V {
        let mut store = lock(&self.store);
        let entry = store.entry(key.to_string()).or_insert_with(init);
        f(entry);
        entry.clone()
    }

    pub fn notify(&self, value: &V, notify: Notify) {
        for listener in self.listeners() {
            match notify {
                Notify::Add => listener.process_add(value),
                Notify::Update => listener.process_update(value),
                Notify::Remove => listener.process_remove(value),
            }
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn ServiceListener<V>>) {
        self.listeners.write().unwrap_or_else(PoisonError::into_inner).push(listener);
    }

    /// Snapshot of the registered listeners, in registration order.
    pub fn listeners(&self) -> Vec<Arc<dyn ServiceListener<V>>> {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.store).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.store).keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    struct Tagged {
        tag: &'static str,
        log: Arc<Log>,
    }

    impl ServiceListener<i64> for Tagged {
        fn process_add(&self, data: &i64) {
            lock(&self.log.0).push(format!("{}:add:{data}", self.tag));
        }

        fn process_update(&self, data: &i64) {
            lock(&self.log.0).push(format!("{}:update:{data}", self.tag));
        }
    }

    #[test]
    fn replace_and_notify_in_order() {
        let core = ServiceCore::<i64>::new();
        let log = Arc::new(Log::default());
        core.add_listener(Arc::new(Tagged { tag: "a", log: log.clone() }));
        core.add_listener(Arc::new(Tagged { tag: "b", log: log.clone() }));

        core.replace("k".into(), 1, Notify::Add);
        core.replace("k".into(), 2, Notify::Update);
        core.notify(&2, Notify::Remove);

        assert_eq!(core.get("k").unwrap(), 2);
        assert_eq!(core.len(), 1);
        assert_eq!(*lock(&log.0), vec!["a:add:1", "b:add:1", "a:update:2", "b:update:2"]);
    }

    #[test]
    fn unknown_key() {
        let core = ServiceCore::<i64>::new();
        assert!(matches!(core.get("nope"), Err(MeshError::UnknownKey(k)) if k == "nope"));
    }

    #[test]
    fn update_in_place() {
        let core = ServiceCore::<i64>::new();
        assert_eq!(core.update_with("k", || 10, |v| *v += 5), 15);
        assert_eq!(core.update_with("k", || 10, |v| *v -= 20), -5);
        assert_eq!(core.keys(), vec!["k".to_string()]);
    }

    struct Reentrant {
        core: Arc<ServiceCore<i64>>,
    }

    impl ServiceListener<i64> for Reentrant {
        fn process_add(&self, data: &i64) {
            if *data < 3 {
                self.core.replace("k".into(), data + 1, Notify::Add);
            }
        }

        fn process_update(&self, _data: &i64) {}
    }

    #[test]
    fn listener_may_reenter_service() {
        let core = Arc::new(ServiceCore::<i64>::new());
        core.add_listener(Arc::new(Reentrant { core: core.clone() }));
        core.replace("k".into(), 0, Notify::Add);
        assert_eq!(core.get("k").unwrap(), 3);
    }
}
