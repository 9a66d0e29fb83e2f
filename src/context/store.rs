//! TTL-backed key/value storage scoped to a hierarchy level.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde_json::Value;

/// A level in the context hierarchy (spec §4.D, broadest to narrowest).
///
/// Lookups merge narrower scopes over broader ones, so a `User` value
/// shadows a `Global` value of the same key, and so on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContextScope {
    Global,
    Session(String),
    User(String),
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.map(|at| Instant::now() >= at).unwrap_or(false)
    }
}

/// Holds context key/value pairs per scope, with optional per-entry TTL.
///
/// Expiry is lazy: an entry past its TTL is simply skipped by `get`/`get_all`
/// and reaped the next time [`ContextStore::evict_expired`] runs, mirroring
/// the original store's behavior of never scheduling background cleanup.
pub struct ContextStore {
    entries: RwLock<HashMap<ContextScope, HashMap<String, Entry>>>,
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Store `value` under `scope`/`key`, expiring after `ttl` if given.
    pub fn set(&self, scope: ContextScope, key: impl Into<String>, value: Value, ttl: Option<Duration>) {
        let mut entries = self.entries.write();
        entries.entry(scope).or_default().insert(
            key.into(),
            Entry {
                value,
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
    }

    /// Fetch one key within a scope, ignoring expired entries.
    pub fn get(&self, scope: &ContextScope, key: &str) -> Option<Value> {
        let entries = self.entries.read();
        entries
            .get(scope)
            .and_then(|scoped| scoped.get(key))
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone())
    }

    /// Fetch every live key/value pair within a scope.
    pub fn get_all(&self, scope: &ContextScope) -> HashMap<String, Value> {
        let entries = self.entries.read();
        entries
            .get(scope)
            .map(|scoped| {
                scoped
                    .iter()
                    .filter(|(_, entry)| !entry.is_expired())
                    .map(|(key, entry)| (key.clone(), entry.value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Remove a single key from a scope. Idempotent.
    pub fn delete(&self, scope: &ContextScope, key: &str) {
        if let Some(scoped) = self.entries.write().get_mut(scope) {
            scoped.remove(key);
        }
    }

    /// Drop every key in a scope.
    pub fn clear_scope(&self, scope: &ContextScope) {
        self.entries.write().remove(scope);
    }

    /// Sweep every expired entry out of the store. Not required for
    /// correctness (reads already skip expired entries) but keeps memory
    /// bounded under long-lived scopes with many short-TTL writes.
    pub fn evict_expired(&self) {
        let mut entries = self.entries.write();
        for scoped in entries.values_mut() {
            scoped.retain(|_, entry| !entry.is_expired());
        }
        entries.retain(|_, scoped| !scoped.is_empty());
    }

    pub fn scope_count(&self) -> usize {
        self.entries.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_within_scope() {
        let store = ContextStore::new();
        store.set(ContextScope::Global, "env", Value::from("prod"), None);
        assert_eq!(store.get(&ContextScope::Global, "env"), Some(Value::from("prod")));
    }

    #[test]
    fn scopes_are_isolated() {
        let store = ContextStore::new();
        store.set(ContextScope::User("alice".into()), "role", Value::from("admin"), None);
        assert_eq!(store.get(&ContextScope::User("bob".into()), "role"), None);
    }

    #[test]
    fn expired_entry_is_invisible() {
        let store = ContextStore::new();
        store.set(
            ContextScope::Global,
            "temp",
            Value::from(1),
            Some(Duration::from_millis(0)),
        );
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.get(&ContextScope::Global, "temp"), None);
    }

    #[test]
    fn evict_expired_removes_empty_scopes() {
        let store = ContextStore::new();
        store.set(
            ContextScope::Global,
            "temp",
            Value::from(1),
            Some(Duration::from_millis(0)),
        );
        std::thread::sleep(Duration::from_millis(5));
        store.evict_expired();
        assert_eq!(store.scope_count(), 0);
    }

    #[test]
    fn delete_is_idempotent() {
        let store = ContextStore::new();
        store.set(ContextScope::Global, "key", Value::from(1), None);
        store.delete(&ContextScope::Global, "key");
        store.delete(&ContextScope::Global, "key");
        assert_eq!(store.get(&ContextScope::Global, "key"), None);
    }
}
