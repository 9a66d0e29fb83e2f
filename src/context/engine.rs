//! Hierarchical context enrichment: merges global, session, and user scopes
//! into an event's own context (spec §4.D).

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::event::{DataMap, Event};

use super::store::{ContextScope, ContextStore};

/// Keys an [`Event`] may carry in its own context to identify which session
/// and user scopes it should be enriched from.
const SESSION_KEY: &str = "session_id";
const USER_KEY: &str = "user_id";

/// Merges context store scopes onto events, broadest first.
///
/// Merge order is `Global -> Session -> User -> event's own context`, so an
/// event's explicit context always wins over anything inherited (spec §4.D,
/// §8).
pub struct ContextEngine {
    store: Arc<ContextStore>,
}

impl ContextEngine {
    pub fn new(store: Arc<ContextStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    /// Convenience for installing a single global value, e.g. at bus startup.
    pub fn set_global(&self, key: impl Into<String>, value: Value, ttl: Option<Duration>) {
        self.store.set(ContextScope::Global, key, value, ttl);
    }

    pub fn set_session(&self, session_id: impl Into<String>, key: impl Into<String>, value: Value, ttl: Option<Duration>) {
        self.store.set(ContextScope::Session(session_id.into()), key, value, ttl);
    }

    pub fn set_user(&self, user_id: impl Into<String>, key: impl Into<String>, value: Value, ttl: Option<Duration>) {
        self.store.set(ContextScope::User(user_id.into()), key, value, ttl);
    }

    /// Produce an enriched copy of `event` with inherited context merged in
    /// underneath the event's own context.
    ///
    /// `session_id`/`user_id` are read from the event's own context, if
    /// present, before the merge happens.
    pub fn enrich_event(&self, event: &Event) -> Event {
        let mut merged: DataMap = self.store.get_all(&ContextScope::Global).into_iter().collect();

        if let Some(Value::String(session_id)) = event.context.get(SESSION_KEY) {
            merged.extend(self.store.get_all(&ContextScope::Session(session_id.clone())));
        }
        if let Some(Value::String(user_id)) = event.context.get(USER_KEY) {
            merged.extend(self.store.get_all(&ContextScope::User(user_id.clone())));
        }

        merged.extend(event.context.clone());
        event.with_context(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> ContextEngine {
        ContextEngine::new(Arc::new(ContextStore::new()))
    }

    #[test]
    fn global_context_is_merged_in() {
        let engine = engine();
        engine.set_global("env", Value::from("prod"), None);

        let event = Event::new("test").unwrap();
        let enriched = engine.enrich_event(&event);

        assert_eq!(enriched.context.get("env"), Some(&Value::from("prod")));
    }

    #[test]
    fn session_and_user_scopes_are_merged_by_id() {
        let engine = engine();
        engine.set_session("s1", "cart_size", Value::from(3), None);
        engine.set_user("alice", "plan", Value::from("pro"), None);

        let event = Event::builder("test")
            .context(DataMap::from([
                ("session_id".to_string(), Value::from("s1")),
                ("user_id".to_string(), Value::from("alice")),
            ]))
            .build()
            .unwrap();
        let enriched = engine.enrich_event(&event);

        assert_eq!(enriched.context.get("cart_size"), Some(&Value::from(3)));
        assert_eq!(enriched.context.get("plan"), Some(&Value::from("pro")));
    }

    #[test]
    fn events_own_context_wins_over_inherited() {
        let engine = engine();
        engine.set_global("env", Value::from("prod"), None);

        let event = Event::builder("test")
            .context(DataMap::from([("env".to_string(), Value::from("test-override"))]))
            .build()
            .unwrap();
        let enriched = engine.enrich_event(&event);

        assert_eq!(enriched.context.get("env"), Some(&Value::from("test-override")));
    }

    #[test]
    fn enrichment_does_not_mutate_original_event() {
        let engine = engine();
        engine.set_global("env", Value::from("prod"), None);

        let event = Event::new("test").unwrap();
        let _ = engine.enrich_event(&event);

        assert!(event.context.is_empty());
    }
}
