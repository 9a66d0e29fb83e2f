//! The subscription registry: storage, indexing, and pattern-matched queries.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::event::Event;
use crate::subscription::{RoutingMode, Subscription, SubscriptionId};
use crate::topic::matches;

/// Breakdown of registered subscriptions by pattern kind (spec §4.B stats).
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub total_subscriptions: usize,
    pub exact_patterns: usize,
    pub wildcard_patterns: usize,
    pub semantic_subscriptions: usize,
    pub capacity: usize,
}

/// Indexed store of live subscriptions (spec §3, §4.B).
///
/// Literal patterns are indexed by an exact hash lookup; wildcard and
/// semantic subscriptions sit in linear-scan lists, since the expected
/// cardinality of non-literal subscribers is small (spec §4.A rationale).
pub struct Registry {
    capacity: usize,
    exact: RwLock<HashMap<String, Vec<SubscriptionId>>>,
    wildcard: RwLock<Vec<SubscriptionId>>,
    semantic: RwLock<Vec<SubscriptionId>>,
    by_id: RwLock<HashMap<SubscriptionId, Arc<Subscription>>>,
}

impl Registry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            exact: RwLock::new(HashMap::new()),
            wildcard: RwLock::new(Vec::new()),
            semantic: RwLock::new(Vec::new()),
            by_id: RwLock::new(HashMap::new()),
        }
    }

    /// Insert `subscription`, indexing it by pattern kind.
    ///
    /// Fails with [`Error::RegistryFull`] at capacity or
    /// [`Error::DuplicateSubscription`] if the id already exists; neither
    /// failure mutates the registry (spec §8).
    pub fn add(&self, subscription: Subscription) -> Result<Arc<Subscription>> {
        let mut by_id = self.by_id.write();
        if by_id.len() >= self.capacity {
            tracing::warn!(capacity = self.capacity, "registry full, rejecting subscription");
            return Err(Error::RegistryFull {
                capacity: self.capacity,
            });
        }
        if by_id.contains_key(&subscription.id) {
            return Err(Error::DuplicateSubscription(subscription.id));
        }

        let id = subscription.id;
        let pattern = subscription.pattern.clone();
        let mode = subscription.mode;
        let is_literal = subscription.is_literal();
        let shared = Arc::new(subscription);
        by_id.insert(id, shared.clone());
        drop(by_id);

        match mode {
            RoutingMode::Semantic => self.semantic.write().push(id),
            RoutingMode::LiteralOrWildcard if is_literal => {
                self.exact.write().entry(pattern).or_default().push(id);
            }
            RoutingMode::LiteralOrWildcard => self.wildcard.write().push(id),
        }

        Ok(shared)
    }

    /// Remove a subscription by id. Idempotent: removing an absent id
    /// returns `false` rather than failing (spec §4.B, §8 idempotence law).
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let Some(subscription) = self.by_id.write().remove(&id) else {
            return false;
        };

        match subscription.mode {
            RoutingMode::Semantic => self.semantic.write().retain(|sub_id| *sub_id != id),
            RoutingMode::LiteralOrWildcard if subscription.is_literal() => {
                let mut exact = self.exact.write();
                if let Some(ids) = exact.get_mut(&subscription.pattern) {
                    ids.retain(|sub_id| *sub_id != id);
                    if ids.is_empty() {
                        exact.remove(&subscription.pattern);
                    }
                }
            }
            RoutingMode::LiteralOrWildcard => self.wildcard.write().retain(|sub_id| *sub_id != id),
        }

        true
    }

    /// Fetch a subscription by id.
    pub fn get(&self, id: SubscriptionId) -> Result<Arc<Subscription>> {
        self.by_id
            .read()
            .get(&id)
            .cloned()
            .ok_or(Error::SubscriptionNotFound(id))
    }

    /// All subscriptions (literal or wildcard) whose pattern matches
    /// `event.topic`, sorted by descending priority with ties broken by
    /// insertion order (spec §4.B, §8).
    pub fn find_matches(&self, event: &Event) -> Vec<Arc<Subscription>> {
        let by_id = self.by_id.read();
        let mut found: Vec<Arc<Subscription>> = Vec::new();

        if let Some(ids) = self.exact.read().get(&event.topic) {
            found.extend(ids.iter().filter_map(|id| by_id.get(id).cloned()));
        }

        for id in self.wildcard.read().iter() {
            if let Some(sub) = by_id.get(id) {
                if matches(&sub.pattern, &event.topic) {
                    found.push(sub.clone());
                }
            }
        }

        found.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.sequence.cmp(&b.sequence)));
        found
    }

    /// All subscriptions in `mode = semantic`, for the semantic router seam
    /// to resolve separately (spec §4.B).
    pub fn semantic_subscriptions(&self) -> Vec<Arc<Subscription>> {
        let by_id = self.by_id.read();
        self.semantic
            .read()
            .iter()
            .filter_map(|id| by_id.get(id).cloned())
            .collect()
    }

    /// All subscriptions whose pattern string equals `pattern` exactly.
    pub fn find_by_pattern(&self, pattern: &str) -> Vec<Arc<Subscription>> {
        self.by_id
            .read()
            .values()
            .filter(|sub| sub.pattern == pattern)
            .cloned()
            .collect()
    }

    /// All live subscriptions, in no particular order.
    pub fn get_all(&self) -> Vec<Arc<Subscription>> {
        self.by_id.read().values().cloned().collect()
    }

    /// Remove every subscription.
    pub fn clear(&self) {
        self.by_id.write().clear();
        self.exact.write().clear();
        self.wildcard.write().clear();
        self.semantic.write().clear();
    }

    pub fn count(&self) -> usize {
        self.by_id.read().len()
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            total_subscriptions: self.count(),
            exact_patterns: self.exact.read().values().map(Vec::len).sum(),
            wildcard_patterns: self.wildcard.read().len(),
            semantic_subscriptions: self.semantic.read().len(),
            capacity: self.capacity,
        }
    }
}
