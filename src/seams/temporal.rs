//! Seam for recording dispatched events over time (spec §4.E).
//!
//! A persistent, queryable event store is explicitly out of scope (spec
//! Non-goals); this module provides the trait boundary plus a bounded
//! in-memory default so a bus can be built and tested without wiring up
//! an external implementation.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::event::Event;

/// An append-only record of dispatched events, queryable by topic and time
/// range.
#[async_trait]
pub trait TemporalLog: Send + Sync {
    async fn record(&self, event: &Event);

    /// Events recorded on `topic` (exact match) within `[since, until]`,
    /// most recent first.
    async fn query(&self, topic: &str, since: DateTime<Utc>, until: DateTime<Utc>) -> Vec<Event>;

    /// Replay stored events in the order they were recorded (oldest first),
    /// optionally filtered to a single topic. Used to rebuild state or
    /// re-feed a late subscriber (spec §4.E).
    async fn replay(&self, topic: Option<&str>) -> Vec<Event>;

    async fn len(&self) -> usize;
}

/// Fixed-capacity ring buffer of the most recently recorded events.
///
/// Not a substitute for a real temporal store: it has no disk persistence
/// and silently discards the oldest entry once `capacity` is reached.
pub struct InMemoryTemporalLog {
    capacity: usize,
    events: Mutex<VecDeque<Event>>,
}

impl InMemoryTemporalLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::new()),
        }
    }
}

#[async_trait]
impl TemporalLog for InMemoryTemporalLog {
    async fn record(&self, event: &Event) {
        let mut events = self.events.lock();
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event.clone());
    }

    async fn query(&self, topic: &str, since: DateTime<Utc>, until: DateTime<Utc>) -> Vec<Event> {
        let events = self.events.lock();
        events
            .iter()
            .rev()
            .filter(|event| event.topic == topic && event.timestamp >= since && event.timestamp <= until)
            .cloned()
            .collect()
    }

    async fn replay(&self, topic: Option<&str>) -> Vec<Event> {
        let events = self.events.lock();
        events
            .iter()
            .filter(|event| topic.map_or(true, |topic| event.topic == topic))
            .cloned()
            .collect()
    }

    async fn len(&self) -> usize {
        self.events.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn records_and_queries_by_topic_and_range() {
        let log = InMemoryTemporalLog::new(10);
        let event = Event::new("user.login").unwrap();
        log.record(&event).await;

        let now = Utc::now();
        let found = log.query("user.login", now - Duration::minutes(1), now + Duration::minutes(1)).await;
        assert_eq!(found.len(), 1);

        let missed = log.query("user.logout", now - Duration::minutes(1), now + Duration::minutes(1)).await;
        assert!(missed.is_empty());
    }

    #[tokio::test]
    async fn capacity_evicts_oldest() {
        let log = InMemoryTemporalLog::new(2);
        log.record(&Event::new("a").unwrap()).await;
        log.record(&Event::new("b").unwrap()).await;
        log.record(&Event::new("c").unwrap()).await;

        assert_eq!(log.len().await, 2);
    }

    #[tokio::test]
    async fn replay_returns_events_oldest_first_optionally_by_topic() {
        let log = InMemoryTemporalLog::new(10);
        log.record(&Event::new("a.created").unwrap()).await;
        log.record(&Event::new("b.created").unwrap()).await;
        log.record(&Event::new("a.created").unwrap()).await;

        let all = log.replay(None).await;
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].topic, "a.created");
        assert_eq!(all[1].topic, "b.created");

        let only_a = log.replay(Some("a.created")).await;
        assert_eq!(only_a.len(), 2);
        assert!(only_a.iter().all(|event| event.topic == "a.created"));
    }
}
