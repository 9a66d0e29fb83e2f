//! Seam for letting an external reasoning system observe and annotate
//! events before dispatch (spec §4.G).
//!
//! Talking to a real language model is out of scope (spec Non-goals); this
//! module is the trait boundary plus a scripted mock connector for tests
//! and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::Result;
use crate::event::Event;

/// A connection to an external reasoning system (an LLM, in production).
#[async_trait]
pub trait LlmConnector: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Observes an event and may attach annotations to it before it is
/// dispatched to subscriptions.
#[async_trait]
pub trait ReasoningHook: Send + Sync {
    /// Returns the annotations to merge into the event's metadata, or an
    /// empty map to leave it untouched.
    async fn annotate(&self, event: &Event) -> Result<HashMap<String, Value>>;
}

/// A scripted [`LlmConnector`] for tests: returns a fixed response, or
/// responses keyed by exact prompt match, falling back to an echo.
pub struct MockLlmConnector {
    scripted: Mutex<HashMap<String, String>>,
    default_response: String,
}

impl MockLlmConnector {
    pub fn new(default_response: impl Into<String>) -> Self {
        Self {
            scripted: Mutex::new(HashMap::new()),
            default_response: default_response.into(),
        }
    }

    pub fn script(&self, prompt: impl Into<String>, response: impl Into<String>) {
        self.scripted.lock().insert(prompt.into(), response.into());
    }
}

#[async_trait]
impl LlmConnector for MockLlmConnector {
    async fn complete(&self, prompt: &str) -> Result<String> {
        Ok(self
            .scripted
            .lock()
            .get(prompt)
            .cloned()
            .unwrap_or_else(|| self.default_response.clone()))
    }
}

/// A reasoning hook that classifies an event's urgency by asking its
/// connector a fixed prompt template, recording the raw reply under
/// `reasoning.urgency` in the event's metadata.
pub struct UrgencyReasoningHook<C> {
    connector: C,
}

impl<C: LlmConnector> UrgencyReasoningHook<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl<C: LlmConnector + Send + Sync> ReasoningHook for UrgencyReasoningHook<C> {
    async fn annotate(&self, event: &Event) -> Result<HashMap<String, Value>> {
        let prompt = format!("Rate the urgency of event on topic '{}' as low, medium, or high.", event.topic);
        let reply = self.connector.complete(&prompt).await?;

        let mut annotations = HashMap::new();
        annotations.insert("reasoning.urgency".to_string(), Value::from(reply));
        Ok(annotations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_connector_returns_default_when_unscripted() {
        let connector = MockLlmConnector::new("ok");
        assert_eq!(connector.complete("anything").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn mock_connector_returns_scripted_response() {
        let connector = MockLlmConnector::new("ok");
        connector.script("ping", "pong");
        assert_eq!(connector.complete("ping").await.unwrap(), "pong");
    }

    #[tokio::test]
    async fn urgency_hook_annotates_from_connector_reply() {
        let connector = MockLlmConnector::new("low");
        let hook = UrgencyReasoningHook::new(connector);

        let event = Event::new("system.heartbeat").unwrap();
        let annotations = hook.annotate(&event).await.unwrap();

        assert_eq!(annotations.get("reasoning.urgency"), Some(&Value::from("low")));
    }
}
