//! The event type: an immutable record with identity, lineage, payload, and context.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};

/// A string-keyed bag of arbitrary JSON-compatible values.
pub type DataMap = HashMap<String, Value>;

/// An immutable event flowing through the bus.
///
/// Construct with [`Event::new`]; events are never mutated in place once
/// built. Derived copies (`with_context`, `child`) always produce a new
/// value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub topic: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: DataMap,
    #[serde(default)]
    pub context: DataMap,
    #[serde(default)]
    pub metadata: DataMap,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

impl Event {
    /// Create a new event on `topic`. Fails if `topic` is empty.
    pub fn new(topic: impl Into<String>) -> Result<Self> {
        Self::builder(topic).build()
    }

    /// Start a builder for more elaborate event construction.
    pub fn builder(topic: impl Into<String>) -> EventBuilder {
        EventBuilder::new(topic)
    }

    /// Return a copy of this event with `pairs` merged into its context.
    ///
    /// The original event is left unchanged; on conflict the new pairs win.
    pub fn with_context<I, K, V>(&self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut context = self.context.clone();
        for (k, v) in pairs {
            context.insert(k.into(), v.into());
        }
        Self {
            context,
            ..self.clone()
        }
    }

    /// Create a child event correlated to this one.
    ///
    /// The child inherits this event's context, is stamped with a fresh
    /// id/timestamp, and records `parent_id = self.id` (spec §3, §8).
    pub fn child(&self, topic: impl Into<String>) -> Result<Self> {
        Self::builder(topic)
            .context(self.context.clone())
            .parent_id(self.id)
            .build()
    }

    /// Serialize to the wire shape described in spec §6.
    pub fn to_dict(&self) -> Value {
        serde_json::to_value(self).expect("Event always serializes")
    }

    /// Deserialize from the wire shape, tolerating missing optional fields.
    ///
    /// `id` and `timestamp` are regenerated if absent, matching the
    /// original's `from_dict` behavior.
    pub fn from_dict(mut value: Value) -> Result<Self> {
        let obj = value
            .as_object_mut()
            .ok_or_else(|| Error::Other(anyhow::anyhow!("event payload must be a JSON object")))?;

        if !obj.contains_key("id") {
            obj.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        }
        if !obj.contains_key("timestamp") {
            obj.insert(
                "timestamp".into(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }

        let topic = obj
            .get("topic")
            .and_then(Value::as_str)
            .ok_or(Error::EmptyTopic)?;
        if topic.is_empty() {
            return Err(Error::EmptyTopic);
        }

        serde_json::from_value(value).map_err(Error::from)
    }
}

/// Builder for [`Event`], used by `Event::new`/`Event::builder` and by the
/// context-enrichment seam when constructing enriched copies.
pub struct EventBuilder {
    topic: String,
    data: DataMap,
    context: DataMap,
    metadata: DataMap,
    parent_id: Option<Uuid>,
    id: Option<Uuid>,
    timestamp: Option<DateTime<Utc>>,
}

impl EventBuilder {
    fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            data: DataMap::new(),
            context: DataMap::new(),
            metadata: DataMap::new(),
            parent_id: None,
            id: None,
            timestamp: None,
        }
    }

    pub fn data(mut self, data: DataMap) -> Self {
        self.data = data;
        self
    }

    pub fn context(mut self, context: DataMap) -> Self {
        self.context = context;
        self
    }

    pub fn metadata(mut self, metadata: DataMap) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn parent_id(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn build(self) -> Result<Event> {
        if self.topic.is_empty() {
            return Err(Error::EmptyTopic);
        }
        Ok(Event {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            topic: self.topic,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            data: self.data,
            context: self.context,
            metadata: self.metadata,
            parent_id: self.parent_id,
        })
    }
}
