//! Subscriptions: a pattern bound to a handler, filter, priority, and mode.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::event::Event;
use crate::topic::{is_literal, validate_pattern};

/// Unique identifier of a live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a subscription's pattern is interpreted when matching an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMode {
    /// Literal or wildcard segment matching (spec §4.A).
    LiteralOrWildcard,
    /// Resolved by the semantic router seam (spec §4.G) instead of the registry.
    Semantic,
}

/// A future-returning event handler.
///
/// Both immediately-returning and suspending handlers are admissible: the
/// dispatcher always awaits whatever `handle` returns (spec §9).
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, event: &Event) -> Result<()>;
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Adapts a plain async closure into a [`Handler`].
pub struct FnHandler<F> {
    func: F,
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(&Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(&Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(&self, event: &Event) -> Result<()> {
        (self.func)(event).await
    }
}

/// A synchronous predicate over an event, used to gate handler invocation.
///
/// Filters may suspend, though the spec discourages it (§5); the simple
/// `Fn(&Event) -> bool` form covers the common case and is what
/// `SubscribeBuilder::filter` accepts.
pub trait Filter: Send + Sync + 'static {
    fn check(&self, event: &Event) -> bool;
}

impl<F> Filter for F
where
    F: Fn(&Event) -> bool + Send + Sync + 'static,
{
    fn check(&self, event: &Event) -> bool {
        self(event)
    }
}

/// The binding of a pattern, handler, filter, and priority (spec §3).
pub struct Subscription {
    pub id: SubscriptionId,
    pub pattern: String,
    pub mode: RoutingMode,
    pub priority: i64,
    pub threshold: f32,
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) filter: Option<Arc<dyn Filter>>,
    /// Monotonic insertion sequence; breaks priority ties stably (spec §4.B, §8).
    pub(crate) sequence: u64,
}

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

impl Subscription {
    pub(crate) fn new(
        pattern: String,
        handler: Arc<dyn Handler>,
        filter: Option<Arc<dyn Filter>>,
        priority: i64,
        mode: RoutingMode,
        threshold: f32,
    ) -> Result<Self> {
        if pattern.is_empty() {
            return Err(Error::EmptyPattern);
        }
        if mode == RoutingMode::LiteralOrWildcard {
            validate_pattern(&pattern)?;
        }
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidThreshold(threshold));
        }

        Ok(Self {
            id: SubscriptionId::new(),
            pattern,
            mode,
            priority,
            threshold,
            handler,
            filter,
            sequence: SEQUENCE.fetch_add(1, Ordering::Relaxed),
        })
    }

    /// Whether this subscription's pattern contains no wildcard segment.
    pub fn is_literal(&self) -> bool {
        is_literal(&self.pattern)
    }

    /// Exact string equality between this subscription's pattern and `topic`.
    pub fn matches_exact(&self, topic: &str) -> bool {
        self.pattern == topic
    }

    /// Evaluate the filter gate for `event`. A missing filter always passes.
    ///
    /// A filter that panics is not caught here — callers invoking this from
    /// the dispatcher wrap it so a panicking filter is treated as `false`
    /// rather than aborting the dispatch (spec §4.C point 1).
    pub fn should_handle(&self, event: &Event) -> bool {
        match &self.filter {
            Some(filter) => filter.check(event),
            None => true,
        }
    }

    /// Invoke the handler directly, bypassing the dispatcher's isolation and
    /// concurrency machinery. Used by tests and by callers composing their
    /// own dispatch loop.
    pub async fn handle_event(&self, event: &Event) -> Result<()> {
        self.handler.handle(event).await
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("pattern", &self.pattern)
            .field("mode", &self.mode)
            .field("priority", &self.priority)
            .finish()
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Subscription {}

impl std::hash::Hash for Subscription {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
