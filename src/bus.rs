//! The bus façade: ties the registry, dispatcher, and optional seams
//! together into the public API (spec §2, §5).

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::config::BusConfig;
use crate::context::ContextEngine;
use crate::dispatcher::{DispatchOutcome, DispatchReport, Dispatcher};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::registry::{Registry, RegistryStats};
use crate::seams::{ClusterRelay, ReasoningHook, SemanticRouter, TemporalLog};
use crate::subscription::{Filter, FnHandler, Handler, RoutingMode, Subscription, SubscriptionId};

const CREATED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// Lifecycle state of a [`NeuroBus`] (spec §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    Created,
    Running,
    Stopped,
}

fn state_from_u8(value: u8) -> BusState {
    match value {
        CREATED => BusState::Created,
        RUNNING => BusState::Running,
        _ => BusState::Stopped,
    }
}

/// An in-process publish/subscribe event bus.
///
/// There is no global singleton; every caller owns its own instance, as
/// many as it needs (spec §9). Construct with [`NeuroBus::new`], or let
/// [`NeuroBus::run`]/[`NeuroBus::scoped`] manage the start/stop lifecycle.
pub struct NeuroBus {
    config: BusConfig,
    state: AtomicU8,
    registry: Arc<Registry>,
    dispatcher: Arc<Dispatcher>,
    context_engine: RwLock<Option<Arc<ContextEngine>>>,
    temporal_log: RwLock<Option<Arc<dyn TemporalLog>>>,
    cluster_relay: RwLock<Option<Arc<dyn ClusterRelay>>>,
    semantic_router: RwLock<Option<Arc<dyn SemanticRouter>>>,
    reasoning_hook: RwLock<Option<Arc<dyn ReasoningHook>>>,
}

impl Default for NeuroBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl NeuroBus {
    pub fn new(config: BusConfig) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(
            config.enable_parallel_dispatch,
            config.enable_error_isolation,
            config.handler_timeout(),
            config.dispatch_timeout(),
            config.max_concurrent_handlers,
        ));
        let registry = Arc::new(Registry::new(config.max_subscriptions));

        Self {
            config,
            state: AtomicU8::new(CREATED),
            registry,
            dispatcher,
            context_engine: RwLock::new(None),
            temporal_log: RwLock::new(None),
            cluster_relay: RwLock::new(None),
            semantic_router: RwLock::new(None),
            reasoning_hook: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn state(&self) -> BusState {
        state_from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Transition `Created -> Running`. Starting an already-running bus is a
    /// no-op; starting a stopped one is an error (spec §5).
    pub fn start(&self) -> Result<()> {
        match self
            .state
            .compare_exchange(CREATED, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => {
                tracing::info!(max_subscriptions = self.config.max_subscriptions, "bus started");
                Ok(())
            }
            Err(RUNNING) => Ok(()),
            Err(_) => Err(Error::BusAlreadyStopped),
        }
    }

    /// Transition `Running -> Stopped`.
    pub fn stop(&self) -> Result<()> {
        match self
            .state
            .compare_exchange(RUNNING, STOPPED, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => {
                tracing::info!("bus stopped");
                Ok(())
            }
            Err(STOPPED) => Err(Error::BusAlreadyStopped),
            Err(_) => Err(Error::BusNotStarted),
        }
    }

    /// Run `body` against a freshly started bus, stopping it afterward
    /// regardless of whether `body` succeeded.
    ///
    /// This is the guaranteed-cleanup equivalent of an async context
    /// manager: unlike [`ScopedBus`], whose `Drop` cannot await, this
    /// awaits `stop` directly.
    pub async fn run<F, Fut, R>(config: BusConfig, body: F) -> Result<R>
    where
        F: FnOnce(Arc<NeuroBus>) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let bus = Arc::new(NeuroBus::new(config));
        bus.start()?;
        let result = body(bus.clone()).await;
        let _ = bus.stop();
        result
    }

    /// Start a bus and wrap it in a guard that stops it on drop, best
    /// effort. Prefer [`NeuroBus::run`] when the caller can await cleanup;
    /// this exists for call sites that just need RAII scoping.
    pub fn scoped(config: BusConfig) -> Result<ScopedBus> {
        let bus = Arc::new(NeuroBus::new(config));
        bus.start()?;
        Ok(ScopedBus { bus })
    }

    /// Begin a fluent subscription. Terminate the chain with `.handler(...)`
    /// to register it (spec §3, §5).
    pub fn subscribe(&self, pattern: impl Into<String>) -> SubscribeBuilder<'_> {
        SubscribeBuilder {
            bus: self,
            pattern: pattern.into(),
            priority: 0,
            filter: None,
            mode: RoutingMode::LiteralOrWildcard,
            threshold: 0.75,
        }
    }

    fn register(&self, subscription: Subscription) -> Result<SubscriptionId> {
        if self.state() == BusState::Stopped {
            return Err(Error::BusAlreadyStopped);
        }
        self.registry.add(subscription).map(|sub| sub.id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.remove(id)
    }

    pub fn clear_subscriptions(&self) {
        self.registry.clear();
    }

    pub fn get_subscriptions(&self) -> Vec<Arc<Subscription>> {
        self.registry.get_all()
    }

    pub fn get_stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    pub fn enable_context_enrichment(&self, engine: Arc<ContextEngine>) -> &Self {
        *self.context_engine.write() = Some(engine);
        self
    }

    pub fn enable_temporal_log(&self, log: Arc<dyn TemporalLog>) -> &Self {
        *self.temporal_log.write() = Some(log);
        self
    }

    pub fn enable_cluster_relay(&self, relay: Arc<dyn ClusterRelay>) -> &Self {
        *self.cluster_relay.write() = Some(relay);
        self
    }

    pub fn enable_semantic(&self, router: Arc<dyn SemanticRouter>) -> &Self {
        *self.semantic_router.write() = Some(router);
        self
    }

    pub fn enable_reasoning_hook(&self, hook: Arc<dyn ReasoningHook>) -> &Self {
        *self.reasoning_hook.write() = Some(hook);
        self
    }

    /// Publish an event: enrich, log, relay, route, and dispatch it (spec
    /// §2, §4.C-§4.G).
    ///
    /// Returns as soon as the dispatch has been scheduled, not once every
    /// handler has run (spec §4.C point 6): the registry/semantic match,
    /// temporal log append, relay broadcast, and handler invocations all
    /// happen on a spawned task. Call [`PublishHandle::wait`] to observe the
    /// resulting [`DispatchReport`]. The one exception is
    /// `enable_error_isolation = false` (spec §7's testing-only escape
    /// hatch): there, `publish` awaits the dispatch itself so it can
    /// propagate the first handler failure to the caller, and the returned
    /// handle's report is already resolved.
    ///
    /// Fails with [`Error::BusNotStarted`] unless the bus is currently
    /// running.
    pub async fn publish(&self, event: Event) -> Result<PublishHandle> {
        if self.state() != BusState::Running {
            return Err(Error::BusNotStarted);
        }

        let event = self.enrich(event);
        let event_id = event.id;

        // The reasoning hook is fully decoupled from dispatch (spec §4.G):
        // it runs on its own task and its outcome never gates matching or
        // handler invocation.
        self.spawn_reasoning_hook(event.clone());

        let registry = self.registry.clone();
        let dispatcher = self.dispatcher.clone();
        let temporal_log = self.temporal_log.read().clone();
        let cluster_relay = self.cluster_relay.read().clone();
        let semantic_router = self.semantic_router.read().clone();

        let task = tokio::spawn(async move {
            if let Some(log) = temporal_log {
                log.record(&event).await;
            }
            if let Some(relay) = cluster_relay {
                if let Err(error) = relay.relay(&event).await {
                    let failure = Error::SeamFailure {
                        seam: "cluster_relay",
                        message: error.to_string(),
                    };
                    tracing::warn!(%failure, "seam failed, continuing with pre-relay event");
                }
            }

            let mut matched = registry.find_matches(&event);
            if let Some(router) = &semantic_router {
                matched.extend(semantic_matches(&registry, router.as_ref(), &event).await);
            }
            matched.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.sequence.cmp(&b.sequence)));

            tracing::debug!(topic = %event.topic, event_id = %event.id, matched = matched.len(), "dispatching event");

            let event = Arc::new(event);
            let report = dispatcher.dispatch(event, matched).await;
            if report.failed_count() > 0 {
                tracing::warn!(event_id = %report.event_id, failed = report.failed_count(), "some handlers failed");
            }
            report
        });

        if !self.config.enable_error_isolation {
            // The testing-only escape hatch: the dispatcher already stops at
            // the first failing/timed-out handler in this mode, and that
            // failure must be re-raised to the caller (spec §7), so we await
            // the dispatch here instead of handing back a pending handle.
            let report = task.await.map_err(|join_error| {
                Error::Other(anyhow::anyhow!("dispatch task panicked: {join_error}"))
            })?;

            if let Some(failure) = report.results.iter().find(|r| {
                matches!(r.outcome, DispatchOutcome::Failed(_) | DispatchOutcome::TimedOut)
            }) {
                let message = match &failure.outcome {
                    DispatchOutcome::Failed(message) => message.clone(),
                    DispatchOutcome::TimedOut => "handler timed out".to_string(),
                    _ => unreachable!(),
                };
                return Err(Error::HandlerFailure {
                    subscription: failure.subscription,
                    message,
                });
            }

            return Ok(PublishHandle {
                event_id,
                inner: PublishHandleInner::Ready(report),
            });
        }

        Ok(PublishHandle {
            event_id,
            inner: PublishHandleInner::Pending(task),
        })
    }

    fn enrich(&self, event: Event) -> Event {
        match self.context_engine.read().clone() {
            Some(engine) => engine.enrich_event(&event),
            None => event,
        }
    }

    /// Fire the reasoning hook off on its own task; its result (or failure)
    /// never feeds back into the dispatched event or gates `publish` (spec
    /// §4.G: "fully asynchronous; never blocks dispatch").
    fn spawn_reasoning_hook(&self, event: Event) {
        let Some(hook) = self.reasoning_hook.read().clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(error) = hook.annotate(&event).await {
                let failure = Error::SeamFailure {
                    seam: "reasoning_hook",
                    message: error.to_string(),
                };
                tracing::warn!(%failure, "seam failed");
            }
        });
    }
}

/// Resolves the subscriptions a semantic router seam matches for `event`,
/// keeping only those at or above each subscription's own threshold (spec
/// §4.G). A free function rather than a method so it can be moved into the
/// spawned dispatch task in [`NeuroBus::publish`] without borrowing `self`.
async fn semantic_matches(
    registry: &Registry,
    router: &dyn SemanticRouter,
    event: &Event,
) -> Vec<Arc<Subscription>> {
    let mut matches = Vec::new();
    for subscription in registry.semantic_subscriptions() {
        let score = router.score(&subscription.pattern, event).await;
        if score >= subscription.threshold {
            matches.push(subscription);
        }
    }
    matches
}

/// A handle to the dispatch `publish` scheduled (spec §4.C point 6).
///
/// By default this wraps a still-running task; call [`PublishHandle::wait`]
/// to await its [`DispatchReport`]. When `enable_error_isolation` is
/// disabled, `publish` already awaited the dispatch to decide whether to
/// propagate a handler failure, so the report here is already resolved and
/// `wait` returns immediately.
pub struct PublishHandle {
    event_id: Uuid,
    inner: PublishHandleInner,
}

enum PublishHandleInner {
    Pending(tokio::task::JoinHandle<DispatchReport>),
    Ready(DispatchReport),
}

impl PublishHandle {
    /// The id of the event this handle's dispatch was scheduled for.
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    /// Wait for the scheduled dispatch to finish and return its report.
    pub async fn wait(self) -> Result<DispatchReport> {
        match self.inner {
            PublishHandleInner::Pending(task) => task.await.map_err(|join_error| {
                Error::Other(anyhow::anyhow!("dispatch task panicked: {join_error}"))
            }),
            PublishHandleInner::Ready(report) => Ok(report),
        }
    }
}

/// Best-effort RAII scope returned by [`NeuroBus::scoped`].
///
/// `Drop` cannot run async code, so the guard flips the bus's state
/// directly rather than running any stop-time seam hooks. Use
/// [`NeuroBus::run`] when stop must be awaited.
pub struct ScopedBus {
    bus: Arc<NeuroBus>,
}

impl std::ops::Deref for ScopedBus {
    type Target = NeuroBus;

    fn deref(&self) -> &Self::Target {
        &self.bus
    }
}

impl Drop for ScopedBus {
    fn drop(&mut self) {
        let _ = self.bus.stop();
    }
}

/// Fluent subscription builder returned by [`NeuroBus::subscribe`].
pub struct SubscribeBuilder<'a> {
    bus: &'a NeuroBus,
    pattern: String,
    priority: i64,
    filter: Option<Arc<dyn Filter>>,
    mode: RoutingMode,
    threshold: f32,
}

impl<'a> SubscribeBuilder<'a> {
    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn filter(mut self, filter: impl Filter) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Route by the semantic router seam instead of topic matching (spec
    /// §4.G). Requires [`NeuroBus::enable_semantic`] to have been called for
    /// the subscription to ever fire.
    pub fn semantic(mut self) -> Self {
        self.mode = RoutingMode::Semantic;
        self
    }

    /// Minimum semantic similarity score required to fire. Ignored outside
    /// `semantic` mode.
    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Register the subscription with an async closure handler.
    pub fn handler<F, Fut>(self, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(&Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.handler_arc(Arc::new(FnHandler::new(handler)))
    }

    /// Register the subscription with a trait-object handler.
    pub fn handler_arc(self, handler: Arc<dyn Handler>) -> Result<SubscriptionId> {
        let subscription = Subscription::new(
            self.pattern,
            handler,
            self.filter,
            self.priority,
            self.mode,
            self.threshold,
        )?;
        self.bus.register(subscription)
    }
}
