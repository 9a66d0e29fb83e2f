//! Dispatches a matched event to its subscriptions: filtering, ordering,
//! concurrency, isolation, and timeouts (spec §4.C).

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::time::timeout as tokio_timeout;

use crate::event::Event;
use crate::subscription::{Subscription, SubscriptionId};

/// Outcome of a single handler invocation.
#[derive(Debug, Clone, Serialize)]
pub enum DispatchOutcome {
    /// The handler ran to completion without error.
    Completed,
    /// The filter rejected the event; the handler was never invoked.
    Filtered,
    /// The handler did not finish within `handler_timeout`.
    TimedOut,
    /// The handler returned an error or panicked.
    Failed(String),
}

/// Per-handler result, keyed by subscription, in dispatch order.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerResult {
    pub subscription: SubscriptionId,
    pub outcome: DispatchOutcome,
}

/// Summary of dispatching one event to all of its matched subscriptions
/// (spec §4.C, §6).
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub event_id: uuid::Uuid,
    pub matched: usize,
    pub results: Vec<HandlerResult>,
    pub timed_out: bool,
}

impl DispatchReport {
    pub fn completed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, DispatchOutcome::Completed))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, DispatchOutcome::Failed(_)))
            .count()
    }
}

/// Runs matched subscriptions against an event under the configured
/// concurrency, isolation, and timeout policy.
///
/// Grounded on the teacher's message-loop dispatch in `hub.rs`, generalized
/// from a single correlated RPC reply to a fan-out over many independent
/// handlers.
pub struct Dispatcher {
    parallel: bool,
    error_isolation: bool,
    handler_timeout: Duration,
    dispatch_timeout: Duration,
    semaphore: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(
        parallel: bool,
        error_isolation: bool,
        handler_timeout: Duration,
        dispatch_timeout: Duration,
        max_concurrent_handlers: usize,
    ) -> Self {
        Self {
            parallel,
            error_isolation,
            handler_timeout,
            dispatch_timeout,
            semaphore: Arc::new(Semaphore::new(max_concurrent_handlers.max(1))),
        }
    }

    /// Dispatch `event` to `subscriptions`, already sorted by priority.
    ///
    /// When `error_isolation` is off, the first failing or timed-out handler
    /// stops the dispatch; any remaining handlers are never attempted and do
    /// not appear in the returned results at all. When it's on (the
    /// default), every subscription is attempted regardless of earlier
    /// failures (spec §4.C point 1, §8 isolation law).
    pub async fn dispatch(
        &self,
        event: Arc<Event>,
        subscriptions: Vec<Arc<Subscription>>,
    ) -> DispatchReport {
        let matched = subscriptions.len();
        let run = self.run_all(event.clone(), subscriptions);

        let (results, timed_out) = match tokio_timeout(self.dispatch_timeout, run).await {
            Ok(results) => (results, false),
            Err(_) => (Vec::new(), true),
        };

        DispatchReport {
            event_id: event.id,
            matched,
            results,
            timed_out,
        }
    }

    async fn run_all(
        &self,
        event: Arc<Event>,
        subscriptions: Vec<Arc<Subscription>>,
    ) -> Vec<HandlerResult> {
        if self.parallel {
            self.run_parallel(event, subscriptions).await
        } else {
            self.run_sequential(event, subscriptions).await
        }
    }

    async fn run_sequential(
        &self,
        event: Arc<Event>,
        subscriptions: Vec<Arc<Subscription>>,
    ) -> Vec<HandlerResult> {
        let mut results = Vec::with_capacity(subscriptions.len());
        for subscription in subscriptions {
            let subscription_id = subscription.id;
            let outcome = self.run_one(event.clone(), subscription).await;
            let stop = !self.error_isolation && matches!(outcome, DispatchOutcome::Failed(_) | DispatchOutcome::TimedOut);
            results.push(HandlerResult {
                subscription: subscription_id,
                outcome,
            });
            if stop {
                break;
            }
        }
        results
    }

    async fn run_parallel(
        &self,
        event: Arc<Event>,
        subscriptions: Vec<Arc<Subscription>>,
    ) -> Vec<HandlerResult> {
        let mut ids = Vec::with_capacity(subscriptions.len());
        let mut handles = Vec::with_capacity(subscriptions.len());
        for subscription in subscriptions {
            let event = event.clone();
            let semaphore = self.semaphore.clone();
            let handler_timeout = self.handler_timeout;
            ids.push(subscription.id);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closes");
                run_handler(&event, &subscription, handler_timeout).await
            }));
        }

        futures::future::join_all(handles)
            .await
            .into_iter()
            .zip(ids)
            .map(|(joined, subscription)| {
                let outcome = match joined {
                    Ok(outcome) => outcome,
                    Err(join_error) => DispatchOutcome::Failed(format!("handler task panicked: {join_error}")),
                };
                HandlerResult { subscription, outcome }
            })
            .collect()
    }

    async fn run_one(&self, event: Arc<Event>, subscription: Arc<Subscription>) -> DispatchOutcome {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("semaphore never closes");
        run_handler(&event, &subscription, self.handler_timeout).await
    }
}

async fn run_handler(
    event: &Event,
    subscription: &Subscription,
    handler_timeout: Duration,
) -> DispatchOutcome {
    let should_handle = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        subscription.should_handle(event)
    }));
    match should_handle {
        Ok(true) => {}
        Ok(false) => return DispatchOutcome::Filtered,
        Err(_) => {
            tracing::warn!(subscription = %subscription.id, "filter panicked, treating as false");
            return DispatchOutcome::Filtered;
        }
    }

    match tokio_timeout(handler_timeout, subscription.handle_event(event)).await {
        Ok(Ok(())) => DispatchOutcome::Completed,
        Ok(Err(error)) => {
            tracing::warn!(subscription = %subscription.id, %error, "handler failed");
            DispatchOutcome::Failed(error.to_string())
        }
        Err(_) => {
            tracing::warn!(subscription = %subscription.id, timeout = ?handler_timeout, "handler timed out");
            DispatchOutcome::TimedOut
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::{FnHandler, Handler, RoutingMode};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sub(priority: i64, handler: Arc<dyn Handler>) -> Arc<Subscription> {
        Arc::new(
            Subscription::new(
                "test".into(),
                handler,
                None,
                priority,
                RoutingMode::LiteralOrWildcard,
                0.75,
            )
            .unwrap(),
        )
    }

    fn ok_handler() -> Arc<dyn Handler> {
        Arc::new(FnHandler::new(|_: &Event| async { Ok(()) }))
    }

    fn failing_handler() -> Arc<dyn Handler> {
        Arc::new(FnHandler::new(|_: &Event| async {
            Err(crate::Error::Other(anyhow::anyhow!("boom")))
        }))
    }

    #[tokio::test]
    async fn dispatches_to_all_matches_and_reports_completed() {
        let dispatcher = Dispatcher::new(true, true, Duration::from_secs(1), Duration::from_secs(5), 8);
        let event = Arc::new(Event::new("test").unwrap());
        let subs = vec![sub(0, ok_handler()), sub(0, ok_handler())];

        let report = dispatcher.dispatch(event, subs).await;
        assert_eq!(report.matched, 2);
        assert_eq!(report.completed_count(), 2);
        assert!(!report.timed_out);
    }

    #[tokio::test]
    async fn error_isolation_lets_other_handlers_run() {
        let order = Arc::new(AtomicUsize::new(0));
        let recorder = order.clone();
        let recording_handler: Arc<dyn Handler> = Arc::new(FnHandler::new(move |_: &Event| {
            let recorder = recorder.clone();
            async move {
                recorder.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));

        let dispatcher = Dispatcher::new(false, true, Duration::from_secs(1), Duration::from_secs(5), 8);
        let event = Arc::new(Event::new("test").unwrap());
        let subs = vec![sub(100, failing_handler()), sub(50, recording_handler)];

        let report = dispatcher.dispatch(event, subs).await;
        assert_eq!(report.failed_count(), 1);
        assert_eq!(order.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn without_isolation_stops_at_first_failure() {
        let order = Arc::new(AtomicUsize::new(0));
        let recorder = order.clone();
        let recording_handler: Arc<dyn Handler> = Arc::new(FnHandler::new(move |_: &Event| {
            let recorder = recorder.clone();
            async move {
                recorder.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));

        let dispatcher = Dispatcher::new(false, false, Duration::from_secs(1), Duration::from_secs(5), 8);
        let event = Arc::new(Event::new("test").unwrap());
        let subs = vec![sub(100, failing_handler()), sub(50, recording_handler)];

        let report = dispatcher.dispatch(event, subs).await;
        assert_eq!(report.results.len(), 1);
        assert_eq!(order.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn filtered_subscription_never_invokes_handler() {
        let invoked = Arc::new(AtomicUsize::new(0));
        let recorder = invoked.clone();
        let handler: Arc<dyn Handler> = Arc::new(FnHandler::new(move |_: &Event| {
            let recorder = recorder.clone();
            async move {
                recorder.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));
        let subscription = Subscription::new(
            "test".into(),
            handler,
            Some(Arc::new(|_: &Event| false)),
            0,
            RoutingMode::LiteralOrWildcard,
            0.75,
        )
        .unwrap();

        let dispatcher = Dispatcher::new(true, true, Duration::from_secs(1), Duration::from_secs(5), 8);
        let event = Arc::new(Event::new("test").unwrap());
        let report = dispatcher.dispatch(event, vec![Arc::new(subscription)]).await;

        assert!(matches!(report.results[0].outcome, DispatchOutcome::Filtered));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn slow_handler_times_out() {
        let slow_handler: Arc<dyn Handler> = Arc::new(FnHandler::new(|_: &Event| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        }));
        let dispatcher = Dispatcher::new(
            true,
            true,
            Duration::from_millis(5),
            Duration::from_secs(5),
            8,
        );
        let event = Arc::new(Event::new("test").unwrap());
        let report = dispatcher.dispatch(event, vec![sub(0, slow_handler)]).await;

        assert!(matches!(report.results[0].outcome, DispatchOutcome::TimedOut));
    }

    #[tokio::test]
    async fn panicking_filter_is_treated_as_false_in_sequential_mode() {
        let invoked = Arc::new(AtomicUsize::new(0));
        let recorder = invoked.clone();
        let handler: Arc<dyn Handler> = Arc::new(FnHandler::new(move |_: &Event| {
            let recorder = recorder.clone();
            async move {
                recorder.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));
        let subscription = Subscription::new(
            "test".into(),
            handler,
            Some(Arc::new(|_: &Event| panic!("filter exploded"))),
            0,
            RoutingMode::LiteralOrWildcard,
            0.75,
        )
        .unwrap();

        let dispatcher = Dispatcher::new(false, true, Duration::from_secs(1), Duration::from_secs(5), 8);
        let event = Arc::new(Event::new("test").unwrap());
        let report = dispatcher.dispatch(event, vec![Arc::new(subscription)]).await;

        assert!(matches!(report.results[0].outcome, DispatchOutcome::Filtered));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }
}
