use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error, warn};

use crate::error::{EventError, Result};
use crate::types::{EventHandler, EventTag, LifecycleEvent};

/// Identifies one registration so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    tag: EventTag,
    handler: Arc<dyn EventHandler>,
}

/// Central registry and dispatcher for lifecycle events.
///
/// Share one instance across the process as `Arc<EventBus>`. Delivery is
/// synchronous: `publish` returns once every matching handler has run.
pub struct EventBus {
    /// Kept in subscription order; delivery walks it front to back.
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `handler` for every future publish of `tag`.
    pub fn subscribe(&self, tag: EventTag, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(handler = handler.name(), %tag, "handler subscribed");
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscription { id, tag, handler });
        id
    }

    /// Register `handler` for each tag in `tags`, in the order given.
    pub fn subscribe_all(
        &self,
        tags: &[EventTag],
        handler: Arc<dyn EventHandler>,
    ) -> Vec<SubscriptionId> {
        tags.iter()
            .map(|tag| self.subscribe(*tag, Arc::clone(&handler)))
            .collect()
    }

    /// Register a closure as a handler.
    pub fn subscribe_fn<F>(&self, tag: EventTag, name: &str, f: F) -> SubscriptionId
    where
        F: Fn(&LifecycleEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.subscribe(
            tag,
            Arc::new(FnHandler {
                name: name.to_string(),
                f,
            }),
        )
    }

    /// Remove a registration. Silent no-op if it is already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subs.len();
        subs.retain(|s| s.id != id);
        if subs.len() < before {
            debug!(?id, "handler unsubscribed");
        }
    }

    /// Number of handlers currently subscribed to `tag`.
    pub fn subscriber_count(&self, tag: EventTag) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.tag == tag)
            .count()
    }

    /// Deliver `event` to every subscriber of its tag, in subscription order.
    ///
    /// A failing or panicking handler is logged and skipped; the remaining
    /// handlers still run. Returns how many handlers completed successfully.
    pub fn publish(&self, event: LifecycleEvent) -> usize {
        let tag = event.tag();

        // Snapshot the matching handlers and release the lock before calling
        // them, so a handler may publish or subscribe re-entrantly.
        let handlers: Vec<Arc<dyn EventHandler>> = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.tag == tag)
            .map(|s| Arc::clone(&s.handler))
            .collect();

        if handlers.is_empty() {
            debug!(%tag, "event published with no subscribers");
            return 0;
        }

        let mut delivered = 0;
        for handler in handlers {
            match invoke(handler.as_ref(), &event) {
                Ok(()) => {
                    delivered += 1;
                    debug!(handler = handler.name(), %tag, "handler completed");
                }
                Err(EventError::Panicked(msg)) => {
                    error!(handler = handler.name(), %tag, panic = %msg, "handler panicked");
                }
                Err(e) => {
                    warn!(handler = handler.name(), %tag, error = %e, "handler failed");
                }
            }
        }
        delivered
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn invoke(handler: &dyn EventHandler, event: &LifecycleEvent) -> Result<()> {
    match catch_unwind(AssertUnwindSafe(|| handler.handle(event))) {
        Ok(result) => result,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(EventError::Panicked(msg))
        }
    }
}

struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&LifecycleEvent) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: &LifecycleEvent) -> Result<()> {
        (self.f)(event)
    }
}
