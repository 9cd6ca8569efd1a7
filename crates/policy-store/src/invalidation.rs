//! Invalidation events and subscriber fan-out (§4.8).

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::RwLock;
use tracing::warn;

/// What changed. `RulesChanged` covers any edit to a version's rule set that doesn't
/// change its lifecycle status (`policy_published`/`policy_updated`/`policy_deleted`
/// cover the status transitions themselves).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationKind {
    PolicyPublished,
    PolicyUpdated,
    PolicyDeleted,
    RulesChanged,
}

/// `(tenantId, policyId, versionId?)` plus the kind of change (§4.8).
#[derive(Debug, Clone)]
pub struct InvalidationEvent {
    pub kind: InvalidationKind,
    pub tenant_id: String,
    pub policy_id: String,
    pub version_id: Option<String>,
}

/// Receives invalidation events fanned out by the store. Implementations should be
/// cheap and non-blocking (this hook runs synchronously on the publishing call).
pub trait InvalidationSubscriber: Send + Sync {
    fn on_invalidation(&self, event: &InvalidationEvent);
}

/// Registry of subscribers plus the evict-and-publish entry point. Held by the store
/// alongside its compiled cache so eviction and fan-out happen atomically from the
/// caller's point of view.
#[derive(Default)]
pub struct InvalidationBus {
    subscribers: RwLock<Vec<std::sync::Arc<dyn InvalidationSubscriber>>>,
}

impl InvalidationBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: std::sync::Arc<dyn InvalidationSubscriber>) {
        self.subscribers.write().expect("invalidation bus lock poisoned").push(subscriber);
    }

    /// Fan out `event` to every subscriber. A subscriber that panics is isolated: the
    /// panic is caught, logged, and the remaining subscribers still run.
    pub fn publish(&self, event: &InvalidationEvent) {
        let subs = self.subscribers.read().expect("invalidation bus lock poisoned");
        for sub in subs.iter() {
            let sub = sub.clone();
            let event = event.clone();
            if catch_unwind(AssertUnwindSafe(|| sub.on_invalidation(&event))).is_err() {
                warn!(
                    tenant_id = %event.tenant_id,
                    policy_id = %event.policy_id,
                    "invalidation subscriber panicked; isolated and continuing"
                );
            }
        }
    }
}
