//! `DecisionSink`: the opaque destination a `DecisionLogger` flushes into (§4.10).

use crate::entry::{DecisionAggregate, DecisionLogEntry};
use async_trait::async_trait;
use policy_core::error::PolicyError;
use std::sync::Mutex;

/// Durable (or test) destination for flushed decision log batches. `write_batch` is
/// all-or-nothing from the logger's perspective: a failure means the whole batch is
/// retried (or dropped after the retry budget is exhausted), never partially applied.
#[async_trait]
pub trait DecisionSink: Send + Sync {
    async fn write_batch(&self, entries: &[DecisionLogEntry]) -> Result<(), PolicyError>;
}

/// Optional read surface a persistent sink may additionally implement (§4.10: "when
/// backed by a persistent sink").
#[async_trait]
pub trait DecisionQuery: Send + Sync {
    async fn recent_by_principal(
        &self,
        tenant_id: &str,
        principal_id: &str,
        limit: usize,
    ) -> Result<Vec<DecisionLogEntry>, PolicyError>;

    async fn by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Option<DecisionLogEntry>, PolicyError>;

    async fn aggregate(
        &self,
        tenant_id: &str,
        operation_full_code: &str,
        window_start_ms: u64,
        window_end_ms: u64,
    ) -> Result<DecisionAggregate, PolicyError>;
}

/// In-memory sink for tests and the offline CLI. Keeps every flushed entry in a
/// process-local `Vec`; not meant for production volume.
#[derive(Default)]
pub struct InMemorySink {
    entries: Mutex<Vec<DecisionLogEntry>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<DecisionLogEntry> {
        self.entries.lock().expect("decision sink lock poisoned").clone()
    }
}

#[async_trait]
impl DecisionSink for InMemorySink {
    async fn write_batch(&self, batch: &[DecisionLogEntry]) -> Result<(), PolicyError> {
        self.entries.lock().expect("decision sink lock poisoned").extend_from_slice(batch);
        Ok(())
    }
}

#[async_trait]
impl DecisionQuery for InMemorySink {
    async fn recent_by_principal(
        &self,
        tenant_id: &str,
        principal_id: &str,
        limit: usize,
    ) -> Result<Vec<DecisionLogEntry>, PolicyError> {
        let guard = self.entries.lock().expect("decision sink lock poisoned");
        Ok(guard
            .iter()
            .rev()
            .filter(|e| e.tenant_id == tenant_id && e.request.subject.principal_id == principal_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Option<DecisionLogEntry>, PolicyError> {
        let guard = self.entries.lock().expect("decision sink lock poisoned");
        Ok(guard
            .iter()
            .find(|e| e.request.context.correlation_id.as_deref() == Some(correlation_id))
            .cloned())
    }

    async fn aggregate(
        &self,
        tenant_id: &str,
        operation_full_code: &str,
        window_start_ms: u64,
        window_end_ms: u64,
    ) -> Result<DecisionAggregate, PolicyError> {
        let guard = self.entries.lock().expect("decision sink lock poisoned");
        let mut agg = DecisionAggregate::default();
        for entry in guard.iter() {
            if entry.tenant_id != tenant_id {
                continue;
            }
            if entry.request.action.full_code() != operation_full_code {
                continue;
            }
            if entry.logged_at_ms < window_start_ms || entry.logged_at_ms > window_end_ms {
                continue;
            }
            if entry.decision.allowed {
                agg.allow_count += 1;
            } else {
                agg.deny_count += 1;
            }
        }
        Ok(agg)
    }
}
