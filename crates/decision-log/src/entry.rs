//! The unit of record a `DecisionLogger` buffers and flushes (§4.10).

use policy_core::model::{Decision, PolicyInput, SubjectFacts};
use serde::Serialize;

/// One `(request, decision, subjectSnapshot?)` tuple, timestamped at the moment it was
/// handed to the logger (not at evaluation time — those can differ under backpressure).
#[derive(Debug, Clone, Serialize)]
pub struct DecisionLogEntry {
    pub tenant_id: String,
    pub request: PolicyInput,
    pub decision: Decision,
    pub subject_snapshot: Option<SubjectFacts>,
    pub logged_at_ms: u64,
}

/// Allow/deny counts for an operation over a time window (§4.10 read API).
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DecisionAggregate {
    pub allow_count: u64,
    pub deny_count: u64,
}
