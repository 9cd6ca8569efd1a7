//! Decision observer bridging `policy-engine`'s process-global observer hook to
//! OTel metrics (feature-gated via `otel`). Always counts in-process via plain
//! atomics so tests can assert on it without an exporter.

use policy_core::model::{Decision, Effect};
use policy_engine::DecisionObserver;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

#[cfg(feature = "otel")]
use crate::metrics::{init_decision_instruments, DecisionInstruments};

static ALLOW_ACC: AtomicU64 = AtomicU64::new(0);
static DENY_ACC: AtomicU64 = AtomicU64::new(0);

#[cfg(feature = "otel")]
static INSTR: OnceLock<DecisionInstruments> = OnceLock::new();

#[cfg(feature = "otel")]
fn ensure_instruments() -> &'static DecisionInstruments {
    INSTR.get_or_init(init_decision_instruments)
}

/// OTel-backed observer for decisions, installable via `policy_engine::set_observer`.
#[derive(Clone, Copy, Debug, Default)]
pub struct OtelDecisionObserver;

impl DecisionObserver for OtelDecisionObserver {
    fn on_decision(&self, decision: &Decision) {
        match decision.effect {
            Effect::Allow => {
                let _ = ALLOW_ACC.fetch_add(1, Ordering::Relaxed);
            }
            Effect::Deny => {
                let _ = DENY_ACC.fetch_add(1, Ordering::Relaxed);
            }
        }

        #[cfg(feature = "otel")]
        {
            use opentelemetry::KeyValue;
            let inst = ensure_instruments();
            inst.decisions.add(1, &[KeyValue::new("effect", decision.effect.as_str())]);
        }
    }
}

static INSTANCE: OnceLock<Arc<dyn DecisionObserver>> = OnceLock::new();

/// Returns the shared instance suitable for `policy_engine::set_observer()`.
pub fn global() -> Arc<dyn DecisionObserver> {
    INSTANCE.get_or_init(|| Arc::new(OtelDecisionObserver) as Arc<dyn DecisionObserver>).clone()
}

/// In-process mirrors for tests: `(allow_total, deny_total)`.
pub fn snapshot_counters() -> (u64, u64) {
    (ALLOW_ACC.load(Ordering::Relaxed), DENY_ACC.load(Ordering::Relaxed))
}
