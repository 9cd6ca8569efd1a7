//! Optional in-process observer hook for decisions (§9.1): a low-cardinality
//! companion to `decision-log`'s durable sink, meant for metrics exporters.

use policy_core::model::Decision;
use std::sync::{Arc, OnceLock, RwLock};

/// Observer invoked for every decision the evaluator reaches, after the decision is
/// built but before it is handed to the decision logger. Implementations must be
/// cheap and non-blocking; this runs on the evaluation hot path.
pub trait DecisionObserver: Send + Sync {
    fn on_decision(&self, decision: &Decision);
}

static OBSERVER: OnceLock<RwLock<Option<Arc<dyn DecisionObserver>>>> = OnceLock::new();

/// Install or clear the process-global decision observer. Passing `None` clears it.
pub fn set_observer(observer: Option<Arc<dyn DecisionObserver>>) {
    let cell = OBSERVER.get_or_init(|| RwLock::new(None));
    *cell.write().expect("decision observer lock poisoned") = observer;
}

pub(crate) fn notify(decision: &Decision) {
    let Some(cell) = OBSERVER.get() else { return };
    if let Some(observer) = cell.read().expect("decision observer lock poisoned").as_ref() {
        observer.on_decision(decision);
    }
}
