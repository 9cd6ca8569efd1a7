//! Top-level policy evaluator: resolves applicable policies and orchestrates C1-C8
//! and C10 into one `evaluate()` entry point (C6, C9, §4.6, §4.9).

#![deny(unsafe_code)]

mod evaluator;
mod observer;
mod resolver;

pub use evaluator::{Evaluator, EVALUATOR_VERSION};
pub use observer::{set_observer, DecisionObserver};
pub use resolver::resolve_applicable_policies;
