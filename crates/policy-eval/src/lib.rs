//! Condition AST evaluation, rule matching, determinism comparator, and conflict
//! resolution (C1-C4). Everything in this crate is synchronous and CPU-bound per §5 —
//! no I/O, no async, so it composes cleanly inside both sync and async callers.

#![deny(unsafe_code)]

pub mod comparator;
pub mod condition;
pub mod context;
pub mod matcher;
mod regex_cache;
pub mod resolver;

pub use comparator::compare_rules;
pub use condition::evaluate;
pub use context::EvalContext;
pub use resolver::{resolve, Candidate, Resolution};
