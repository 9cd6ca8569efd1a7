//! Policy repository access, compiled-policy caching, and hot-reload invalidation
//! (C8, §4.8). Repository reads and cache misses are I/O-bearing (`async`); the cache
//! itself is a plain concurrent map with no suspension on a hit.

#![deny(unsafe_code)]

mod compiled_cache;
mod invalidation;
mod repository;

pub use compiled_cache::{CompiledPolicyCache, InvalidatingCache, DEFAULT_COMPILED_CACHE_TTL};
pub use invalidation::{InvalidationBus, InvalidationEvent, InvalidationKind, InvalidationSubscriber};
pub use repository::{InMemoryPolicyRepository, PolicyRecord, PolicyRepository};
