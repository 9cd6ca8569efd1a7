//! Compiled-policy cache: `(tenantId, versionId) -> CompiledPolicy` with TTL (§4.8).

use crate::invalidation::{InvalidationBus, InvalidationEvent};
use crate::repository::PolicyRepository;
use dashmap::DashMap;
use policy_core::error::PolicyError;
use policy_core::ids::now_ms;
use policy_core::model::CompiledPolicy;
use std::time::{Duration, Instant};
use tracing::instrument;

struct CacheEntry {
    policy: CompiledPolicy,
    expires_at: Instant,
}

/// Default TTL for a compiled-policy cache entry (§4.8): five minutes.
pub const DEFAULT_COMPILED_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Caches [`CompiledPolicy`] values keyed by `(tenant_id, version_id)` and evicts on
/// invalidation events whose `(tenant_id, policy_id)` matches a cached entry's own
/// policy id. Two concurrent misses on the same key may both compile; the later
/// `dashmap` write simply overwrites the earlier one, which is safe because
/// compilation is pure (§5).
pub struct CompiledPolicyCache {
    entries: DashMap<(String, String), CacheEntry>,
    ttl: Duration,
}

impl CompiledPolicyCache {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: DashMap::new(), ttl }
    }

    pub fn get(&self, tenant_id: &str, version_id: &str) -> Option<CompiledPolicy> {
        let key = (tenant_id.to_string(), version_id.to_string());
        if let Some(entry) = self.entries.get(&key) {
            if entry.expires_at > Instant::now() {
                return Some(entry.policy.clone());
            }
        }
        self.entries.remove(&key);
        None
    }

    fn insert(&self, tenant_id: &str, version_id: &str, policy: CompiledPolicy) {
        let key = (tenant_id.to_string(), version_id.to_string());
        self.entries.insert(key, CacheEntry { policy, expires_at: Instant::now() + self.ttl });
    }

    /// Fetch the compiled form of `(tenant_id, policy_id, version_id)`, compiling via
    /// the repository's rules on a cache miss (§4.8 step 3 / §4.9 step 3).
    #[instrument(skip(self, repository), fields(tenant_id, policy_id, version_id))]
    pub async fn get_or_compile(
        &self,
        repository: &dyn PolicyRepository,
        tenant_id: &str,
        policy_id: &str,
        version_id: &str,
    ) -> Result<CompiledPolicy, PolicyError> {
        if let Some(hit) = self.get(tenant_id, version_id) {
            return Ok(hit);
        }
        let rules = repository.get_rules(tenant_id, version_id).await?;
        let (compiled, report) = policy_compiler::compile(policy_id, version_id, &rules, now_ms())?;
        if !report.diagnostics.is_empty() {
            tracing::debug!(
                excluded = report.excluded_rule_count,
                "policy compiled with excluded rules"
            );
        }
        self.insert(tenant_id, version_id, compiled.clone());
        Ok(compiled)
    }

    /// Evict every entry whose `(tenant_id, policy_id)` matches `event`, scoped further
    /// by `version_id` when the event names one (§4.8).
    pub fn evict_for(&self, event: &InvalidationEvent) {
        self.entries.retain(|(tenant_id, _version_id), entry| {
            let matches_tenant_and_policy =
                tenant_id == &event.tenant_id && entry.policy.policy_id == event.policy_id;
            if !matches_tenant_and_policy {
                return true;
            }
            match &event.version_id {
                Some(v) => entry.policy.version_id != *v,
                None => false,
            }
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Wires a [`CompiledPolicyCache`] to an [`InvalidationBus`] so published events evict
/// the cache before subscribers (e.g. the evaluator's own resolver caches) are notified.
pub struct InvalidatingCache {
    pub cache: CompiledPolicyCache,
    pub bus: InvalidationBus,
}

impl InvalidatingCache {
    pub fn new(ttl: Duration) -> Self {
        Self { cache: CompiledPolicyCache::new(ttl), bus: InvalidationBus::new() }
    }

    pub fn publish(&self, event: InvalidationEvent) {
        self.cache.evict_for(&event);
        self.bus.publish(&event);
    }
}
