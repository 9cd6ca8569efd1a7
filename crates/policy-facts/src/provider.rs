//! TTL-cached facts provider (C7, §4.7).

use crate::cache::TtlCache;
use crate::source::FactsSource;
use dashmap::DashMap;
use policy_core::error::PolicyError;
use policy_core::model::{ResourceFacts, SubjectFacts};
use policy_core::value::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::instrument;

/// TTLs and capacity for the three fact caches (§4.7): 60s for subjects, 30s for
/// resources, 10s for derived/computed facts.
#[derive(Debug, Clone, Copy)]
pub struct FactsCacheConfig {
    pub subject_ttl: Duration,
    pub resource_ttl: Duration,
    pub derived_ttl: Duration,
    pub max_entries_per_cache: usize,
}

impl Default for FactsCacheConfig {
    fn default() -> Self {
        Self {
            subject_ttl: Duration::from_secs(60),
            resource_ttl: Duration::from_secs(30),
            derived_ttl: Duration::from_secs(10),
            max_entries_per_cache: 10_000,
        }
    }
}

/// Resolves and caches subject/resource/derived facts in front of a [`FactsSource`].
/// Cache hits never reach the source; cache misses single-flight per key so that
/// concurrent callers asking for the same fact at the same instant share one fetch.
pub struct FactsProvider<S: FactsSource> {
    source: S,
    subjects: TtlCache<SubjectFacts>,
    resources: TtlCache<ResourceFacts>,
    derived: TtlCache<Value>,
    inflight: DashMap<String, Arc<AsyncMutex<()>>>,
}

fn subject_key(tenant_id: &str, principal_id: &str) -> String {
    format!("{tenant_id}:{principal_id}")
}

fn resource_key(tenant_id: &str, resource_type: &str, id: Option<&str>) -> String {
    format!("{tenant_id}:{resource_type}:{}", id.unwrap_or(""))
}

fn derived_key(tenant_id: &str, key: &str) -> String {
    format!("{tenant_id}:{key}")
}

impl<S: FactsSource> FactsProvider<S> {
    pub fn new(source: S, config: FactsCacheConfig) -> Self {
        Self {
            source,
            subjects: TtlCache::new(config.subject_ttl, config.max_entries_per_cache),
            resources: TtlCache::new(config.resource_ttl, config.max_entries_per_cache),
            derived: TtlCache::new(config.derived_ttl, config.max_entries_per_cache),
            inflight: DashMap::new(),
        }
    }

    #[instrument(skip(self), fields(tenant_id, principal_id))]
    pub async fn resolve_subject(
        &self,
        tenant_id: &str,
        principal_id: &str,
    ) -> Result<SubjectFacts, PolicyError> {
        let key = subject_key(tenant_id, principal_id);
        if let Some(hit) = self.subjects.get(&key) {
            return Ok(hit);
        }
        let guard_key = format!("subject:{key}");
        let guard_arc = self
            .inflight
            .entry(guard_key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _permit = guard_arc.lock().await;
        if let Some(hit) = self.subjects.get(&key) {
            self.inflight.remove(&guard_key);
            return Ok(hit);
        }
        let fetched = self.source.fetch_subject(tenant_id, principal_id).await?;
        self.subjects.insert(key, fetched.clone());
        if Arc::strong_count(&guard_arc) <= 2 {
            self.inflight.remove(&guard_key);
        }
        Ok(fetched)
    }

    #[instrument(skip(self), fields(tenant_id, resource_type))]
    pub async fn resolve_resource(
        &self,
        tenant_id: &str,
        resource_type: &str,
        id: Option<&str>,
    ) -> Result<ResourceFacts, PolicyError> {
        let key = resource_key(tenant_id, resource_type, id);
        if let Some(hit) = self.resources.get(&key) {
            return Ok(hit);
        }
        let guard_key = format!("resource:{key}");
        let guard_arc = self
            .inflight
            .entry(guard_key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _permit = guard_arc.lock().await;
        if let Some(hit) = self.resources.get(&key) {
            self.inflight.remove(&guard_key);
            return Ok(hit);
        }
        let fetched = self.source.fetch_resource(tenant_id, resource_type, id).await?;
        self.resources.insert(key, fetched.clone());
        if Arc::strong_count(&guard_arc) <= 2 {
            self.inflight.remove(&guard_key);
        }
        Ok(fetched)
    }

    pub async fn resolve_derived(&self, tenant_id: &str, key: &str) -> Result<Value, PolicyError> {
        let cache_key = derived_key(tenant_id, key);
        if let Some(hit) = self.derived.get(&cache_key) {
            return Ok(hit);
        }
        let guard_key = format!("derived:{cache_key}");
        let guard_arc = self
            .inflight
            .entry(guard_key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _permit = guard_arc.lock().await;
        if let Some(hit) = self.derived.get(&cache_key) {
            self.inflight.remove(&guard_key);
            return Ok(hit);
        }
        let fetched = self.source.fetch_derived(tenant_id, key).await?;
        self.derived.insert(cache_key, fetched.clone());
        if Arc::strong_count(&guard_arc) <= 2 {
            self.inflight.remove(&guard_key);
        }
        Ok(fetched)
    }

    /// Resolve subject and resource facts concurrently (§4.7): both fetches run via
    /// `tokio::join!` so a cold cache on both sides costs one round trip, not two.
    #[instrument(skip(self), fields(tenant_id, principal_id, resource_type))]
    pub async fn resolve_facts(
        &self,
        tenant_id: &str,
        principal_id: &str,
        resource_type: &str,
        resource_id: Option<&str>,
    ) -> Result<(SubjectFacts, ResourceFacts), PolicyError> {
        let (subject, resource) = tokio::join!(
            self.resolve_subject(tenant_id, principal_id),
            self.resolve_resource(tenant_id, resource_type, resource_id)
        );
        Ok((subject?, resource?))
    }

    pub fn invalidate_subject(&self, tenant_id: &str, principal_id: &str) {
        self.subjects.invalidate(&subject_key(tenant_id, principal_id));
    }

    pub fn invalidate_resource(&self, tenant_id: &str, resource_type: &str, id: Option<&str>) {
        self.resources.invalidate(&resource_key(tenant_id, resource_type, id));
    }

    pub fn invalidate_derived(&self, tenant_id: &str, key: &str) {
        self.derived.invalidate(&derived_key(tenant_id, key));
    }

    /// Spawn a background task that sweeps expired entries out of all three caches
    /// every `period`. Bounds memory for a cache that fills up and then stops being
    /// read; purely an optimization over the lazy on-read/at-capacity sweep.
    pub fn spawn_periodic_eviction(self: Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()>
    where
        S: 'static,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                self.subjects.sweep_expired();
                self.resources.sweep_expired();
                self.derived.sweep_expired();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use policy_core::model::PrincipalType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        subject_calls: AtomicUsize,
    }

    #[async_trait]
    impl FactsSource for CountingSource {
        async fn fetch_subject(
            &self,
            _tenant_id: &str,
            principal_id: &str,
        ) -> Result<SubjectFacts, PolicyError> {
            self.subject_calls.fetch_add(1, Ordering::SeqCst);
            Ok(SubjectFacts {
                principal_id: principal_id.to_string(),
                principal_type: PrincipalType::User,
                roles: vec![],
                groups: vec![],
                org_unit: None,
                attributes: Default::default(),
                generated_at_ms: 0,
            })
        }

        async fn fetch_resource(
            &self,
            _tenant_id: &str,
            resource_type: &str,
            id: Option<&str>,
        ) -> Result<ResourceFacts, PolicyError> {
            Ok(ResourceFacts {
                resource_type: resource_type.to_string(),
                id: id.map(str::to_string),
                version_id: None,
                module: None,
                owner_id: None,
                attributes: Default::default(),
            })
        }

        async fn fetch_derived(&self, _tenant_id: &str, key: &str) -> Result<Value, PolicyError> {
            Ok(Value::from(key))
        }
    }

    #[tokio::test]
    async fn cache_hit_skips_source() {
        let provider = FactsProvider::new(
            CountingSource { subject_calls: AtomicUsize::new(0) },
            FactsCacheConfig::default(),
        );
        provider.resolve_subject("tenant-1", "user-1").await.unwrap();
        provider.resolve_subject("tenant-1", "user-1").await.unwrap();
        assert_eq!(provider.source.subject_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let provider = FactsProvider::new(
            CountingSource { subject_calls: AtomicUsize::new(0) },
            FactsCacheConfig::default(),
        );
        provider.resolve_subject("tenant-1", "user-1").await.unwrap();
        provider.invalidate_subject("tenant-1", "user-1");
        provider.resolve_subject("tenant-1", "user-1").await.unwrap();
        assert_eq!(provider.source.subject_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn resolve_facts_runs_concurrently_and_succeeds() {
        let provider = FactsProvider::new(
            CountingSource { subject_calls: AtomicUsize::new(0) },
            FactsCacheConfig::default(),
        );
        let (subject, resource) =
            provider.resolve_facts("tenant-1", "user-1", "document", Some("doc-1")).await.unwrap();
        assert_eq!(subject.principal_id, "user-1");
        assert_eq!(resource.id.as_deref(), Some("doc-1"));
    }
}
