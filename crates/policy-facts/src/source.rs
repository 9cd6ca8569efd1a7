//! Pluggable backing source for subject, resource, and derived facts.

use async_trait::async_trait;
use policy_core::error::PolicyError;
use policy_core::model::{ResourceFacts, SubjectFacts};
use policy_core::value::Value;

/// Fetches facts on a cache miss. Implementations talk to whatever system of record
/// backs subject/resource attributes (a user directory, an entity store, a derived
/// attribute computation); the provider in this crate only knows how to cache and
/// invalidate what this trait returns.
#[async_trait]
pub trait FactsSource: Send + Sync {
    /// Fetch the attribute snapshot for a principal within a tenant.
    async fn fetch_subject(
        &self,
        tenant_id: &str,
        principal_id: &str,
    ) -> Result<SubjectFacts, PolicyError>;

    /// Fetch the attribute snapshot for a resource within a tenant. `id` is `None` for
    /// type-level facts (e.g. module-wide defaults with no concrete instance).
    async fn fetch_resource(
        &self,
        tenant_id: &str,
        resource_type: &str,
        id: Option<&str>,
    ) -> Result<ResourceFacts, PolicyError>;

    /// Fetch a single derived/computed fact by an opaque key (e.g. `"org:acme:headcount"`).
    async fn fetch_derived(&self, tenant_id: &str, key: &str) -> Result<Value, PolicyError>;
}
