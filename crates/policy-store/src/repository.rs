//! `PolicyRepository`: the read surface the store compiles against (§4.8).

use async_trait::async_trait;
use policy_core::error::PolicyError;
use policy_core::model::{Policy, PolicyVersion, Rule, VersionStatus};
use policy_core::selection::VersionSelection;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Read access to policies, versions, and rules. Implementations may be backed by a
/// database, a config-as-code bundle, or (for tests and the CLI) an in-memory map.
#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn get_policy(&self, tenant_id: &str, policy_id: &str) -> Result<Option<Policy>, PolicyError>;

    async fn get_version(
        &self,
        tenant_id: &str,
        policy_id: &str,
        selection: VersionSelection,
    ) -> Result<Option<PolicyVersion>, PolicyError>;

    async fn get_rules(&self, tenant_id: &str, version_id: &str) -> Result<Vec<Rule>, PolicyError>;

    async fn list_policies(&self, tenant_id: &str) -> Result<Vec<Policy>, PolicyError>;
}

/// Everything needed to seed one policy's in-memory record: the policy itself, its
/// versions, and the rules attached to each version (keyed by `version_id`).
#[derive(Debug, Clone)]
pub struct PolicyRecord {
    pub policy: Policy,
    pub versions: Vec<PolicyVersion>,
    pub rules_by_version: BTreeMap<String, Vec<Rule>>,
}

/// Reference `PolicyRepository` backed by an in-process map, grouped by tenant then
/// policy id. Intended for tests and the offline CLI, not for production traffic.
#[derive(Default)]
pub struct InMemoryPolicyRepository {
    records: RwLock<BTreeMap<String, BTreeMap<String, PolicyRecord>>>,
}

impl InMemoryPolicyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, tenant_id: &str, record: PolicyRecord) {
        let mut guard = self.records.write().expect("policy repository lock poisoned");
        guard
            .entry(tenant_id.to_string())
            .or_default()
            .insert(record.policy.policy_id.clone(), record);
    }
}

#[async_trait]
impl PolicyRepository for InMemoryPolicyRepository {
    async fn get_policy(&self, tenant_id: &str, policy_id: &str) -> Result<Option<Policy>, PolicyError> {
        let guard = self.records.read().expect("policy repository lock poisoned");
        Ok(guard.get(tenant_id).and_then(|byp| byp.get(policy_id)).map(|r| r.policy.clone()))
    }

    async fn get_version(
        &self,
        tenant_id: &str,
        policy_id: &str,
        selection: VersionSelection,
    ) -> Result<Option<PolicyVersion>, PolicyError> {
        let guard = self.records.read().expect("policy repository lock poisoned");
        let Some(record) = guard.get(tenant_id).and_then(|byp| byp.get(policy_id)) else {
            return Ok(None);
        };
        Ok(select_version(&record.versions, selection))
    }

    async fn get_rules(&self, tenant_id: &str, version_id: &str) -> Result<Vec<Rule>, PolicyError> {
        let guard = self.records.read().expect("policy repository lock poisoned");
        let Some(by_policy) = guard.get(tenant_id) else { return Ok(Vec::new()) };
        for record in by_policy.values() {
            if let Some(rules) = record.rules_by_version.get(version_id) {
                return Ok(rules.clone());
            }
        }
        Ok(Vec::new())
    }

    async fn list_policies(&self, tenant_id: &str) -> Result<Vec<Policy>, PolicyError> {
        let guard = self.records.read().expect("policy repository lock poisoned");
        Ok(guard.get(tenant_id).map(|byp| byp.values().map(|r| r.policy.clone()).collect()).unwrap_or_default())
    }
}

fn select_version(versions: &[PolicyVersion], selection: VersionSelection) -> Option<PolicyVersion> {
    match selection {
        VersionSelection::Published => versions
            .iter()
            .filter(|v| v.status == VersionStatus::Published)
            .max_by_key(|v| v.version_no)
            .cloned(),
        VersionSelection::Staged => versions
            .iter()
            .filter(|v| v.status == VersionStatus::Staged)
            .max_by_key(|v| v.version_no)
            .cloned(),
        VersionSelection::Draft => versions
            .iter()
            .filter(|v| v.status == VersionStatus::Draft)
            .max_by_key(|v| v.version_no)
            .cloned(),
        VersionSelection::Specific { version_id } => {
            versions.iter().find(|v| v.version_id == version_id).cloned()
        }
        VersionSelection::EffectiveAt { at_ms } => versions
            .iter()
            .filter(|v| v.status == VersionStatus::Published)
            .filter(|v| v.published_at_ms.map(|p| p <= at_ms).unwrap_or(false))
            .max_by_key(|v| v.published_at_ms)
            .cloned(),
    }
}
