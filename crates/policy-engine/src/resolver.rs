//! Policy resolver (C6, §4.6): finds applicable policies for a request's resource, in
//! specificity order, each paired with the version selected for this call.

use policy_core::error::PolicyError;
use policy_core::model::{Policy, PolicyVersion, ResourceFacts, ScopeType};
use policy_core::selection::VersionSelection;
use policy_store::PolicyRepository;

/// Resolve every active policy applicable to `resource`, most specific tier first
/// (`entity_version` > `entity` > `module` > `global`), sorted by policy name within
/// each tier, each paired with the version chosen by `selection`. A policy absent a
/// version under `selection` (e.g. no version has been published yet) is skipped.
pub async fn resolve_applicable_policies(
    repository: &dyn PolicyRepository,
    tenant_id: &str,
    resource: &ResourceFacts,
    selection: VersionSelection,
) -> Result<Vec<(Policy, PolicyVersion)>, PolicyError> {
    let all_policies = repository.list_policies(tenant_id).await?;

    let mut tiers: Vec<(ScopeType, Option<String>)> = Vec::new();
    if let Some(version_id) = &resource.version_id {
        tiers.push((ScopeType::EntityVersion, Some(version_id.clone())));
    }
    tiers.push((ScopeType::Entity, Some(resource.resource_type.clone())));
    if let Some(module) = &resource.module {
        tiers.push((ScopeType::Module, Some(module.clone())));
    }
    tiers.push((ScopeType::Global, None));

    let mut resolved = Vec::new();
    for (scope_type, scope_key) in tiers {
        let mut tier_policies: Vec<&Policy> = all_policies
            .iter()
            .filter(|p| p.is_active && p.scope_type == scope_type && p.scope_key == scope_key)
            .collect();
        tier_policies.sort_by(|a, b| a.name.cmp(&b.name));

        for policy in tier_policies {
            if let Some(version) =
                repository.get_version(tenant_id, &policy.policy_id, selection.clone()).await?
            {
                resolved.push((policy.clone(), version));
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy_core::model::VersionStatus;
    use policy_store::{InMemoryPolicyRepository, PolicyRecord};
    use std::collections::BTreeMap;

    fn policy(name: &str, id: &str, scope_type: ScopeType, scope_key: Option<&str>) -> Policy {
        Policy {
            tenant_id: "tenant-1".into(),
            policy_id: id.into(),
            name: name.into(),
            description: None,
            scope_type,
            scope_key: scope_key.map(str::to_string),
            is_active: true,
        }
    }

    fn published_version(policy_id: &str) -> PolicyVersion {
        PolicyVersion {
            version_id: format!("{policy_id}-v1"),
            policy_id: policy_id.into(),
            version_no: 1,
            status: VersionStatus::Published,
            created_at_ms: 0,
            published_at_ms: Some(1),
        }
    }

    fn resource() -> ResourceFacts {
        ResourceFacts {
            resource_type: "document".into(),
            id: Some("doc-1".into()),
            version_id: None,
            module: Some("billing".into()),
            owner_id: None,
            attributes: Default::default(),
        }
    }

    fn seed(repo: &InMemoryPolicyRepository, p: Policy) {
        let version = published_version(&p.policy_id);
        let mut rules_by_version = BTreeMap::new();
        rules_by_version.insert(version.version_id.clone(), vec![]);
        repo.upsert(
            "tenant-1",
            PolicyRecord { policy: p, versions: vec![version], rules_by_version },
        );
    }

    #[tokio::test]
    async fn orders_entity_before_module_before_global() {
        let repo = InMemoryPolicyRepository::new();
        seed(&repo, policy("Global Policy", "p-global", ScopeType::Global, None));
        seed(&repo, policy("Module Policy", "p-module", ScopeType::Module, Some("billing")));
        seed(&repo, policy("Entity Policy", "p-entity", ScopeType::Entity, Some("document")));

        let resolved =
            resolve_applicable_policies(&repo, "tenant-1", &resource(), VersionSelection::Published)
                .await
                .unwrap();
        let ids: Vec<&str> = resolved.iter().map(|(p, _)| p.policy_id.as_str()).collect();
        assert_eq!(ids, vec!["p-entity", "p-module", "p-global"]);
    }

    #[tokio::test]
    async fn same_tier_orders_by_name_ascending() {
        let repo = InMemoryPolicyRepository::new();
        seed(&repo, policy("Zeta", "p-z", ScopeType::Entity, Some("document")));
        seed(&repo, policy("Alpha", "p-a", ScopeType::Entity, Some("document")));

        let resolved =
            resolve_applicable_policies(&repo, "tenant-1", &resource(), VersionSelection::Published)
                .await
                .unwrap();
        let ids: Vec<&str> = resolved.iter().map(|(p, _)| p.policy_id.as_str()).collect();
        assert_eq!(ids, vec!["p-a", "p-z"]);
    }

    #[tokio::test]
    async fn inactive_policy_is_excluded() {
        let repo = InMemoryPolicyRepository::new();
        let mut inactive = policy("Inactive", "p-inactive", ScopeType::Entity, Some("document"));
        inactive.is_active = false;
        seed(&repo, inactive);

        let resolved =
            resolve_applicable_policies(&repo, "tenant-1", &resource(), VersionSelection::Published)
                .await
                .unwrap();
        assert!(resolved.is_empty());
    }
}
