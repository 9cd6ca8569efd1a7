use policy_core::model::{
    ActionRef, Effect, Namespace, Policy, PolicyVersion, PrincipalType, RequestContext,
    ResourceFacts, Rule, ScopeType, SubjectType, VersionStatus,
};
use policy_engine::Evaluator;
use policy_facts::{FactsCacheConfig, FactsProvider, FactsSource};
use policy_store::{InMemoryPolicyRepository, InvalidatingCache, PolicyRecord, PolicyRepository};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

struct DemoSource;

#[async_trait::async_trait]
impl FactsSource for DemoSource {
    async fn fetch_subject(
        &self,
        _tenant_id: &str,
        principal_id: &str,
    ) -> Result<policy_core::model::SubjectFacts, policy_core::error::PolicyError> {
        Ok(policy_core::model::SubjectFacts {
            principal_id: principal_id.to_string(),
            principal_type: PrincipalType::User,
            roles: vec!["editor".into()],
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
    ) -> Result<ResourceFacts, policy_core::error::PolicyError> {
        Ok(ResourceFacts {
            resource_type: resource_type.to_string(),
            id: id.map(str::to_string),
            version_id: None,
            module: None,
            owner_id: None,
            attributes: Default::default(),
        })
    }

    async fn fetch_derived(
        &self,
        _tenant_id: &str,
        key: &str,
    ) -> Result<policy_core::value::Value, policy_core::error::PolicyError> {
        Ok(policy_core::value::Value::from(key))
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_json_logging();

    #[cfg(feature = "otel")]
    {
        telemetry::init_otel("policy-engine-demo")?;
    }
    policy_engine::set_observer(Some(telemetry::decision_observer()));

    let repo = InMemoryPolicyRepository::new();
    let rule = Rule {
        rule_id: "allow-editors".into(),
        version_id: "v1".into(),
        scope_type: ScopeType::Entity,
        scope_key: Some("document".into()),
        subject_type: SubjectType::Role,
        subject_key: "editor".into(),
        effect: Effect::Allow,
        conditions: None,
        priority: 10,
        is_active: true,
        operations: vec!["ENTITY.READ".into()],
        obligations: vec![],
    };
    let mut rules_by_version = BTreeMap::new();
    rules_by_version.insert("v1".to_string(), vec![rule]);
    repo.upsert(
        "tenant-1",
        PolicyRecord {
            policy: Policy {
                tenant_id: "tenant-1".into(),
                policy_id: "p1".into(),
                name: "Editors Policy".into(),
                description: None,
                scope_type: ScopeType::Entity,
                scope_key: Some("document".into()),
                is_active: true,
            },
            versions: vec![PolicyVersion {
                version_id: "v1".into(),
                policy_id: "p1".into(),
                version_no: 1,
                status: VersionStatus::Published,
                created_at_ms: 0,
                published_at_ms: Some(1),
            }],
            rules_by_version,
        },
    );

    let facts = FactsProvider::new(DemoSource, FactsCacheConfig::default());
    let repository: Arc<dyn PolicyRepository> = Arc::new(repo);
    let compiled = InvalidatingCache::new(Duration::from_secs(60));
    let sink = Arc::new(decision_log::InMemorySink::new());
    let logger = decision_log::DecisionLogger::new(
        decision_log::DecisionLoggerConfig::default(),
        sink,
        None,
    );
    let evaluator = Evaluator::new(facts, repository, compiled, logger);

    let action = ActionRef { namespace: Namespace::Entity, code: "READ".into() };
    let context = RequestContext {
        tenant_id: "tenant-1".into(),
        timestamp_ms: 0,
        correlation_id: None,
        ip: None,
        user_agent: None,
        channel: None,
        geo: None,
        attributes: Default::default(),
    };
    let decision = evaluator
        .evaluate_for("tenant-1", "user-1", "document", Some("doc-1"), action, context, Default::default())
        .await?;

    println!("decision: {:?}, counters: {:?}", decision.effect, telemetry::snapshot_counters());

    #[cfg(feature = "otel")]
    {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    Ok(())
}
