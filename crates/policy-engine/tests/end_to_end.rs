use async_trait::async_trait;
use policy_core::error::PolicyError;
use policy_core::model::{
    ActionRef, Condition, ConditionOp, ConflictResolution, Effect, Namespace, Policy,
    PolicyEvaluationOptions, PolicyVersion, PrincipalType, RequestContext, ResourceFacts, Rule,
    ScopeType, SubjectFacts, SubjectType, VersionStatus,
};
use policy_core::value::Value;
use policy_engine::Evaluator;
use policy_facts::{FactsCacheConfig, FactsProvider, FactsSource};
use policy_store::{InMemoryPolicyRepository, InvalidatingCache, PolicyRecord, PolicyRepository};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

struct Source {
    subject: SubjectFacts,
}

#[async_trait]
impl FactsSource for Source {
    async fn fetch_subject(&self, _tenant_id: &str, _principal_id: &str) -> Result<SubjectFacts, PolicyError> {
        Ok(self.subject.clone())
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
            module: Some("crm".into()),
            owner_id: None,
            attributes: Default::default(),
        })
    }

    async fn fetch_derived(&self, _tenant_id: &str, key: &str) -> Result<Value, PolicyError> {
        Ok(Value::from(key))
    }
}

fn subject(department: Option<&str>) -> SubjectFacts {
    let mut attributes = BTreeMap::new();
    if let Some(dept) = department {
        attributes.insert("department".to_string(), Value::String(dept.to_string()));
    }
    SubjectFacts {
        principal_id: "user-123".into(),
        principal_type: PrincipalType::User,
        roles: vec![],
        groups: vec![],
        org_unit: None,
        attributes,
        generated_at_ms: 0,
    }
}

fn base_rule(rule_id: &str, scope_type: ScopeType, scope_key: Option<&str>, effect: Effect, priority: u32) -> Rule {
    Rule {
        rule_id: rule_id.into(),
        version_id: "v1".into(),
        scope_type,
        scope_key: scope_key.map(str::to_string),
        subject_type: SubjectType::User,
        subject_key: "user-123".into(),
        effect,
        conditions: None,
        priority,
        is_active: true,
        operations: vec!["ENTITY.READ".into()],
        obligations: vec![],
    }
}

fn seed(rules: Vec<Rule>) -> InMemoryPolicyRepository {
    let repo = InMemoryPolicyRepository::new();
    for (i, rule) in rules.into_iter().enumerate() {
        let policy_id = format!("p{i}");
        let mut rules_by_version = BTreeMap::new();
        let scope_type = rule.scope_type;
        let scope_key = rule.scope_key.clone();
        rules_by_version.insert("v1".to_string(), vec![rule]);
        repo.upsert(
            "tenant-1",
            PolicyRecord {
                policy: Policy {
                    tenant_id: "tenant-1".into(),
                    policy_id: policy_id.clone(),
                    name: format!("policy-{i}"),
                    description: None,
                    scope_type,
                    scope_key,
                    is_active: true,
                },
                versions: vec![PolicyVersion {
                    version_id: "v1".into(),
                    policy_id,
                    version_no: 1,
                    status: VersionStatus::Published,
                    created_at_ms: 0,
                    published_at_ms: Some(1),
                }],
                rules_by_version,
            },
        );
    }
    repo
}

fn evaluator(repo: InMemoryPolicyRepository, department: Option<&str>) -> Evaluator<Source> {
    let facts = FactsProvider::new(Source { subject: subject(department) }, FactsCacheConfig::default());
    let repository: Arc<dyn PolicyRepository> = Arc::new(repo);
    let compiled = InvalidatingCache::new(Duration::from_secs(60));
    let sink = Arc::new(decision_log::InMemorySink::new());
    let logger = decision_log::DecisionLogger::new(decision_log::DecisionLoggerConfig::default(), sink, None);
    Evaluator::new(facts, repository, compiled, logger)
}

fn read_action() -> ActionRef {
    ActionRef { namespace: Namespace::Entity, code: "READ".into() }
}

fn context(tenant_id: &str) -> RequestContext {
    RequestContext {
        tenant_id: tenant_id.into(),
        timestamp_ms: 0,
        correlation_id: None,
        ip: None,
        user_agent: None,
        channel: None,
        geo: None,
        attributes: Default::default(),
    }
}

async fn run(
    ev: &Evaluator<Source>,
    resource_type: &str,
    resource_id: Option<&str>,
    options: PolicyEvaluationOptions,
) -> policy_core::model::Decision {
    ev.evaluate_for("tenant-1", "user-123", resource_type, resource_id, read_action(), context("tenant-1"), options)
        .await
        .unwrap()
}

#[tokio::test]
async fn single_allow() {
    let repo = seed(vec![base_rule("r1", ScopeType::Entity, Some("document"), Effect::Allow, 100)]);
    let ev = evaluator(repo, None);
    let decision = run(&ev, "document", Some("doc-1"), PolicyEvaluationOptions::default()).await;
    assert!(decision.allowed);
    assert_eq!(decision.deciding_rule.unwrap().rule_id, "r1");
}

#[tokio::test]
async fn default_deny_on_empty_store() {
    let repo = seed(vec![]);
    let ev = evaluator(repo, None);
    let decision = run(&ev, "document", Some("doc-1"), PolicyEvaluationOptions::default()).await;
    assert!(!decision.allowed);
    assert!(decision.reasons.iter().any(|r| r.contains("default deny")));
}

fn conflicting_rules() -> Vec<Rule> {
    vec![
        base_rule("allow-a", ScopeType::Entity, Some("document"), Effect::Allow, 50),
        base_rule("deny-b", ScopeType::Entity, Some("document"), Effect::Deny, 100),
    ]
}

#[tokio::test]
async fn deny_overrides_picks_the_deny() {
    let ev = evaluator(seed(conflicting_rules()), None);
    let opts = PolicyEvaluationOptions { conflict_resolution: ConflictResolution::DenyOverrides, ..Default::default() };
    let decision = run(&ev, "document", Some("doc-1"), opts).await;
    assert!(!decision.allowed);
    assert_eq!(decision.deciding_rule.unwrap().rule_id, "deny-b");
}

#[tokio::test]
async fn allow_overrides_picks_the_allow() {
    let ev = evaluator(seed(conflicting_rules()), None);
    let opts = PolicyEvaluationOptions { conflict_resolution: ConflictResolution::AllowOverrides, ..Default::default() };
    let decision = run(&ev, "document", Some("doc-1"), opts).await;
    assert!(decision.allowed);
    assert_eq!(decision.deciding_rule.unwrap().rule_id, "allow-a");
}

#[tokio::test]
async fn entity_specificity_beats_module() {
    let repo = seed(vec![
        base_rule("module-allow", ScopeType::Module, Some("crm"), Effect::Allow, 10),
        base_rule("entity-deny", ScopeType::Entity, Some("document"), Effect::Deny, 100),
    ]);
    let ev = evaluator(repo, None);
    let decision = run(&ev, "document", Some("doc-1"), PolicyEvaluationOptions::default()).await;
    assert!(!decision.allowed);
    assert_eq!(decision.deciding_rule.unwrap().rule_id, "entity-deny");
}

#[tokio::test]
async fn condition_filters_on_subject_department() {
    let mut rule = base_rule("eng-only", ScopeType::Entity, Some("document"), Effect::Allow, 100);
    rule.conditions = Some(Condition::Leaf {
        field: "subject.attributes.department".into(),
        op: ConditionOp::Eq,
        value: Value::String("engineering".into()),
    });

    let repo = seed(vec![rule.clone()]);
    let ev = evaluator(repo, Some("engineering"));
    let decision = run(&ev, "document", Some("doc-1"), PolicyEvaluationOptions::default()).await;
    assert!(decision.allowed);

    let repo = seed(vec![rule]);
    let ev = evaluator(repo, Some("sales"));
    let decision = run(&ev, "document", Some("doc-1"), PolicyEvaluationOptions::default()).await;
    assert!(!decision.allowed);
}

#[tokio::test]
async fn tenant_mismatch_in_condition_denies() {
    let mut rule = base_rule("tenant-gated", ScopeType::Entity, Some("document"), Effect::Allow, 100);
    rule.conditions = Some(Condition::Leaf {
        field: "context.tenantId".into(),
        op: ConditionOp::Eq,
        value: Value::String("tenant-1".into()),
    });
    let repo = seed(vec![rule]);
    let ev = evaluator(repo, None);

    let decision = ev
        .evaluate_for("tenant-1", "user-123", "document", Some("doc-1"), read_action(), context("tenant-2"), Default::default())
        .await
        .unwrap();
    assert!(!decision.allowed);
}
