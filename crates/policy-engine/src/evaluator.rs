//! Top-level orchestrator (C9, §4.9): resolves policies, matches and evaluates rules,
//! applies conflict resolution, and hands the outcome to the decision logger.

use crate::resolver::resolve_applicable_policies;
use decision_log::{DecisionLogEntry, DecisionLogger};
use policy_core::error::PolicyError;
use policy_core::ids::now_ms;
use policy_core::model::{
    ActionRef, CompiledPolicy, Decision, DebugCounters, DecisionMetadata, MatchedRule, Namespace,
    PolicyEvaluationOptions, PolicyInput, RequestContext, ResourceFacts, SubjectFacts,
};
use policy_core::selection::VersionSelection;
use policy_eval::context::EvalContext;
use policy_eval::resolver::Candidate;
use policy_eval::{comparator, matcher};
use policy_facts::{FactsProvider, FactsSource};
use policy_store::{InvalidationEvent, InvalidationSubscriber, InvalidatingCache, PolicyRepository};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// The evaluator version stamped into every decision's metadata.
pub const EVALUATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Wires together facts resolution (C7), the compiled-policy cache (C8), rule
/// matching and conflict resolution (C1-C4), and decision logging (C10) behind one
/// `evaluate` entry point (C9, §4.9).
pub struct Evaluator<S: FactsSource> {
    facts: FactsProvider<S>,
    repository: Arc<dyn PolicyRepository>,
    compiled: InvalidatingCache,
    logger: Arc<DecisionLogger>,
}

impl<S: FactsSource> Evaluator<S> {
    pub fn new(
        facts: FactsProvider<S>,
        repository: Arc<dyn PolicyRepository>,
        compiled: InvalidatingCache,
        logger: Arc<DecisionLogger>,
    ) -> Self {
        Self { facts, repository, compiled, logger }
    }

    /// Evaluate a fully-formed request (§4.9). `input` is expected to already carry
    /// resolved subject/resource facts; callers starting from bare ids should use
    /// [`Evaluator::evaluate_for`] instead, which resolves facts via C7 first.
    #[instrument(skip(self, input), fields(tenant_id = %input.context.tenant_id, principal_id = %input.subject.principal_id))]
    pub async fn evaluate(
        &self,
        input: PolicyInput,
        options: PolicyEvaluationOptions,
    ) -> Result<Decision, PolicyError> {
        let started = Instant::now();
        let body = self.evaluate_inner(&input, &options, started);
        let decision = match options.deadline_ms {
            Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), body).await {
                Ok(result) => result?,
                Err(_) => return Err(PolicyError::EvalTimeout { deadline_ms: ms }),
            },
            None => body.await?,
        };
        Ok(decision)
    }

    /// Resolve subject and resource facts for `tenant_id`/`principal_id`/the given
    /// resource identity, then evaluate (§4.7 + §4.9 step 1).
    #[instrument(skip(self, context, options), fields(tenant_id, principal_id, resource_type))]
    pub async fn evaluate_for(
        &self,
        tenant_id: &str,
        principal_id: &str,
        resource_type: &str,
        resource_id: Option<&str>,
        action: ActionRef,
        context: RequestContext,
        options: PolicyEvaluationOptions,
    ) -> Result<Decision, PolicyError> {
        let (subject, resource) =
            self.facts.resolve_facts(tenant_id, principal_id, resource_type, resource_id).await?;
        let input = PolicyInput { subject, resource, action, context };
        self.evaluate(input, options).await
    }

    async fn evaluate_inner(
        &self,
        input: &PolicyInput,
        options: &PolicyEvaluationOptions,
        started: Instant,
    ) -> Result<Decision, PolicyError> {
        let applicable =
            resolve_applicable_policies(
                self.repository.as_ref(),
                &input.context.tenant_id,
                &input.resource,
                VersionSelection::Published,
            )
            .await?;

        let mut compiled_policies: Vec<(String, String, String, CompiledPolicy)> =
            Vec::with_capacity(applicable.len());
        for (policy, version) in &applicable {
            let compiled = self
                .compiled
                .cache
                .get_or_compile(
                    self.repository.as_ref(),
                    &input.context.tenant_id,
                    &policy.policy_id,
                    &version.version_id,
                )
                .await?;
            compiled_policies.push((
                policy.policy_id.clone(),
                version.version_id.clone(),
                policy.name.clone(),
                compiled,
            ));
        }
        let policies_evaluated = compiled_policies.len();

        let ctx = EvalContext::from_input(input);
        let mut rules_scanned = 0usize;
        let mut candidates: Vec<Candidate<'_>> = Vec::new();
        for (policy_id, policy_version_id, policy_name, compiled) in &compiled_policies {
            let matched = matcher::match_rules(compiled, &input.subject, &input.resource, &input.action);
            rules_scanned += matched.len();
            for rule in matched {
                let passes = match &rule.conditions {
                    Some(cond) => {
                        policy_eval::evaluate(cond, &ctx, options.max_condition_depth).unwrap_or(false)
                    }
                    None => true,
                };
                if passes {
                    candidates.push(Candidate {
                        rule,
                        policy_id,
                        policy_version_id,
                        policy_name,
                    });
                }
            }
        }
        let rules_matched = candidates.len();

        let ordered = {
            let mut ordered = candidates.clone();
            ordered.sort_by(|a, b| comparator::compare_rules(a.rule, b.rule));
            ordered
        };
        let matched_rules = if options.explain {
            ordered.iter().map(to_matched_rule).collect()
        } else {
            Vec::new()
        };

        let resolution = policy_eval::resolver::resolve(candidates, options.conflict_resolution);
        let deciding_rule = resolution.deciding.as_ref().map(to_matched_rule);
        let obligations =
            resolution.deciding.as_ref().map(|c| c.rule.obligations.clone()).unwrap_or_default();

        let debug = if options.explain {
            Some(DebugCounters { rules_scanned, rules_matched, policies_evaluated })
        } else {
            None
        };

        let decision = Decision {
            effect: resolution.effect,
            allowed: resolution.effect == policy_core::model::Effect::Allow,
            deciding_rule,
            matched_rules,
            obligations,
            reasons: vec![resolution.reason],
            debug,
            metadata: DecisionMetadata {
                duration_ms: started.elapsed().as_millis() as u64,
                evaluated_at_ms: now_ms(),
                evaluator_version: EVALUATOR_VERSION.to_string(),
                correlation_id: input.context.correlation_id.clone(),
            },
        };

        crate::observer::notify(&decision);

        self.logger
            .record(DecisionLogEntry {
                tenant_id: input.context.tenant_id.clone(),
                request: input.clone(),
                decision: decision.clone(),
                subject_snapshot: Some(input.subject.clone()),
                logged_at_ms: now_ms(),
            })
            .await;

        Ok(decision)
    }

    /// Convenience wrapper (§4.9): resolve `principal_id`'s facts, build a synthetic
    /// request against `resource` for `operation` (`NAMESPACE.CODE`), and return
    /// whether it is allowed.
    pub async fn has_permission(
        &self,
        tenant_id: &str,
        principal_id: &str,
        operation: &str,
        resource: ResourceFacts,
    ) -> Result<bool, PolicyError> {
        let action = parse_operation(operation)?;
        let subject = self.facts.resolve_subject(tenant_id, principal_id).await?;
        let input = PolicyInput {
            subject,
            resource,
            action,
            context: RequestContext {
                tenant_id: tenant_id.to_string(),
                timestamp_ms: now_ms(),
                correlation_id: None,
                ip: None,
                user_agent: None,
                channel: None,
                geo: None,
                attributes: Default::default(),
            },
        };
        let decision = self.evaluate(input, PolicyEvaluationOptions::default()).await?;
        Ok(decision.allowed)
    }

    /// Convenience wrapper (§4.9): resolve and return `principal_id`'s subject facts.
    pub async fn get_subject(
        &self,
        tenant_id: &str,
        principal_id: &str,
    ) -> Result<SubjectFacts, PolicyError> {
        self.facts.resolve_subject(tenant_id, principal_id).await
    }
}

impl<S: FactsSource> InvalidationSubscriber for Evaluator<S> {
    /// The evaluator keeps no resolver-level cache of its own beyond the shared
    /// compiled-policy cache (already evicted by the publisher before subscribers
    /// run); this only exists so hot-reload wiring has an explicit subscriber.
    fn on_invalidation(&self, event: &InvalidationEvent) {
        tracing::debug!(
            tenant_id = %event.tenant_id,
            policy_id = %event.policy_id,
            kind = ?event.kind,
            "evaluator observed policy invalidation"
        );
    }
}

fn to_matched_rule(c: &Candidate<'_>) -> MatchedRule {
    MatchedRule {
        rule_id: c.rule.rule_id.clone(),
        policy_id: c.policy_id.to_string(),
        policy_version_id: c.policy_version_id.to_string(),
        policy_name: c.policy_name.to_string(),
        effect: c.rule.effect,
        priority: c.rule.priority,
        scope_type: c.rule.scope_type,
        subject_type: c.rule.subject_type,
        subject_key: c.rule.subject_key.clone(),
    }
}

fn parse_operation(operation: &str) -> Result<ActionRef, PolicyError> {
    let (namespace, code) = operation
        .split_once('.')
        .ok_or_else(|| PolicyError::InvalidInput(format!("malformed operation code: {operation}")))?;
    let namespace = match namespace {
        "ENTITY" => Namespace::Entity,
        "WORKFLOW" => Namespace::Workflow,
        "UTIL" => Namespace::Util,
        "DELEGATION" => Namespace::Delegation,
        "COLLAB" => Namespace::Collab,
        other => {
            return Err(PolicyError::InvalidInput(format!("unknown operation namespace: {other}")))
        }
    };
    Ok(ActionRef { namespace, code: code.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use policy_core::model::{
        Effect, Policy, PolicyVersion, PrincipalType, Rule, ScopeType, SubjectType, VersionStatus,
    };
    use policy_facts::FactsCacheConfig;
    use policy_store::{InMemoryPolicyRepository, PolicyRecord};
    use std::collections::BTreeMap;

    struct StaticSource;

    #[async_trait]
    impl FactsSource for StaticSource {
        async fn fetch_subject(
            &self,
            _tenant_id: &str,
            principal_id: &str,
        ) -> Result<SubjectFacts, PolicyError> {
            Ok(SubjectFacts {
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

        async fn fetch_derived(
            &self,
            _tenant_id: &str,
            key: &str,
        ) -> Result<policy_core::value::Value, PolicyError> {
            Ok(policy_core::value::Value::from(key))
        }
    }

    fn seeded_repo() -> InMemoryPolicyRepository {
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
        repo
    }

    fn build_evaluator() -> Evaluator<StaticSource> {
        let facts = FactsProvider::new(StaticSource, FactsCacheConfig::default());
        let repository: Arc<dyn PolicyRepository> = Arc::new(seeded_repo());
        let compiled = InvalidatingCache::new(Duration::from_secs(60));
        let sink = Arc::new(decision_log::InMemorySink::new());
        let logger = DecisionLogger::new(decision_log::DecisionLoggerConfig::default(), sink, None);
        Evaluator::new(facts, repository, compiled, logger)
    }

    #[tokio::test]
    async fn matching_role_rule_allows() {
        let evaluator = build_evaluator();
        let resource =
            ResourceFacts {
                resource_type: "document".into(),
                id: Some("doc-1".into()),
                version_id: None,
                module: None,
                owner_id: None,
                attributes: Default::default(),
            };
        let allowed = evaluator
            .has_permission("tenant-1", "user-1", "ENTITY.READ", resource)
            .await
            .unwrap();
        assert!(allowed);
    }

    #[tokio::test]
    async fn unmatched_operation_defaults_to_deny() {
        let evaluator = build_evaluator();
        let resource = ResourceFacts {
            resource_type: "document".into(),
            id: Some("doc-1".into()),
            version_id: None,
            module: None,
            owner_id: None,
            attributes: Default::default(),
        };
        let allowed = evaluator
            .has_permission("tenant-1", "user-1", "ENTITY.DELETE", resource)
            .await
            .unwrap();
        assert!(!allowed);
    }

    #[tokio::test]
    async fn explain_populates_debug_counters() {
        let evaluator = build_evaluator();
        let input = PolicyInput {
            subject: evaluator.get_subject("tenant-1", "user-1").await.unwrap(),
            resource: ResourceFacts {
                resource_type: "document".into(),
                id: Some("doc-1".into()),
                version_id: None,
                module: None,
                owner_id: None,
                attributes: Default::default(),
            },
            action: ActionRef { namespace: Namespace::Entity, code: "READ".into() },
            context: RequestContext {
                tenant_id: "tenant-1".into(),
                timestamp_ms: 0,
                correlation_id: Some("corr-1".into()),
                ip: None,
                user_agent: None,
                channel: None,
                geo: None,
                attributes: Default::default(),
            },
        };
        let options = PolicyEvaluationOptions { explain: true, ..Default::default() };
        let decision = evaluator.evaluate(input, options).await.unwrap();
        assert!(decision.debug.is_some());
        assert_eq!(decision.metadata.correlation_id.as_deref(), Some("corr-1"));
        assert_eq!(decision.matched_rules.len(), 1);
    }
}
