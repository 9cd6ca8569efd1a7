//! Offline fixture CLI for the policy decision engine.
//!
//! Loads a YAML fixture describing one tenant's policies (and, for `eval`, a sample
//! request) and either compiles every version and prints its checksum, or runs the
//! full evaluator pipeline and prints the resulting `Decision`.

#![deny(unsafe_code)]

mod fixture;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use fixture::{Fixture, FixtureRequest};
use policy_core::error::PolicyError;
use policy_core::model::{PolicyEvaluationOptions, ResourceFacts, SubjectFacts};
use policy_core::value::Value;
use policy_engine::Evaluator;
use policy_facts::{FactsCacheConfig, FactsProvider, FactsSource};
use policy_store::{InMemoryPolicyRepository, InvalidatingCache, PolicyRepository};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "policy-cli", about = "Compile and evaluate policy fixtures offline")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile every policy version in a fixture and print its checksum
    Compile {
        #[arg(short, long)]
        fixture: PathBuf,
    },
    /// Evaluate the fixture's `request` against its policies
    Eval {
        #[arg(short, long)]
        fixture: PathBuf,
        #[arg(long, default_value_t = false)]
        explain: bool,
        #[arg(long)]
        deadline_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Compile { fixture } => cmd_compile(&fixture)?,
        Command::Eval { fixture, explain, deadline_ms } => {
            cmd_eval(&fixture, explain, deadline_ms).await?
        }
    }
    Ok(())
}

fn cmd_compile(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let fx = fixture::load(path)?;
    for policy in &fx.policies {
        for version in &policy.versions {
            let rules: Vec<policy_core::model::Rule> = version
                .rules
                .iter()
                .map(|r| policy_core::model::Rule {
                    rule_id: r.rule_id.clone(),
                    version_id: version.version_id.clone(),
                    scope_type: r.scope_type,
                    scope_key: r.scope_key.clone(),
                    subject_type: r.subject_type,
                    subject_key: r.subject_key.clone(),
                    effect: r.effect,
                    conditions: r.conditions.clone(),
                    priority: r.priority,
                    is_active: r.is_active,
                    operations: r.operations.clone(),
                    obligations: r.obligations.clone(),
                })
                .collect();
            match policy_compiler::compile(&policy.policy_id, &version.version_id, &rules, 0) {
                Ok((compiled, report)) => {
                    println!(
                        "{}/{}: checksum={} rules={} excluded={}",
                        policy.policy_id,
                        version.version_id,
                        compiled.checksum,
                        compiled.counts.rule_count,
                        report.excluded_rule_count
                    );
                    for diag in &report.diagnostics {
                        println!("  diagnostic: {} - {}", diag.rule_id, diag.message);
                    }
                }
                Err(e) => {
                    println!("{}/{}: compilation failed: {}", policy.policy_id, version.version_id, e);
                }
            }
        }
    }
    Ok(())
}

struct FixtureSource {
    subject: SubjectFacts,
    resource: ResourceFacts,
}

#[async_trait]
impl FactsSource for FixtureSource {
    async fn fetch_subject(&self, _tenant_id: &str, _principal_id: &str) -> Result<SubjectFacts, PolicyError> {
        Ok(self.subject.clone())
    }

    async fn fetch_resource(
        &self,
        _tenant_id: &str,
        _resource_type: &str,
        _id: Option<&str>,
    ) -> Result<ResourceFacts, PolicyError> {
        Ok(self.resource.clone())
    }

    async fn fetch_derived(&self, _tenant_id: &str, key: &str) -> Result<Value, PolicyError> {
        Ok(Value::from(key))
    }
}

fn request_to_source(req: &FixtureRequest) -> FixtureSource {
    FixtureSource {
        subject: SubjectFacts {
            principal_id: req.principal_id.clone(),
            principal_type: req.principal_type,
            roles: req.roles.clone(),
            groups: req.groups.clone(),
            org_unit: None,
            attributes: req.subject_attributes.clone(),
            generated_at_ms: 0,
        },
        resource: ResourceFacts {
            resource_type: req.resource_type.clone(),
            id: req.resource_id.clone(),
            version_id: None,
            module: req.resource_module.clone(),
            owner_id: None,
            attributes: req.resource_attributes.clone(),
        },
    }
}

async fn cmd_eval(
    path: &PathBuf,
    explain: bool,
    deadline_ms: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let fx: Fixture = fixture::load(path)?;
    let req = fx.request.as_ref().ok_or(fixture::FixtureError::MissingRequest)?;
    let action = fixture::parse_action(&req.action)?;

    let repo = InMemoryPolicyRepository::new();
    fixture::seed_in_memory(&fx, &repo);
    let repository: Arc<dyn PolicyRepository> = Arc::new(repo);

    let facts = FactsProvider::new(request_to_source(req), FactsCacheConfig::default());
    let compiled = InvalidatingCache::new(Duration::from_secs(60));
    let sink = Arc::new(decision_log::InMemorySink::new());
    let logger = decision_log::DecisionLogger::new(decision_log::DecisionLoggerConfig::default(), sink, None);
    let evaluator = Evaluator::new(facts, repository, compiled, logger);

    let options = PolicyEvaluationOptions { explain, deadline_ms, ..Default::default() };
    let context = policy_core::model::RequestContext {
        tenant_id: fx.tenant_id.clone(),
        timestamp_ms: policy_core::ids::now_ms(),
        correlation_id: None,
        ip: None,
        user_agent: None,
        channel: None,
        geo: None,
        attributes: Default::default(),
    };

    let decision = evaluator
        .evaluate_for(
            &fx.tenant_id,
            &req.principal_id,
            &req.resource_type,
            req.resource_id.as_deref(),
            action,
            context,
            options,
        )
        .await?;

    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}
