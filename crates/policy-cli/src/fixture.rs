//! YAML fixture format for offline policy testing: validated on load, never
//! partially applied.

use policy_core::model::{
    Condition, Effect, Namespace, Obligation, Policy, PolicyVersion, PrincipalType, ScopeType,
    SubjectType, VersionStatus,
};
use policy_core::value::AttributeMap;
use policy_store::PolicyRecord;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct Fixture {
    pub tenant_id: String,
    pub policies: Vec<FixturePolicy>,
    #[serde(default)]
    pub request: Option<FixtureRequest>,
}

#[derive(Debug, Deserialize)]
pub struct FixturePolicy {
    pub policy_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub scope_type: ScopeType,
    #[serde(default)]
    pub scope_key: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub versions: Vec<FixtureVersion>,
}

#[derive(Debug, Deserialize)]
pub struct FixtureVersion {
    pub version_id: String,
    #[serde(default = "default_version_no")]
    pub version_no: u32,
    #[serde(default = "default_status")]
    pub status: VersionStatus,
    #[serde(default)]
    pub published_at_ms: Option<u64>,
    pub rules: Vec<FixtureRule>,
}

#[derive(Debug, Deserialize)]
pub struct FixtureRule {
    pub rule_id: String,
    pub scope_type: ScopeType,
    #[serde(default)]
    pub scope_key: Option<String>,
    pub subject_type: SubjectType,
    pub subject_key: String,
    pub effect: Effect,
    #[serde(default)]
    pub conditions: Option<Condition>,
    #[serde(default)]
    pub priority: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub operations: Vec<String>,
    #[serde(default)]
    pub obligations: Vec<Obligation>,
}

#[derive(Debug, Deserialize)]
pub struct FixtureRequest {
    pub principal_id: String,
    #[serde(default = "default_principal_type")]
    pub principal_type: PrincipalType,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub subject_attributes: AttributeMap,
    pub resource_type: String,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub resource_module: Option<String>,
    #[serde(default)]
    pub resource_attributes: AttributeMap,
    pub action: String,
}

fn default_true() -> bool {
    true
}

fn default_version_no() -> u32 {
    1
}

fn default_status() -> VersionStatus {
    VersionStatus::Published
}

fn default_principal_type() -> PrincipalType {
    PrincipalType::User
}

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("failed to open fixture {path:?}: {source}")]
    Open { path: std::path::PathBuf, source: std::io::Error },
    #[error("malformed fixture {path:?}: {source}")]
    Parse { path: std::path::PathBuf, source: serde_yaml::Error },
    #[error("action '{0}' is not a valid NAMESPACE.CODE reference")]
    InvalidAction(String),
    #[error("fixture has no `request` section; `eval` needs one")]
    MissingRequest,
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<Fixture, FixtureError> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|source| FixtureError::Open { path: path.to_path_buf(), source })?;
    let rdr = BufReader::new(f);
    serde_yaml::from_reader(rdr).map_err(|source| FixtureError::Parse { path: path.to_path_buf(), source })
}

/// Parses a wire-format `NAMESPACE.CODE` action reference the same way the engine's
/// request path does.
pub fn parse_action(action: &str) -> Result<policy_core::model::ActionRef, FixtureError> {
    let (ns, code) = action
        .split_once('.')
        .ok_or_else(|| FixtureError::InvalidAction(action.to_string()))?;
    let namespace = match ns {
        "ENTITY" => Namespace::Entity,
        "WORKFLOW" => Namespace::Workflow,
        "UTIL" => Namespace::Util,
        "DELEGATION" => Namespace::Delegation,
        "COLLAB" => Namespace::Collab,
        _ => return Err(FixtureError::InvalidAction(action.to_string())),
    };
    Ok(policy_core::model::ActionRef { namespace, code: code.to_string() })
}

/// Seeds an in-memory repository from the fixture's policies, converting each
/// [`FixtureRule`] into a `Rule` stamped with its owning version id.
pub fn seed_in_memory(fixture: &Fixture, repo: &policy_store::InMemoryPolicyRepository) {
    for fp in &fixture.policies {
        let mut rules_by_version = BTreeMap::new();
        for fv in &fp.versions {
            let rules = fv
                .rules
                .iter()
                .map(|fr| policy_core::model::Rule {
                    rule_id: fr.rule_id.clone(),
                    version_id: fv.version_id.clone(),
                    scope_type: fr.scope_type,
                    scope_key: fr.scope_key.clone(),
                    subject_type: fr.subject_type,
                    subject_key: fr.subject_key.clone(),
                    effect: fr.effect,
                    conditions: fr.conditions.clone(),
                    priority: fr.priority,
                    is_active: fr.is_active,
                    operations: fr.operations.clone(),
                    obligations: fr.obligations.clone(),
                })
                .collect();
            rules_by_version.insert(fv.version_id.clone(), rules);
        }
        let versions = fp
            .versions
            .iter()
            .map(|fv| PolicyVersion {
                version_id: fv.version_id.clone(),
                policy_id: fp.policy_id.clone(),
                version_no: fv.version_no,
                status: fv.status,
                created_at_ms: 0,
                published_at_ms: fv.published_at_ms,
            })
            .collect();
        repo.upsert(
            &fixture.tenant_id,
            PolicyRecord {
                policy: Policy {
                    tenant_id: fixture.tenant_id.clone(),
                    policy_id: fp.policy_id.clone(),
                    name: fp.name.clone(),
                    description: fp.description.clone(),
                    scope_type: fp.scope_type,
                    scope_key: fp.scope_key.clone(),
                    is_active: fp.is_active,
                },
                versions,
                rules_by_version,
            },
        );
    }
}
