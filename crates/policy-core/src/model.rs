//! Entities and wire types from §3 DATA MODEL.

use crate::value::{AttributeMap, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Scope types, ordered most-to-least specific. `Ord` follows that specificity order
/// directly so `ScopeType::Record < ScopeType::Global` reads as "more specific first"
/// once reversed by the comparator in `policy-eval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeType {
    Record,
    EntityVersion,
    Entity,
    Module,
    Global,
}

impl ScopeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeType::Record => "record",
            ScopeType::EntityVersion => "entity_version",
            ScopeType::Entity => "entity",
            ScopeType::Module => "module",
            ScopeType::Global => "global",
        }
    }

    /// Lower is more specific; used directly by the §4.3 comparator.
    pub fn specificity_rank(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subject types, ordered most-to-least specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    User,
    Service,
    Role,
    Group,
}

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectType::User => "user",
            SubjectType::Service => "service",
            SubjectType::Role => "role",
            SubjectType::Group => "group",
        }
    }

    pub fn specificity_rank(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The universal wildcard key usable in rule declarations for scope/subject/operation.
pub const WILDCARD: &str = "*";

/// Effect of a rule or a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "allow",
            Effect::Deny => "deny",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed namespace set for operation codes (§3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Namespace {
    Entity,
    Workflow,
    Util,
    Delegation,
    Collab,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Entity => "ENTITY",
            Namespace::Workflow => "WORKFLOW",
            Namespace::Util => "UTIL",
            Namespace::Delegation => "DELEGATION",
            Namespace::Collab => "COLLAB",
        }
    }
}

/// `(namespace, code)` operation catalog entry, wire format `NAMESPACE.CODE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub namespace: Namespace,
    pub code: String,
}

impl Operation {
    pub fn full_code(&self) -> String {
        format!("{}.{}", self.namespace.as_str(), self.code)
    }
}

/// Version lifecycle state (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    Draft,
    Staged,
    Published,
    Archived,
}

/// `(tenantId, policyId)` identity plus metadata; owns an ordered set of versions
/// (versions themselves are stored by the repository, not embedded here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub tenant_id: String,
    pub policy_id: String,
    pub name: String,
    pub description: Option<String>,
    pub scope_type: ScopeType,
    pub scope_key: Option<String>,
    pub is_active: bool,
}

/// `(versionId, policyId, versionNo)` plus lifecycle status and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyVersion {
    pub version_id: String,
    pub policy_id: String,
    pub version_no: u32,
    pub status: VersionStatus,
    pub created_at_ms: u64,
    pub published_at_ms: Option<u64>,
}

/// Boolean tree of ABAC conditions (§3, §4.1). `Leaf` tests a single field; `Group`
/// combines children under `and`/`or`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    Leaf { field: String, op: ConditionOp, value: Value },
    Group { op: GroupOp, children: Vec<Condition> },
}

/// Fixed leaf operator set (§4.1). Unknown operators never appear here — they are
/// rejected at parse time — but an evaluator must still treat a *malformed* operand
/// (e.g. `gt` against two strings) as "false", never as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
    Exists,
    NotExists,
}

/// Group combinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOp {
    And,
    Or,
}

/// An opaque payload attached to a rule that the caller is expected to honor if the
/// rule decides. The engine never interprets its contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obligation {
    pub key: String,
    pub value: Value,
}

/// `(ruleId, versionId, scopeType, scopeKey?, subjectType, subjectKey, effect,
/// conditions?, priority, isActive, operations[])` from §3. `operations` is a
/// non-empty set of `NAMESPACE.CODE` strings or `*`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: String,
    pub version_id: String,
    pub scope_type: ScopeType,
    pub scope_key: Option<String>,
    pub subject_type: SubjectType,
    pub subject_key: String,
    pub effect: Effect,
    pub conditions: Option<Condition>,
    /// Lower numbers bind tighter (§3).
    pub priority: u32,
    pub is_active: bool,
    pub operations: Vec<String>,
    #[serde(default)]
    pub obligations: Vec<Obligation>,
}

/// Subject attribute snapshot (§3). Used both at match time (subject key derivation)
/// and at condition time (attribute lookup).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectFacts {
    pub principal_id: String,
    pub principal_type: PrincipalType,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    pub org_unit: Option<String>,
    #[serde(default)]
    pub attributes: AttributeMap,
    pub generated_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalType {
    User,
    Service,
}

/// Resource attribute snapshot (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceFacts {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: Option<String>,
    pub version_id: Option<String>,
    pub module: Option<String>,
    pub owner_id: Option<String>,
    #[serde(default)]
    pub attributes: AttributeMap,
}

/// Request-scoped context (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub tenant_id: String,
    pub timestamp_ms: u64,
    pub correlation_id: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub channel: Option<String>,
    pub geo: Option<String>,
    #[serde(default)]
    pub attributes: AttributeMap,
}

/// The requested action, wire format `NAMESPACE.CODE`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRef {
    pub namespace: Namespace,
    pub code: String,
}

impl ActionRef {
    pub fn full_code(&self) -> String {
        format!("{}.{}", self.namespace.as_str(), self.code)
    }
}

/// Top-level evaluator input (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyInput {
    pub subject: SubjectFacts,
    pub resource: ResourceFacts,
    pub action: ActionRef,
    pub context: RequestContext,
}

/// A single pre-sorted rule inside a compiled index leaf (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledRule {
    pub rule_id: String,
    pub effect: Effect,
    pub priority: u32,
    pub scope_type: ScopeType,
    pub subject_type: SubjectType,
    pub subject_key: String,
    pub conditions: Option<Condition>,
    #[serde(default)]
    pub obligations: Vec<Obligation>,
}

/// Counts populated alongside a compiled policy (§4.5 step 5).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CompiledCounts {
    pub scope_count: usize,
    pub subject_count: usize,
    pub rule_count: usize,
}

/// Three-level index: `scopeSlot -> subjectSlot -> operationSlot -> orderedList<CompiledRule>`.
pub type RuleIndex = BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<CompiledRule>>>>;

/// `{policyId, versionId, compiledAt, checksum, ruleIndex, counts}` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledPolicy {
    pub policy_id: String,
    pub version_id: String,
    pub compiled_at_ms: u64,
    pub checksum: String,
    pub rule_index: RuleIndex,
    pub counts: CompiledCounts,
}

/// A matched rule surfaced in a `Decision` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedRule {
    pub rule_id: String,
    pub policy_id: String,
    pub policy_version_id: String,
    pub policy_name: String,
    pub effect: Effect,
    pub priority: u32,
    pub scope_type: ScopeType,
    pub subject_type: SubjectType,
    pub subject_key: String,
}

/// Debug counters surfaced only when `options.explain` is set (§4.9 step 5).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DebugCounters {
    pub rules_scanned: usize,
    pub rules_matched: usize,
    pub policies_evaluated: usize,
}

/// Decision metadata (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionMetadata {
    pub duration_ms: u64,
    pub evaluated_at_ms: u64,
    pub evaluator_version: String,
    pub correlation_id: Option<String>,
}

/// The authoritative top-level decision (§3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub effect: Effect,
    pub allowed: bool,
    pub deciding_rule: Option<MatchedRule>,
    pub matched_rules: Vec<MatchedRule>,
    pub obligations: Vec<Obligation>,
    pub reasons: Vec<String>,
    pub debug: Option<DebugCounters>,
    pub metadata: DecisionMetadata,
}

/// Conflict resolution strategy selectable per call (§4.4, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    DenyOverrides,
    AllowOverrides,
    PriorityOrder,
    FirstMatch,
}

impl Default for ConflictResolution {
    fn default() -> Self {
        ConflictResolution::DenyOverrides
    }
}

/// Per-call evaluation options (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyEvaluationOptions {
    #[serde(default)]
    pub conflict_resolution: ConflictResolution,
    #[serde(default)]
    pub explain: bool,
    pub deadline_ms: Option<u64>,
    #[serde(default = "default_max_condition_depth")]
    pub max_condition_depth: u32,
}

fn default_max_condition_depth() -> u32 {
    10
}

impl Default for PolicyEvaluationOptions {
    fn default() -> Self {
        Self {
            conflict_resolution: ConflictResolution::default(),
            explain: false,
            deadline_ms: None,
            max_condition_depth: default_max_condition_depth(),
        }
    }
}

/// Ranking projection used by the §4.3 comparator; kept here so both `policy-eval`
/// (comparing `CompiledRule`s) and `policy-compiler` (pre-sorting leaves) share one
/// source of truth for the ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleRank<'a> {
    pub scope_type: ScopeType,
    pub subject_type: SubjectType,
    pub subject_key: &'a str,
    pub priority: u32,
    pub effect: Effect,
    pub rule_id: &'a str,
}

impl<'a> RuleRank<'a> {
    pub fn from_compiled(r: &'a CompiledRule) -> Self {
        Self {
            scope_type: r.scope_type,
            subject_type: r.subject_type,
            subject_key: &r.subject_key,
            priority: r.priority,
            effect: r.effect,
            rule_id: &r.rule_id,
        }
    }
}

impl<'a> PartialOrd for RuleRank<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<'a> Ord for RuleRank<'a> {
    fn cmp(&self, other: &Self) -> Ordering {
        // 1. scope specificity: more specific (lower rank) wins -> sorts first.
        self.scope_type
            .specificity_rank()
            .cmp(&other.scope_type.specificity_rank())
            // 2. subject specificity, then wildcard-within-type ranks lowest.
            .then_with(|| self.subject_type.specificity_rank().cmp(&other.subject_type.specificity_rank()))
            .then_with(|| wildcard_rank(self.subject_key).cmp(&wildcard_rank(other.subject_key)))
            // 3. priority: lower number binds tighter.
            .then_with(|| self.priority.cmp(&other.priority))
            // 4. effect tie-break: deny before allow.
            .then_with(|| effect_rank(self.effect).cmp(&effect_rank(other.effect)))
            // 5. rule id, lexicographic ascending.
            .then_with(|| self.rule_id.cmp(other.rule_id))
    }
}

fn wildcard_rank(subject_key: &str) -> u8 {
    if subject_key == WILDCARD {
        1
    } else {
        0
    }
}

fn effect_rank(e: Effect) -> u8 {
    match e {
        Effect::Deny => 0,
        Effect::Allow => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_specificity_orders_record_before_global() {
        assert!(ScopeType::Record.specificity_rank() < ScopeType::Global.specificity_rank());
    }

    #[test]
    fn wildcard_subject_key_ranks_below_concrete_same_type() {
        let concrete = RuleRank {
            scope_type: ScopeType::Entity,
            subject_type: SubjectType::User,
            subject_key: "user-1",
            priority: 10,
            effect: Effect::Allow,
            rule_id: "r1",
        };
        let wildcard = RuleRank { subject_key: "*", rule_id: "r2", ..concrete };
        assert!(concrete < wildcard);
    }

    #[test]
    fn full_code_formats_namespace_dot_code() {
        let op = Operation { namespace: Namespace::Entity, code: "READ".into() };
        assert_eq!(op.full_code(), "ENTITY.READ");
    }
}
