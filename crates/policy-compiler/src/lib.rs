//! Compiles raw policy rules into an indexed, checksummed `CompiledPolicy` (C5, §4.5).
//!
//! The compiler is deliberately pure: given the same `(policy_id, version_id, rules)`
//! it always produces the same `CompiledPolicy`, including `checksum`. Rules that
//! fail validation are excluded and reported as diagnostics rather than aborting the
//! whole compile, unless every rule in the version is invalid.

#![deny(unsafe_code)]

mod checksum;
mod validate;

use policy_core::error::{PolicyError, RuleDiagnostic};
use policy_core::model::{CompiledCounts, CompiledPolicy, CompiledRule, Rule, RuleIndex, WILDCARD};
use policy_eval::comparator::sort_rules;
use std::collections::BTreeSet;

pub use validate::validate_rule;

/// Diagnostics collected while compiling, even on a successful compile (some rules may
/// have been silently excluded rather than fatal).
#[derive(Debug, Clone, Default)]
pub struct CompileReport {
    pub diagnostics: Vec<RuleDiagnostic>,
    pub excluded_rule_count: usize,
}

/// Compile `rules` (a flat pool, typically every rule attached to `version_id`) into a
/// `CompiledPolicy`. Inactive rules and rules belonging to a different version are
/// silently skipped (not diagnosed — they are expected noise from a repository query,
/// not an authoring error). Rules that fail validation are diagnosed and excluded;
/// compilation only fails outright when every candidate rule was excluded.
pub fn compile(
    policy_id: &str,
    version_id: &str,
    rules: &[Rule],
    compiled_at_ms: u64,
) -> Result<(CompiledPolicy, CompileReport), PolicyError> {
    let mut diagnostics = Vec::new();
    let mut index: RuleIndex = RuleIndex::new();
    let mut scope_slots: BTreeSet<String> = BTreeSet::new();
    let mut subject_slots: BTreeSet<String> = BTreeSet::new();
    let mut candidate_count = 0usize;
    let mut accepted_count = 0usize;

    for rule in rules {
        if !rule.is_active || rule.version_id != version_id {
            continue;
        }
        candidate_count += 1;

        if let Err(message) = validate_rule(rule) {
            diagnostics.push(RuleDiagnostic { rule_id: rule.rule_id.clone(), message });
            continue;
        }

        let scope_slot = format!(
            "{}:{}",
            rule.scope_type.as_str(),
            rule.scope_key.as_deref().unwrap_or(WILDCARD)
        );
        let subject_slot = format!("{}:{}", rule.subject_type.as_str(), rule.subject_key);
        scope_slots.insert(scope_slot.clone());
        subject_slots.insert(subject_slot.clone());

        let compiled_rule = CompiledRule {
            rule_id: rule.rule_id.clone(),
            effect: rule.effect,
            priority: rule.priority,
            scope_type: rule.scope_type,
            subject_type: rule.subject_type,
            subject_key: rule.subject_key.clone(),
            conditions: rule.conditions.clone(),
            obligations: rule.obligations.clone(),
        };

        for op in &rule.operations {
            index
                .entry(scope_slot.clone())
                .or_default()
                .entry(subject_slot.clone())
                .or_default()
                .entry(op.clone())
                .or_default()
                .push(compiled_rule.clone());
        }
        accepted_count += 1;
    }

    if candidate_count > 0 && accepted_count == 0 {
        return Err(PolicyError::CompilationFailed {
            message: format!(
                "all {candidate_count} candidate rule(s) for version '{version_id}' failed validation"
            ),
            diagnostics,
        });
    }

    for scope in index.values_mut() {
        for subjects in scope.values_mut() {
            for ops in subjects.values_mut() {
                sort_rules(ops);
            }
        }
    }

    let checksum = checksum::compute(version_id, &index);
    let counts = CompiledCounts {
        scope_count: scope_slots.len(),
        subject_count: subject_slots.len(),
        rule_count: accepted_count,
    };

    let compiled = CompiledPolicy {
        policy_id: policy_id.to_string(),
        version_id: version_id.to_string(),
        compiled_at_ms,
        checksum,
        rule_index: index,
        counts,
    };
    let excluded_rule_count = diagnostics.len();

    Ok((compiled, CompileReport { diagnostics, excluded_rule_count }))
}
