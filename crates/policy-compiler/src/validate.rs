//! Per-rule validation (§4.5 step 1).

use policy_core::model::{Condition, Rule, WILDCARD};

/// Maximum nesting depth accepted by the compiler itself; the evaluator enforces its
/// own `maxConditionDepth` per call, but a rule whose *declared* tree already exceeds
/// the hard ceiling is rejected at compile time so a malicious/buggy policy author
/// cannot smuggle an unbounded tree past a lenient per-call option.
const HARD_MAX_CONDITION_DEPTH: u32 = 10;

/// Validate a single rule, returning the first problem found (if any) as a message
/// suitable for a `RuleDiagnostic`.
pub fn validate_rule(rule: &Rule) -> Result<(), String> {
    if rule.operations.is_empty() {
        return Err("operations must be non-empty".to_string());
    }
    for op in &rule.operations {
        if op != WILDCARD && !is_well_formed_operation_code(op) {
            return Err(format!("operation code '{op}' is not NAMESPACE.CODE or '*'"));
        }
    }
    if rule.subject_key.is_empty() {
        return Err("subject_key must be non-empty".to_string());
    }
    if let Some(scope_key) = &rule.scope_key {
        if scope_key.is_empty() {
            return Err("scope_key must be non-empty when present".to_string());
        }
    }
    if let Some(cond) = &rule.conditions {
        validate_condition_depth(cond, 0)?;
    }
    Ok(())
}

fn is_well_formed_operation_code(code: &str) -> bool {
    let Some((ns, rest)) = code.split_once('.') else { return false };
    !ns.is_empty()
        && !rest.is_empty()
        && rest.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false)
        && rest.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn validate_condition_depth(condition: &Condition, depth: u32) -> Result<(), String> {
    if depth > HARD_MAX_CONDITION_DEPTH {
        return Err(format!("condition tree exceeds max depth {HARD_MAX_CONDITION_DEPTH}"));
    }
    match condition {
        Condition::Leaf { field, .. } => {
            if field.is_empty() || field.split('.').any(str::is_empty) {
                return Err(format!("malformed field path '{field}'"));
            }
            Ok(())
        }
        Condition::Group { children, .. } => {
            for child in children {
                validate_condition_depth(child, depth + 1)?;
            }
            Ok(())
        }
    }
}
