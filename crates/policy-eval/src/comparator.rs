//! Determinism comparator (§4.3, C3): a strict total order over matched rules.

use policy_core::model::{CompiledRule, RuleRank};
use std::cmp::Ordering;

/// Compare two rules per the §4.3 total order. `Ordering::Less` means `a` is ranked
/// ahead of (more specific / higher priority than) `b`.
pub fn compare_rules(a: &CompiledRule, b: &CompiledRule) -> Ordering {
    RuleRank::from_compiled(a).cmp(&RuleRank::from_compiled(b))
}

/// Stable-sort `rules` into §4.3 order in place. Used both by the compiler (to
/// pre-sort index leaves) and by the evaluator (to order the final matched-rule set).
pub fn sort_rules(rules: &mut [CompiledRule]) {
    rules.sort_by(compare_rules);
}

/// Stable-sort a slice of references without cloning, for the evaluator's hot path
/// where rules live inside a borrowed `CompiledPolicy`.
pub fn sort_rule_refs<'a>(rules: &mut [&'a CompiledRule]) {
    rules.sort_by(|a, b| compare_rules(a, b));
}
