//! Conflict resolver (§4.4, C4): collapses matched rules to a single effect.

use crate::comparator::compare_rules;
use policy_core::model::{CompiledRule, ConflictResolution, Effect};

/// A matched rule together with the policy identity it was compiled from, enough
/// context for the resolver to pick a deciding rule and for the orchestrator to build
/// a `MatchedRule` afterward.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub rule: &'a CompiledRule,
    pub policy_id: &'a str,
    pub policy_version_id: &'a str,
    pub policy_name: &'a str,
}

/// Outcome of conflict resolution: the chosen effect, the deciding candidate (`None`
/// only when there were no candidates at all), and the human-readable reason.
pub struct Resolution<'a> {
    pub effect: Effect,
    pub deciding: Option<Candidate<'a>>,
    pub reason: String,
}

pub const DEFAULT_DENY_REASON: &str = "No matching rules found (default deny)";

/// Sort `candidates` into §4.3 order and apply `strategy` (§4.4). Returns `deny` with
/// no deciding rule when `candidates` is empty (closed-world default deny).
pub fn resolve<'a>(mut candidates: Vec<Candidate<'a>>, strategy: ConflictResolution) -> Resolution<'a> {
    if candidates.is_empty() {
        return Resolution { effect: Effect::Deny, deciding: None, reason: DEFAULT_DENY_REASON.into() };
    }
    candidates.sort_by(|a, b| compare_rules(a.rule, b.rule));

    match strategy {
        ConflictResolution::DenyOverrides => {
            if let Some(deny) = candidates.iter().find(|c| c.rule.effect == Effect::Deny) {
                let reason = format!("Rule '{}' denied (deny_overrides)", deny.rule.rule_id);
                return Resolution { effect: Effect::Deny, deciding: Some(deny.clone()), reason };
            }
            let allow = candidates.into_iter().next().unwrap();
            let reason = format!("Rule '{}' allowed (deny_overrides, no deny matched)", allow.rule.rule_id);
            Resolution { effect: Effect::Allow, deciding: Some(allow), reason }
        }
        ConflictResolution::AllowOverrides => {
            if let Some(allow) = candidates.iter().find(|c| c.rule.effect == Effect::Allow) {
                let reason = format!("Rule '{}' allowed (allow_overrides)", allow.rule.rule_id);
                return Resolution { effect: Effect::Allow, deciding: Some(allow.clone()), reason };
            }
            let deny = candidates.into_iter().next().unwrap();
            let reason = format!("Rule '{}' denied (allow_overrides, no allow matched)", deny.rule.rule_id);
            Resolution { effect: Effect::Deny, deciding: Some(deny), reason }
        }
        ConflictResolution::PriorityOrder | ConflictResolution::FirstMatch => {
            let top = candidates.into_iter().next().unwrap();
            let reason = format!("Rule '{}' decided ({:?})", top.rule.rule_id, strategy);
            let effect = top.rule.effect;
            Resolution { effect, deciding: Some(top), reason }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy_core::model::*;

    fn rule(id: &str, priority: u32, effect: Effect) -> CompiledRule {
        CompiledRule {
            rule_id: id.to_string(),
            effect,
            priority,
            scope_type: ScopeType::Entity,
            subject_type: SubjectType::User,
            subject_key: "u1".into(),
            conditions: None,
            obligations: vec![],
        }
    }

    fn cand<'a>(rule: &'a CompiledRule) -> Candidate<'a> {
        Candidate { rule, policy_id: "pA", policy_version_id: "vA", policy_name: "Policy A" }
    }

    #[test]
    fn empty_candidates_default_deny() {
        let res = resolve(vec![], ConflictResolution::DenyOverrides);
        assert_eq!(res.effect, Effect::Deny);
        assert!(res.deciding.is_none());
        assert_eq!(res.reason, DEFAULT_DENY_REASON);
    }

    #[test]
    fn deny_overrides_picks_deny_even_if_allow_outranks_it() {
        let allow = rule("allow", 50, Effect::Allow);
        let deny = rule("deny", 100, Effect::Deny);
        let res = resolve(vec![cand(&allow), cand(&deny)], ConflictResolution::DenyOverrides);
        assert_eq!(res.effect, Effect::Deny);
        assert_eq!(res.deciding.unwrap().rule.rule_id, "deny");
    }

    #[test]
    fn allow_overrides_picks_allow_even_if_deny_outranks_it() {
        let allow = rule("allow", 50, Effect::Allow);
        let deny = rule("deny", 10, Effect::Deny);
        let res = resolve(vec![cand(&allow), cand(&deny)], ConflictResolution::AllowOverrides);
        assert_eq!(res.effect, Effect::Allow);
        assert_eq!(res.deciding.unwrap().rule.rule_id, "allow");
    }

    #[test]
    fn first_match_takes_top_ranked_rule_outright() {
        let low_pri_allow = rule("allow", 100, Effect::Allow);
        let high_pri_deny = rule("deny", 10, Effect::Deny);
        let res =
            resolve(vec![cand(&low_pri_allow), cand(&high_pri_deny)], ConflictResolution::FirstMatch);
        assert_eq!(res.effect, Effect::Deny);
        assert_eq!(res.deciding.unwrap().rule.rule_id, "deny");
    }
}
