//! Rule matcher (§4.2, C2): builds subject/scope/operation slot lists and crosses them
//! against a compiled index.

use policy_core::model::{ActionRef, CompiledPolicy, CompiledRule, PrincipalType, ResourceFacts, SubjectFacts};
use policy_core::model::WILDCARD;

/// Build the subject key list from `SubjectFacts`, in the order described by §4.2:
/// `user:<id>`, optionally `service:<id>`, one `role:<r>` per role, one `group:<g>`
/// per group, plus the universal wildcard at each level.
pub fn subject_slots(subject: &SubjectFacts) -> Vec<String> {
    let mut slots = vec![format!("user:{}", subject.principal_id), "user:*".to_string()];
    if subject.principal_type == PrincipalType::Service {
        slots.push(format!("service:{}", subject.principal_id));
        slots.push("service:*".to_string());
    }
    for role in &subject.roles {
        slots.push(format!("role:{}", role));
    }
    slots.push("role:*".to_string());
    for group in &subject.groups {
        slots.push(format!("group:{}", group));
    }
    slots.push("group:*".to_string());
    slots
}

/// Build the scope slot list for the request's resource, most specific first (§4.2).
pub fn scope_slots(resource: &ResourceFacts) -> Vec<String> {
    let mut slots = Vec::with_capacity(5);
    if let Some(id) = &resource.id {
        slots.push(format!("record:{}", id));
    }
    if let Some(v) = &resource.version_id {
        slots.push(format!("entity_version:{}", v));
    }
    slots.push(format!("entity:{}", resource.resource_type));
    if let Some(m) = &resource.module {
        slots.push(format!("module:{}", m));
    }
    slots.push(format!("global:{}", WILDCARD));
    slots
}

/// Build the operation slot list: the concrete full code, then the wildcard (§4.2).
pub fn operation_slots(action: &ActionRef) -> Vec<String> {
    vec![action.full_code(), WILDCARD.to_string()]
}

/// Cross `scopeSlot x subjectSlot x operationSlot` against the compiled index and
/// collect every matched `CompiledRule`, without deduplicating (a rule only ever
/// appears once per leaf it was inserted under, and it is inserted under exactly the
/// slots it declared).
pub fn match_rules<'a>(
    compiled: &'a CompiledPolicy,
    subject: &SubjectFacts,
    resource: &ResourceFacts,
    action: &ActionRef,
) -> Vec<&'a CompiledRule> {
    let scopes = scope_slots(resource);
    let subjects = subject_slots(subject);
    let ops = operation_slots(action);

    let mut out = Vec::new();
    for scope in &scopes {
        let Some(by_subject) = compiled.rule_index.get(scope) else { continue };
        for subj in &subjects {
            let Some(by_op) = by_subject.get(subj) else { continue };
            for op in &ops {
                if let Some(rules) = by_op.get(op) {
                    out.extend(rules.iter());
                }
            }
        }
    }
    out
}
