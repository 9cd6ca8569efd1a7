//! Stable checksum over a compiled rule index (§4.5 step 4).

use policy_core::model::RuleIndex;
use sha2::{Digest, Sha256};

/// Hash the canonical JSON form of `(version_id, rule_index)`. `RuleIndex` is built on
/// `BTreeMap`, so `serde_json` already emits keys in sorted order at every level —
/// canonicalization falls out of the type, no separate normalization pass needed.
pub fn compute(version_id: &str, index: &RuleIndex) -> String {
    let canonical = serde_json::json!({
        "versionId": version_id,
        "ruleIndex": index,
    });
    let bytes = serde_json::to_vec(&canonical)
        .expect("RuleIndex and version_id always serialize to valid JSON");
    hex::encode(Sha256::digest(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy_core::model::*;
    use std::collections::BTreeMap;

    fn sample_index() -> RuleIndex {
        let rule = CompiledRule {
            rule_id: "r1".into(),
            effect: Effect::Allow,
            priority: 10,
            scope_type: ScopeType::Entity,
            subject_type: SubjectType::User,
            subject_key: "u1".into(),
            conditions: None,
            obligations: vec![],
        };
        let mut ops = BTreeMap::new();
        ops.insert("ENTITY.READ".to_string(), vec![rule]);
        let mut subjects = BTreeMap::new();
        subjects.insert("u1".to_string(), ops);
        let mut scopes = BTreeMap::new();
        scopes.insert("document".to_string(), subjects);
        scopes
    }

    #[test]
    fn same_input_yields_same_checksum() {
        let idx = sample_index();
        assert_eq!(compute("v1", &idx), compute("v1", &idx));
    }

    #[test]
    fn different_version_id_changes_checksum() {
        let idx = sample_index();
        assert_ne!(compute("v1", &idx), compute("v2", &idx));
    }

    #[test]
    fn checksum_is_64_char_hex() {
        let checksum = compute("v1", &sample_index());
        assert_eq!(checksum.len(), 64);
        assert!(checksum.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
