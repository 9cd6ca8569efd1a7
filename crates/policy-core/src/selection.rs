//! Version selection modes (§4.6), used by previews/tests to pin a non-published version.

use serde::{Deserialize, Serialize};

/// How to pick a `PolicyVersion` for a policy. Evaluation always uses `Published`
/// unless a caller explicitly overrides with one of the other modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum VersionSelection {
    /// The single `published` version (a policy has at most one). Default for evaluation.
    Published,
    /// An exact version id, regardless of status.
    Specific { version_id: String },
    /// The latest `published` version with `publishedAt <= at_ms`.
    EffectiveAt { at_ms: u64 },
    /// The latest `staged` version, for previews.
    Staged,
    /// The latest `draft` version, for previews.
    Draft,
}

impl Default for VersionSelection {
    fn default() -> Self {
        VersionSelection::Published
    }
}
