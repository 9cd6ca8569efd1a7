//! Fixed error taxonomy (§7). Every variant is propagated by code, never by panic.

use serde::Serialize;
use thiserror::Error;

/// A single rule-level validation diagnostic attached to a `PolicyCompilationFailed`
/// error (or returned alongside a successful compile that excluded some rules).
#[derive(Debug, Clone, Serialize)]
pub struct RuleDiagnostic {
    pub rule_id: String,
    pub message: String,
}

/// The fixed error taxonomy from §7. Variant names match the wire codes verbatim so a
/// caller can match on `PolicyError::code()` without string comparison.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("condition tree exceeds max depth {max_depth}")]
    ExprTooDeep { max_depth: u32 },

    #[error("evaluation deadline of {deadline_ms}ms exceeded")]
    EvalTimeout { deadline_ms: u64 },

    #[error("fact resolution failed: {0}")]
    FactResolutionFailed(String),

    #[error("policy compilation failed: {message}")]
    CompilationFailed { message: String, diagnostics: Vec<RuleDiagnostic> },

    #[error("internal error: {0}")]
    Internal(String),
}

impl PolicyError {
    /// The stable wire code for this error, as listed in §7.
    pub fn code(&self) -> &'static str {
        match self {
            PolicyError::InvalidInput(_) => "INVALID_INPUT",
            PolicyError::ExprTooDeep { .. } => "POLICY_EXPR_TOO_DEEP",
            PolicyError::EvalTimeout { .. } => "POLICY_EVAL_TIMEOUT",
            PolicyError::FactResolutionFailed(_) => "FACT_RESOLUTION_FAILED",
            PolicyError::CompilationFailed { .. } => "POLICY_COMPILATION_FAILED",
            PolicyError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_spec_taxonomy() {
        assert_eq!(PolicyError::InvalidInput("x".into()).code(), "INVALID_INPUT");
        assert_eq!(PolicyError::ExprTooDeep { max_depth: 10 }.code(), "POLICY_EXPR_TOO_DEEP");
        assert_eq!(PolicyError::EvalTimeout { deadline_ms: 50 }.code(), "POLICY_EVAL_TIMEOUT");
        assert_eq!(
            PolicyError::CompilationFailed { message: "x".into(), diagnostics: vec![] }.code(),
            "POLICY_COMPILATION_FAILED"
        );
    }
}
