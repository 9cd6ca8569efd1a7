//! Boolean-tree evaluator for `Condition` (§4.1, C1).
//!
//! Evaluation is pure and total (aside from the bounded-depth error): the same
//! `(condition, input)` pair always yields the same result, and no operator ever
//! coerces across value tags.

use crate::context::EvalContext;
use crate::regex_cache::compiled_pattern;
use policy_core::error::PolicyError;
use policy_core::model::{Condition, ConditionOp, GroupOp};
use policy_core::value::Value;

/// Evaluate a condition tree against `ctx`, bounded by `max_depth` (§4.1). Returns
/// `POLICY_EXPR_TOO_DEEP` if the tree's nesting exceeds `max_depth`; every other
/// failure mode (invalid regex, type mismatch, unknown path) resolves to `false`
/// rather than an error.
pub fn evaluate(
    condition: &Condition,
    ctx: &EvalContext<'_>,
    max_depth: u32,
) -> Result<bool, PolicyError> {
    eval_at_depth(condition, ctx, 0, max_depth)
}

fn eval_at_depth(
    condition: &Condition,
    ctx: &EvalContext<'_>,
    depth: u32,
    max_depth: u32,
) -> Result<bool, PolicyError> {
    if depth > max_depth {
        return Err(PolicyError::ExprTooDeep { max_depth });
    }
    match condition {
        Condition::Leaf { field, op, value } => {
            let resolved = ctx.resolve(field);
            Ok(eval_leaf(*op, &resolved, value))
        }
        Condition::Group { op, children } => match op {
            GroupOp::And => {
                for child in children {
                    if !eval_at_depth(child, ctx, depth + 1, max_depth)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            GroupOp::Or => {
                for child in children {
                    if eval_at_depth(child, ctx, depth + 1, max_depth)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        },
    }
}

fn eval_leaf(op: ConditionOp, left: &Value, right: &Value) -> bool {
    match op {
        ConditionOp::Eq => left == right,
        ConditionOp::Ne => left != right,
        ConditionOp::Gt => numeric_cmp(left, right).map(|o| o.is_gt()).unwrap_or(false),
        ConditionOp::Gte => numeric_cmp(left, right).map(|o| o.is_ge()).unwrap_or(false),
        ConditionOp::Lt => numeric_cmp(left, right).map(|o| o.is_lt()).unwrap_or(false),
        ConditionOp::Lte => numeric_cmp(left, right).map(|o| o.is_le()).unwrap_or(false),
        ConditionOp::In => match right.as_list() {
            Some(list) => list.iter().any(|v| v == left),
            None => false,
        },
        ConditionOp::NotIn => match right.as_list() {
            Some(list) => !list.iter().any(|v| v == left),
            None => true,
        },
        ConditionOp::Contains => match (left.as_str(), right.as_str()) {
            (Some(l), Some(r)) => l.contains(r),
            _ => false,
        },
        ConditionOp::StartsWith => match (left.as_str(), right.as_str()) {
            (Some(l), Some(r)) => l.starts_with(r),
            _ => false,
        },
        ConditionOp::EndsWith => match (left.as_str(), right.as_str()) {
            (Some(l), Some(r)) => l.ends_with(r),
            _ => false,
        },
        ConditionOp::Matches => match (left.as_str(), right.as_str()) {
            (Some(l), Some(pattern)) => {
                compiled_pattern(pattern).map(|re| re.is_match(l)).unwrap_or(false)
            }
            _ => false,
        },
        ConditionOp::Exists => left.is_present(),
        ConditionOp::NotExists => !left.is_present(),
    }
}

fn numeric_cmp(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    let l = left.as_number()?;
    let r = right.as_number()?;
    l.partial_cmp(&r)
}
