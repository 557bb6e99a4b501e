use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};

use crate::ast::meta::{CmpOp, Index, Lhs, Literal, MetaExpr, SECONDS_PER_DAY};
use crate::value::{Metadata, Value};

/// Errors that can occur while evaluating a metadata expression in process.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// A `~`-family operator carried a pattern that is not a valid
    /// regular expression.
    BadRegex { pattern: String, error: String },
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::BadRegex { pattern, error } => {
                write!(f, "bad regular expression '{}': {}", pattern, error)
            }
        }
    }
}

impl std::error::Error for EvalError {}

/// In-process metadata-expression evaluator.
///
/// Given an attribute-name-to-value map and a predicate tree (normalized or
/// not), evaluates to a boolean. This is the reference semantics the SQL
/// translation must agree with, operator by operator, including the
/// calendar-day desugaring of `date(...)` literals: used for post-filtering
/// materialized results, for dataset `having` clauses, and for any predicate
/// SQL lowering declines to handle.
///
/// A missing attribute fails every leaf except `not present`. Values of
/// different JSON kinds never satisfy an ordering comparison.
///
/// # Examples
///
/// ```
/// use mql_lang::ast::{CmpOp, Lhs, Literal, MetaExpr};
/// use mql_lang::evaluator::MetaEvaluator;
/// use mql_lang::Value;
/// use std::collections::HashMap;
///
/// let mut meta = HashMap::new();
/// meta.insert("v".to_string(), Value::Integer(5));
///
/// let expr = MetaExpr::InRange {
///     lhs: Lhs::Scalar("v".to_string()),
///     low: Literal::Int(1),
///     high: Literal::Int(10),
///     negated: false,
/// };
/// assert!(MetaEvaluator::new().evaluate(&meta, &expr).unwrap());
/// ```
#[derive(Default)]
pub struct MetaEvaluator;

impl MetaEvaluator {
    pub fn new() -> Self {
        MetaEvaluator
    }

    pub fn evaluate(&self, metadata: &Metadata, expr: &MetaExpr) -> Result<bool, EvalError> {
        match expr {
            MetaExpr::And(children) => {
                for c in children {
                    if !self.evaluate(metadata, c)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            MetaExpr::Or(children) => {
                for c in children {
                    if self.evaluate(metadata, c)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            MetaExpr::Not(inner) => Ok(!self.evaluate(metadata, inner)?),

            MetaExpr::Present { name } => Ok(metadata.contains_key(name)),
            MetaExpr::NotPresent { name } => Ok(!metadata.contains_key(name)),

            MetaExpr::Cmp { lhs, op, value } => self.eval_cmp(metadata, lhs, *op, value),

            MetaExpr::InRange {
                lhs,
                low,
                high,
                negated,
            } => Ok(self.eval_in_range(metadata, lhs, low, high, *negated)),

            MetaExpr::InSet { lhs, set, negated } => {
                Ok(self.eval_in_set(metadata, lhs, set, *negated))
            }
        }
    }

    fn eval_cmp(
        &self,
        metadata: &Metadata,
        lhs: &Lhs,
        op: CmpOp,
        value: &Literal,
    ) -> Result<bool, EvalError> {
        let re = if op.is_regex() {
            match value {
                Literal::Str(pattern) => Some(compile_regex(pattern, op)?),
                // A non-string pattern can never match anything.
                _ => None,
            }
        } else {
            None
        };

        let test = |v: &Value| -> bool {
            if op.is_regex() {
                match (&re, v.as_str()) {
                    (Some(re), Some(s)) => {
                        let matched = re.is_match(s);
                        if matches!(op, CmpOp::NotMatch | CmpOp::NotMatchI) {
                            !matched
                        } else {
                            matched
                        }
                    }
                    _ => false,
                }
            } else if let Literal::Date(day) = value {
                date_cmp(v, op, *day)
            } else {
                cmp_values(v, op, &value.to_value())
            }
        };

        Ok(match lhs {
            Lhs::Scalar(name) | Lhs::ObjectAttribute(name) => {
                metadata.get(name).is_some_and(test)
            }
            Lhs::ArrayAny(name) => match element_values(metadata, name) {
                Some(values) => values.into_iter().any(test),
                None => false,
            },
            Lhs::Subscript { name, index } => {
                subscript_value(metadata, name, index).is_some_and(test)
            }
            Lhs::ArrayLength(name) => array_length(metadata, name)
                .map(Value::Integer)
                .is_some_and(|l| test(&l)),
        })
    }

    fn eval_in_range(
        &self,
        metadata: &Metadata,
        lhs: &Lhs,
        low: &Literal,
        high: &Literal,
        negated: bool,
    ) -> bool {
        let low_v = low.to_value();
        // A date upper bound extends to the end of its calendar day,
        // exclusive: [low, high + 1d).
        let (high_v, high_exclusive) = match high {
            Literal::Date(t) => (Value::Float(t + SECONDS_PER_DAY), true),
            other => (other.to_value(), false),
        };

        let inside = |v: &Value| -> bool {
            let ge_low = matches!(
                v.compare(&low_v),
                Some(Ordering::Greater) | Some(Ordering::Equal)
            );
            let le_high = if high_exclusive {
                matches!(v.compare(&high_v), Some(Ordering::Less))
            } else {
                matches!(
                    v.compare(&high_v),
                    Some(Ordering::Less) | Some(Ordering::Equal)
                )
            };
            ge_low && le_high
        };
        // The negated form is element-wise: the value (or at least one
        // element) falls outside the range. Incomparable values are
        // neither inside nor outside.
        let outside = |v: &Value| -> bool {
            let lt_low = matches!(v.compare(&low_v), Some(Ordering::Less));
            let gt_high = if high_exclusive {
                matches!(
                    v.compare(&high_v),
                    Some(Ordering::Greater) | Some(Ordering::Equal)
                )
            } else {
                matches!(v.compare(&high_v), Some(Ordering::Greater))
            };
            lt_low || gt_high
        };
        let test = |v: &Value| if negated { outside(v) } else { inside(v) };

        match lhs {
            Lhs::Scalar(name) | Lhs::ObjectAttribute(name) => {
                metadata.get(name).is_some_and(test)
            }
            Lhs::ArrayAny(name) => match element_values(metadata, name) {
                Some(values) => values.into_iter().any(test),
                None => false,
            },
            Lhs::Subscript { name, index } => {
                subscript_value(metadata, name, index).is_some_and(test)
            }
            Lhs::ArrayLength(name) => array_length(metadata, name)
                .map(Value::Integer)
                .is_some_and(|l| test(&l)),
        }
    }

    fn eval_in_set(&self, metadata: &Metadata, lhs: &Lhs, set: &[Literal], negated: bool) -> bool {
        let values: Vec<Value> = set.iter().map(Literal::to_value).collect();
        let in_set = |v: &Value| values.iter().any(|s| v.loose_eq(s));
        let test = |v: &Value| if negated { !in_set(v) } else { in_set(v) };

        match lhs {
            Lhs::Scalar(name) | Lhs::ObjectAttribute(name) => {
                metadata.get(name).is_some_and(test)
            }
            Lhs::ArrayAny(name) => match element_values(metadata, name) {
                Some(elements) => elements.into_iter().any(test),
                None => false,
            },
            Lhs::Subscript { name, index } => {
                subscript_value(metadata, name, index).is_some_and(test)
            }
            Lhs::ArrayLength(name) => array_length(metadata, name)
                .map(Value::Integer)
                .is_some_and(|l| test(&l)),
        }
    }
}

/// Plain (non-regex, non-date) comparison.
fn cmp_values(v: &Value, op: CmpOp, rhs: &Value) -> bool {
    match op {
        CmpOp::Eq => v.loose_eq(rhs),
        CmpOp::Ne => !v.loose_eq(rhs),
        CmpOp::Lt => matches!(v.compare(rhs), Some(Ordering::Less)),
        CmpOp::Le => matches!(
            v.compare(rhs),
            Some(Ordering::Less) | Some(Ordering::Equal)
        ),
        CmpOp::Gt => matches!(v.compare(rhs), Some(Ordering::Greater)),
        CmpOp::Ge => matches!(
            v.compare(rhs),
            Some(Ordering::Greater) | Some(Ordering::Equal)
        ),
        _ => false,
    }
}

/// Comparison against a `date(...)` literal: the stored value is an epoch
/// timestamp, the literal denotes the whole day `[t, t + 86400)`.
///
/// `=` selects inside the interval, `!=` its complement, `<` keeps the
/// day's start, `<=` and `>` shift to the day's end. Identical to the SQL
/// translation by construction.
fn date_cmp(v: &Value, op: CmpOp, day_start: f64) -> bool {
    let t = match v.as_float() {
        Some(t) => t,
        None => return false,
    };
    let day_end = day_start + SECONDS_PER_DAY;
    match op {
        CmpOp::Eq => t >= day_start && t < day_end,
        CmpOp::Ne => t < day_start || t >= day_end,
        CmpOp::Lt => t < day_start,
        CmpOp::Le => t < day_end,
        CmpOp::Gt => t >= day_end,
        CmpOp::Ge => t >= day_start,
        _ => false,
    }
}

fn compile_regex(pattern: &str, op: CmpOp) -> Result<Regex, EvalError> {
    RegexBuilder::new(pattern)
        .case_insensitive(matches!(op, CmpOp::MatchI | CmpOp::NotMatchI))
        .build()
        .map_err(|e| EvalError::BadRegex {
            pattern: pattern.to_string(),
            error: e.to_string(),
        })
}

/// The candidate elements of an `a[any]` operand: array elements, or the
/// values of an object attribute.
fn element_values<'a>(metadata: &'a Metadata, name: &str) -> Option<Vec<&'a Value>> {
    match metadata.get(name)? {
        Value::Array(items) => Some(items.iter().collect()),
        Value::Object(map) => Some(map.values().collect()),
        _ => None,
    }
}

fn subscript_value<'a>(metadata: &'a Metadata, name: &str, index: &Index) -> Option<&'a Value> {
    match (metadata.get(name)?, index) {
        (Value::Array(items), Index::Position(i)) => {
            if *i < 0 {
                let back = i.unsigned_abs() as usize;
                items.len().checked_sub(back).and_then(|k| items.get(k))
            } else {
                items.get(*i as usize)
            }
        }
        (Value::Object(map), Index::Key(k)) => map.get(k),
        _ => None,
    }
}

fn array_length(metadata: &Metadata, name: &str) -> Option<i64> {
    match metadata.get(name)? {
        Value::Array(items) => Some(items.len() as i64),
        _ => None,
    }
}
