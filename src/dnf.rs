//! Disjunctive-normal-form conversion for metadata expressions.
//!
//! [`regularize`] turns an arbitrary predicate tree into the canonical
//! two-level shape the rest of the pipeline relies on: an `Or` whose
//! children are all `And`, whose children are all leaves. `Not` is
//! eliminated algebraically on the way in (De Morgan, operator complements,
//! flag toggles - see [`MetaExpr::negated`]).
//!
//! Distribution of AND over OR is exponential in the number of OR branches
//! under a conjunction. Query predicates are short in practice, so this is
//! a known scaling limit rather than a bug; [`MAX_DNF_TERMS`] bounds the
//! expansion and conversion fails fast past it instead of hanging.

use crate::ast::meta::MetaExpr;
use crate::error::CompileError;

/// Upper bound on the number of AND-terms a normalized expression may have.
pub const MAX_DNF_TERMS: usize = 1024;

/// Normalize a predicate into DNF: `Or(And(leaf, ...), ...)`.
///
/// Idempotent: regularizing an already-regular expression reproduces it.
pub fn regularize(expr: MetaExpr) -> Result<MetaExpr, CompileError> {
    let terms = normalize(expr)?;
    Ok(MetaExpr::Or(terms.into_iter().map(MetaExpr::And).collect()))
}

/// Conjoin a new predicate with an (optional) accumulated one and
/// re-normalize. This is the only sanctioned way to grow a selector's
/// `where` clause; raw tree concatenation would break the two-level shape.
pub fn conjoin(existing: Option<MetaExpr>, new: MetaExpr) -> Result<MetaExpr, CompileError> {
    match existing {
        None => regularize(new),
        Some(e) => regularize(MetaExpr::And(vec![e, new])),
    }
}

/// The AND-terms of a normalized expression, one `Vec` of leaves per term.
///
/// Accepts any predicate (it normalizes on the way); used by the SQL
/// translator and anywhere the or-of-ands list form is more convenient
/// than the tree.
pub fn terms(expr: &MetaExpr) -> Result<Vec<Vec<MetaExpr>>, CompileError> {
    normalize(expr.clone())
}

fn normalize(expr: MetaExpr) -> Result<Vec<Vec<MetaExpr>>, CompileError> {
    match expr {
        MetaExpr::Not(inner) => normalize(inner.negated()),

        MetaExpr::Or(children) => {
            let mut out: Vec<Vec<MetaExpr>> = Vec::new();
            for child in children {
                out.extend(normalize(child)?);
                check_bound(out.len())?;
            }
            Ok(out)
        }

        MetaExpr::And(children) => {
            // Cartesian product of the children's OR-terms.
            let mut acc: Vec<Vec<MetaExpr>> = vec![Vec::new()];
            for child in children {
                let child_terms = normalize(child)?;
                check_bound(acc.len().saturating_mul(child_terms.len()))?;
                let mut next = Vec::with_capacity(acc.len() * child_terms.len());
                for path in &acc {
                    for term in &child_terms {
                        let mut combined = path.clone();
                        combined.extend(term.iter().cloned());
                        next.push(combined);
                    }
                }
                acc = next;
            }
            Ok(acc)
        }

        leaf => Ok(vec![vec![leaf]]),
    }
}

fn check_bound(terms: usize) -> Result<(), CompileError> {
    if terms > MAX_DNF_TERMS {
        Err(CompileError::TooManyTerms {
            terms,
            limit: MAX_DNF_TERMS,
        })
    } else {
        Ok(())
    }
}
