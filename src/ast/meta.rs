use std::collections::HashMap;

use crate::value::Value;

/// Seconds in one calendar day, the width of the interval a `date(...)`
/// literal desugars to.
pub const SECONDS_PER_DAY: f64 = 86400.0;

/// A constant appearing in a metadata expression or filter parameter list.
///
/// `Date` carries epoch seconds at midnight UTC and keeps calendar-day
/// comparison semantics: equality and ranges against a `Date` cover the
/// half-open interval `[t, t + 86400)`. `DateTime` is an exact instant and
/// compares like a plain number.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    Date(f64),
    DateTime(f64),
}

impl Literal {
    /// The plain value this literal compares against.
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Int(n) => Value::Integer(*n),
            Literal::Float(n) => Value::Float(*n),
            Literal::Str(s) => Value::String(s.clone()),
            Literal::Bool(b) => Value::Boolean(*b),
            Literal::Null => Value::Null,
            Literal::Date(t) => Value::Float(*t),
            Literal::DateTime(t) => Value::Float(*t),
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, Literal::Date(_))
    }

    /// Coarse type name used for range-bound compatibility checks.
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::Int(_) | Literal::Float(_) => "number",
            Literal::Str(_) => "string",
            Literal::Bool(_) => "bool",
            Literal::Null => "null",
            Literal::Date(_) => "date",
            Literal::DateTime(_) => "datetime",
        }
    }
}

/// Comparison operator of a `cmp_op` leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    /// Regular-expression match `~`
    Match,
    /// Case-insensitive match `~*`
    MatchI,
    NotMatch,
    NotMatchI,
}

impl CmpOp {
    /// The operator whose result is the logical negation of this one.
    ///
    /// Used to eliminate `!` in front of comparisons: `!(x < c)` becomes
    /// `x >= c`, `!(x ~ p)` becomes `x !~ p`, and so on.
    pub fn complement(self) -> CmpOp {
        match self {
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Le => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Le,
            CmpOp::Ge => CmpOp::Lt,
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
            CmpOp::Match => CmpOp::NotMatch,
            CmpOp::NotMatch => CmpOp::Match,
            CmpOp::MatchI => CmpOp::NotMatchI,
            CmpOp::NotMatchI => CmpOp::MatchI,
        }
    }

    pub fn is_regex(self) -> bool {
        matches!(
            self,
            CmpOp::Match | CmpOp::MatchI | CmpOp::NotMatch | CmpOp::NotMatchI
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Match => "~",
            CmpOp::MatchI => "~*",
            CmpOp::NotMatch => "!~",
            CmpOp::NotMatchI => "!~*",
        }
    }
}

/// Subscript into an array element or object field.
#[derive(Debug, Clone, PartialEq)]
pub enum Index {
    /// `a[2]`; negative counts from the end
    Position(i64),
    /// `a["key"]`
    Key(String),
}

/// The left operand of a metadata predicate leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Lhs {
    /// A document-backed attribute addressed by its key
    Scalar(String),
    /// Any element of an array attribute: `a[any]`
    ArrayAny(String),
    /// One element or field of an attribute: `a[2]`, `a["key"]`
    Subscript { name: String, index: Index },
    /// The length of an array attribute: `len(a)`
    ArrayLength(String),
    /// A first-class table column (creator, size, ...), resolved against
    /// the file or dataset row rather than the metadata document
    ObjectAttribute(String),
}

impl Lhs {
    pub fn name(&self) -> &str {
        match self {
            Lhs::Scalar(n)
            | Lhs::ArrayAny(n)
            | Lhs::ArrayLength(n)
            | Lhs::ObjectAttribute(n) => n,
            Lhs::Subscript { name, .. } => name,
        }
    }
}

/// A boolean predicate over a metadata document.
///
/// `Not` only exists between parsing and normalization; `dnf::regularize`
/// eliminates it algebraically, so the optimizer, the SQL compiler, and the
/// evaluator never see one inside a normalized expression.
///
/// The `negated` flags on `InRange`/`InSet` select the element-wise
/// complements (`not in lo:hi`, `not in (..)`): for an array attribute they
/// ask for at least one element outside the range/set, mirroring how the
/// positive forms ask for at least one element inside it.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaExpr {
    And(Vec<MetaExpr>),
    Or(Vec<MetaExpr>),
    Not(Box<MetaExpr>),
    Cmp {
        lhs: Lhs,
        op: CmpOp,
        value: Literal,
    },
    InRange {
        lhs: Lhs,
        low: Literal,
        high: Literal,
        negated: bool,
    },
    InSet {
        lhs: Lhs,
        set: Vec<Literal>,
        negated: bool,
    },
    Present {
        name: String,
    },
    NotPresent {
        name: String,
    },
}

impl MetaExpr {
    /// The logical negation, with `!` pushed all the way into the leaves:
    /// De Morgan over `and`/`or`, operator complement for comparisons,
    /// flag toggles for ranges and sets, `present`/`not present` swap.
    pub fn negated(self) -> MetaExpr {
        match self {
            MetaExpr::And(children) => {
                MetaExpr::Or(children.into_iter().map(MetaExpr::negated).collect())
            }
            MetaExpr::Or(children) => {
                MetaExpr::And(children.into_iter().map(MetaExpr::negated).collect())
            }
            MetaExpr::Not(inner) => *inner,
            MetaExpr::Cmp { lhs, op, value } => MetaExpr::Cmp {
                lhs,
                op: op.complement(),
                value,
            },
            MetaExpr::InRange {
                lhs,
                low,
                high,
                negated,
            } => MetaExpr::InRange {
                lhs,
                low,
                high,
                negated: !negated,
            },
            MetaExpr::InSet { lhs, set, negated } => MetaExpr::InSet {
                lhs,
                set,
                negated: !negated,
            },
            MetaExpr::Present { name } => MetaExpr::NotPresent { name },
            MetaExpr::NotPresent { name } => MetaExpr::Present { name },
        }
    }

    pub fn is_leaf(&self) -> bool {
        !matches!(
            self,
            MetaExpr::And(_) | MetaExpr::Or(_) | MetaExpr::Not(_)
        )
    }
}

/// Keyword parameters of a pluggable filter call.
pub type KeywordParams = HashMap<String, Literal>;
