#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use mql_lang::ast::{CmpOp, Index, Lhs, Literal, MetaExpr};
    use mql_lang::evaluator::{EvalError, MetaEvaluator};
    use mql_lang::value::{Metadata, Value};

    const DAY: f64 = 86400.0;

    fn eval(meta: &Metadata, expr: &MetaExpr) -> bool {
        MetaEvaluator::new().evaluate(meta, expr).expect("evaluates")
    }

    fn scalar(name: &str) -> Lhs {
        Lhs::Scalar(name.to_string())
    }

    fn cmp(lhs: Lhs, op: CmpOp, value: Literal) -> MetaExpr {
        MetaExpr::Cmp { lhs, op, value }
    }

    fn in_range(lhs: Lhs, low: Literal, high: Literal, negated: bool) -> MetaExpr {
        MetaExpr::InRange {
            lhs,
            low,
            high,
            negated,
        }
    }

    fn in_set(lhs: Lhs, set: Vec<Literal>, negated: bool) -> MetaExpr {
        MetaExpr::InSet { lhs, set, negated }
    }

    fn meta(pairs: Vec<(&str, Value)>) -> Metadata {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn ints(values: &[i64]) -> Value {
        Value::Array(values.iter().map(|v| Value::Integer(*v)).collect())
    }

    // ========================================================================
    // Scalar comparisons
    // ========================================================================

    #[test]
    fn test_scalar_range_corpus() {
        // {"v":5}, {"v":15}, {"v":null} against `v in 1:10`
        let expr = in_range(scalar("v"), Literal::Int(1), Literal::Int(10), false);
        assert!(eval(&meta(vec![("v", Value::Integer(5))]), &expr));
        assert!(!eval(&meta(vec![("v", Value::Integer(15))]), &expr));
        assert!(!eval(&meta(vec![("v", Value::Null)]), &expr));
        assert!(!eval(&meta(vec![]), &expr));
    }

    #[test]
    fn test_scalar_comparisons() {
        let m = meta(vec![("v", Value::Integer(5))]);
        assert!(eval(&m, &cmp(scalar("v"), CmpOp::Eq, Literal::Int(5))));
        assert!(eval(&m, &cmp(scalar("v"), CmpOp::Lt, Literal::Int(6))));
        assert!(eval(&m, &cmp(scalar("v"), CmpOp::Ge, Literal::Int(5))));
        assert!(!eval(&m, &cmp(scalar("v"), CmpOp::Gt, Literal::Int(5))));
        // equality widens between integer and float
        assert!(eval(&m, &cmp(scalar("v"), CmpOp::Eq, Literal::Float(5.0))));
        // a missing attribute fails every comparison
        assert!(!eval(&m, &cmp(scalar("w"), CmpOp::Eq, Literal::Int(5))));
        assert!(!eval(&m, &cmp(scalar("w"), CmpOp::Ne, Literal::Int(5))));
    }

    #[test]
    fn test_cross_type_comparison() {
        let m = meta(vec![("v", Value::String("abc".to_string()))]);
        // different kinds are never ordered
        assert!(!eval(&m, &cmp(scalar("v"), CmpOp::Lt, Literal::Int(5))));
        // but they are unequal
        assert!(eval(&m, &cmp(scalar("v"), CmpOp::Ne, Literal::Int(5))));
    }

    // ========================================================================
    // Array shapes
    // ========================================================================

    #[test]
    fn test_array_any() {
        let m = meta(vec![("runs", ints(&[3100, 3150, 3200]))]);
        let any = Lhs::ArrayAny("runs".to_string());
        assert!(eval(&m, &cmp(any.clone(), CmpOp::Eq, Literal::Int(3150))));
        assert!(!eval(&m, &cmp(any.clone(), CmpOp::Eq, Literal::Int(9))));
        assert!(eval(
            &m,
            &in_range(any.clone(), Literal::Int(3000), Literal::Int(3120), false)
        ));
        // a scalar attribute is not an array
        let m2 = meta(vec![("runs", Value::Integer(3100))]);
        assert!(!eval(&m2, &cmp(any, CmpOp::Eq, Literal::Int(3100))));
    }

    #[test]
    fn test_negated_set_is_element_wise() {
        // `not in` over an array asks for at least one element outside
        let m = meta(vec![("tags", ints(&[1, 2]))]);
        let any = Lhs::ArrayAny("tags".to_string());
        assert!(!eval(
            &m,
            &in_set(any.clone(), vec![Literal::Int(1), Literal::Int(2)], true)
        ));
        assert!(eval(
            &m,
            &in_set(any, vec![Literal::Int(1)], true),
        ));
        // scalar: present and outside the set
        let m2 = meta(vec![("v", Value::Integer(3))]);
        assert!(eval(
            &m2,
            &in_set(scalar("v"), vec![Literal::Int(1)], true)
        ));
        assert!(!eval(
            &meta(vec![]),
            &in_set(scalar("v"), vec![Literal::Int(1)], true)
        ));
    }

    #[test]
    fn test_subscripts() {
        let m = meta(vec![("runs", ints(&[10, 20, 30]))]);
        let first = Lhs::Subscript {
            name: "runs".to_string(),
            index: Index::Position(0),
        };
        let last = Lhs::Subscript {
            name: "runs".to_string(),
            index: Index::Position(-1),
        };
        let past_end = Lhs::Subscript {
            name: "runs".to_string(),
            index: Index::Position(7),
        };
        assert!(eval(&m, &cmp(first, CmpOp::Eq, Literal::Int(10))));
        assert!(eval(&m, &cmp(last, CmpOp::Eq, Literal::Int(30))));
        assert!(!eval(&m, &cmp(past_end, CmpOp::Eq, Literal::Int(10))));

        let mut obj = HashMap::new();
        obj.insert("beam".to_string(), Value::String("on".to_string()));
        let m2 = meta(vec![("state", Value::Object(obj))]);
        let keyed = Lhs::Subscript {
            name: "state".to_string(),
            index: Index::Key("beam".to_string()),
        };
        assert!(eval(
            &m2,
            &cmp(keyed, CmpOp::Eq, Literal::Str("on".to_string()))
        ));
    }

    #[test]
    fn test_array_length() {
        let m = meta(vec![("runs", ints(&[1, 2, 3]))]);
        let len = Lhs::ArrayLength("runs".to_string());
        assert!(eval(&m, &cmp(len.clone(), CmpOp::Eq, Literal::Int(3))));
        assert!(eval(
            &m,
            &in_set(len.clone(), vec![Literal::Int(2), Literal::Int(3)], false)
        ));
        assert!(eval(
            &m,
            &in_range(len.clone(), Literal::Int(1), Literal::Int(5), false)
        ));
        // not an array
        let m2 = meta(vec![("runs", Value::Integer(7))]);
        assert!(!eval(&m2, &cmp(len, CmpOp::Eq, Literal::Int(1))));
    }

    // ========================================================================
    // Presence
    // ========================================================================

    #[test]
    fn test_presence() {
        let m = meta(vec![("a", Value::Null)]);
        assert!(eval(
            &m,
            &MetaExpr::Present {
                name: "a".to_string()
            }
        ));
        assert!(eval(
            &m,
            &MetaExpr::NotPresent {
                name: "b".to_string()
            }
        ));
        assert!(!eval(
            &m,
            &MetaExpr::Present {
                name: "b".to_string()
            }
        ));
    }

    // ========================================================================
    // Regular expressions
    // ========================================================================

    #[test]
    fn test_regex_operators() {
        let m = meta(vec![("name", Value::String("raw_2020_0617".to_string()))]);
        let n = scalar("name");
        assert!(eval(
            &m,
            &cmp(n.clone(), CmpOp::Match, Literal::Str("^raw_".to_string()))
        ));
        assert!(!eval(
            &m,
            &cmp(n.clone(), CmpOp::Match, Literal::Str("^RAW_".to_string()))
        ));
        assert!(eval(
            &m,
            &cmp(n.clone(), CmpOp::MatchI, Literal::Str("^RAW_".to_string()))
        ));
        assert!(!eval(
            &m,
            &cmp(n.clone(), CmpOp::NotMatch, Literal::Str("^raw_".to_string()))
        ));
        assert!(eval(
            &m,
            &cmp(n.clone(), CmpOp::NotMatch, Literal::Str("^cal_".to_string()))
        ));
        // a non-string value never matches, even negated
        let m2 = meta(vec![("name", Value::Integer(5))]);
        assert!(!eval(
            &m2,
            &cmp(n.clone(), CmpOp::Match, Literal::Str("5".to_string()))
        ));
        assert!(!eval(
            &m2,
            &cmp(n, CmpOp::NotMatch, Literal::Str("5".to_string()))
        ));
    }

    #[test]
    fn test_bad_regex_is_an_error() {
        let m = meta(vec![("name", Value::String("x".to_string()))]);
        let result = MetaEvaluator::new().evaluate(
            &m,
            &cmp(scalar("name"), CmpOp::Match, Literal::Str("(".to_string())),
        );
        assert!(matches!(result, Err(EvalError::BadRegex { .. })));
    }

    // ========================================================================
    // Calendar-day desugaring
    // ========================================================================

    #[test]
    fn test_date_equality_covers_the_day() {
        let day = 1596240000.0; // 2020-08-01 00:00:00 UTC
        let expr = cmp(scalar("t"), CmpOp::Eq, Literal::Date(day));
        assert!(eval(&meta(vec![("t", Value::Float(day))]), &expr));
        assert!(eval(
            &meta(vec![("t", Value::Float(day + DAY - 1.0))]),
            &expr
        ));
        assert!(!eval(&meta(vec![("t", Value::Float(day + DAY))]), &expr));
        assert!(!eval(&meta(vec![("t", Value::Float(day - 1.0))]), &expr));
        // integer timestamps work too
        assert!(eval(
            &meta(vec![("t", Value::Integer(1596240000 + 3600))]),
            &expr
        ));
    }

    #[test]
    fn test_date_ordering_shifts_to_day_boundaries() {
        let day = 1596240000.0;
        let inside = meta(vec![("t", Value::Float(day + 100.0))]);
        let next_day = meta(vec![("t", Value::Float(day + DAY))]);

        assert!(!eval(&inside, &cmp(scalar("t"), CmpOp::Lt, Literal::Date(day))));
        assert!(eval(&inside, &cmp(scalar("t"), CmpOp::Le, Literal::Date(day))));
        assert!(!eval(&inside, &cmp(scalar("t"), CmpOp::Gt, Literal::Date(day))));
        assert!(eval(&inside, &cmp(scalar("t"), CmpOp::Ge, Literal::Date(day))));
        assert!(eval(&next_day, &cmp(scalar("t"), CmpOp::Gt, Literal::Date(day))));
        assert!(!eval(&next_day, &cmp(scalar("t"), CmpOp::Le, Literal::Date(day))));

        assert!(!eval(&inside, &cmp(scalar("t"), CmpOp::Ne, Literal::Date(day))));
        assert!(eval(&next_day, &cmp(scalar("t"), CmpOp::Ne, Literal::Date(day))));
    }

    #[test]
    fn test_date_range_is_half_open_on_the_high_day() {
        let low = 1596240000.0;
        let high = low + 2.0 * DAY; // three calendar days
        let expr = in_range(scalar("t"), Literal::Date(low), Literal::Date(high), false);
        assert!(eval(&meta(vec![("t", Value::Float(low))]), &expr));
        assert!(eval(
            &meta(vec![("t", Value::Float(high + DAY - 1.0))]),
            &expr
        ));
        assert!(!eval(&meta(vec![("t", Value::Float(high + DAY))]), &expr));
        assert!(!eval(&meta(vec![("t", Value::Float(low - 1.0))]), &expr));
    }

    // ========================================================================
    // Boolean structure
    // ========================================================================

    #[test]
    fn test_short_circuit_and_or() {
        let m = meta(vec![("a", Value::Integer(1))]);
        let t = cmp(scalar("a"), CmpOp::Eq, Literal::Int(1));
        let f = cmp(scalar("a"), CmpOp::Eq, Literal::Int(2));
        assert!(eval(&m, &MetaExpr::And(vec![t.clone(), t.clone()])));
        assert!(!eval(&m, &MetaExpr::And(vec![t.clone(), f.clone()])));
        assert!(eval(&m, &MetaExpr::Or(vec![f.clone(), t.clone()])));
        assert!(!eval(&m, &MetaExpr::Or(vec![f.clone(), f.clone()])));
        assert!(eval(&m, &MetaExpr::Not(Box::new(f))));
        assert!(!eval(&m, &MetaExpr::Not(Box::new(t))));
    }
}
