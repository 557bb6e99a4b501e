#[cfg(test)]
mod tests {
    use mql_lang::ast::{BasicDatasetQuery, BasicFileQuery, DatasetPattern, QueryAst, QueryNode};
    use mql_lang::optimizer::{Capabilities, apply_capabilities, optimize};
    use mql_lang::parser::parse;

    fn file_tree(text: &str) -> QueryNode {
        match parse(text).expect("query should parse") {
            QueryAst::File(tree) => tree,
            QueryAst::Dataset(_) => panic!("expected a file query"),
        }
    }

    fn optimized(text: &str) -> QueryNode {
        optimize(file_tree(text), 0, None, false).expect("should optimize")
    }

    fn scan(namespace: &str, name: &str) -> QueryNode {
        QueryNode::BasicFileQuery(BasicFileQuery::new(Some(BasicDatasetQuery::new(vec![
            DatasetPattern::exact(Some(namespace.to_string()), name),
        ]))))
    }

    // ========================================================================
    // Metadata pushdown
    // ========================================================================

    #[test]
    fn test_where_merges_into_selector() {
        match optimized("files from a:b where core.x = 1") {
            QueryNode::BasicFileQuery(q) => {
                assert!(q.wheres.is_some(), "predicate should land in the selector")
            }
            other => panic!("expected bare scan, got {:?}", other),
        }
    }

    #[test]
    fn test_pushdown_into_union_branches() {
        match optimized("union(files from a:x, files from b:y) where core.x = 1") {
            QueryNode::Union(children) => {
                for c in children {
                    match c {
                        QueryNode::BasicFileQuery(q) => assert!(q.wheres.is_some()),
                        other => panic!("expected scan branch, got {:?}", other),
                    }
                }
            }
            other => panic!("expected union, got {:?}", other),
        }
    }

    #[test]
    fn test_minus_pushes_left_only() {
        match optimized("(files from a:x - files from a:y) where core.x = 1") {
            QueryNode::Minus { left, right } => {
                match *left {
                    QueryNode::BasicFileQuery(q) => assert!(q.wheres.is_some()),
                    other => panic!("expected scan, got {:?}", other),
                }
                match *right {
                    QueryNode::BasicFileQuery(q) => {
                        assert!(q.wheres.is_none(), "right operand must stay unfiltered")
                    }
                    other => panic!("expected scan, got {:?}", other),
                }
            }
            other => panic!("expected minus, got {:?}", other),
        }
    }

    #[test]
    fn test_pushdown_stops_at_provenance_boundary() {
        match optimized("parents(files from a:b) where core.x = 1") {
            QueryNode::MetaFilter { child, expr, .. } => {
                assert!(expr.is_some());
                match *child {
                    QueryNode::ParentsOf { child, .. } => match *child {
                        QueryNode::BasicFileQuery(q) => assert!(q.wheres.is_none()),
                        other => panic!("expected scan, got {:?}", other),
                    },
                    other => panic!("expected parents_of, got {:?}", other),
                }
            }
            other => panic!("expected meta_filter wrapper, got {:?}", other),
        }
    }

    #[test]
    fn test_pushdown_blocked_by_pending_pagination() {
        // skip applies before the filter; merging the predicate into the
        // selector would change which rows the skip sees
        match optimized("files from a:b skip 2 where core.x = 1") {
            QueryNode::MetaFilter { child, expr, .. } => {
                assert!(expr.is_some());
                match *child {
                    QueryNode::BasicFileQuery(q) => {
                        assert_eq!(q.skip, 2);
                        assert!(q.wheres.is_none());
                    }
                    other => panic!("expected paginated scan, got {:?}", other),
                }
            }
            other => panic!("expected meta_filter wrapper, got {:?}", other),
        }
    }

    #[test]
    fn test_filter_output_predicate_stays_a_wrapper() {
        match optimized("filter sample(0.5)(files from a:b) where core.x = 1") {
            QueryNode::MetaFilter { child, expr, .. } => {
                assert!(expr.is_some());
                assert!(matches!(*child, QueryNode::Filter { .. }));
            }
            other => panic!("expected meta_filter wrapper, got {:?}", other),
        }
    }

    // ========================================================================
    // Provenance distribution
    // ========================================================================

    #[test]
    fn test_parents_distribute_over_union() {
        match optimized("parents(union(files from a:x, files from b:y))") {
            QueryNode::Union(children) => {
                assert_eq!(children.len(), 2);
                for c in children {
                    assert!(matches!(c, QueryNode::ParentsOf { .. }));
                }
            }
            other => panic!("expected distributed union, got {:?}", other),
        }
    }

    // ========================================================================
    // Pagination
    // ========================================================================

    #[test]
    fn test_skip_limit_merges_into_selector() {
        match optimized("files from a:b skip 5 limit 10") {
            QueryNode::BasicFileQuery(q) => {
                assert_eq!(q.skip, 5);
                assert_eq!(q.limit, Some(10));
                assert!(q.ordered, "pagination must force ordering");
            }
            other => panic!("expected scan, got {:?}", other),
        }
    }

    #[test]
    fn test_union_budget_is_not_distributed() {
        match optimized("union(files from a:x, files from b:y) limit 5") {
            QueryNode::SkipLimit {
                child,
                skip: 0,
                limit: Some(5),
            } => match *child {
                QueryNode::Ordered(inner) => match *inner {
                    QueryNode::Union(children) => {
                        for c in children {
                            match c {
                                QueryNode::BasicFileQuery(q) => {
                                    assert_eq!(q.limit, None, "no branch-local limit")
                                }
                                other => panic!("expected scan branch, got {:?}", other),
                            }
                        }
                    }
                    other => panic!("expected union, got {:?}", other),
                },
                other => panic!("expected ordered marker, got {:?}", other),
            },
            other => panic!("expected pagination wrapper, got {:?}", other),
        }
    }

    #[test]
    fn test_caller_budget_composes() {
        let tree = file_tree("files from a:b skip 2");
        match optimize(tree, 3, Some(4), false).expect("should optimize") {
            QueryNode::BasicFileQuery(q) => {
                assert_eq!(q.skip, 5);
                assert_eq!(q.limit, Some(4));
            }
            other => panic!("expected scan, got {:?}", other),
        }
    }

    #[test]
    fn test_limit_zero_collapses_to_empty() {
        assert!(matches!(
            optimized("files from a:b limit 0"),
            QueryNode::Empty
        ));
        let tree = file_tree("parents(files from a:b)");
        assert!(matches!(
            optimize(tree, 0, Some(0), false).expect("should optimize"),
            QueryNode::Empty
        ));
    }

    // ========================================================================
    // Dead branches
    // ========================================================================

    #[test]
    fn test_union_drops_empty_branches() {
        let tree = QueryNode::Union(vec![QueryNode::Empty, scan("a", "x")]);
        match optimize(tree, 0, None, false).expect("should optimize") {
            QueryNode::BasicFileQuery(_) => {}
            other => panic!("single survivor should replace the union, got {:?}", other),
        }

        let tree = QueryNode::Union(vec![QueryNode::Empty, QueryNode::Empty]);
        assert!(matches!(
            optimize(tree, 0, None, false).expect("should optimize"),
            QueryNode::Empty
        ));
    }

    #[test]
    fn test_join_with_empty_collapses() {
        let tree = QueryNode::Join(vec![scan("a", "x"), QueryNode::Empty]);
        assert!(matches!(
            optimize(tree, 0, None, false).expect("should optimize"),
            QueryNode::Empty
        ));
    }

    #[test]
    fn test_minus_empty_rules() {
        let tree = QueryNode::Minus {
            left: Box::new(QueryNode::Empty),
            right: Box::new(scan("a", "x")),
        };
        assert!(matches!(
            optimize(tree, 0, None, false).expect("should optimize"),
            QueryNode::Empty
        ));

        let tree = QueryNode::Minus {
            left: Box::new(scan("a", "x")),
            right: Box::new(QueryNode::Empty),
        };
        assert!(matches!(
            optimize(tree, 0, None, false).expect("should optimize"),
            QueryNode::BasicFileQuery(_)
        ));
    }

    #[test]
    fn test_wrapper_around_empty_collapses() {
        let tree = QueryNode::ParentsOf {
            child: Box::new(QueryNode::Empty),
            with_meta: false,
            with_provenance: false,
        };
        assert!(matches!(
            optimize(tree, 0, None, false).expect("should optimize"),
            QueryNode::Empty
        ));
    }

    // ========================================================================
    // Ordering
    // ========================================================================

    #[test]
    fn test_explicit_ordered_reaches_selector() {
        match optimized("files from a:b ordered") {
            QueryNode::BasicFileQuery(q) => assert!(q.ordered),
            other => panic!("expected scan, got {:?}", other),
        }
    }

    #[test]
    fn test_caller_requested_ordering() {
        let tree = file_tree("files from a:b");
        match optimize(tree, 0, None, true).expect("should optimize") {
            QueryNode::BasicFileQuery(q) => assert!(q.ordered),
            other => panic!("expected scan, got {:?}", other),
        }
    }

    // ========================================================================
    // Idempotence
    // ========================================================================

    #[test]
    fn test_optimize_is_idempotent() {
        let queries = [
            "files from a:b where core.x = 1",
            "union(files from a:x, files from b:y) limit 5",
            "parents(files from a:b) where core.x = 1",
            "files from a:x - files from a:y",
            "files from a:b skip 2 where core.x = 1",
        ];
        for text in queries {
            let once = optimized(text);
            let twice = optimize(once.clone(), 0, None, false).expect("should re-optimize");
            assert_eq!(once, twice, "optimize not idempotent for {}", text);
        }
    }

    // ========================================================================
    // Capability propagation
    // ========================================================================

    #[test]
    fn test_meta_filter_forces_metadata_below() {
        let tree = optimized("parents(files from a:b) where core.x = 1");
        let tree = apply_capabilities(tree, Capabilities::default());
        match tree {
            QueryNode::MetaFilter { child, .. } => match *child {
                QueryNode::ParentsOf { child, .. } => match *child {
                    QueryNode::BasicFileQuery(q) => {
                        assert!(q.with_meta, "meta_filter input needs metadata");
                        assert!(q.with_provenance, "provenance hop input needs provenance");
                    }
                    other => panic!("expected scan, got {:?}", other),
                },
                other => panic!("expected parents_of, got {:?}", other),
            },
            other => panic!("expected meta_filter, got {:?}", other),
        }
    }

    #[test]
    fn test_caller_capabilities_reach_leaves() {
        let tree = optimized("union(files from a:x, files from b:y)");
        let tree = apply_capabilities(
            tree,
            Capabilities {
                with_meta: true,
                with_provenance: false,
                include_retired: true,
            },
        );
        match tree {
            QueryNode::Union(children) => {
                for c in children {
                    match c {
                        QueryNode::BasicFileQuery(q) => {
                            assert!(q.with_meta);
                            assert!(q.include_retired);
                            assert!(!q.with_provenance);
                        }
                        other => panic!("expected scan, got {:?}", other),
                    }
                }
            }
            other => panic!("expected union, got {:?}", other),
        }
    }
}
