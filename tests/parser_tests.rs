#[cfg(test)]
mod tests {
    use mql_lang::ast::{CmpOp, Lhs, Literal, MetaExpr, QueryAst, QueryNode};
    use mql_lang::error::MqlError;
    use mql_lang::parser::parse;

    fn file_tree(text: &str) -> QueryNode {
        match parse(text).expect("query should parse") {
            QueryAst::File(tree) => tree,
            QueryAst::Dataset(_) => panic!("expected a file query"),
        }
    }

    // ========================================================================
    // Basic file queries
    // ========================================================================

    #[test]
    fn test_basic_query_with_dataset() {
        let tree = file_tree("files from dune:raw");
        match tree {
            QueryNode::BasicFileQuery(q) => {
                let sel = q.selector.expect("selector");
                assert_eq!(sel.patterns.len(), 1);
                assert_eq!(sel.patterns[0].namespace.as_deref(), Some("dune"));
                assert_eq!(sel.patterns[0].name, "raw");
                assert!(!sel.patterns[0].wildcard);
            }
            other => panic!("expected basic query, got {:?}", other),
        }
    }

    #[test]
    fn test_bare_files_selects_everything() {
        match file_tree("files") {
            QueryNode::BasicFileQuery(q) => assert!(q.selector.is_none()),
            other => panic!("expected basic query, got {:?}", other),
        }
    }

    #[test]
    fn test_where_clause_wraps_in_meta_filter() {
        let tree = file_tree("files from a:b where core.runs[any] in 3100:3200");
        match tree {
            QueryNode::MetaFilter { child, expr, .. } => {
                assert!(matches!(*child, QueryNode::BasicFileQuery(_)));
                match expr.expect("expression") {
                    MetaExpr::InRange {
                        lhs: Lhs::ArrayAny(name),
                        low: Literal::Int(3100),
                        high: Literal::Int(3200),
                        negated: false,
                    } => assert_eq!(name, "core.runs"),
                    other => panic!("unexpected expression {:?}", other),
                }
            }
            other => panic!("expected meta_filter, got {:?}", other),
        }
    }

    #[test]
    fn test_column_attribute_classification() {
        let tree = file_tree("files from a:b where size > 1000");
        match tree {
            QueryNode::MetaFilter { expr, .. } => match expr.expect("expression") {
                MetaExpr::Cmp {
                    lhs: Lhs::ObjectAttribute(name),
                    op: CmpOp::Gt,
                    value: Literal::Int(1000),
                } => assert_eq!(name, "size"),
                other => panic!("unexpected expression {:?}", other),
            },
            other => panic!("expected meta_filter, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_bare_word_is_document_backed() {
        // `v` is not a file column, so it addresses the metadata document
        let tree = file_tree("files where v in 1:10");
        match tree {
            QueryNode::MetaFilter { expr, .. } => match expr.expect("expression") {
                MetaExpr::InRange {
                    lhs: Lhs::Scalar(name),
                    ..
                } => assert_eq!(name, "v"),
                other => panic!("unexpected expression {:?}", other),
            },
            other => panic!("expected meta_filter, got {:?}", other),
        }
    }

    // ========================================================================
    // Set algebra and provenance
    // ========================================================================

    #[test]
    fn test_minus_is_left_associative() {
        let tree = file_tree("files from a:x - files from a:y - files from a:z");
        match tree {
            QueryNode::Minus { left, right } => {
                assert!(matches!(*left, QueryNode::Minus { .. }));
                assert!(matches!(*right, QueryNode::BasicFileQuery(_)));
            }
            other => panic!("expected minus, got {:?}", other),
        }
    }

    #[test]
    fn test_union_and_join_forms() {
        match file_tree("union(files from a:x, files from b:y)") {
            QueryNode::Union(children) => assert_eq!(children.len(), 2),
            other => panic!("expected union, got {:?}", other),
        }
        match file_tree("[files from a:x, files from b:y]") {
            QueryNode::Union(children) => assert_eq!(children.len(), 2),
            other => panic!("expected union, got {:?}", other),
        }
        match file_tree("join(files from a:x, files from b:y)") {
            QueryNode::Join(children) => assert_eq!(children.len(), 2),
            other => panic!("expected join, got {:?}", other),
        }
        match file_tree("{files from a:x, files from b:y}") {
            QueryNode::Join(children) => assert_eq!(children.len(), 2),
            other => panic!("expected join, got {:?}", other),
        }
    }

    #[test]
    fn test_parents_and_children() {
        match file_tree("parents(files from a:x)") {
            QueryNode::ParentsOf { child, .. } => {
                assert!(matches!(*child, QueryNode::BasicFileQuery(_)))
            }
            other => panic!("expected parents_of, got {:?}", other),
        }
        match file_tree("children(files from a:x)") {
            QueryNode::ChildrenOf { .. } => {}
            other => panic!("expected children_of, got {:?}", other),
        }
    }

    // ========================================================================
    // Pagination and ordering postfixes
    // ========================================================================

    #[test]
    fn test_skip_limit_postfixes_nest() {
        let tree = file_tree("files from a:b skip 5 limit 10");
        match tree {
            QueryNode::SkipLimit {
                child,
                skip: 0,
                limit: Some(10),
            } => match *child {
                QueryNode::SkipLimit {
                    skip: 5,
                    limit: None,
                    ..
                } => {}
                other => panic!("expected inner skip, got {:?}", other),
            },
            other => panic!("expected outer limit, got {:?}", other),
        }
    }

    #[test]
    fn test_ordered_postfix() {
        assert!(matches!(
            file_tree("files from a:b ordered"),
            QueryNode::Ordered(_)
        ));
    }

    // ========================================================================
    // Filters, named queries, file lists
    // ========================================================================

    #[test]
    fn test_filter_call() {
        let tree = file_tree("filter sample(0.5, seed=42)(files from a:b)");
        match tree {
            QueryNode::Filter {
                name,
                params,
                kv,
                children,
                ..
            } => {
                assert_eq!(name, "sample");
                assert_eq!(params, vec![Literal::Float(0.5)]);
                assert_eq!(kv.get("seed"), Some(&Literal::Int(42)));
                assert_eq!(children.len(), 1);
            }
            other => panic!("expected filter, got {:?}", other),
        }
    }

    #[test]
    fn test_named_query() {
        match file_tree("query analysis:goldens") {
            QueryNode::NamedQuery { namespace, name } => {
                assert_eq!(namespace.as_deref(), Some("analysis"));
                assert_eq!(name, "goldens");
            }
            other => panic!("expected named query, got {:?}", other),
        }
    }

    #[test]
    fn test_explicit_file_list() {
        match file_tree("files a:f1, b:f2") {
            QueryNode::FileList { specs, .. } => assert_eq!(specs.len(), 2),
            other => panic!("expected file list, got {:?}", other),
        }
        match file_tree("fids abc123, def456") {
            QueryNode::FileList { specs, .. } => assert_eq!(specs.len(), 2),
            other => panic!("expected file list, got {:?}", other),
        }
    }

    // ========================================================================
    // Metadata expressions
    // ========================================================================

    #[test]
    fn test_and_or_precedence() {
        // a or b and c parses as a or (b and c)
        let tree = file_tree("files where core.a = 1 or core.b = 2 and core.c = 3");
        match tree {
            QueryNode::MetaFilter { expr, .. } => match expr.expect("expression") {
                MetaExpr::Or(children) => {
                    assert_eq!(children.len(), 2);
                    assert!(matches!(children[0], MetaExpr::Cmp { .. }));
                    assert!(matches!(&children[1], MetaExpr::And(inner) if inner.len() == 2));
                }
                other => panic!("unexpected expression {:?}", other),
            },
            other => panic!("expected meta_filter, got {:?}", other),
        }
    }

    #[test]
    fn test_negation_is_eliminated_at_parse_time() {
        let tree = file_tree("files where !(core.x = 1)");
        match tree {
            QueryNode::MetaFilter { expr, .. } => match expr.expect("expression") {
                MetaExpr::Cmp {
                    op: CmpOp::Ne,
                    value: Literal::Int(1),
                    ..
                } => {}
                other => panic!("expected complemented comparison, got {:?}", other),
            },
            other => panic!("expected meta_filter, got {:?}", other),
        }
    }

    #[test]
    fn test_presence_and_sets() {
        let tree = file_tree(
            "files where core.tag present and core.q not present and core.v in (1, 2, 3)",
        );
        match tree {
            QueryNode::MetaFilter { expr, .. } => match expr.expect("expression") {
                MetaExpr::And(children) => {
                    assert!(matches!(&children[0], MetaExpr::Present { name } if name == "core.tag"));
                    assert!(
                        matches!(&children[1], MetaExpr::NotPresent { name } if name == "core.q")
                    );
                    assert!(matches!(
                        &children[2],
                        MetaExpr::InSet { negated: false, set, .. } if set.len() == 3
                    ));
                }
                other => panic!("unexpected expression {:?}", other),
            },
            other => panic!("expected meta_filter, got {:?}", other),
        }
    }

    #[test]
    fn test_regex_operators() {
        let tree = file_tree("files where core.name !~* '^raw'");
        match tree {
            QueryNode::MetaFilter { expr, .. } => match expr.expect("expression") {
                MetaExpr::Cmp {
                    op: CmpOp::NotMatchI,
                    value: Literal::Str(p),
                    ..
                } => assert_eq!(p, "^raw"),
                other => panic!("unexpected expression {:?}", other),
            },
            other => panic!("expected meta_filter, got {:?}", other),
        }
    }

    #[test]
    fn test_constant_in_attribute_sugar() {
        let tree = file_tree("files where 7 in core.runs");
        match tree {
            QueryNode::MetaFilter { expr, .. } => match expr.expect("expression") {
                MetaExpr::Cmp {
                    lhs: Lhs::ArrayAny(name),
                    op: CmpOp::Eq,
                    value: Literal::Int(7),
                } => assert_eq!(name, "core.runs"),
                other => panic!("unexpected expression {:?}", other),
            },
            other => panic!("expected meta_filter, got {:?}", other),
        }
    }

    #[test]
    fn test_date_constant() {
        let tree = file_tree("files where core.done = date('2020-08-01')");
        match tree {
            QueryNode::MetaFilter { expr, .. } => match expr.expect("expression") {
                MetaExpr::Cmp {
                    value: Literal::Date(t),
                    ..
                } => assert_eq!(t, 1596240000.0),
                other => panic!("unexpected expression {:?}", other),
            },
            other => panic!("expected meta_filter, got {:?}", other),
        }
    }

    // ========================================================================
    // Dataset queries
    // ========================================================================

    #[test]
    fn test_dataset_query() {
        match parse("datasets dune:raw with children recursively having frozen = false")
            .expect("should parse")
        {
            QueryAst::Dataset(selector) => {
                assert!(selector.with_children);
                assert!(selector.recursively);
                assert!(selector.having.is_some());
            }
            QueryAst::File(_) => panic!("expected a dataset query"),
        }
    }

    #[test]
    fn test_dataset_pattern() {
        match parse("datasets matching dune:'raw_*'").expect("should parse") {
            QueryAst::Dataset(selector) => {
                assert!(selector.patterns[0].wildcard);
                assert!(!selector.patterns[0].regexp);
                // SQL-style translation of the wildcard
                assert_eq!(selector.patterns[0].name, "raw_%");
            }
            QueryAst::File(_) => panic!("expected a dataset query"),
        }
    }

    // ========================================================================
    // Errors
    // ========================================================================

    #[test]
    fn test_syntax_error() {
        assert!(matches!(parse("files from"), Err(MqlError::Syntax(_))));
        assert!(matches!(parse("union(files"), Err(MqlError::Syntax(_))));
    }

    #[test]
    fn test_range_type_mismatch_is_compile_error() {
        assert!(matches!(
            parse("files where core.x in 1:'a'"),
            Err(MqlError::Compile(_))
        ));
    }

    #[test]
    fn test_comments_are_ignored() {
        let tree = file_tree("files from a:b # select the raw files\nwhere size > 1");
        assert!(matches!(tree, QueryNode::MetaFilter { .. }));
    }
}
