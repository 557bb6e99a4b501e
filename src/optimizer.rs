//! The query-optimization pipeline: a fixed sequence of tree rewrites that
//! push filters and pagination toward the data source.
//!
//! Pass order (applied by [`optimize`]):
//!
//! 1. pagination merge/pushdown for `skip`/`limit` written in the query
//! 2. metadata-expression pushdown
//! 3. distribution of provenance operators over unions
//! 4. dead-branch elimination
//! 5. pagination merge/pushdown again, for the caller-supplied budget
//! 6. ordering propagation
//!
//! Capability propagation ([`apply_capabilities`]) runs separately, right
//! before SQL lowering or execution, because the needed columns depend on
//! call-time options rather than on the query text.
//!
//! Every pass consumes the tree by value and returns a new one; collapsing
//! to [`QueryNode::Empty`] is the only cross-tag rewrite. Running
//! [`optimize`] on its own output reproduces it unchanged.

use crate::ast::{MetaExpr, QueryNode, merge_skip_limit};
use crate::dnf;
use crate::error::CompileError;

/// Which columns the caller needs fetched, threaded toward the leaves.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub with_meta: bool,
    pub with_provenance: bool,
    pub include_retired: bool,
}

/// Run the rewrite pipeline over an assembled tree.
///
/// `skip`/`limit`/`ordered` are the caller-supplied pagination budget and
/// ordering request, composed on top of whatever the query text asked for.
pub fn optimize(
    tree: QueryNode,
    skip: usize,
    limit: Option<usize>,
    ordered: bool,
) -> Result<QueryNode, CompileError> {
    let tree = apply_skip_limit(tree, 0, None);
    let tree = push_meta(tree, None)?;
    let tree = distribute_provenance(tree);
    let tree = remove_empty(tree);
    let tree = apply_skip_limit(tree, skip, limit);
    let tree = remove_empty(tree);
    Ok(apply_ordering(tree, ordered))
}

// ----------------------------------------------------------------------
// Pagination merge / pushdown
// ----------------------------------------------------------------------

/// Thread a `(skip, limit)` budget top-down.
///
/// Explicit `skip_limit` nodes merge into the budget and dissolve. The
/// budget lands in a basic-query selector when one is reached directly;
/// over a union/join the combined result is wrapped instead (distributing
/// a budget over branches would not compose to global pagination). A
/// node whose effective limit is zero collapses to `Empty` without ever
/// reaching the data source.
fn apply_skip_limit(node: QueryNode, skip: usize, limit: Option<usize>) -> QueryNode {
    if limit == Some(0) {
        return QueryNode::Empty;
    }
    match node {
        QueryNode::Empty => QueryNode::Empty,

        QueryNode::SkipLimit {
            child,
            skip: node_skip,
            limit: node_limit,
        } => {
            // The node's own pair applies first, the surrounding budget on
            // top of its output.
            let (s, l) = merge_skip_limit(node_skip, node_limit, skip, limit);
            if l == Some(0) {
                QueryNode::Empty
            } else {
                apply_skip_limit(*child, s, l)
            }
        }

        QueryNode::BasicFileQuery(mut query) => {
            query.add_skip_limit(skip, limit);
            if query.limit == Some(0) {
                QueryNode::Empty
            } else {
                QueryNode::BasicFileQuery(query)
            }
        }

        QueryNode::FileList {
            specs,
            with_meta,
            with_provenance,
            skip: node_skip,
            limit: node_limit,
        } => {
            let (s, l) = merge_skip_limit(node_skip, node_limit, skip, limit);
            if l == Some(0) {
                QueryNode::Empty
            } else {
                QueryNode::FileList {
                    specs,
                    with_meta,
                    with_provenance,
                    skip: s,
                    limit: l,
                }
            }
        }

        QueryNode::Union(children) => QueryNode::Union(
            children
                .into_iter()
                .map(|c| apply_skip_limit(c, 0, None))
                .collect(),
        )
        .paginate(skip, limit),

        QueryNode::Join(children) => QueryNode::Join(
            children
                .into_iter()
                .map(|c| apply_skip_limit(c, 0, None))
                .collect(),
        )
        .paginate(skip, limit),

        QueryNode::Minus { left, right } => QueryNode::Minus {
            left: Box::new(apply_skip_limit(*left, 0, None)),
            right: Box::new(apply_skip_limit(*right, 0, None)),
        }
        .paginate(skip, limit),

        QueryNode::Filter {
            name,
            params,
            kv,
            children,
            skip: node_skip,
            limit: node_limit,
            ordered,
            with_meta,
        } => {
            let (s, l) = merge_skip_limit(node_skip, node_limit, skip, limit);
            if l == Some(0) {
                QueryNode::Empty
            } else {
                QueryNode::Filter {
                    name,
                    params,
                    kv,
                    children: children
                        .into_iter()
                        .map(|c| apply_skip_limit(c, 0, None))
                        .collect(),
                    skip: s,
                    limit: l,
                    ordered,
                    with_meta,
                }
            }
        }

        QueryNode::MetaFilter {
            child,
            expr,
            with_meta,
            with_provenance,
        } => QueryNode::MetaFilter {
            child: Box::new(apply_skip_limit(*child, 0, None)),
            expr,
            with_meta,
            with_provenance,
        }
        .paginate(skip, limit),

        QueryNode::ParentsOf {
            child,
            with_meta,
            with_provenance,
        } => QueryNode::ParentsOf {
            child: Box::new(apply_skip_limit(*child, 0, None)),
            with_meta,
            with_provenance,
        }
        .paginate(skip, limit),

        QueryNode::ChildrenOf {
            child,
            with_meta,
            with_provenance,
        } => QueryNode::ChildrenOf {
            child: Box::new(apply_skip_limit(*child, 0, None)),
            with_meta,
            with_provenance,
        }
        .paginate(skip, limit),

        QueryNode::Ordered(child) => {
            QueryNode::Ordered(Box::new(apply_skip_limit(*child, 0, None))).paginate(skip, limit)
        }

        node @ QueryNode::NamedQuery { .. } => node.paginate(skip, limit),
    }
}

// ----------------------------------------------------------------------
// Metadata-expression pushdown
// ----------------------------------------------------------------------

/// Thread the accumulated filter predicate top-down.
///
/// Union and join recurse into every child with the same predicate; minus
/// pushes only into its left operand. At a basic query the predicate merges
/// into the selector unless pagination is already pending there. At any
/// boundary the predicate cannot cross (a provenance hop, pending
/// pagination, a pluggable filter, an explicit file list) a `meta_filter`
/// wrapper is synthesized instead - predicates are never dropped.
fn push_meta(node: QueryNode, expr: Option<&MetaExpr>) -> Result<QueryNode, CompileError> {
    Ok(match node {
        QueryNode::Empty => QueryNode::Empty,

        QueryNode::Union(children) => QueryNode::Union(
            children
                .into_iter()
                .map(|c| push_meta(c, expr))
                .collect::<Result<_, _>>()?,
        ),

        QueryNode::Join(children) => QueryNode::Join(
            children
                .into_iter()
                .map(|c| push_meta(c, expr))
                .collect::<Result<_, _>>()?,
        ),

        QueryNode::Minus { left, right } => QueryNode::Minus {
            left: Box::new(push_meta(*left, expr)?),
            // narrowing the right side would add back files it should remove
            right: Box::new(push_meta(*right, None)?),
        },

        QueryNode::BasicFileQuery(mut query) => match expr {
            None => QueryNode::BasicFileQuery(query),
            Some(e) => {
                if query.paginated() {
                    // merging would change which rows the pagination sees
                    wrap_meta(QueryNode::BasicFileQuery(query), Some(e))
                } else {
                    query.add_where(e.clone())?;
                    QueryNode::BasicFileQuery(query)
                }
            }
        },

        QueryNode::ParentsOf {
            child,
            with_meta,
            with_provenance,
        } => wrap_meta(
            QueryNode::ParentsOf {
                child: Box::new(push_meta(*child, None)?),
                with_meta,
                with_provenance,
            },
            expr,
        ),

        QueryNode::ChildrenOf {
            child,
            with_meta,
            with_provenance,
        } => wrap_meta(
            QueryNode::ChildrenOf {
                child: Box::new(push_meta(*child, None)?),
                with_meta,
                with_provenance,
            },
            expr,
        ),

        QueryNode::MetaFilter {
            child,
            expr: own,
            with_meta,
            with_provenance,
        } => {
            let combined = match (expr, own) {
                (None, own) => own,
                (Some(e), None) => Some(e.clone()),
                (Some(e), Some(own)) => {
                    Some(dnf::regularize(MetaExpr::And(vec![e.clone(), own]))?)
                }
            };
            match *child {
                child @ (QueryNode::Filter { .. } | QueryNode::FileList { .. }) => {
                    QueryNode::MetaFilter {
                        child: Box::new(push_meta(child, None)?),
                        expr: combined,
                        with_meta,
                        with_provenance,
                    }
                }
                child => push_meta(child, combined.as_ref())?,
            }
        }

        QueryNode::SkipLimit { child, skip, limit } => wrap_meta(
            QueryNode::SkipLimit {
                child: Box::new(push_meta(*child, None)?),
                skip,
                limit,
            },
            expr,
        ),

        QueryNode::Ordered(child) => QueryNode::Ordered(Box::new(push_meta(*child, expr)?)),

        QueryNode::Filter {
            name,
            params,
            kv,
            children,
            skip,
            limit,
            ordered,
            with_meta,
        } => wrap_meta(
            QueryNode::Filter {
                name,
                params,
                kv,
                children: children
                    .into_iter()
                    .map(|c| push_meta(c, None))
                    .collect::<Result<_, _>>()?,
                skip,
                limit,
                ordered,
                with_meta,
            },
            expr,
        ),

        node @ (QueryNode::FileList { .. } | QueryNode::NamedQuery { .. }) => {
            wrap_meta(node, expr)
        }
    })
}

fn wrap_meta(node: QueryNode, expr: Option<&MetaExpr>) -> QueryNode {
    match expr {
        None => node,
        Some(e) => QueryNode::MetaFilter {
            child: Box::new(node),
            expr: Some(e.clone()),
            with_meta: false,
            with_provenance: false,
        },
    }
}

// ----------------------------------------------------------------------
// Provenance distribution over unions
// ----------------------------------------------------------------------

/// `parents(A + B)` becomes `parents(A) + parents(B)` so each branch
/// compiles to a single provenance join.
fn distribute_provenance(node: QueryNode) -> QueryNode {
    let node = map_children(node, distribute_provenance);
    match node {
        QueryNode::ParentsOf {
            child,
            with_meta,
            with_provenance,
        } => match *child {
            QueryNode::Union(children) => QueryNode::Union(
                children
                    .into_iter()
                    .map(|c| QueryNode::ParentsOf {
                        child: Box::new(c),
                        with_meta,
                        with_provenance,
                    })
                    .collect(),
            ),
            child => QueryNode::ParentsOf {
                child: Box::new(child),
                with_meta,
                with_provenance,
            },
        },
        QueryNode::ChildrenOf {
            child,
            with_meta,
            with_provenance,
        } => match *child {
            QueryNode::Union(children) => QueryNode::Union(
                children
                    .into_iter()
                    .map(|c| QueryNode::ChildrenOf {
                        child: Box::new(c),
                        with_meta,
                        with_provenance,
                    })
                    .collect(),
            ),
            child => QueryNode::ChildrenOf {
                child: Box::new(child),
                with_meta,
                with_provenance,
            },
        },
        other => other,
    }
}

// ----------------------------------------------------------------------
// Dead-branch elimination
// ----------------------------------------------------------------------

/// Bottom-up removal of `Empty` branches: a union drops them (and a
/// single survivor replaces the union), a join or a minus with an empty
/// left side collapses, a minus with an empty right side is its left
/// side, and every wrapper around an empty child is itself empty.
fn remove_empty(node: QueryNode) -> QueryNode {
    match node {
        QueryNode::Union(children) => {
            let mut survivors: Vec<QueryNode> = children
                .into_iter()
                .map(remove_empty)
                .filter(|c| !c.is_empty())
                .collect();
            match survivors.len() {
                0 => QueryNode::Empty,
                1 => survivors.remove(0),
                _ => QueryNode::Union(survivors),
            }
        }

        QueryNode::Join(children) => {
            let children: Vec<QueryNode> = children.into_iter().map(remove_empty).collect();
            if children.iter().any(QueryNode::is_empty) {
                QueryNode::Empty
            } else {
                QueryNode::Join(children)
            }
        }

        QueryNode::Minus { left, right } => {
            let left = remove_empty(*left);
            let right = remove_empty(*right);
            if left.is_empty() {
                QueryNode::Empty
            } else if right.is_empty() {
                left
            } else {
                QueryNode::Minus {
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
        }

        other => {
            let rebuilt = map_children(other, remove_empty);
            match &rebuilt {
                QueryNode::SkipLimit { child, .. }
                | QueryNode::Ordered(child)
                | QueryNode::MetaFilter { child, .. }
                | QueryNode::ParentsOf { child, .. }
                | QueryNode::ChildrenOf { child, .. }
                    if child.is_empty() =>
                {
                    QueryNode::Empty
                }
                _ => rebuilt,
            }
        }
    }
}

// ----------------------------------------------------------------------
// Ordering propagation
// ----------------------------------------------------------------------

/// Record the demand for deterministic order.
///
/// Any pagination boundary forces ordering on its subtree - repeated skips
/// over an unordered stream would paginate nondeterministically. Basic
/// queries and filters record the flag; explicit file lists already have a
/// fixed order; any other node gets an explicit `ordered` marker, compiled
/// later as `ORDER BY` on the file id.
fn apply_ordering(node: QueryNode, ordered: bool) -> QueryNode {
    match node {
        QueryNode::Empty => QueryNode::Empty,

        QueryNode::Ordered(child) => apply_ordering(*child, true),

        QueryNode::BasicFileQuery(mut query) => {
            // pagination pushed into the selector forces ordering too;
            // skipping over an unordered stream would not be repeatable
            query.ordered = query.ordered || ordered || query.paginated();
            QueryNode::BasicFileQuery(query)
        }

        node @ QueryNode::FileList { .. } => node,

        QueryNode::SkipLimit { child, skip, limit } => QueryNode::SkipLimit {
            child: Box::new(apply_ordering(*child, true)),
            skip,
            limit,
        },

        QueryNode::Filter {
            name,
            params,
            kv,
            children,
            skip,
            limit,
            ordered: own,
            with_meta,
        } => QueryNode::Filter {
            name,
            params,
            kv,
            children: children
                .into_iter()
                .map(|c| apply_ordering(c, false))
                .collect(),
            skip,
            limit,
            ordered: own || ordered,
            with_meta,
        },

        other => {
            let rebuilt = map_children(other, |c| apply_ordering(c, false));
            if ordered {
                QueryNode::Ordered(Box::new(rebuilt))
            } else {
                rebuilt
            }
        }
    }
}

// ----------------------------------------------------------------------
// Capability propagation
// ----------------------------------------------------------------------

/// Push "caller needs metadata / provenance" flags toward the leaves so
/// only the necessary columns are fetched. A `meta_filter` or a pluggable
/// filter must inspect metadata to do its job, so it forces metadata on
/// for its input regardless of what the caller asked for; a provenance hop
/// likewise forces provenance below itself.
pub fn apply_capabilities(node: QueryNode, caps: Capabilities) -> QueryNode {
    match node {
        QueryNode::BasicFileQuery(mut query) => {
            query.with_meta = query.with_meta || caps.with_meta;
            query.with_provenance = query.with_provenance || caps.with_provenance;
            query.include_retired = query.include_retired || caps.include_retired;
            QueryNode::BasicFileQuery(query)
        }

        QueryNode::FileList {
            specs,
            with_meta,
            with_provenance,
            skip,
            limit,
        } => QueryNode::FileList {
            specs,
            with_meta: with_meta || caps.with_meta,
            with_provenance: with_provenance || caps.with_provenance,
            skip,
            limit,
        },

        QueryNode::MetaFilter { child, expr, .. } => QueryNode::MetaFilter {
            child: Box::new(apply_capabilities(
                *child,
                Capabilities {
                    with_meta: true,
                    ..caps
                },
            )),
            expr,
            with_meta: caps.with_meta,
            with_provenance: caps.with_provenance,
        },

        QueryNode::ParentsOf { child, .. } => QueryNode::ParentsOf {
            child: Box::new(apply_capabilities(
                *child,
                Capabilities {
                    with_provenance: true,
                    ..caps
                },
            )),
            with_meta: caps.with_meta,
            with_provenance: caps.with_provenance,
        },

        QueryNode::ChildrenOf { child, .. } => QueryNode::ChildrenOf {
            child: Box::new(apply_capabilities(
                *child,
                Capabilities {
                    with_provenance: true,
                    ..caps
                },
            )),
            with_meta: caps.with_meta,
            with_provenance: caps.with_provenance,
        },

        QueryNode::Filter {
            name,
            params,
            kv,
            children,
            skip,
            limit,
            ordered,
            ..
        } => QueryNode::Filter {
            name,
            params,
            kv,
            children: children
                .into_iter()
                .map(|c| {
                    apply_capabilities(
                        c,
                        Capabilities {
                            with_meta: true,
                            ..caps
                        },
                    )
                })
                .collect(),
            skip,
            limit,
            ordered,
            with_meta: caps.with_meta,
        },

        other => map_children(other, |c| apply_capabilities(c, caps)),
    }
}

// ----------------------------------------------------------------------

/// Rebuild a node with every direct child replaced by `f(child)`.
/// Leaves pass through unchanged.
fn map_children(node: QueryNode, mut f: impl FnMut(QueryNode) -> QueryNode) -> QueryNode {
    match node {
        QueryNode::Union(children) => QueryNode::Union(children.into_iter().map(f).collect()),
        QueryNode::Join(children) => QueryNode::Join(children.into_iter().map(f).collect()),
        QueryNode::Minus { left, right } => QueryNode::Minus {
            left: Box::new(f(*left)),
            right: Box::new(f(*right)),
        },
        QueryNode::ParentsOf {
            child,
            with_meta,
            with_provenance,
        } => QueryNode::ParentsOf {
            child: Box::new(f(*child)),
            with_meta,
            with_provenance,
        },
        QueryNode::ChildrenOf {
            child,
            with_meta,
            with_provenance,
        } => QueryNode::ChildrenOf {
            child: Box::new(f(*child)),
            with_meta,
            with_provenance,
        },
        QueryNode::MetaFilter {
            child,
            expr,
            with_meta,
            with_provenance,
        } => QueryNode::MetaFilter {
            child: Box::new(f(*child)),
            expr,
            with_meta,
            with_provenance,
        },
        QueryNode::SkipLimit { child, skip, limit } => QueryNode::SkipLimit {
            child: Box::new(f(*child)),
            skip,
            limit,
        },
        QueryNode::Ordered(child) => QueryNode::Ordered(Box::new(f(*child))),
        QueryNode::Filter {
            name,
            params,
            kv,
            children,
            skip,
            limit,
            ordered,
            with_meta,
        } => QueryNode::Filter {
            name,
            params,
            kv,
            children: children.into_iter().map(f).collect(),
            skip,
            limit,
            ordered,
            with_meta,
        },
        leaf @ (QueryNode::Empty
        | QueryNode::BasicFileQuery(_)
        | QueryNode::FileList { .. }
        | QueryNode::NamedQuery { .. }) => leaf,
    }
}
