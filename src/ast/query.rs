use crate::ast::meta::{KeywordParams, Literal, MetaExpr};
use crate::ast::selectors::{BasicDatasetQuery, BasicFileQuery};

/// An explicit file reference in a `fids ...` / `files a:b, ...` list.
#[derive(Debug, Clone, PartialEq)]
pub enum FileSpec {
    /// File id
    Fid(String),
    /// `namespace:name`
    Did { namespace: String, name: String },
}

/// A node of the file-query tree.
///
/// Rewrite passes consume a node by value and return a new one; the only
/// sanctioned cross-tag rewrite is collapsing to `Empty`, the "no results,
/// independent of context" sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    /// No results, regardless of context.
    Empty,

    /// Leaf scan over datasets/files (the "basic query").
    BasicFileQuery(BasicFileQuery),

    /// Explicit list of files by id or namespace:name.
    FileList {
        specs: Vec<FileSpec>,
        with_meta: bool,
        with_provenance: bool,
        skip: usize,
        limit: Option<usize>,
    },

    /// Set union of any number of sub-queries, de-duplicated by file id.
    Union(Vec<QueryNode>),

    /// Set intersection.
    Join(Vec<QueryNode>),

    /// Set difference: `left - right`.
    Minus {
        left: Box<QueryNode>,
        right: Box<QueryNode>,
    },

    /// Files that are parents of the child query's results.
    ParentsOf {
        child: Box<QueryNode>,
        with_meta: bool,
        with_provenance: bool,
    },

    /// Files that are children of the child query's results.
    ChildrenOf {
        child: Box<QueryNode>,
        with_meta: bool,
        with_provenance: bool,
    },

    /// Post-filter: evaluate a predicate over the child's materialized
    /// results. Produced where a predicate cannot be pushed further down
    /// (across a provenance hop, over a paginated selector, over a
    /// pluggable filter).
    MetaFilter {
        child: Box<QueryNode>,
        expr: Option<MetaExpr>,
        with_meta: bool,
        with_provenance: bool,
    },

    /// Pagination applied to the child's result stream.
    SkipLimit {
        child: Box<QueryNode>,
        skip: usize,
        limit: Option<usize>,
    },

    /// Deterministic-order marker; compiled as `ORDER BY` on the file id.
    Ordered(Box<QueryNode>),

    /// Invocation of a registered pluggable filter.
    Filter {
        name: String,
        params: Vec<Literal>,
        kv: KeywordParams,
        children: Vec<QueryNode>,
        skip: usize,
        limit: Option<usize>,
        ordered: bool,
        with_meta: bool,
    },

    /// Reference to a stored named query; inlined during assembly.
    NamedQuery {
        namespace: Option<String>,
        name: String,
    },
}

impl QueryNode {
    pub fn is_empty(&self) -> bool {
        matches!(self, QueryNode::Empty)
    }

    /// Rebuild this node with each direct child replaced by `f(child)`,
    /// stopping at the first error. Leaves pass through unchanged.
    pub fn try_map_children<E>(
        self,
        f: &mut impl FnMut(QueryNode) -> Result<QueryNode, E>,
    ) -> Result<QueryNode, E> {
        Ok(match self {
            QueryNode::Union(children) => QueryNode::Union(
                children.into_iter().map(&mut *f).collect::<Result<_, E>>()?,
            ),
            QueryNode::Join(children) => QueryNode::Join(
                children.into_iter().map(&mut *f).collect::<Result<_, E>>()?,
            ),
            QueryNode::Minus { left, right } => QueryNode::Minus {
                left: Box::new(f(*left)?),
                right: Box::new(f(*right)?),
            },
            QueryNode::ParentsOf {
                child,
                with_meta,
                with_provenance,
            } => QueryNode::ParentsOf {
                child: Box::new(f(*child)?),
                with_meta,
                with_provenance,
            },
            QueryNode::ChildrenOf {
                child,
                with_meta,
                with_provenance,
            } => QueryNode::ChildrenOf {
                child: Box::new(f(*child)?),
                with_meta,
                with_provenance,
            },
            QueryNode::MetaFilter {
                child,
                expr,
                with_meta,
                with_provenance,
            } => QueryNode::MetaFilter {
                child: Box::new(f(*child)?),
                expr,
                with_meta,
                with_provenance,
            },
            QueryNode::SkipLimit { child, skip, limit } => QueryNode::SkipLimit {
                child: Box::new(f(*child)?),
                skip,
                limit,
            },
            QueryNode::Ordered(child) => QueryNode::Ordered(Box::new(f(*child)?)),
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
                children: children.into_iter().map(&mut *f).collect::<Result<_, E>>()?,
                skip,
                limit,
                ordered,
                with_meta,
            },
            leaf @ (QueryNode::Empty
            | QueryNode::BasicFileQuery(_)
            | QueryNode::FileList { .. }
            | QueryNode::NamedQuery { .. }) => leaf,
        })
    }

    /// Wrap in a pagination node, unless the pair is a no-op.
    pub fn paginate(self, skip: usize, limit: Option<usize>) -> QueryNode {
        if skip == 0 && limit.is_none() {
            self
        } else {
            QueryNode::SkipLimit {
                child: Box::new(self),
                skip,
                limit,
            }
        }
    }
}

/// A parsed top-level query: either a file query tree or a dataset selector.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryAst {
    File(QueryNode),
    Dataset(BasicDatasetQuery),
}
