//! The query facades: parse once, then `assemble` / `optimize` / `compile`
//! / `run`, each stage memoized on the query object.

use crate::ast::{BasicDatasetQuery, QueryAst, QueryNode};
use crate::error::{CompileError, ExecError, MqlError};
use crate::executor::{DataSource, DatasetRecord, Executor, FileStream, FilterRegistry};
use crate::optimizer::{self, Capabilities};
use crate::parser;
use crate::sql::{Compiled, SqlCompiler};

/// Stored named-query source text, fetched by exact `(namespace, name)`.
/// A missing key is a compilation error, not a runtime one.
pub trait QueryStore {
    fn fetch(&self, namespace: &str, name: &str) -> Result<Option<String>, ExecError>;
}

/// A query store with nothing in it; assembly fails on any reference.
pub struct NoQueries;

impl QueryStore for NoQueries {
    fn fetch(&self, _namespace: &str, _name: &str) -> Result<Option<String>, ExecError> {
        Ok(None)
    }
}

/// Call-time options applied outside of the query text.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub default_namespace: Option<String>,
    pub with_meta: bool,
    pub with_provenance: bool,
    pub include_retired: bool,
    /// Force deterministic ordering of the results.
    pub ordered: bool,
    pub skip: usize,
    pub limit: Option<usize>,
}

/// A parsed file query and its cached pipeline artifacts.
pub struct FileQuery {
    tree: QueryNode,
    assembled: Option<QueryNode>,
    optimized: Option<QueryNode>,
    compiled: Option<Compiled>,
}

impl FileQuery {
    pub fn new(tree: QueryNode) -> Self {
        FileQuery {
            tree,
            assembled: None,
            optimized: None,
            compiled: None,
        }
    }

    /// Parse query text that must be a file query.
    pub fn parse(text: &str) -> Result<Self, MqlError> {
        match parser::parse(text)? {
            QueryAst::File(tree) => Ok(FileQuery::new(tree)),
            QueryAst::Dataset(_) => Err(MqlError::Compile(CompileError::MalformedTree(
                "expected a file query, got a dataset query".to_string(),
            ))),
        }
    }

    pub fn tree(&self) -> &QueryNode {
        &self.tree
    }

    /// Inline referenced named queries and fill in default namespaces.
    /// Circular references are reported as compilation errors.
    pub fn assemble(
        &mut self,
        store: &dyn QueryStore,
        default_namespace: Option<&str>,
    ) -> Result<&QueryNode, MqlError> {
        if self.assembled.is_none() {
            let mut stack = Vec::new();
            self.assembled = Some(assemble_tree(
                self.tree.clone(),
                store,
                default_namespace,
                &mut stack,
            )?);
        }
        Ok(self.assembled.as_ref().unwrap_or(&self.tree))
    }

    /// Use the raw tree as the assembled one (no named-query references).
    pub fn skip_assembly(&mut self) -> &QueryNode {
        if self.assembled.is_none() {
            self.assembled = Some(self.tree.clone());
        }
        self.assembled.as_ref().unwrap_or(&self.tree)
    }

    /// Run the optimizer pipeline. Idempotent, memoized.
    pub fn optimize(&mut self, options: &QueryOptions) -> Result<&QueryNode, MqlError> {
        if self.optimized.is_none() {
            if self.assembled.is_none() {
                self.assemble(&NoQueries, options.default_namespace.as_deref())?;
            }
            let tree = self
                .assembled
                .clone()
                .unwrap_or_else(|| self.tree.clone());
            self.optimized = Some(optimizer::optimize(
                tree,
                options.skip,
                options.limit,
                options.ordered,
            )?);
        }
        Ok(self.optimized.as_ref().unwrap_or(&self.tree))
    }

    /// Lower the optimized tree to its compiled form: a single SQL
    /// statement when the whole tree is SQL-representable, otherwise a
    /// plan with SQL leaves and residual nodes for the executor.
    pub fn compile(&mut self, options: &QueryOptions) -> Result<&Compiled, MqlError> {
        if self.compiled.is_none() {
            self.optimize(options)?;
            let tree = match &self.optimized {
                Some(t) => t.clone(),
                None => self.tree.clone(),
            };
            let tree = optimizer::apply_capabilities(
                tree,
                Capabilities {
                    with_meta: options.with_meta,
                    with_provenance: options.with_provenance,
                    include_retired: options.include_retired,
                },
            );
            self.compiled = Some(SqlCompiler::new().compile(&tree)?);
        }
        match &self.compiled {
            Some(c) => Ok(c),
            None => Err(MqlError::Compile(CompileError::MalformedTree(
                "compilation produced nothing".to_string(),
            ))),
        }
    }

    /// The single SQL statement for this query, when it lowers to one.
    pub fn to_sql(&mut self, options: &QueryOptions) -> Result<Option<String>, MqlError> {
        Ok(self.compile(options)?.sql().map(String::from))
    }

    /// Execute against a data source and hydrate the result stream.
    ///
    /// Interprets the optimized tree: scans, provenance hops, and lookups
    /// go to the source; everything else runs in process.
    pub fn run(
        &mut self,
        source: &dyn DataSource,
        filters: &FilterRegistry,
        options: &QueryOptions,
    ) -> Result<FileStream, MqlError> {
        self.optimize(options)?;
        let tree = match &self.optimized {
            Some(t) => t.clone(),
            None => self.tree.clone(),
        };
        let tree = optimizer::apply_capabilities(
            tree,
            Capabilities {
                with_meta: options.with_meta,
                with_provenance: options.with_provenance,
                include_retired: options.include_retired,
            },
        );
        check_filters(&tree, filters)?;
        Executor::new(source, filters)
            .execute(&tree)
            .map_err(MqlError::Execution)
    }
}

/// A parsed dataset query: a selector with optional children closure and
/// `having` predicate.
pub struct DatasetQuery {
    selector: BasicDatasetQuery,
}

impl DatasetQuery {
    pub fn new(selector: BasicDatasetQuery) -> Self {
        DatasetQuery { selector }
    }

    pub fn parse(text: &str) -> Result<Self, MqlError> {
        match parser::parse(text)? {
            QueryAst::Dataset(selector) => Ok(DatasetQuery::new(selector)),
            QueryAst::File(_) => Err(MqlError::Compile(CompileError::MalformedTree(
                "expected a dataset query, got a file query".to_string(),
            ))),
        }
    }

    pub fn selector(&self) -> &BasicDatasetQuery {
        &self.selector
    }

    /// The SELECT over the dataset catalog this selector compiles to.
    pub fn to_sql(&self, options: &QueryOptions) -> Result<String, MqlError> {
        let mut selector = self.selector.clone();
        selector.apply_namespace(options.default_namespace.as_deref());
        Ok(SqlCompiler::new().selector_sql(&selector)?)
    }

    /// Resolve the selector against the catalog, de-duplicated by
    /// `(namespace, name)`, `having` evaluated in process.
    pub fn run(
        &self,
        source: &dyn DataSource,
        options: &QueryOptions,
    ) -> Result<Vec<DatasetRecord>, MqlError> {
        let mut selector = self.selector.clone();
        selector.apply_namespace(options.default_namespace.as_deref());
        let filters = FilterRegistry::new();
        let mut datasets = Executor::new(source, &filters)
            .datasets(&selector)
            .map_err(MqlError::Execution)?;
        if options.ordered {
            datasets.sort_by(|a, b| a.did().cmp(&b.did()));
        }
        if options.skip > 0 {
            datasets.drain(..options.skip.min(datasets.len()));
        }
        if let Some(limit) = options.limit {
            datasets.truncate(limit);
        }
        Ok(datasets)
    }
}

/// Either kind of parsed query.
pub enum MqlQuery {
    File(FileQuery),
    Dataset(DatasetQuery),
}

impl MqlQuery {
    pub fn parse(text: &str) -> Result<MqlQuery, MqlError> {
        Ok(match parser::parse(text)? {
            QueryAst::File(tree) => MqlQuery::File(FileQuery::new(tree)),
            QueryAst::Dataset(selector) => MqlQuery::Dataset(DatasetQuery::new(selector)),
        })
    }
}

fn assemble_tree(
    node: QueryNode,
    store: &dyn QueryStore,
    default_namespace: Option<&str>,
    stack: &mut Vec<(String, String)>,
) -> Result<QueryNode, MqlError> {
    match node {
        QueryNode::NamedQuery { namespace, name } => {
            let ns = namespace
                .or_else(|| default_namespace.map(String::from))
                .unwrap_or_default();
            let key = (ns.clone(), name.clone());
            if stack.contains(&key) {
                return Err(MqlError::Compile(CompileError::CircularNamedQuery {
                    namespace: ns,
                    name,
                }));
            }
            let source = store
                .fetch(&ns, &name)
                .map_err(MqlError::Execution)?
                .ok_or_else(|| {
                    MqlError::Compile(CompileError::UnknownNamedQuery {
                        namespace: ns.clone(),
                        name: name.clone(),
                    })
                })?;
            let tree = match parser::parse(&source)? {
                QueryAst::File(tree) => tree,
                QueryAst::Dataset(_) => {
                    return Err(MqlError::Compile(CompileError::MalformedTree(format!(
                        "named query {}:{} is not a file query",
                        ns, name
                    ))));
                }
            };
            stack.push(key);
            let tree = assemble_tree(tree, store, Some(&ns), stack)?;
            stack.pop();
            Ok(tree)
        }

        QueryNode::BasicFileQuery(mut query) => {
            query.apply_namespace(default_namespace);
            Ok(QueryNode::BasicFileQuery(query))
        }

        other => other
            .try_map_children(&mut |c| assemble_tree(c, store, default_namespace, stack)),
    }
}

/// Every referenced pluggable filter must be registered before execution.
fn check_filters(node: &QueryNode, filters: &FilterRegistry) -> Result<(), MqlError> {
    match node {
        QueryNode::Filter { name, children, .. } => {
            if !filters.contains_key(name) {
                return Err(MqlError::Compile(CompileError::UnknownFilter(name.clone())));
            }
            for c in children {
                check_filters(c, filters)?;
            }
            Ok(())
        }
        QueryNode::Union(children) | QueryNode::Join(children) => {
            for c in children {
                check_filters(c, filters)?;
            }
            Ok(())
        }
        QueryNode::Minus { left, right } => {
            check_filters(left, filters)?;
            check_filters(right, filters)
        }
        QueryNode::ParentsOf { child, .. }
        | QueryNode::ChildrenOf { child, .. }
        | QueryNode::MetaFilter { child, .. }
        | QueryNode::SkipLimit { child, .. }
        | QueryNode::Ordered(child) => check_filters(child, filters),
        QueryNode::Empty
        | QueryNode::BasicFileQuery(_)
        | QueryNode::FileList { .. }
        | QueryNode::NamedQuery { .. } => Ok(()),
    }
}
