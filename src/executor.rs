//! In-process execution of an optimized query tree against a [`DataSource`].
//!
//! This is the interpretation backend: leaf scans, provenance hops, and
//! explicit file lists come from the data source; set algebra, pagination,
//! ordering, post-filters (via the metadata evaluator), and pluggable
//! filters run here over lazy, forward-only record streams. A SQL-capable
//! deployment pushes whole subtrees to the engine instead (see `sql`) and
//! only needs this path for residual nodes; both backends share the same
//! predicate semantics.

use std::collections::{HashMap, HashSet};

use crate::ast::{
    BasicDatasetQuery, BasicFileQuery, DatasetPattern, FileSpec, KeywordParams, Literal, MetaExpr,
    QueryNode,
};
use crate::error::ExecError;
use crate::evaluator::MetaEvaluator;
use crate::value::{Metadata, Value};

/// A hydrated file row.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub fid: String,
    pub namespace: String,
    pub name: String,
    /// `None` when metadata was not requested.
    pub metadata: Option<Metadata>,
    pub size: Option<i64>,
    pub creator: Option<String>,
    pub created_timestamp: Option<f64>,
    pub retired: bool,
    /// Parent file ids, when provenance was requested.
    pub parents: Option<Vec<String>>,
    pub children: Option<Vec<String>>,
}

impl FileRecord {
    pub fn did(&self) -> String {
        format!("{}:{}", self.namespace, self.name)
    }

    /// The attribute map predicates evaluate against: the metadata document
    /// with the column-backed attributes merged in, so `size > 1000`
    /// behaves the same here as in generated SQL.
    pub fn attributes(&self) -> Metadata {
        let mut map = self.metadata.clone().unwrap_or_default();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert(
            "namespace".to_string(),
            Value::String(self.namespace.clone()),
        );
        if let Some(size) = self.size {
            map.insert("size".to_string(), Value::Integer(size));
        }
        if let Some(creator) = &self.creator {
            map.insert("creator".to_string(), Value::String(creator.clone()));
        }
        if let Some(t) = self.created_timestamp {
            map.insert("created_timestamp".to_string(), Value::Float(t));
        }
        map
    }
}

/// A hydrated dataset row.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRecord {
    pub namespace: String,
    pub name: String,
    pub metadata: Metadata,
    pub frozen: bool,
    pub monotonic: bool,
    pub file_count: i64,
    pub creator: Option<String>,
    pub created_timestamp: Option<f64>,
}

impl DatasetRecord {
    pub fn did(&self) -> String {
        format!("{}:{}", self.namespace, self.name)
    }

    /// Attribute map for `having` predicates: dataset metadata plus the
    /// column-backed dataset attributes.
    pub fn attributes(&self) -> Metadata {
        let mut map = self.metadata.clone();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert(
            "namespace".to_string(),
            Value::String(self.namespace.clone()),
        );
        map.insert("frozen".to_string(), Value::Boolean(self.frozen));
        map.insert("monotonic".to_string(), Value::Boolean(self.monotonic));
        if let Some(creator) = &self.creator {
            map.insert("creator".to_string(), Value::String(creator.clone()));
        }
        if let Some(t) = self.created_timestamp {
            map.insert("created_timestamp".to_string(), Value::Float(t));
        }
        map
    }
}

/// A lazy, forward-only, single-pass stream of file records. Restart by
/// re-running the query; there is no rewind.
pub type FileStream = Box<dyn Iterator<Item = FileRecord>>;

/// Direction of a provenance hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    Parents,
    Children,
}

/// The storage engine, seen from the in-process executor.
///
/// Implementations return plain record streams; all query semantics
/// (predicates, set algebra, pagination, closure over dataset children)
/// stay in the core. A SQL-backed implementation would render each call
/// with the `sql` module and hand the text to its connection.
pub trait DataSource {
    /// Files that are members of the given dataset.
    fn files_in_dataset(
        &self,
        namespace: &str,
        name: &str,
        with_meta: bool,
        with_provenance: bool,
    ) -> Result<FileStream, ExecError>;

    /// All files in the catalog (a basic query with no dataset selector).
    fn all_files(&self, with_meta: bool, with_provenance: bool)
    -> Result<FileStream, ExecError>;

    /// Files by explicit id or namespace:name, in the order given.
    fn lookup_files(
        &self,
        specs: &[FileSpec],
        with_meta: bool,
        with_provenance: bool,
    ) -> Result<FileStream, ExecError>;

    /// Parents (or children) of the given file ids, de-duplicated.
    fn relatives(
        &self,
        fids: &[String],
        rel: Relationship,
        with_meta: bool,
        with_provenance: bool,
    ) -> Result<FileStream, ExecError>;

    /// Datasets matching one selector pattern.
    fn datasets_matching(&self, pattern: &DatasetPattern)
    -> Result<Vec<DatasetRecord>, ExecError>;

    /// One dataset by exact name.
    fn get_dataset(&self, namespace: &str, name: &str)
    -> Result<Option<DatasetRecord>, ExecError>;

    /// Direct children of a dataset in the dataset hierarchy.
    fn dataset_children(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Vec<(String, String)>, ExecError>;
}

/// Options handed to a pluggable filter alongside its inputs.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub skip: usize,
    pub limit: Option<usize>,
    pub ordered: bool,
}

/// A named, pluggable post-processing filter.
///
/// Receives its input result streams in query order, the positional and
/// keyword parameters from the query text, and the caller's pagination and
/// ordering state; it is responsible for honoring them in its output.
pub trait FileFilter {
    fn run(
        &self,
        inputs: Vec<FileStream>,
        params: &[Literal],
        kv: &KeywordParams,
        options: &FilterOptions,
    ) -> Result<FileStream, ExecError>;
}

/// Registered filters by name.
pub type FilterRegistry = HashMap<String, Box<dyn FileFilter>>;

/// Walks an optimized query tree and produces the result stream.
pub struct Executor<'a> {
    source: &'a dyn DataSource,
    filters: &'a FilterRegistry,
    evaluator: MetaEvaluator,
}

impl<'a> Executor<'a> {
    pub fn new(source: &'a dyn DataSource, filters: &'a FilterRegistry) -> Self {
        Executor {
            source,
            filters,
            evaluator: MetaEvaluator::new(),
        }
    }

    pub fn execute(&self, node: &QueryNode) -> Result<FileStream, ExecError> {
        match node {
            QueryNode::Empty => Ok(empty_stream()),

            QueryNode::BasicFileQuery(query) => self.scan(query),

            QueryNode::FileList {
                specs,
                with_meta,
                with_provenance,
                skip,
                limit,
            } => {
                let stream = self.source.lookup_files(specs, *with_meta, *with_provenance)?;
                Ok(paginate(stream, *skip, *limit))
            }

            QueryNode::Union(children) => {
                let streams = children
                    .iter()
                    .map(|c| self.execute(c))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(union_streams(streams))
            }

            QueryNode::Join(children) => self.join(children),

            QueryNode::Minus { left, right } => {
                let right_ids: HashSet<String> =
                    self.execute(right)?.map(|f| f.fid).collect();
                let left = self.execute(left)?;
                Ok(Box::new(left.filter(move |f| !right_ids.contains(&f.fid))))
            }

            QueryNode::ParentsOf {
                child,
                with_meta,
                with_provenance,
            } => self.relatives(child, Relationship::Parents, *with_meta, *with_provenance),

            QueryNode::ChildrenOf {
                child,
                with_meta,
                with_provenance,
            } => self.relatives(child, Relationship::Children, *with_meta, *with_provenance),

            QueryNode::MetaFilter { child, expr, .. } => {
                let stream = self.execute(child)?;
                match expr {
                    None => Ok(stream),
                    Some(expr) => self.meta_filter(stream, expr),
                }
            }

            QueryNode::SkipLimit { child, skip, limit } => {
                let stream = self.execute(child)?;
                Ok(paginate(stream, *skip, *limit))
            }

            QueryNode::Ordered(child) => {
                let mut records: Vec<FileRecord> = self.execute(child)?.collect();
                records.sort_by(|a, b| a.fid.cmp(&b.fid));
                Ok(Box::new(records.into_iter()))
            }

            QueryNode::Filter {
                name,
                params,
                kv,
                children,
                skip,
                limit,
                ordered,
                ..
            } => {
                let filter = self.filters.get(name).ok_or_else(|| ExecError::Filter {
                    name: name.clone(),
                    message: "not registered".to_string(),
                })?;
                let inputs = children
                    .iter()
                    .map(|c| self.execute(c))
                    .collect::<Result<Vec<_>, _>>()?;
                let options = FilterOptions {
                    skip: *skip,
                    limit: *limit,
                    ordered: *ordered,
                };
                filter.run(inputs, params, kv, &options)
            }

            QueryNode::NamedQuery { namespace, name } => Err(ExecError::Eval(format!(
                "unassembled named query {}:{} reached the executor",
                namespace.as_deref().unwrap_or(""),
                name
            ))),
        }
    }

    /// Resolve a dataset selector: pattern matches, optional closure over
    /// children (iterative; a visited set breaks hierarchy cycles, so a
    /// dataset can never become its own descendant), then the `having`
    /// predicate over each dataset's own metadata.
    pub fn datasets(&self, selector: &BasicDatasetQuery) -> Result<Vec<DatasetRecord>, ExecError> {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut found: Vec<DatasetRecord> = Vec::new();

        for pattern in &selector.patterns {
            for ds in self.source.datasets_matching(pattern)? {
                if seen.insert((ds.namespace.clone(), ds.name.clone())) {
                    found.push(ds);
                }
            }
        }

        if selector.with_children {
            let mut parents: Vec<(String, String)> = found
                .iter()
                .map(|d| (d.namespace.clone(), d.name.clone()))
                .collect();
            let mut scanned: HashSet<(String, String)> = HashSet::new();
            while !parents.is_empty() {
                let mut next_level: Vec<(String, String)> = Vec::new();
                for (ns, n) in &parents {
                    scanned.insert((ns.clone(), n.clone()));
                    for child in self.source.dataset_children(ns, n)? {
                        if seen.insert(child.clone()) {
                            if let Some(ds) = self.source.get_dataset(&child.0, &child.1)? {
                                found.push(ds);
                            }
                        }
                        if !scanned.contains(&child) {
                            next_level.push(child);
                        }
                    }
                }
                parents = if selector.recursively {
                    next_level
                } else {
                    Vec::new()
                };
            }
        }

        match &selector.having {
            None => Ok(found),
            Some(having) => {
                validate_expr(having)?;
                let mut kept = Vec::new();
                for ds in found {
                    if self
                        .evaluator
                        .evaluate(&ds.attributes(), having)
                        .map_err(|e| ExecError::Eval(e.to_string()))?
                    {
                        kept.push(ds);
                    }
                }
                Ok(kept)
            }
        }
    }

    fn scan(&self, query: &BasicFileQuery) -> Result<FileStream, ExecError> {
        // Filtering in process needs the metadata even when the caller
        // did not ask for it.
        let with_meta = query.with_meta || query.wheres.is_some();

        let stream = match &query.selector {
            None => self.source.all_files(with_meta, query.with_provenance)?,
            Some(selector) => {
                let datasets = self.datasets(selector)?;
                let mut streams = Vec::with_capacity(datasets.len());
                for ds in &datasets {
                    streams.push(self.source.files_in_dataset(
                        &ds.namespace,
                        &ds.name,
                        with_meta,
                        query.with_provenance,
                    )?);
                }
                union_streams(streams)
            }
        };

        let include_retired = query.include_retired;
        let stream: FileStream =
            Box::new(stream.filter(move |f| include_retired || !f.retired));

        let stream = match &query.wheres {
            None => stream,
            Some(wheres) => {
                let filtered = self.meta_filter(stream, wheres)?;
                if query.with_meta {
                    filtered
                } else {
                    // metadata was fetched only to filter on it
                    Box::new(filtered.map(|mut f| {
                        f.metadata = None;
                        f
                    }))
                }
            }
        };

        let stream = if query.ordered {
            let mut records: Vec<FileRecord> = stream.collect();
            records.sort_by(|a, b| a.fid.cmp(&b.fid));
            Box::new(records.into_iter()) as FileStream
        } else {
            stream
        };

        Ok(paginate(stream, query.skip, query.limit))
    }

    fn join(&self, children: &[QueryNode]) -> Result<FileStream, ExecError> {
        let mut iter = children.iter();
        let first = match iter.next() {
            Some(c) => c,
            None => return Ok(empty_stream()),
        };
        let first: Vec<FileRecord> = self.execute(first)?.collect();
        let mut ids: HashSet<String> = first.iter().map(|f| f.fid.clone()).collect();
        for child in iter {
            let other: HashSet<String> = self.execute(child)?.map(|f| f.fid).collect();
            ids.retain(|id| other.contains(id));
        }
        Ok(Box::new(
            first.into_iter().filter(move |f| ids.contains(&f.fid)),
        ))
    }

    fn relatives(
        &self,
        child: &QueryNode,
        rel: Relationship,
        with_meta: bool,
        with_provenance: bool,
    ) -> Result<FileStream, ExecError> {
        let mut fids: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for f in self.execute(child)? {
            if seen.insert(f.fid.clone()) {
                fids.push(f.fid);
            }
        }
        self.source.relatives(&fids, rel, with_meta, with_provenance)
    }

    fn meta_filter(&self, stream: FileStream, expr: &MetaExpr) -> Result<FileStream, ExecError> {
        // Surface bad regular expressions before the stream is consumed;
        // after this the evaluator cannot fail.
        validate_expr(expr)?;
        let expr = expr.clone();
        let evaluator = MetaEvaluator::new();
        Ok(Box::new(stream.filter(move |f| {
            evaluator
                .evaluate(&f.attributes(), &expr)
                .unwrap_or(false)
        })))
    }
}

/// Pre-compile every regex leaf so evaluation over the stream cannot fail.
fn validate_expr(expr: &MetaExpr) -> Result<(), ExecError> {
    let empty = Metadata::new();
    match expr {
        MetaExpr::And(children) | MetaExpr::Or(children) => {
            for c in children {
                validate_expr(c)?;
            }
            Ok(())
        }
        MetaExpr::Not(inner) => validate_expr(inner),
        leaf => MetaEvaluator::new()
            .evaluate(&empty, leaf)
            .map(|_| ())
            .map_err(|e| ExecError::Eval(e.to_string())),
    }
}

fn empty_stream() -> FileStream {
    Box::new(std::iter::empty())
}

fn paginate(stream: FileStream, skip: usize, limit: Option<usize>) -> FileStream {
    let stream = stream.skip(skip);
    match limit {
        Some(l) => Box::new(stream.take(l)),
        None => Box::new(stream),
    }
}

/// Lazy union: concatenate the streams and drop files already seen.
fn union_streams(streams: Vec<FileStream>) -> FileStream {
    let mut seen: HashSet<String> = HashSet::new();
    Box::new(
        streams
            .into_iter()
            .flatten()
            .filter(move |f| seen.insert(f.fid.clone())),
    )
}
