use crate::ast::meta::MetaExpr;
use crate::dnf;
use crate::error::CompileError;

/// One dataset name or name pattern inside a selector.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetPattern {
    /// Namespace; `None` until a default namespace is applied.
    pub namespace: Option<String>,
    /// Exact name, SQL-style pattern (`%`/`_`), or regular expression.
    pub name: String,
    /// Name is a pattern rather than an exact match.
    pub wildcard: bool,
    /// Pattern is a regular expression (implies `wildcard`).
    pub regexp: bool,
}

impl DatasetPattern {
    pub fn exact(namespace: Option<String>, name: impl Into<String>) -> Self {
        DatasetPattern {
            namespace,
            name: name.into(),
            wildcard: false,
            regexp: false,
        }
    }
}

/// A dataset selector: which datasets to draw from, optionally closed over
/// their children and filtered by a predicate on the datasets' own metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicDatasetQuery {
    pub patterns: Vec<DatasetPattern>,
    pub with_children: bool,
    pub recursively: bool,
    /// `having` clause, evaluated against each candidate dataset's metadata.
    pub having: Option<MetaExpr>,
    pub ordered: bool,
}

impl BasicDatasetQuery {
    pub fn new(patterns: Vec<DatasetPattern>) -> Self {
        BasicDatasetQuery {
            patterns,
            with_children: false,
            recursively: false,
            having: None,
            ordered: false,
        }
    }

    /// Fill in missing namespaces from the query-level default.
    pub fn apply_namespace(&mut self, default_namespace: Option<&str>) {
        if let Some(ns) = default_namespace {
            for p in &mut self.patterns {
                if p.namespace.is_none() {
                    p.namespace = Some(ns.to_string());
                }
            }
        }
    }
}

/// The leaf-level file selector: dataset membership plus the filter and
/// pagination state accumulated by the optimizer.
///
/// `wheres` is kept in disjunctive normal form at all times; new conditions
/// go through [`BasicFileQuery::add_where`], never raw tree surgery.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicFileQuery {
    /// `None` selects over all files (no dataset restriction).
    pub selector: Option<BasicDatasetQuery>,
    pub wheres: Option<MetaExpr>,
    pub skip: usize,
    pub limit: Option<usize>,
    pub with_meta: bool,
    pub with_provenance: bool,
    pub include_retired: bool,
    pub ordered: bool,
}

impl BasicFileQuery {
    pub fn new(selector: Option<BasicDatasetQuery>) -> Self {
        BasicFileQuery {
            selector,
            wheres: None,
            skip: 0,
            limit: None,
            with_meta: false,
            with_provenance: false,
            include_retired: false,
            ordered: false,
        }
    }

    /// Conjoin a predicate with the accumulated one and re-normalize.
    pub fn add_where(&mut self, expr: MetaExpr) -> Result<(), CompileError> {
        self.wheres = Some(dnf::conjoin(self.wheres.take(), expr)?);
        Ok(())
    }

    /// Apply a further `skip`/`limit` pair on top of the accumulated one.
    pub fn add_skip_limit(&mut self, skip: usize, limit: Option<usize>) {
        let (s, l) = merge_skip_limit(self.skip, self.limit, skip, limit);
        self.skip = s;
        self.limit = l;
    }

    /// Pagination has been pushed into this selector.
    pub fn paginated(&self) -> bool {
        self.skip > 0 || self.limit.is_some()
    }

    pub fn apply_namespace(&mut self, default_namespace: Option<&str>) {
        if let Some(sel) = &mut self.selector {
            sel.apply_namespace(default_namespace);
        }
    }
}

/// Compose two sequential "skip N, take M" operations into one pair.
///
/// The existing pair runs first, the new pair is applied to its output:
/// skips add, and the surviving limit is whatever remains of the existing
/// window after the new skip, capped by the new limit, floored at zero.
/// Repeated application is associative.
pub fn merge_skip_limit(
    existing_skip: usize,
    existing_limit: Option<usize>,
    skip: usize,
    limit: Option<usize>,
) -> (usize, Option<usize>) {
    match (existing_limit, limit) {
        (None, l) => (existing_skip + skip, l),
        (Some(el), None) => (existing_skip + skip, Some(el.saturating_sub(skip))),
        (Some(el), Some(l)) => (
            existing_skip + skip,
            Some(el.saturating_sub(skip).min(l)),
        ),
    }
}
