//! Translation of an optimized query tree into SQL text.
//!
//! The target is a PostgreSQL-flavored engine with a JSONB `metadata`
//! column: `?` for key existence, `@?`/`@@` for JSON-path predicates,
//! `jsonb_array_length` for array lengths. Assumed tables: `files`
//! (plus a `files_with_provenance` view exposing `parents`/`children`
//! aggregates), `datasets`, the `files_datasets` membership table, the
//! `parent_child` file provenance edge table, and the `datasets_parents`
//! dataset hierarchy edge table.
//!
//! [`SqlCompiler::compile`] folds maximal SQL-representable subtrees into
//! single statements bottom-up; whatever cannot be lowered (pluggable
//! filters and anything stacked on top of them) remains as a [`Compiled`]
//! node for the executor, which materializes the SQL parts and finishes
//! the job in process. No predicate is ever dropped on the way.

use crate::ast::{
    BasicDatasetQuery, BasicFileQuery, CmpOp, FileSpec, Index, KeywordParams, Lhs, Literal,
    MetaExpr, QueryNode, SECONDS_PER_DAY,
};
use crate::dnf;
use crate::error::CompileError;
use crate::parser::{DATASET_ATTRIBUTES, FILE_ATTRIBUTES};
use crate::value::Value;

/// The fixed column set every generated file SELECT projects, so that set
/// operators can combine arbitrary subqueries.
pub const FILE_COLUMNS: &str =
    "id, namespace, name, metadata, size, creator, created_timestamp, parents, children";

/// The compiled form of a query: either one SQL statement, or a residual
/// plan whose leaves are SQL statements.
#[derive(Debug, Clone, PartialEq)]
pub enum Compiled {
    Empty,
    /// A complete SQL statement projecting [`FILE_COLUMNS`].
    Sql(String),
    Union(Vec<Compiled>),
    Join(Vec<Compiled>),
    Minus {
        left: Box<Compiled>,
        right: Box<Compiled>,
    },
    Parents {
        input: Box<Compiled>,
        with_meta: bool,
        with_provenance: bool,
    },
    Children {
        input: Box<Compiled>,
        with_meta: bool,
        with_provenance: bool,
    },
    MetaFilter {
        input: Box<Compiled>,
        expr: Option<MetaExpr>,
    },
    SkipLimit {
        input: Box<Compiled>,
        skip: usize,
        limit: Option<usize>,
    },
    Ordered(Box<Compiled>),
    Filter {
        name: String,
        params: Vec<Literal>,
        kv: KeywordParams,
        inputs: Vec<Compiled>,
        skip: usize,
        limit: Option<usize>,
        ordered: bool,
    },
}

impl Compiled {
    /// The single SQL statement, when the whole tree lowered to one.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Compiled::Sql(s) => Some(s),
            _ => None,
        }
    }
}

/// Bottom-up AST-to-SQL compiler. Table aliases are generated from a
/// per-compiler counter, so each compilation is self-contained.
pub struct SqlCompiler {
    next_alias: u32,
}

impl Default for SqlCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlCompiler {
    pub fn new() -> Self {
        SqlCompiler { next_alias: 0 }
    }

    fn alias(&mut self, prefix: &str) -> String {
        self.next_alias += 1;
        format!("{}_{}", prefix, self.next_alias)
    }

    pub fn compile(&mut self, node: &QueryNode) -> Result<Compiled, CompileError> {
        match node {
            QueryNode::Empty => Ok(Compiled::Empty),

            QueryNode::BasicFileQuery(query) => Ok(Compiled::Sql(self.scan_sql(query)?)),

            QueryNode::FileList {
                specs,
                with_meta,
                with_provenance,
                skip,
                limit,
            } => Ok(Compiled::Sql(self.file_list_sql(
                specs,
                *with_meta,
                *with_provenance,
                *skip,
                *limit,
            ))),

            QueryNode::Union(children) => {
                let compiled = self.compile_list(children)?;
                Ok(self.fold_set_op(compiled, "union", Compiled::Union))
            }

            QueryNode::Join(children) => {
                let compiled = self.compile_list(children)?;
                Ok(self.fold_set_op(compiled, "intersect", Compiled::Join))
            }

            QueryNode::Minus { left, right } => {
                let left = self.compile(left)?;
                let right = self.compile(right)?;
                match (left, right) {
                    (Compiled::Sql(l), Compiled::Sql(r)) => {
                        let t = self.alias("t");
                        Ok(Compiled::Sql(format!(
                            "select {FILE_COLUMNS} from (\n{l}\nexcept\n{r}\n) as {t}"
                        )))
                    }
                    (left, right) => Ok(Compiled::Minus {
                        left: Box::new(left),
                        right: Box::new(right),
                    }),
                }
            }

            QueryNode::ParentsOf {
                child,
                with_meta,
                with_provenance,
            } => {
                let input = self.compile(child)?;
                match input {
                    Compiled::Sql(sql) => Ok(Compiled::Sql(self.provenance_sql(
                        &sql,
                        true,
                        *with_meta,
                        *with_provenance,
                    ))),
                    input => Ok(Compiled::Parents {
                        input: Box::new(input),
                        with_meta: *with_meta,
                        with_provenance: *with_provenance,
                    }),
                }
            }

            QueryNode::ChildrenOf {
                child,
                with_meta,
                with_provenance,
            } => {
                let input = self.compile(child)?;
                match input {
                    Compiled::Sql(sql) => Ok(Compiled::Sql(self.provenance_sql(
                        &sql,
                        false,
                        *with_meta,
                        *with_provenance,
                    ))),
                    input => Ok(Compiled::Children {
                        input: Box::new(input),
                        with_meta: *with_meta,
                        with_provenance: *with_provenance,
                    }),
                }
            }

            QueryNode::MetaFilter { child, expr, .. } => {
                let input = self.compile(child)?;
                match (input, expr) {
                    (input, None) => Ok(input),
                    (Compiled::Sql(sql), Some(expr)) => {
                        let t = self.alias("t");
                        match dnf_where(expr, &t, FILE_ATTRIBUTES)? {
                            Some(clause) => Ok(Compiled::Sql(format!(
                                "select {FILE_COLUMNS} from (\n{sql}\n) as {t} where {clause}"
                            ))),
                            None => Ok(Compiled::Sql(sql)),
                        }
                    }
                    (input, Some(expr)) => Ok(Compiled::MetaFilter {
                        input: Box::new(input),
                        expr: Some(expr.clone()),
                    }),
                }
            }

            QueryNode::SkipLimit { child, skip, limit } => {
                let input = self.compile(child)?;
                match input {
                    Compiled::Sql(sql) => {
                        let t = self.alias("t");
                        let mut out =
                            format!("select {FILE_COLUMNS} from (\n{sql}\n) as {t}");
                        if let Some(l) = limit {
                            out.push_str(&format!(" limit {}", l));
                        }
                        if *skip > 0 {
                            out.push_str(&format!(" offset {}", skip));
                        }
                        Ok(Compiled::Sql(out))
                    }
                    input => Ok(Compiled::SkipLimit {
                        input: Box::new(input),
                        skip: *skip,
                        limit: *limit,
                    }),
                }
            }

            QueryNode::Ordered(child) => {
                let input = self.compile(child)?;
                match input {
                    Compiled::Sql(sql) => {
                        let t = self.alias("t");
                        Ok(Compiled::Sql(format!(
                            "select {FILE_COLUMNS} from (\n{sql}\n) as {t} order by {t}.id"
                        )))
                    }
                    input => Ok(Compiled::Ordered(Box::new(input))),
                }
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
            } => Ok(Compiled::Filter {
                name: name.clone(),
                params: params.clone(),
                kv: kv.clone(),
                inputs: children
                    .iter()
                    .map(|c| self.compile(c))
                    .collect::<Result<_, _>>()?,
                skip: *skip,
                limit: *limit,
                ordered: *ordered,
            }),

            QueryNode::NamedQuery { namespace, name } => Err(CompileError::MalformedTree(format!(
                "unassembled named query {}:{}",
                namespace.as_deref().unwrap_or(""),
                name
            ))),
        }
    }

    fn compile_list(&mut self, children: &[QueryNode]) -> Result<Vec<Compiled>, CompileError> {
        children.iter().map(|c| self.compile(c)).collect()
    }

    /// Combine children of a union/join: all-SQL children fold into one
    /// statement over a templated outer SELECT, mixed children stay a plan
    /// node.
    fn fold_set_op(
        &mut self,
        children: Vec<Compiled>,
        sql_op: &str,
        residual: impl FnOnce(Vec<Compiled>) -> Compiled,
    ) -> Compiled {
        if children.iter().all(|c| matches!(c, Compiled::Sql(_))) {
            let parts: Vec<String> = children
                .into_iter()
                .filter_map(|c| match c {
                    Compiled::Sql(s) => Some(s),
                    _ => None,
                })
                .collect();
            let t = self.alias("t");
            let body = parts.join(&format!("\n{}\n", sql_op));
            Compiled::Sql(format!(
                "select {FILE_COLUMNS} from (\n{body}\n) as {t}"
            ))
        } else {
            residual(children)
        }
    }

    /// SELECT for a basic file query: the file table, optionally joined
    /// through dataset membership to the selector's datasets, filtered by
    /// the retirement flag and the accumulated DNF predicate.
    fn scan_sql(&mut self, query: &BasicFileQuery) -> Result<String, CompileError> {
        let f = self.alias("f");
        let table = if query.with_provenance {
            "files_with_provenance"
        } else {
            "files"
        };
        let projection = file_projection(&f, query.with_meta, query.with_provenance);

        let mut where_parts: Vec<String> = Vec::new();
        if !query.include_retired {
            where_parts.push(format!("not {}.retired", f));
        }
        if let Some(wheres) = &query.wheres {
            if let Some(clause) = dnf_where(wheres, &f, FILE_ATTRIBUTES)? {
                where_parts.push(clause);
            }
        }
        let where_clause = if where_parts.is_empty() {
            String::new()
        } else {
            format!("\nwhere {}", where_parts.join(" and "))
        };

        let mut tail = String::new();
        if query.ordered {
            tail.push_str(&format!("\norder by {}.id", f));
        }
        if let Some(limit) = query.limit {
            tail.push_str(&format!("\nlimit {}", limit));
        }
        if query.skip > 0 {
            tail.push_str(&format!("\noffset {}", query.skip));
        }

        match &query.selector {
            None => Ok(format!(
                "select {projection}\nfrom {table} {f}{where_clause}{tail}"
            )),
            Some(selector) => {
                let fd = self.alias("fd");
                let sd = self.alias("sd");
                let datasets_sql = self.selector_sql(selector)?;
                Ok(format!(
                    "with {sd} as (\n{datasets_sql}\n)\n\
                     select {projection}\n\
                     from {table} {f}\n\
                     inner join files_datasets {fd} on {fd}.file_id = {f}.id\n\
                     inner join {sd} on {sd}.namespace = {fd}.dataset_namespace \
                     and {sd}.name = {fd}.dataset_name\
                     {where_clause}{tail}"
                ))
            }
        }
    }

    /// SELECT producing the `(namespace, name, metadata)` rows of a dataset
    /// selector: exact names, patterns, the optional closure over dataset
    /// children (recursive CTE - the `union` inside makes it cycle-safe),
    /// and the optional `having` predicate over dataset metadata.
    pub fn selector_sql(&mut self, selector: &BasicDatasetQuery) -> Result<String, CompileError> {
        let meta = if selector.having.is_some() {
            "metadata"
        } else {
            "null as metadata"
        };
        let mut parts: Vec<String> = Vec::new();

        for pattern in &selector.patterns {
            let namespace = pattern.namespace.clone().unwrap_or_default();
            let ns = sql_str(&namespace);
            let name = sql_str(&pattern.name);
            let name_match = if pattern.regexp {
                format!("name ~ {}", name)
            } else if pattern.wildcard {
                format!("name like {}", name)
            } else {
                format!("name = {}", name)
            };

            if !pattern.wildcard && selector.having.is_none() && !selector.with_children {
                // exact name, nothing to look up
                parts.push(format!(
                    "select {} as namespace, {} as name, null as metadata",
                    ns, name
                ));
            } else {
                parts.push(format!(
                    "select namespace, name, {meta} from datasets where namespace = {ns} and {name_match}"
                ));
            }

            if selector.with_children {
                let d = self.alias("d");
                let dp = self.alias("dp");
                let root_match = if pattern.regexp {
                    format!("{dp}.parent_name ~ {name}")
                } else if pattern.wildcard {
                    format!("{dp}.parent_name like {name}")
                } else {
                    format!("{dp}.parent_name = {name}")
                };
                let first_level = format!(
                    "select {d}.namespace, {d}.name, {d}.metadata from datasets {d}\n\
                     inner join datasets_parents {dp} on {dp}.child_namespace = {d}.namespace \
                     and {dp}.child_name = {d}.name\n\
                     where {dp}.parent_namespace = {ns} and {root_match}"
                );
                if selector.recursively {
                    let s = self.alias("s");
                    let dd = self.alias("d");
                    let ddp = self.alias("dp");
                    let subsets = self.alias("subsets");
                    parts.push(format!(
                        "(with recursive {subsets} as (\n\
                         {first_level}\n\
                         union\n\
                         select {dd}.namespace, {dd}.name, {dd}.metadata from datasets {dd}\n\
                         inner join datasets_parents {ddp} on {ddp}.child_namespace = {dd}.namespace \
                         and {ddp}.child_name = {dd}.name\n\
                         inner join {subsets} {s} on {s}.namespace = {ddp}.parent_namespace \
                         and {s}.name = {ddp}.parent_name\n\
                         )\n\
                         select distinct namespace, name, metadata from {subsets})"
                    ));
                } else {
                    parts.push(first_level);
                }
            }
        }

        let mut sql = parts.join("\nunion\n");
        if let Some(having) = &selector.having {
            let ds = self.alias("ds");
            if let Some(clause) = dnf_where(having, &ds, DATASET_ATTRIBUTES)? {
                sql = format!(
                    "select namespace, name, metadata from (\n{sql}\n) as {ds} where {clause}"
                );
            }
        }
        Ok(sql)
    }

    /// Self-join through the provenance edge table; the projected side is
    /// the parents (or children) of the inner query's rows.
    fn provenance_sql(
        &mut self,
        input_sql: &str,
        parents: bool,
        with_meta: bool,
        with_provenance: bool,
    ) -> String {
        let f = self.alias("f");
        let pc = self.alias("pc");
        let q = self.alias("q");
        let table = if with_provenance {
            "files_with_provenance"
        } else {
            "files"
        };
        let projection = file_projection(&f, with_meta, with_provenance);
        let (own_side, other_side) = if parents {
            ("parent_id", "child_id")
        } else {
            ("child_id", "parent_id")
        };
        format!(
            "select distinct {projection}\n\
             from {table} {f}\n\
             inner join parent_child {pc} on {f}.id = {pc}.{own_side}\n\
             inner join (\n{input_sql}\n) as {q} on {q}.id = {pc}.{other_side}"
        )
    }

    /// SELECT for an explicit list of file ids and/or namespace:name pairs.
    fn file_list_sql(
        &mut self,
        specs: &[FileSpec],
        with_meta: bool,
        with_provenance: bool,
        skip: usize,
        limit: Option<usize>,
    ) -> String {
        let f = self.alias("f");
        let table = if with_provenance {
            "files_with_provenance"
        } else {
            "files"
        };
        let projection = file_projection(&f, with_meta, with_provenance);

        let ids: Vec<String> = specs
            .iter()
            .filter_map(|s| match s {
                FileSpec::Fid(fid) => Some(sql_str(fid)),
                _ => None,
            })
            .collect();
        let dids: Vec<String> = specs
            .iter()
            .filter_map(|s| match s {
                FileSpec::Did { namespace, name } => {
                    Some(sql_str(&format!("{}:{}", namespace, name)))
                }
                _ => None,
            })
            .collect();

        let mut parts = Vec::new();
        if !ids.is_empty() {
            parts.push(format!(
                "select {projection} from {table} {f} where {f}.id in ({})",
                ids.join(", ")
            ));
        }
        if !dids.is_empty() {
            parts.push(format!(
                "select {projection} from {table} {f} \
                 where {f}.namespace || ':' || {f}.name in ({})",
                dids.join(", ")
            ));
        }

        let mut sql = parts.join("\nunion\n");
        if skip > 0 || limit.is_some() {
            let t = self.alias("t");
            sql = format!("select {FILE_COLUMNS} from (\n{sql}\n) as {t} order by {t}.id");
            if let Some(l) = limit {
                sql.push_str(&format!(" limit {}", l));
            }
            if skip > 0 {
                sql.push_str(&format!(" offset {}", skip));
            }
        }
        sql
    }
}

fn file_projection(f: &str, with_meta: bool, with_provenance: bool) -> String {
    let meta = if with_meta {
        format!("{}.metadata", f)
    } else {
        "null as metadata".to_string()
    };
    let provenance = if with_provenance {
        format!("{f}.parents, {f}.children")
    } else {
        "null as parents, null as children".to_string()
    };
    format!(
        "{f}.id, {f}.namespace, {f}.name, {meta}, {f}.size, {f}.creator, \
         {f}.created_timestamp, {provenance}"
    )
}

// ----------------------------------------------------------------------
// DNF -> WHERE clause
// ----------------------------------------------------------------------

/// Translate a metadata predicate into a WHERE clause over `table`.
///
/// The expression is normalized first; each AND-clause's leaves become
/// parenthesized conjuncts, clauses are OR-joined. Returns `None` for the
/// trivially-true empty expression. `attributes` names the column-backed
/// attributes valid in this context.
pub fn dnf_where(
    expr: &MetaExpr,
    table: &str,
    attributes: &[&str],
) -> Result<Option<String>, CompileError> {
    let terms = dnf::terms(expr)?;
    if terms.is_empty() {
        return Ok(None);
    }
    let mut clauses = Vec::with_capacity(terms.len());
    for term in &terms {
        let mut conjuncts = Vec::with_capacity(term.len());
        for leaf in term {
            conjuncts.push(format!("( {} )", leaf_sql(leaf, table, attributes)?));
        }
        if conjuncts.is_empty() {
            conjuncts.push("( true )".to_string());
        }
        clauses.push(format!("( {} )", conjuncts.join(" and ")));
    }
    Ok(Some(clauses.join(" or ")))
}

fn leaf_sql(leaf: &MetaExpr, t: &str, attributes: &[&str]) -> Result<String, CompileError> {
    match leaf {
        MetaExpr::Present { name } => Ok(if is_column(name, attributes) {
            // table columns always exist
            "true".to_string()
        } else {
            format!("{}.metadata ? {}", t, sql_str(name))
        }),

        MetaExpr::NotPresent { name } => Ok(if is_column(name, attributes) {
            "false".to_string()
        } else {
            format!("not ({}.metadata ? {})", t, sql_str(name))
        }),

        MetaExpr::Cmp { lhs, op, value } => cmp_sql(lhs, *op, value, t, attributes),

        MetaExpr::InRange {
            lhs,
            low,
            high,
            negated,
        } => range_sql(lhs, low, high, *negated, t, attributes),

        MetaExpr::InSet { lhs, set, negated } => set_sql(lhs, set, *negated, t, attributes),

        MetaExpr::And(_) | MetaExpr::Or(_) | MetaExpr::Not(_) => Err(
            CompileError::MalformedTree("boolean node among DNF leaves".to_string()),
        ),
    }
}

fn cmp_sql(
    lhs: &Lhs,
    op: CmpOp,
    value: &Literal,
    t: &str,
    attributes: &[&str],
) -> Result<String, CompileError> {
    match lhs {
        Lhs::ObjectAttribute(name) => {
            check_column(name, attributes)?;
            if op.is_regex() {
                // Postgres has the regex operators natively for columns
                return Ok(format!(
                    "{}.{} {} {}",
                    t,
                    name,
                    op.as_str(),
                    sql_literal(&value.to_value())
                ));
            }
            if let Literal::Date(day) = value {
                return Ok(column_date_cmp(t, name, op, *day));
            }
            let sql_op = if op == CmpOp::Eq { "=" } else { op.as_str() };
            Ok(format!(
                "{}.{} {} {}",
                t,
                name,
                sql_op,
                sql_literal(&value.to_value())
            ))
        }

        Lhs::ArrayLength(name) => {
            let sql_op = if op == CmpOp::Eq { "=" } else { op.as_str() };
            Ok(format!(
                "jsonb_array_length({}.metadata -> {}) {} {}",
                t,
                sql_str(name),
                sql_op,
                json_literal(&value.to_value())
            ))
        }

        Lhs::Scalar(_) | Lhs::ArrayAny(_) | Lhs::Subscript { .. } => {
            let path = doc_path(lhs);
            if op.is_regex() {
                let ci = matches!(op, CmpOp::MatchI | CmpOp::NotMatchI);
                let negated = matches!(op, CmpOp::NotMatch | CmpOp::NotMatchI);
                let flags = if ci { " flag \"i\"" } else { "" };
                let mut predicate = format!(
                    "@ like_regex {}{}",
                    json_literal(&value.to_value()),
                    flags
                );
                if negated {
                    predicate = format!("!({})", predicate);
                }
                return Ok(path_filter(t, &path, &predicate));
            }
            if let Literal::Date(day) = value {
                return Ok(doc_date_cmp(t, &path, op, *day));
            }
            let json_op = match op {
                CmpOp::Eq => "==",
                other => other.as_str(),
            };
            Ok(format!(
                "{}.metadata @@ {}",
                t,
                sql_str(&format!(
                    "{} {} {}",
                    path,
                    json_op,
                    json_literal(&value.to_value())
                ))
            ))
        }
    }
}

/// Calendar-day comparison against a JSONB path: the literal denotes
/// `[t, t + 86400)`, so `=` tests the interval, `!=` its complement, and
/// the ordering operators shift to the day boundary.
fn doc_date_cmp(t: &str, path: &str, op: CmpOp, day_start: f64) -> String {
    let day_end = day_start + SECONDS_PER_DAY;
    match op {
        CmpOp::Eq => path_filter(t, path, &format!("@ >= {} && @ < {}", day_start, day_end)),
        CmpOp::Ne => path_filter(t, path, &format!("@ >= {} || @ < {}", day_end, day_start)),
        CmpOp::Lt => format!("{}.metadata @@ {}", t, sql_str(&format!("{} < {}", path, day_start))),
        CmpOp::Le => format!("{}.metadata @@ {}", t, sql_str(&format!("{} < {}", path, day_end))),
        CmpOp::Gt => format!("{}.metadata @@ {}", t, sql_str(&format!("{} >= {}", path, day_end))),
        CmpOp::Ge => format!("{}.metadata @@ {}", t, sql_str(&format!("{} >= {}", path, day_start))),
        _ => "false".to_string(),
    }
}

fn column_date_cmp(t: &str, name: &str, op: CmpOp, day_start: f64) -> String {
    let day_end = day_start + SECONDS_PER_DAY;
    match op {
        CmpOp::Eq => format!("{t}.{name} >= {day_start} and {t}.{name} < {day_end}"),
        CmpOp::Ne => format!("({t}.{name} >= {day_end} or {t}.{name} < {day_start})"),
        CmpOp::Lt => format!("{t}.{name} < {day_start}"),
        CmpOp::Le => format!("{t}.{name} < {day_end}"),
        CmpOp::Gt => format!("{t}.{name} >= {day_end}"),
        CmpOp::Ge => format!("{t}.{name} >= {day_start}"),
        _ => "false".to_string(),
    }
}

fn range_sql(
    lhs: &Lhs,
    low: &Literal,
    high: &Literal,
    negated: bool,
    t: &str,
    attributes: &[&str],
) -> Result<String, CompileError> {
    // A date upper bound extends to the end of its day, exclusive.
    let (high_value, exclusive_high) = match high {
        Literal::Date(day) => (Value::Float(day + SECONDS_PER_DAY), true),
        other => (other.to_value(), false),
    };
    let low_value = low.to_value();

    match lhs {
        Lhs::ObjectAttribute(name) => {
            check_column(name, attributes)?;
            let lo = sql_literal(&low_value);
            let hi = sql_literal(&high_value);
            let body = if exclusive_high {
                format!("{t}.{name} >= {lo} and {t}.{name} < {hi}")
            } else {
                format!("{t}.{name} between {lo} and {hi}")
            };
            Ok(if negated {
                format!("not ({})", body)
            } else {
                body
            })
        }

        Lhs::ArrayLength(name) => {
            let lo = json_literal(&low_value);
            let hi = json_literal(&high_value);
            let n = if negated { " not" } else { "" };
            Ok(format!(
                "jsonb_array_length({}.metadata -> {}){} between {} and {}",
                t,
                sql_str(name),
                n,
                lo,
                hi
            ))
        }

        Lhs::Scalar(_) | Lhs::ArrayAny(_) | Lhs::Subscript { .. } => {
            let path = doc_path(lhs);
            let lo = json_literal(&low_value);
            let hi = json_literal(&high_value);
            let predicate = match (negated, exclusive_high) {
                (false, false) => format!("@ >= {} && @ <= {}", lo, hi),
                (false, true) => format!("@ >= {} && @ < {}", lo, hi),
                (true, false) => format!("@ < {} || @ > {}", lo, hi),
                (true, true) => format!("@ < {} || @ >= {}", lo, hi),
            };
            Ok(path_filter(t, &path, &predicate))
        }
    }
}

fn set_sql(
    lhs: &Lhs,
    set: &[Literal],
    negated: bool,
    t: &str,
    attributes: &[&str],
) -> Result<String, CompileError> {
    if set.is_empty() {
        return Ok(if negated {
            // at least one element/value exists outside the empty set
            match lhs {
                Lhs::ObjectAttribute(_) => "true".to_string(),
                _ => format!("{}.metadata ? {}", t, sql_str(lhs.name())),
            }
        } else {
            "false".to_string()
        });
    }

    match lhs {
        Lhs::ObjectAttribute(name) => {
            check_column(name, attributes)?;
            let values: Vec<String> = set.iter().map(|v| sql_literal(&v.to_value())).collect();
            let body = format!("{}.{} in ({})", t, name, values.join(", "));
            Ok(if negated {
                format!("not ({})", body)
            } else {
                body
            })
        }

        Lhs::ArrayLength(name) => {
            let values: Vec<String> = set.iter().map(|v| json_literal(&v.to_value())).collect();
            let n = if negated { " not" } else { "" };
            Ok(format!(
                "jsonb_array_length({}.metadata -> {}){} in ({})",
                t,
                sql_str(name),
                n,
                values.join(", ")
            ))
        }

        Lhs::Scalar(_) | Lhs::ArrayAny(_) | Lhs::Subscript { .. } => {
            let path = doc_path(lhs);
            let predicate = if negated {
                set.iter()
                    .map(|v| format!("@ != {}", json_literal(&v.to_value())))
                    .collect::<Vec<_>>()
                    .join(" && ")
            } else {
                set.iter()
                    .map(|v| format!("@ == {}", json_literal(&v.to_value())))
                    .collect::<Vec<_>>()
                    .join(" || ")
            };
            Ok(path_filter(t, &path, &predicate))
        }
    }
}

// ----------------------------------------------------------------------
// Literals and paths
// ----------------------------------------------------------------------

/// The JSON-path address of a document-backed left operand.
fn doc_path(lhs: &Lhs) -> String {
    match lhs {
        Lhs::Scalar(name) => format!("$.\"{}\"", name),
        Lhs::ArrayAny(name) => format!("$.\"{}\"[*]", name),
        Lhs::Subscript { name, index } => match index {
            Index::Position(i) => format!("$.\"{}\"[{}]", name, i),
            Index::Key(k) => format!("$.\"{}\".\"{}\"", name, json_escape(k)),
        },
        Lhs::ArrayLength(name) | Lhs::ObjectAttribute(name) => format!("$.\"{}\"", name),
    }
}

fn path_filter(t: &str, path: &str, predicate: &str) -> String {
    format!(
        "{}.metadata @? {}",
        t,
        sql_str(&format!("{} ? ({})", path, predicate))
    )
}

fn is_column(name: &str, attributes: &[&str]) -> bool {
    attributes.contains(&name)
}

fn check_column(name: &str, attributes: &[&str]) -> Result<(), CompileError> {
    if is_column(name, attributes) {
        Ok(())
    } else {
        Err(CompileError::UnknownAttribute(name.to_string()))
    }
}

/// A SQL string literal, single-quoted with quote doubling.
pub fn sql_str(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn json_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// A literal as SQL text (column comparisons).
fn sql_literal(v: &Value) -> String {
    match v {
        Value::String(s) => sql_str(s),
        Value::Boolean(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Integer(n) => n.to_string(),
        Value::Float(n) => n.to_string(),
        other => format!("'{}'", other.to_json()),
    }
}

/// A literal as JSON-path text (document comparisons).
fn json_literal(v: &Value) -> String {
    match v {
        Value::String(s) => format!("\"{}\"", json_escape(s)),
        other => sql_literal(other),
    }
}
