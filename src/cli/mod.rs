//! CLI support for mql-lang
//!
//! Provides programmatic access to the `mql` binary's functionality for
//! embedding in other tools.

use std::io;

use crate::ast::{BasicDatasetQuery, MetaExpr, QueryAst, QueryNode};
use crate::error::MqlError;
use crate::query::{FileQuery, QueryOptions};
use crate::sql::Compiled;

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// Query did not parse or compile
    Mql(MqlError),
    /// IO error
    Io(io::Error),
    /// No query provided
    NoInput,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Mql(e) => write!(f, "{}", e),
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::NoInput => {
                write!(f, "No query provided. Pass it as an argument or pipe it to stdin.")
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Mql(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MqlError> for CliError {
    fn from(e: MqlError) -> Self {
        CliError::Mql(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}

/// Parse a query and render its tree.
pub fn execute_parse(text: &str) -> Result<String, CliError> {
    let ast = crate::parser::parse(text)?;
    Ok(match ast {
        QueryAst::File(tree) => pretty_node(&tree, 0),
        QueryAst::Dataset(selector) => pretty_selector(&selector),
    })
}

/// Parse and optimize a file query, rendering the optimized tree.
pub fn execute_explain(text: &str, options: &QueryOptions) -> Result<String, CliError> {
    match crate::parser::parse(text)? {
        QueryAst::File(tree) => {
            let mut query = FileQuery::new(tree);
            let optimized = query.optimize(options)?;
            Ok(pretty_node(optimized, 0))
        }
        QueryAst::Dataset(selector) => Ok(pretty_selector(&selector)),
    }
}

/// Compile a query to SQL. A query involving pluggable filters does not
/// lower to a single statement; its residual plan is rendered instead.
pub fn execute_sql(text: &str, options: &QueryOptions) -> Result<String, CliError> {
    match crate::parser::parse(text)? {
        QueryAst::File(tree) => {
            let mut query = FileQuery::new(tree);
            let compiled = query.compile(options)?;
            Ok(match compiled.sql() {
                Some(sql) => sql.to_string(),
                None => format!("-- not fully SQL-representable\n{}", pretty_compiled(compiled, 0)),
            })
        }
        QueryAst::Dataset(_) => {
            let query = crate::query::DatasetQuery::parse(text)?;
            Ok(query.to_sql(options)?)
        }
    }
}

fn indent(level: usize) -> String {
    "  ".repeat(level)
}

fn pretty_node(node: &QueryNode, level: usize) -> String {
    let pad = indent(level);
    match node {
        QueryNode::Empty => format!("{}empty", pad),
        QueryNode::BasicFileQuery(q) => {
            let mut line = format!("{}basic_file_query", pad);
            if let Some(sel) = &q.selector {
                let patterns: Vec<String> = sel
                    .patterns
                    .iter()
                    .map(|p| {
                        format!(
                            "{}:{}{}",
                            p.namespace.as_deref().unwrap_or("?"),
                            p.name,
                            if p.regexp {
                                " (regexp)"
                            } else if p.wildcard {
                                " (pattern)"
                            } else {
                                ""
                            }
                        )
                    })
                    .collect();
                line.push_str(&format!(" from {}", patterns.join(", ")));
                if sel.with_children {
                    line.push_str(if sel.recursively {
                        " with children recursively"
                    } else {
                        " with children"
                    });
                }
            }
            if q.skip > 0 || q.limit.is_some() {
                line.push_str(&format!(" skip={} limit={:?}", q.skip, q.limit));
            }
            if q.ordered {
                line.push_str(" ordered");
            }
            if let Some(w) = &q.wheres {
                line.push_str(&format!("\n{}where {}", indent(level + 1), pretty_meta(w)));
            }
            line
        }
        QueryNode::FileList { specs, .. } => format!("{}file_list ({} files)", pad, specs.len()),
        QueryNode::Union(children) => {
            let body: Vec<String> =
                children.iter().map(|c| pretty_node(c, level + 1)).collect();
            format!("{}union\n{}", pad, body.join("\n"))
        }
        QueryNode::Join(children) => {
            let body: Vec<String> =
                children.iter().map(|c| pretty_node(c, level + 1)).collect();
            format!("{}join\n{}", pad, body.join("\n"))
        }
        QueryNode::Minus { left, right } => format!(
            "{}minus\n{}\n{}",
            pad,
            pretty_node(left, level + 1),
            pretty_node(right, level + 1)
        ),
        QueryNode::ParentsOf { child, .. } => {
            format!("{}parents_of\n{}", pad, pretty_node(child, level + 1))
        }
        QueryNode::ChildrenOf { child, .. } => {
            format!("{}children_of\n{}", pad, pretty_node(child, level + 1))
        }
        QueryNode::MetaFilter { child, expr, .. } => {
            let head = match expr {
                Some(e) => format!("{}meta_filter {}", pad, pretty_meta(e)),
                None => format!("{}meta_filter", pad),
            };
            format!("{}\n{}", head, pretty_node(child, level + 1))
        }
        QueryNode::SkipLimit { child, skip, limit } => format!(
            "{}skip_limit skip={} limit={:?}\n{}",
            pad,
            skip,
            limit,
            pretty_node(child, level + 1)
        ),
        QueryNode::Ordered(child) => {
            format!("{}ordered\n{}", pad, pretty_node(child, level + 1))
        }
        QueryNode::Filter { name, children, .. } => {
            let body: Vec<String> =
                children.iter().map(|c| pretty_node(c, level + 1)).collect();
            format!("{}filter {}\n{}", pad, name, body.join("\n"))
        }
        QueryNode::NamedQuery { namespace, name } => format!(
            "{}query {}:{}",
            pad,
            namespace.as_deref().unwrap_or("?"),
            name
        ),
    }
}

fn pretty_selector(selector: &BasicDatasetQuery) -> String {
    let mut out = String::from("datasets");
    for (i, p) in selector.patterns.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&format!(
            " {}:{}",
            p.namespace.as_deref().unwrap_or("?"),
            p.name
        ));
    }
    if selector.with_children {
        out.push_str(" with children");
        if selector.recursively {
            out.push_str(" recursively");
        }
    }
    if let Some(h) = &selector.having {
        out.push_str(&format!(" having {}", pretty_meta(h)));
    }
    out
}

fn pretty_meta(expr: &MetaExpr) -> String {
    match expr {
        MetaExpr::And(children) => {
            let parts: Vec<String> = children.iter().map(pretty_meta).collect();
            format!("({})", parts.join(" and "))
        }
        MetaExpr::Or(children) => {
            let parts: Vec<String> = children.iter().map(pretty_meta).collect();
            format!("({})", parts.join(" or "))
        }
        MetaExpr::Not(inner) => format!("!({})", pretty_meta(inner)),
        MetaExpr::Cmp { lhs, op, value } => {
            format!("{:?} {} {:?}", lhs, op.as_str(), value)
        }
        MetaExpr::InRange {
            lhs,
            low,
            high,
            negated,
        } => format!(
            "{:?} {}in {:?}:{:?}",
            lhs,
            if *negated { "not " } else { "" },
            low,
            high
        ),
        MetaExpr::InSet { lhs, set, negated } => format!(
            "{:?} {}in {:?}",
            lhs,
            if *negated { "not " } else { "" },
            set
        ),
        MetaExpr::Present { name } => format!("{} present", name),
        MetaExpr::NotPresent { name } => format!("{} not present", name),
    }
}

fn pretty_compiled(plan: &Compiled, level: usize) -> String {
    let pad = indent(level);
    match plan {
        Compiled::Empty => format!("{}empty", pad),
        Compiled::Sql(sql) => format!("{}sql:\n{}", pad, sql),
        Compiled::Union(children) => {
            let body: Vec<String> = children
                .iter()
                .map(|c| pretty_compiled(c, level + 1))
                .collect();
            format!("{}union\n{}", pad, body.join("\n"))
        }
        Compiled::Join(children) => {
            let body: Vec<String> = children
                .iter()
                .map(|c| pretty_compiled(c, level + 1))
                .collect();
            format!("{}join\n{}", pad, body.join("\n"))
        }
        Compiled::Minus { left, right } => format!(
            "{}minus\n{}\n{}",
            pad,
            pretty_compiled(left, level + 1),
            pretty_compiled(right, level + 1)
        ),
        Compiled::Parents { input, .. } => {
            format!("{}parents_of\n{}", pad, pretty_compiled(input, level + 1))
        }
        Compiled::Children { input, .. } => {
            format!("{}children_of\n{}", pad, pretty_compiled(input, level + 1))
        }
        Compiled::MetaFilter { input, expr } => {
            let head = match expr {
                Some(e) => format!("{}meta_filter {}", pad, pretty_meta(e)),
                None => format!("{}meta_filter", pad),
            };
            format!("{}\n{}", head, pretty_compiled(input, level + 1))
        }
        Compiled::SkipLimit { input, skip, limit } => format!(
            "{}skip_limit skip={} limit={:?}\n{}",
            pad,
            skip,
            limit,
            pretty_compiled(input, level + 1)
        ),
        Compiled::Ordered(input) => {
            format!("{}ordered\n{}", pad, pretty_compiled(input, level + 1))
        }
        Compiled::Filter { name, inputs, .. } => {
            let body: Vec<String> = inputs
                .iter()
                .map(|c| pretty_compiled(c, level + 1))
                .collect();
            format!("{}filter {}\n{}", pad, name, body.join("\n"))
        }
    }
}
