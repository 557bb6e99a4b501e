//! # MQL - Abstract Syntax Tree
//!
//! This module defines the abstract syntax tree for MQL, the metadata-catalog
//! query language: queries that select files or datasets by dataset
//! membership, metadata predicates, provenance traversal, set algebra, named
//! sub-queries, pluggable filters, and pagination.
//!
//! ## Architecture Overview
//!
//! The AST module is organized into focused submodules:
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[meta]** - Metadata expression trees (predicates over JSON documents)
//! - **[query]** - Query nodes (set algebra, provenance, pagination, filters)
//! - **[selectors]** - The leaf-level file/dataset selector value objects
//!
//! ## Core Concepts
//!
//! A query is a tree of [`query::QueryNode`]s whose leaves are
//! [`selectors::BasicFileQuery`] scans. Metadata predicates are
//! [`meta::MetaExpr`] trees; after normalization (see `dnf`) every predicate
//! is an OR of ANDs of leaves and stays that way through SQL compilation and
//! in-process evaluation.
//!
//! ```text
//! files from dune:raw where core.runs[any] in 3100:3200 and size > 1000
//! ```
//!
//! parses to a `BasicFileQuery` leaf carrying a dataset selector and a
//! two-leaf conjunction, which the optimizer then normalizes and pushes
//! toward the scan.
pub mod meta;
pub mod query;
pub mod selectors;
pub mod tokens;

pub use meta::{CmpOp, Index, KeywordParams, Lhs, Literal, MetaExpr, SECONDS_PER_DAY};
pub use query::{FileSpec, QueryAst, QueryNode};
pub use selectors::{BasicDatasetQuery, BasicFileQuery, DatasetPattern, merge_skip_limit};
pub use tokens::Token;
