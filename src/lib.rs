pub mod ast;
#[cfg(feature = "cli")]
pub mod cli;
pub mod dnf;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod lexer;
pub mod optimizer;
pub mod output;
pub mod parser;
pub mod query;
pub mod sql;
pub mod value;

pub use ast::{
    BasicDatasetQuery, BasicFileQuery, CmpOp, DatasetPattern, Lhs, Literal, MetaExpr, QueryAst,
    QueryNode, Token,
};
pub use error::{CompileError, ExecError, MqlError, SyntaxError};
pub use evaluator::{EvalError, MetaEvaluator};
pub use executor::{
    DataSource, DatasetRecord, Executor, FileFilter, FileRecord, FileStream, FilterOptions,
    FilterRegistry, Relationship,
};
pub use lexer::Lexer;
pub use parser::Parser;
pub use query::{DatasetQuery, FileQuery, MqlQuery, NoQueries, QueryOptions, QueryStore};
pub use sql::{Compiled, SqlCompiler};
pub use value::{Metadata, Value};
