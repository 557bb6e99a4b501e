use std::mem;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::ast::{
    BasicDatasetQuery, BasicFileQuery, CmpOp, DatasetPattern, FileSpec, Index, KeywordParams,
    Lhs, Literal, MetaExpr, QueryAst, QueryNode, Token,
};
use crate::error::{CompileError, MqlError, SyntaxError};
use crate::lexer::Lexer;

/// Column-backed attributes usable in file query predicates.
pub const FILE_ATTRIBUTES: &[&str] = &["creator", "created_timestamp", "name", "namespace", "size"];

/// Column-backed attributes usable in dataset `having` predicates.
pub const DATASET_ATTRIBUTES: &[&str] = &[
    "creator",
    "created_timestamp",
    "name",
    "namespace",
    "frozen",
    "monotonic",
];

/// Recursive-descent parser for MQL query text.
///
/// Produces the AST contract consumed by the rest of the pipeline; any other
/// parsing technology yielding the same [`QueryAst`] shape would do. Most
/// keywords are contextual: the lexer hands them over as identifiers and the
/// parser matches on their spelling, so `files`, `limit`, `children` etc.
/// remain usable as attribute or dataset names.
pub struct Parser {
    lexer: Lexer,
    current_token: Token,
}

/// Parse a complete MQL query.
pub fn parse(text: &str) -> Result<QueryAst, MqlError> {
    let mut parser = Parser::new(Lexer::new(text))?;
    parser.parse_query()
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> Result<Self, SyntaxError> {
        let current_token = lexer.next_token()?;
        Ok(Parser {
            lexer,
            current_token,
        })
    }

    fn advance(&mut self) -> Result<Token, MqlError> {
        let next = self.lexer.next_token().map_err(MqlError::Syntax)?;
        Ok(mem::replace(&mut self.current_token, next))
    }

    fn position(&self) -> usize {
        self.lexer.position()
    }

    fn error(&self, message: impl Into<String>) -> MqlError {
        MqlError::Syntax(SyntaxError::new(message, self.position()))
    }

    fn expect(&mut self, expected: Token) -> Result<(), MqlError> {
        if mem::discriminant(&self.current_token) != mem::discriminant(&expected) {
            return Err(self.error(format!(
                "expected {:?}, got {:?}",
                expected, self.current_token
            )));
        }
        self.advance()?;
        Ok(())
    }

    /// The token after the current one, without consuming anything.
    fn peek_token(&self) -> Result<Token, MqlError> {
        let mut lookahead = self.lexer.clone();
        lookahead.next_token().map_err(MqlError::Syntax)
    }

    /// Whether a comma in a dataset-spec or file-spec list continues that
    /// list, as opposed to separating file queries in a surrounding
    /// `union(...)` / `join(...)`. The next list element must not look like
    /// the start of a file query.
    fn comma_continues_specs(&self) -> Result<bool, MqlError> {
        const QUERY_START: &[&str] = &[
            "files", "file", "fids", "fid", "union", "join", "parents", "children", "filter",
            "query",
        ];
        if self.current_token != Token::Comma {
            return Ok(false);
        }
        Ok(match self.peek_token()? {
            Token::Identifier(word) => !QUERY_START.contains(&word.as_str()),
            Token::String(_) => true,
            _ => false,
        })
    }

    /// Consume the current token if it is the given contextual keyword.
    fn take_word(&mut self, word: &str) -> Result<bool, MqlError> {
        if self.current_token.word() == Some(word) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn at_word(&self, word: &str) -> bool {
        self.current_token.word() == Some(word)
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String, MqlError> {
        match self.advance()? {
            Token::Identifier(name) => Ok(name),
            other => Err(self.error(format!("expected {}, got {:?}", what, other))),
        }
    }

    /// Parse a full query; the whole input must be consumed.
    pub fn parse_query(&mut self) -> Result<QueryAst, MqlError> {
        let ast = if self.take_word("datasets")? {
            QueryAst::Dataset(self.parse_dataset_selector()?)
        } else {
            QueryAst::File(self.parse_file_query()?)
        };
        if self.current_token != Token::Eof {
            return Err(self.error(format!(
                "unexpected trailing input: {:?}",
                self.current_token
            )));
        }
        Ok(ast)
    }

    /// File queries at the top precedence level: `q - q - ...`.
    fn parse_file_query(&mut self) -> Result<QueryNode, MqlError> {
        let mut left = self.parse_postfix()?;
        while self.current_token == Token::Minus {
            self.advance()?;
            let right = self.parse_postfix()?;
            left = QueryNode::Minus {
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// `where`, `skip`, `limit`, and `ordered` apply postfix to a query.
    fn parse_postfix(&mut self) -> Result<QueryNode, MqlError> {
        let mut node = self.parse_primary()?;
        loop {
            if self.at_word("where") {
                self.advance()?;
                let expr = self.parse_meta_expr(FILE_ATTRIBUTES)?;
                node = QueryNode::MetaFilter {
                    child: Box::new(node),
                    expr: Some(expr),
                    with_meta: false,
                    with_provenance: false,
                };
            } else if self.at_word("skip") {
                self.advance()?;
                let n = self.parse_unsigned("skip count")?;
                node = node.paginate(n, None);
            } else if self.at_word("limit") {
                self.advance()?;
                let n = self.parse_unsigned("limit count")?;
                node = QueryNode::SkipLimit {
                    child: Box::new(node),
                    skip: 0,
                    limit: Some(n),
                };
            } else if self.at_word("ordered") {
                self.advance()?;
                node = QueryNode::Ordered(Box::new(node));
            } else {
                break;
            }
        }
        Ok(node)
    }

    fn parse_unsigned(&mut self, what: &str) -> Result<usize, MqlError> {
        match self.advance()? {
            Token::Integer(n) if n >= 0 => Ok(n as usize),
            other => Err(self.error(format!("expected non-negative {}, got {:?}", what, other))),
        }
    }

    fn parse_primary(&mut self) -> Result<QueryNode, MqlError> {
        match &self.current_token {
            Token::LParen => {
                self.advance()?;
                let q = self.parse_file_query()?;
                self.expect(Token::RParen)?;
                Ok(q)
            }
            Token::LBracket => {
                self.advance()?;
                let list = self.parse_query_list(Token::RBracket)?;
                Ok(QueryNode::Union(list))
            }
            Token::LBrace => {
                self.advance()?;
                let list = self.parse_query_list(Token::RBrace)?;
                Ok(QueryNode::Join(list))
            }
            Token::Identifier(word) => match word.as_str() {
                "files" | "file" => self.parse_files_term(),
                "fids" | "fid" => self.parse_fid_list(),
                "union" => {
                    self.advance()?;
                    self.expect(Token::LParen)?;
                    let list = self.parse_query_list(Token::RParen)?;
                    Ok(QueryNode::Union(list))
                }
                "join" => {
                    self.advance()?;
                    self.expect(Token::LParen)?;
                    let list = self.parse_query_list(Token::RParen)?;
                    Ok(QueryNode::Join(list))
                }
                "parents" => {
                    self.advance()?;
                    self.expect(Token::LParen)?;
                    let q = self.parse_file_query()?;
                    self.expect(Token::RParen)?;
                    Ok(QueryNode::ParentsOf {
                        child: Box::new(q),
                        with_meta: false,
                        with_provenance: false,
                    })
                }
                "children" => {
                    self.advance()?;
                    self.expect(Token::LParen)?;
                    let q = self.parse_file_query()?;
                    self.expect(Token::RParen)?;
                    Ok(QueryNode::ChildrenOf {
                        child: Box::new(q),
                        with_meta: false,
                        with_provenance: false,
                    })
                }
                "filter" => self.parse_filter(),
                "query" => {
                    self.advance()?;
                    let (namespace, name) = self.parse_qualified_name()?;
                    Ok(QueryNode::NamedQuery { namespace, name })
                }
                other => Err(self.error(format!("unexpected '{}' at start of a query", other))),
            },
            other => Err(self.error(format!("unexpected {:?} at start of a query", other))),
        }
    }

    /// `files from <selector>`, bare `files` (all files), or an explicit
    /// `files ns:a, ns:b` list.
    fn parse_files_term(&mut self) -> Result<QueryNode, MqlError> {
        self.advance()?; // "files"
        if self.take_word("from")? {
            // tolerated: "files from datasets <selector>"
            let _ = self.take_word("datasets")?;
            let selector = self.parse_dataset_selector()?;
            return Ok(QueryNode::BasicFileQuery(BasicFileQuery::new(Some(
                selector,
            ))));
        }
        // An identifier after `files` starts an explicit file list, unless
        // it is one of the postfix keywords.
        const POSTFIX: &[&str] = &["where", "skip", "limit", "ordered"];
        let starts_list = match self.current_token.word() {
            Some(word) => !POSTFIX.contains(&word),
            None => false,
        };
        if starts_list {
            let mut specs = Vec::new();
            loop {
                let (namespace, name) = self.parse_qualified_name()?;
                let namespace = namespace.ok_or_else(|| {
                    self.error(format!("file spec '{}' is missing a namespace", name))
                })?;
                specs.push(FileSpec::Did { namespace, name });
                if !self.comma_continues_specs()? {
                    break;
                }
                self.advance()?;
            }
            return Ok(QueryNode::FileList {
                specs,
                with_meta: false,
                with_provenance: false,
                skip: 0,
                limit: None,
            });
        }
        Ok(QueryNode::BasicFileQuery(BasicFileQuery::new(None)))
    }

    fn parse_fid_list(&mut self) -> Result<QueryNode, MqlError> {
        self.advance()?; // "fids"
        let mut specs = Vec::new();
        loop {
            let fid = match self.advance()? {
                Token::Identifier(s) => s,
                Token::String(s) => s,
                Token::Integer(n) => n.to_string(),
                other => return Err(self.error(format!("expected file id, got {:?}", other))),
            };
            specs.push(FileSpec::Fid(fid));
            if !self.comma_continues_specs()? {
                break;
            }
            self.advance()?;
        }
        Ok(QueryNode::FileList {
            specs,
            with_meta: false,
            with_provenance: false,
            skip: 0,
            limit: None,
        })
    }

    fn parse_query_list(&mut self, closing: Token) -> Result<Vec<QueryNode>, MqlError> {
        let mut out = vec![self.parse_file_query()?];
        while self.current_token == Token::Comma {
            self.advance()?;
            out.push(self.parse_file_query()?);
        }
        self.expect(closing)?;
        Ok(out)
    }

    /// `filter name(p1, p2, k=v)(q1, q2, ...)`
    fn parse_filter(&mut self) -> Result<QueryNode, MqlError> {
        self.advance()?; // "filter"
        let name = self.expect_identifier("filter name")?;
        self.expect(Token::LParen)?;
        let (params, kv) = self.parse_filter_params()?;
        self.expect(Token::LParen)?;
        let children = self.parse_query_list(Token::RParen)?;
        Ok(QueryNode::Filter {
            name,
            params,
            kv,
            children,
            skip: 0,
            limit: None,
            ordered: false,
            with_meta: false,
        })
    }

    fn parse_filter_params(&mut self) -> Result<(Vec<Literal>, KeywordParams), MqlError> {
        let mut params = Vec::new();
        let mut kv = KeywordParams::new();
        loop {
            if self.current_token == Token::RParen {
                self.advance()?;
                return Ok((params, kv));
            }
            match self.current_token.clone() {
                Token::Identifier(word) => {
                    self.advance()?;
                    if self.current_token == Token::Eq {
                        self.advance()?;
                        let value = self.parse_constant()?;
                        kv.insert(word, value);
                    } else if word == "date" || word == "datetime" {
                        params.push(self.parse_date_constant(&word)?);
                    } else {
                        // bare word: an unquoted string parameter
                        params.push(Literal::Str(word));
                    }
                }
                _ => params.push(self.parse_constant()?),
            }
            if self.current_token == Token::Comma {
                self.advance()?;
            }
        }
    }

    fn parse_qualified_name(&mut self) -> Result<(Option<String>, String), MqlError> {
        let first = self.expect_identifier("name")?;
        if self.current_token == Token::Colon {
            self.advance()?;
            let name = self.expect_identifier("name after ':'")?;
            Ok((Some(first), name))
        } else {
            Ok((None, first))
        }
    }

    // ------------------------------------------------------------------
    // Dataset selectors
    // ------------------------------------------------------------------

    fn parse_dataset_selector(&mut self) -> Result<BasicDatasetQuery, MqlError> {
        let mut patterns = vec![self.parse_dataset_spec()?];
        while self.comma_continues_specs()? {
            self.advance()?;
            patterns.push(self.parse_dataset_spec()?);
        }

        let mut selector = BasicDatasetQuery::new(patterns);
        if self.at_word("with") {
            self.advance()?;
            if !self.take_word("children")? {
                return Err(self.error("expected 'children' after 'with'"));
            }
            selector.with_children = true;
            selector.recursively = self.take_word("recursively")?;
        }
        if self.take_word("having")? {
            selector.having = Some(self.parse_meta_expr(DATASET_ATTRIBUTES)?);
        }
        Ok(selector)
    }

    fn parse_dataset_spec(&mut self) -> Result<DatasetPattern, MqlError> {
        if self.take_word("matching")? {
            let regexp = self.take_word("regexp")?;
            let (namespace, raw) = self.parse_pattern_name()?;
            let name = if regexp {
                raw
            } else {
                // SQL-style wildcards: * and ? become % and _
                raw.replace('*', "%").replace('?', "_")
            };
            Ok(DatasetPattern {
                namespace,
                name,
                wildcard: true,
                regexp,
            })
        } else {
            let (namespace, name) = self.parse_qualified_name()?;
            Ok(DatasetPattern::exact(namespace, name))
        }
    }

    /// `[ns:]"pattern"` or `[ns:]word`.
    fn parse_pattern_name(&mut self) -> Result<(Option<String>, String), MqlError> {
        let first = match self.advance()? {
            Token::Identifier(s) => s,
            Token::String(s) => return Ok((None, s)),
            other => return Err(self.error(format!("expected dataset pattern, got {:?}", other))),
        };
        if self.current_token == Token::Colon {
            self.advance()?;
            let name = match self.advance()? {
                Token::Identifier(s) => s,
                Token::String(s) => s,
                other => {
                    return Err(
                        self.error(format!("expected dataset pattern after ':', got {:?}", other))
                    );
                }
            };
            Ok((Some(first), name))
        } else {
            Ok((None, first))
        }
    }

    // ------------------------------------------------------------------
    // Metadata expressions
    // ------------------------------------------------------------------

    /// `or` of `and` of terms; `attributes` names the column-backed
    /// attributes valid in this context (file vs dataset predicates).
    fn parse_meta_expr(&mut self, attributes: &[&str]) -> Result<MetaExpr, MqlError> {
        let mut terms = vec![self.parse_meta_and(attributes)?];
        while self.current_token == Token::Or {
            self.advance()?;
            terms.push(self.parse_meta_and(attributes)?);
        }
        Ok(if terms.len() == 1 {
            terms.into_iter().next().unwrap_or(MetaExpr::And(vec![]))
        } else {
            MetaExpr::Or(terms)
        })
    }

    fn parse_meta_and(&mut self, attributes: &[&str]) -> Result<MetaExpr, MqlError> {
        let mut terms = vec![self.parse_meta_term(attributes)?];
        while self.current_token == Token::And {
            self.advance()?;
            terms.push(self.parse_meta_term(attributes)?);
        }
        Ok(if terms.len() == 1 {
            terms.into_iter().next().unwrap_or(MetaExpr::And(vec![]))
        } else {
            MetaExpr::And(terms)
        })
    }

    fn parse_meta_term(&mut self, attributes: &[&str]) -> Result<MetaExpr, MqlError> {
        match &self.current_token {
            Token::Bang => {
                self.advance()?;
                // Negation is eliminated right away: De Morgan and operator
                // complements push it into the leaves.
                Ok(self.parse_meta_term(attributes)?.negated())
            }
            Token::LParen => {
                self.advance()?;
                let expr = self.parse_meta_expr(attributes)?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Token::Integer(_)
            | Token::Float(_)
            | Token::String(_)
            | Token::Boolean(_)
            | Token::Minus => {
                // `const in attr` / `const not in attr`: containment sugar
                // over any-element equality.
                let value = self.parse_constant()?;
                let negated = if self.take_word("not")? {
                    if !self.take_word("in")? {
                        return Err(self.error("expected 'in' after 'not'"));
                    }
                    true
                } else if self.take_word("in")? {
                    false
                } else {
                    return Err(self.error("expected 'in' after constant"));
                };
                let name = self.expect_identifier("attribute name")?;
                let op = if negated { CmpOp::Ne } else { CmpOp::Eq };
                Ok(MetaExpr::Cmp {
                    lhs: Lhs::ArrayAny(name),
                    op,
                    value,
                })
            }
            Token::Identifier(_) => {
                let lhs = self.parse_lhs(attributes)?;
                self.parse_meta_leaf(lhs)
            }
            other => Err(self.error(format!(
                "unexpected {:?} in a metadata expression",
                other
            ))),
        }
    }

    fn parse_lhs(&mut self, attributes: &[&str]) -> Result<Lhs, MqlError> {
        let name = self.expect_identifier("attribute name")?;

        if name == "len" && self.current_token == Token::LParen {
            self.advance()?;
            let inner = self.expect_identifier("attribute name in len()")?;
            self.expect(Token::RParen)?;
            return Ok(Lhs::ArrayLength(inner));
        }

        if self.current_token == Token::LBracket {
            self.advance()?;
            let lhs = match self.advance()? {
                Token::Identifier(w) if w == "any" => Lhs::ArrayAny(name),
                Token::Integer(i) => Lhs::Subscript {
                    name,
                    index: Index::Position(i),
                },
                Token::Minus => match self.advance()? {
                    Token::Integer(i) => Lhs::Subscript {
                        name,
                        index: Index::Position(-i),
                    },
                    other => {
                        return Err(self.error(format!("expected subscript, got -{:?}", other)));
                    }
                },
                Token::String(key) => Lhs::Subscript {
                    name,
                    index: Index::Key(key),
                },
                other => return Err(self.error(format!("invalid subscript {:?}", other))),
            };
            self.expect(Token::RBracket)?;
            return Ok(lhs);
        }

        // A bare single-word name is column-backed when it names a known
        // column; everything else addresses the metadata document.
        if !name.contains('.') && attributes.contains(&name.as_str()) {
            Ok(Lhs::ObjectAttribute(name))
        } else {
            Ok(Lhs::Scalar(name))
        }
    }

    fn parse_meta_leaf(&mut self, lhs: Lhs) -> Result<MetaExpr, MqlError> {
        if let Some(op) = self.current_cmp_op() {
            self.advance()?;
            let value = self.parse_constant()?;
            return Ok(MetaExpr::Cmp { lhs, op, value });
        }

        if self.at_word("present") {
            self.advance()?;
            return Ok(MetaExpr::Present {
                name: lhs.name().to_string(),
            });
        }

        if self.at_word("not") {
            self.advance()?;
            if self.take_word("present")? {
                return Ok(MetaExpr::NotPresent {
                    name: lhs.name().to_string(),
                });
            }
            if self.take_word("in")? {
                return self.parse_range_or_set(lhs, true);
            }
            return Err(self.error("expected 'present' or 'in' after 'not'"));
        }

        if self.take_word("in")? {
            return self.parse_range_or_set(lhs, false);
        }

        Err(self.error(format!(
            "expected a comparison after attribute, got {:?}",
            self.current_token
        )))
    }

    fn current_cmp_op(&self) -> Option<CmpOp> {
        match self.current_token {
            Token::Lt => Some(CmpOp::Lt),
            Token::LtEq => Some(CmpOp::Le),
            Token::Gt => Some(CmpOp::Gt),
            Token::GtEq => Some(CmpOp::Ge),
            Token::Eq => Some(CmpOp::Eq),
            Token::NotEq => Some(CmpOp::Ne),
            Token::Match => Some(CmpOp::Match),
            Token::MatchI => Some(CmpOp::MatchI),
            Token::NotMatch => Some(CmpOp::NotMatch),
            Token::NotMatchI => Some(CmpOp::NotMatchI),
            _ => None,
        }
    }

    fn parse_range_or_set(&mut self, lhs: Lhs, negated: bool) -> Result<MetaExpr, MqlError> {
        if self.current_token == Token::LParen {
            self.advance()?;
            let mut set = vec![self.parse_constant()?];
            while self.current_token == Token::Comma {
                self.advance()?;
                set.push(self.parse_constant()?);
            }
            self.expect(Token::RParen)?;
            return Ok(MetaExpr::InSet { lhs, set, negated });
        }

        let low = self.parse_constant()?;
        self.expect(Token::Colon)?;
        let high = self.parse_constant()?;
        if low.kind() != high.kind() {
            return Err(MqlError::Compile(CompileError::RangeTypeMismatch {
                low: low.kind().to_string(),
                high: high.kind().to_string(),
            }));
        }
        Ok(MetaExpr::InRange {
            lhs,
            low,
            high,
            negated,
        })
    }

    // ------------------------------------------------------------------
    // Constants
    // ------------------------------------------------------------------

    fn parse_constant(&mut self) -> Result<Literal, MqlError> {
        match self.advance()? {
            Token::Integer(n) => Ok(Literal::Int(n)),
            Token::Float(n) => Ok(Literal::Float(n)),
            Token::String(s) => Ok(Literal::Str(s)),
            Token::Boolean(b) => Ok(Literal::Bool(b)),
            Token::Null => Ok(Literal::Null),
            Token::Minus => match self.advance()? {
                Token::Integer(n) => Ok(Literal::Int(-n)),
                Token::Float(n) => Ok(Literal::Float(-n)),
                other => Err(self.error(format!("expected number after '-', got {:?}", other))),
            },
            Token::Identifier(word) if word == "date" || word == "datetime" => {
                self.parse_date_constant(&word)
            }
            // bare word: an unquoted string constant
            Token::Identifier(word) => Ok(Literal::Str(word)),
            other => Err(self.error(format!("expected a constant, got {:?}", other))),
        }
    }

    /// `date("YYYY-MM-DD")` / `datetime("YYYY-MM-DD HH:MM:SS")`, both
    /// becoming epoch seconds (UTC).
    fn parse_date_constant(&mut self, kind: &str) -> Result<Literal, MqlError> {
        self.expect(Token::LParen)?;
        let text = match self.advance()? {
            Token::String(s) => s,
            Token::Identifier(s) => s,
            other => return Err(self.error(format!("expected date string, got {:?}", other))),
        };
        self.expect(Token::RParen)?;

        if kind == "date" {
            let day = NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .map_err(|e| self.error(format!("bad date '{}': {}", text, e)))?;
            let t = day.and_time(NaiveTime::MIN).and_utc().timestamp();
            Ok(Literal::Date(t as f64))
        } else {
            let parsed = NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S"))
                .or_else(|_| NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M"))
                .map_err(|e| self.error(format!("bad datetime '{}': {}", text, e)))?;
            Ok(Literal::DateTime(parsed.and_utc().timestamp() as f64))
        }
    }
}
