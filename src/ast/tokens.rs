#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    /// Floating-point number
    ///
    /// # Examples
    /// ```text
    /// 3.14
    /// 0.5
    /// ```
    Float(f64),

    /// Integer
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 1024
    /// ```
    Integer(i64),

    /// String literal enclosed in single or double quotes
    ///
    /// # Examples
    /// ```text
    /// "raw"
    /// 'run #1'
    /// ```
    String(String),

    /// Boolean values (`true` / `false`)
    Boolean(bool),

    /// Null value
    Null,

    /// Attribute, dataset, or keyword word.
    ///
    /// Starts with a letter or underscore; may contain letters, digits,
    /// underscores, dots, and slashes. Most MQL keywords (`files`, `from`,
    /// `where`, `in`, `present`, ...) are contextual and arrive as
    /// identifiers; the parser matches on their spelling.
    Identifier(String),

    // Keywords with fixed meaning everywhere
    /// Boolean conjunction `and`
    And,
    /// Boolean disjunction `or`
    Or,

    // Comparison operators
    Lt,
    LtEq,
    Gt,
    GtEq,
    /// `=` or `==`, both accepted
    Eq,
    NotEq,
    /// Regular-expression match `~`
    Match,
    /// Case-insensitive match `~*`
    MatchI,
    /// Negated match `!~`
    NotMatch,
    /// Negated case-insensitive match `!~*`
    NotMatchI,

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    /// Set difference between file queries; also negates numeric literals
    Minus,
    /// Prefix boolean negation `!`
    Bang,

    Eof,
}

impl Token {
    /// The identifier text, if this token is one.
    pub fn word(&self) -> Option<&str> {
        match self {
            Token::Identifier(w) => Some(w),
            _ => None,
        }
    }
}
