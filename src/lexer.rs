use crate::ast::Token;
use crate::error::SyntaxError;

/// Hand-written character lexer for the MQL surface syntax.
///
/// `#` starts a comment running to the end of the line. Identifiers may
/// contain letters, digits, underscores, dots, and slashes, covering both
/// dotted metadata attribute names (`core.runs`) and dataset/file names.
/// Cloning a lexer snapshots its position, which is how the parser looks
/// one token ahead.
#[derive(Clone)]
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Character offset of the next unread character.
    pub fn position(&self) -> usize {
        self.position
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '#' {
                while let Some(c) = self.current_char() {
                    self.advance();
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' || ch == '.' || ch == '/' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_string(&mut self, quote: char) -> Result<String, SyntaxError> {
        let start = self.position;
        let mut result = String::new();
        self.advance(); // consume opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    self.advance();
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some(c) if c == quote => result.push(c),
                        Some('\\') => result.push('\\'),
                        Some(c) => {
                            return Err(SyntaxError::new(
                                format!("invalid escape sequence: \\{}", c),
                                self.position,
                            ));
                        }
                        None => {
                            return Err(SyntaxError::new(
                                "unterminated string: unexpected end of input after backslash",
                                self.position,
                            ));
                        }
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(SyntaxError::new(
            "unterminated string: missing closing quote",
            start,
        ))
    }

    fn read_number(&mut self) -> Result<Token, SyntaxError> {
        let start = self.position;
        let mut number = String::new();
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.'
                && !is_float
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if is_float {
            number
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| SyntaxError::new(format!("invalid float '{}'", number), start))
        } else {
            number
                .parse::<i64>()
                .map(Token::Integer)
                .map_err(|_| SyntaxError::new(format!("invalid integer '{}'", number), start))
        }
    }

    pub fn next_token(&mut self) -> Result<Token, SyntaxError> {
        self.skip_whitespace_and_comments();

        let token = match self.current_char() {
            None => Token::Eof,
            Some('(') => {
                self.advance();
                Token::LParen
            }
            Some(')') => {
                self.advance();
                Token::RParen
            }
            Some('[') => {
                self.advance();
                Token::LBracket
            }
            Some(']') => {
                self.advance();
                Token::RBracket
            }
            Some('{') => {
                self.advance();
                Token::LBrace
            }
            Some('}') => {
                self.advance();
                Token::RBrace
            }
            Some(',') => {
                self.advance();
                Token::Comma
            }
            Some(':') => {
                self.advance();
                Token::Colon
            }
            Some('-') => {
                self.advance();
                Token::Minus
            }
            Some('=') => {
                self.advance();
                if self.current_char() == Some('=') {
                    self.advance();
                }
                Token::Eq
            }
            Some('<') => {
                self.advance();
                if self.current_char() == Some('=') {
                    self.advance();
                    Token::LtEq
                } else {
                    Token::Lt
                }
            }
            Some('>') => {
                self.advance();
                if self.current_char() == Some('=') {
                    self.advance();
                    Token::GtEq
                } else {
                    Token::Gt
                }
            }
            Some('~') => {
                self.advance();
                if self.current_char() == Some('*') {
                    self.advance();
                    Token::MatchI
                } else {
                    Token::Match
                }
            }
            Some('!') => {
                self.advance();
                match self.current_char() {
                    Some('=') => {
                        self.advance();
                        Token::NotEq
                    }
                    Some('~') => {
                        self.advance();
                        if self.current_char() == Some('*') {
                            self.advance();
                            Token::NotMatchI
                        } else {
                            Token::NotMatch
                        }
                    }
                    _ => Token::Bang,
                }
            }
            Some('"') => Token::String(self.read_string('"')?),
            Some('\'') => Token::String(self.read_string('\'')?),
            Some(ch) if ch.is_ascii_digit() => self.read_number()?,
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();
                match ident.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "true" => Token::Boolean(true),
                    "false" => Token::Boolean(false),
                    "null" => Token::Null,
                    _ => Token::Identifier(ident),
                }
            }
            Some(ch) => {
                return Err(SyntaxError::new(
                    format!("unexpected character '{}'", ch),
                    self.position,
                ));
            }
        };

        Ok(token)
    }
}

#[test]
fn test_keywords() {
    let mut lexer = Lexer::new("and or true false null");
    assert_eq!(lexer.next_token().unwrap(), Token::And);
    assert_eq!(lexer.next_token().unwrap(), Token::Or);
    assert_eq!(lexer.next_token().unwrap(), Token::Boolean(true));
    assert_eq!(lexer.next_token().unwrap(), Token::Boolean(false));
    assert_eq!(lexer.next_token().unwrap(), Token::Null);
}

#[test]
fn test_operators() {
    let mut lexer = Lexer::new("< <= > >= = == != ~ ~* !~ !~* !");
    assert_eq!(lexer.next_token().unwrap(), Token::Lt);
    assert_eq!(lexer.next_token().unwrap(), Token::LtEq);
    assert_eq!(lexer.next_token().unwrap(), Token::Gt);
    assert_eq!(lexer.next_token().unwrap(), Token::GtEq);
    assert_eq!(lexer.next_token().unwrap(), Token::Eq);
    assert_eq!(lexer.next_token().unwrap(), Token::Eq);
    assert_eq!(lexer.next_token().unwrap(), Token::NotEq);
    assert_eq!(lexer.next_token().unwrap(), Token::Match);
    assert_eq!(lexer.next_token().unwrap(), Token::MatchI);
    assert_eq!(lexer.next_token().unwrap(), Token::NotMatch);
    assert_eq!(lexer.next_token().unwrap(), Token::NotMatchI);
    assert_eq!(lexer.next_token().unwrap(), Token::Bang);
}

#[test]
fn test_dotted_identifier() {
    let mut lexer = Lexer::new("core.runs[any] in 3100:3200 # trailing comment");
    assert_eq!(
        lexer.next_token().unwrap(),
        Token::Identifier("core.runs".to_string())
    );
    assert_eq!(lexer.next_token().unwrap(), Token::LBracket);
    assert_eq!(
        lexer.next_token().unwrap(),
        Token::Identifier("any".to_string())
    );
    assert_eq!(lexer.next_token().unwrap(), Token::RBracket);
    assert_eq!(
        lexer.next_token().unwrap(),
        Token::Identifier("in".to_string())
    );
    assert_eq!(lexer.next_token().unwrap(), Token::Integer(3100));
    assert_eq!(lexer.next_token().unwrap(), Token::Colon);
    assert_eq!(lexer.next_token().unwrap(), Token::Integer(3200));
    assert_eq!(lexer.next_token().unwrap(), Token::Eof);
}
