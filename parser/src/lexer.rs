//! Lexer (tokenizer) for LOAM source text.

use loam_core::{ParseError, ParseResult, SourceId, SourceSpan};

/// Token types.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords (case-sensitive)
    Class,
    Enum,
    Association,
    Profile,
    Function,
    Import,
    Extends,
    True,
    False,

    // Literals
    Ident(String),
    Int(i64),
    Float(f64),
    String(String),
    /// Date literal in `%YYYY-MM-DD` form, kept textual.
    Date(String),

    // Symbols
    LParen,      // (
    RParen,      // )
    LBrace,      // {
    RBrace,      // }
    LBracket,    // [
    RBracket,    // ]
    Lt,          // <
    Gt,          // >
    StereoOpen,  // <<
    StereoClose, // >>
    Comma,       // ,
    Semi,        // ;
    Colon,       // :
    PathSep,     // ::
    Dot,         // .
    Range,       // ..
    Eq,          // =
    Star,        // *
    Pipe,        // |

    // End of file
    Eof,
}

impl TokenKind {
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Class => "Class",
            TokenKind::Enum => "Enum",
            TokenKind::Association => "Association",
            TokenKind::Profile => "Profile",
            TokenKind::Function => "function",
            TokenKind::Import => "import",
            TokenKind::Extends => "extends",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Ident(_) => "identifier",
            TokenKind::Int(_) => "integer",
            TokenKind::Float(_) => "float",
            TokenKind::String(_) => "string",
            TokenKind::Date(_) => "date",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Lt => "'<'",
            TokenKind::Gt => "'>'",
            TokenKind::StereoOpen => "'<<'",
            TokenKind::StereoClose => "'>>'",
            TokenKind::Comma => "','",
            TokenKind::Semi => "';'",
            TokenKind::Colon => "':'",
            TokenKind::PathSep => "'::'",
            TokenKind::Dot => "'.'",
            TokenKind::Range => "'..'",
            TokenKind::Eq => "'='",
            TokenKind::Star => "'*'",
            TokenKind::Pipe => "'|'",
            TokenKind::Eof => "end of input",
        }
    }
}

/// A token with its source span.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: SourceSpan,
}

/// Tokenize LOAM source text. Line and column numbers are 1-based; `//`
/// comments run to end of line.
pub fn tokenize(text: &str, source: &SourceId) -> ParseResult<Vec<Token>> {
    Lexer::new(text, source).run()
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    source: &'a SourceId,
}

impl<'a> Lexer<'a> {
    fn new(text: &str, source: &'a SourceId) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            source,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn point(&self) -> SourceSpan {
        SourceSpan::point(self.source.clone(), self.line, self.column)
    }

    fn span_from(&self, start_line: u32, start_column: u32) -> SourceSpan {
        SourceSpan::new(
            self.source.clone(),
            start_line,
            start_column,
            self.line,
            self.column.saturating_sub(1).max(start_column),
        )
    }

    fn run(mut self) -> ParseResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let (start_line, start_column) = (self.line, self.column);
            let c = match self.peek() {
                Some(c) => c,
                None => {
                    tokens.push(Token {
                        kind: TokenKind::Eof,
                        span: self.point(),
                    });
                    return Ok(tokens);
                }
            };

            let kind = if c.is_ascii_alphabetic() || c == '_' {
                self.read_word()
            } else if c.is_ascii_digit() {
                self.read_number()?
            } else if c == '\'' {
                self.read_string()?
            } else if c == '%' {
                self.read_date()
            } else {
                self.read_symbol()?
            };

            tokens.push(Token {
                kind,
                span: self.span_from(start_line, start_column),
            });
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn read_word(&mut self) -> TokenKind {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                word.push(c);
                self.advance();
            } else {
                break;
            }
        }
        match word.as_str() {
            "Class" => TokenKind::Class,
            "Enum" => TokenKind::Enum,
            "Association" => TokenKind::Association,
            "Profile" => TokenKind::Profile,
            "function" => TokenKind::Function,
            "import" => TokenKind::Import,
            "extends" => TokenKind::Extends,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => TokenKind::Ident(word),
        }
    }

    fn read_number(&mut self) -> ParseResult<TokenKind> {
        let mut number = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                number.push(c);
                self.advance();
            } else {
                break;
            }
        }
        // A '.' is only part of the number when followed by a digit; `1..2`
        // must stay three tokens.
        if self.peek() == Some('.') && self.peek_next().map_or(false, |c| c.is_ascii_digit()) {
            number.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    number.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
            let value = number
                .parse::<f64>()
                .map_err(|_| ParseError::new(format!("invalid number '{}'", number), self.point()))?;
            Ok(TokenKind::Float(value))
        } else {
            let value = number
                .parse::<i64>()
                .map_err(|_| ParseError::new(format!("invalid number '{}'", number), self.point()))?;
            Ok(TokenKind::Int(value))
        }
    }

    fn read_string(&mut self) -> ParseResult<TokenKind> {
        let open = self.point();
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.advance() {
                Some('\'') => return Ok(TokenKind::String(value)),
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(c) => value.push(c),
                    None => return Err(ParseError::unexpected_eof(open, "closing quote")),
                },
                Some(c) => value.push(c),
                None => return Err(ParseError::unexpected_eof(open, "closing quote")),
            }
        }
    }

    fn read_date(&mut self) -> TokenKind {
        self.advance(); // '%'
        let mut value = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '-' {
                value.push(c);
                self.advance();
            } else {
                break;
            }
        }
        TokenKind::Date(value)
    }

    fn read_symbol(&mut self) -> ParseResult<TokenKind> {
        let span = self.point();
        let c = self.advance().unwrap_or_default();
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semi,
            '=' => TokenKind::Eq,
            '*' => TokenKind::Star,
            '|' => TokenKind::Pipe,
            '<' => {
                if self.peek() == Some('<') {
                    self.advance();
                    TokenKind::StereoOpen
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.peek() == Some('>') {
                    self.advance();
                    TokenKind::StereoClose
                } else {
                    TokenKind::Gt
                }
            }
            ':' => {
                if self.peek() == Some(':') {
                    self.advance();
                    TokenKind::PathSep
                } else {
                    TokenKind::Colon
                }
            }
            '.' => {
                if self.peek() == Some('.') {
                    self.advance();
                    TokenKind::Range
                } else {
                    TokenKind::Dot
                }
            }
            other => {
                return Err(ParseError::new(
                    format!("unexpected character '{}'", other),
                    span,
                ))
            }
        };
        Ok(kind)
    }
}
