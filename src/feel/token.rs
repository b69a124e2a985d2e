//! FEEL tokenizer
//!
//! Lexes a FEEL source string into a flat token stream. Every token carries
//! its absolute byte position plus 1-based line and column. Errors are
//! recoverable: an unterminated string closes at end of input and lexing
//! continues.

use super::error::{FeelError, FeelErrorKind};

/// Token kind with payload for literal-bearing kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
    Identifier(String),
    /// Operator or punctuation spelled as written (`+`, `**`, `!=`, ...)
    Operator(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Colon,
    /// The `..` range separator
    Range,
    Eof,
}

/// A lexed token with source location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Absolute character offset of the token start
    pub position: usize,
    /// 1-based source line
    pub line: u32,
    /// 1-based source column
    pub column: u32,
}

impl Token {
    fn new(kind: TokenKind, position: usize, line: u32, column: u32) -> Self {
        Self {
            kind,
            position,
            line,
            column,
        }
    }
}

/// Tokenize a FEEL source string.
///
/// Always produces a token list terminated by [`TokenKind::Eof`]; lexical
/// problems are collected rather than aborting the scan.
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<FeelError>) {
    Tokenizer::new(source).run()
}

struct Tokenizer {
    chars: Vec<char>,
    index: usize,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
    errors: Vec<FeelError>,
}

impl Tokenizer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            index: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn run(mut self) -> (Vec<Token>, Vec<FeelError>) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                self.advance();
                self.line += 1;
                self.column = 1;
                continue;
            }
            if c.is_whitespace() {
                self.advance();
                continue;
            }
            let start = (self.index, self.line, self.column);
            match c {
                '0'..='9' => self.lex_number(start, false),
                '"' => self.lex_string(start),
                '(' => self.push_single(TokenKind::LParen, start),
                ')' => self.push_single(TokenKind::RParen, start),
                '[' => self.push_single(TokenKind::LBracket, start),
                ']' => self.push_single(TokenKind::RBracket, start),
                '{' => self.push_single(TokenKind::LBrace, start),
                '}' => self.push_single(TokenKind::RBrace, start),
                ',' => self.push_single(TokenKind::Comma, start),
                ':' => self.push_single(TokenKind::Colon, start),
                '.' => {
                    if self.peek_at(1) == Some('.') {
                        self.advance();
                        self.advance();
                        self.push(TokenKind::Range, start);
                    } else if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                        // .5 style fraction
                        self.lex_number(start, false);
                    } else {
                        self.push_single(TokenKind::Dot, start);
                    }
                }
                '-' => {
                    // A sign binds to the digits only when it starts a value
                    // position, so `3-2` still lexes as three tokens.
                    if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) && self.at_value_start()
                    {
                        self.lex_number(start, true);
                    } else {
                        self.push_single(TokenKind::Operator("-".to_string()), start);
                    }
                }
                '+' | '/' | '%' => {
                    let op = c.to_string();
                    self.advance();
                    self.push(TokenKind::Operator(op), start);
                }
                '*' => {
                    self.advance();
                    if self.peek() == Some('*') {
                        self.advance();
                        self.push(TokenKind::Operator("**".to_string()), start);
                    } else {
                        self.push(TokenKind::Operator("*".to_string()), start);
                    }
                }
                '=' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        self.push(TokenKind::Operator("==".to_string()), start);
                    } else {
                        self.push(TokenKind::Operator("=".to_string()), start);
                    }
                }
                '!' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        self.push(TokenKind::Operator("!=".to_string()), start);
                    } else {
                        self.errors.push(FeelError::at(
                            FeelErrorKind::SyntaxError,
                            "unexpected character '!'",
                            start.1,
                            start.2,
                        ));
                    }
                }
                '<' | '>' => {
                    self.advance();
                    let op = if self.peek() == Some('=') {
                        self.advance();
                        format!("{}=", c)
                    } else {
                        c.to_string()
                    };
                    self.push(TokenKind::Operator(op), start);
                }
                c if c.is_alphabetic() || c == '_' || c == '?' => self.lex_identifier(start),
                other => {
                    self.advance();
                    self.errors.push(FeelError::at(
                        FeelErrorKind::SyntaxError,
                        format!("unexpected character '{}'", other),
                        start.1,
                        start.2,
                    ));
                }
            }
        }
        self.tokens
            .push(Token::new(TokenKind::Eof, self.chars.len(), self.line, self.column));
        (self.tokens, self.errors)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn advance(&mut self) {
        self.index += 1;
        self.column += 1;
    }

    fn push(&mut self, kind: TokenKind, start: (usize, u32, u32)) {
        self.tokens.push(Token::new(kind, start.0, start.1, start.2));
    }

    fn push_single(&mut self, kind: TokenKind, start: (usize, u32, u32)) {
        self.advance();
        self.push(kind, start);
    }

    /// True when the previous token cannot end a value, so a `-` here is a
    /// numeric sign rather than subtraction
    fn at_value_start(&self) -> bool {
        match self.tokens.last().map(|t| &t.kind) {
            None => true,
            Some(TokenKind::Operator(_))
            | Some(TokenKind::LParen)
            | Some(TokenKind::LBracket)
            | Some(TokenKind::LBrace)
            | Some(TokenKind::Comma)
            | Some(TokenKind::Colon)
            | Some(TokenKind::Range) => true,
            Some(TokenKind::Identifier(name)) => matches!(
                name.as_str(),
                "and" | "or" | "not" | "in" | "between" | "return" | "then" | "else" | "satisfies"
            ),
            _ => false,
        }
    }

    fn lex_number(&mut self, start: (usize, u32, u32), signed: bool) {
        let begin = self.index;
        if signed {
            self.advance();
        }
        let mut seen_dot = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && !seen_dot && self.peek_at(1).is_some_and(|c| c.is_ascii_digit())
            {
                // Stop before `..` so ranges like 1..10 lex correctly
                seen_dot = true;
                self.advance();
            } else {
                break;
            }
        }
        let text: String = self.chars[begin..self.index].iter().collect();
        match text.parse::<f64>() {
            Ok(n) => self.push(TokenKind::Number(n), start),
            Err(_) => {
                self.errors.push(FeelError::at(
                    FeelErrorKind::SyntaxError,
                    format!("invalid number literal '{}'", text),
                    start.1,
                    start.2,
                ));
                self.push(TokenKind::Number(0.0), start);
            }
        }
    }

    fn lex_string(&mut self, start: (usize, u32, u32)) {
        self.advance(); // opening quote
        let mut value = String::new();
        let mut terminated = false;
        while let Some(c) = self.peek() {
            match c {
                '"' => {
                    self.advance();
                    terminated = true;
                    break;
                }
                '\\' => {
                    self.advance();
                    match self.peek() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some('\\') => value.push('\\'),
                        Some('"') => value.push('"'),
                        Some(other) => {
                            value.push('\\');
                            value.push(other);
                        }
                        None => break,
                    }
                    self.advance();
                }
                '\n' => {
                    value.push(c);
                    self.advance();
                    self.line += 1;
                    self.column = 1;
                }
                _ => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        if !terminated {
            self.errors.push(FeelError::at(
                FeelErrorKind::SyntaxError,
                "unterminated string literal",
                start.1,
                start.2,
            ));
        }
        self.push(TokenKind::String(value), start);
    }

    fn lex_identifier(&mut self, start: (usize, u32, u32)) {
        let begin = self.index;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '?' {
                self.advance();
            } else {
                break;
            }
        }
        let text: String = self.chars[begin..self.index].iter().collect();
        let kind = match text.as_str() {
            "true" => TokenKind::Boolean(true),
            "false" => TokenKind::Boolean(false),
            "null" => TokenKind::Null,
            _ => TokenKind::Identifier(text),
        };
        self.push(kind, start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, errors) = tokenize(source);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            kinds("age >= 18"),
            vec![
                TokenKind::Identifier("age".into()),
                TokenKind::Operator(">=".into()),
                TokenKind::Number(18.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_negative_number_binds_at_value_start() {
        assert_eq!(
            kinds("-5"),
            vec![TokenKind::Number(-5.0), TokenKind::Eof]
        );
        // Subtraction keeps three tokens
        assert_eq!(
            kinds("3-2"),
            vec![
                TokenKind::Number(3.0),
                TokenKind::Operator("-".into()),
                TokenKind::Number(2.0),
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("a - 2"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Operator("-".into()),
                TokenKind::Number(2.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_range_separator() {
        assert_eq!(
            kinds("[1..10]"),
            vec![
                TokenKind::LBracket,
                TokenKind::Number(1.0),
                TokenKind::Range,
                TokenKind::Number(10.0),
                TokenKind::RBracket,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\nb\"c""#),
            vec![TokenKind::String("a\nb\"c".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_string_recovers() {
        let (tokens, errors) = tokenize("\"abc");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, FeelErrorKind::SyntaxError);
        assert_eq!(tokens[0].kind, TokenKind::String("abc".into()));
        assert_eq!(tokens[1].kind, TokenKind::Eof);
    }

    #[test]
    fn test_keyword_literals() {
        assert_eq!(
            kinds("true false null"),
            vec![
                TokenKind::Boolean(true),
                TokenKind::Boolean(false),
                TokenKind::Null,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_positions_track_lines() {
        let (tokens, _) = tokenize("a\n b");
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[0].column, 1);
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[1].column, 2);
    }

    #[test]
    fn test_power_operator() {
        assert_eq!(
            kinds("2 ** 3"),
            vec![
                TokenKind::Number(2.0),
                TokenKind::Operator("**".into()),
                TokenKind::Number(3.0),
                TokenKind::Eof,
            ]
        );
    }
}
