//! FEEL parser
//!
//! Recursive descent over the token stream. Errors are collected rather
//! than aborted on: the parser always returns a tree, substituting a null
//! literal for fragments it cannot make sense of. Callers distinguish
//! success by the emptiness of the error list.

use super::ast::{BinaryOp, Expr, Literal, Quantifier};
use super::error::{FeelError, FeelErrorKind};
use super::token::{tokenize, Token, TokenKind};

/// Reserved words that terminate a multi-word FEEL name
const KEYWORDS: &[&str] = &[
    "and",
    "or",
    "not",
    "between",
    "in",
    "if",
    "then",
    "else",
    "for",
    "return",
    "some",
    "every",
    "satisfies",
    "function",
    "instance",
    "of",
];

/// Parse a FEEL source string into an expression tree.
///
/// The returned error list covers both lexical and syntactic problems;
/// an empty list means a clean parse.
pub fn parse(source: &str) -> (Expr, Vec<FeelError>) {
    let (tokens, lex_errors) = tokenize(source);
    let mut parser = Parser {
        tokens,
        index: 0,
        errors: lex_errors,
    };
    let expr = parser.parse_expression();
    if !matches!(parser.current().kind, TokenKind::Eof) {
        let token = parser.current().clone();
        parser.error_at(&token, "unexpected trailing input");
    }
    (expr, parser.errors)
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    errors: Vec<FeelError>,
}

impl Parser {
    fn current(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.index + offset).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }

    fn error_at(&mut self, token: &Token, message: impl Into<String>) {
        self.errors.push(FeelError::at(
            FeelErrorKind::SyntaxError,
            message,
            token.line,
            token.column,
        ));
    }

    fn at_keyword(&self, word: &str) -> bool {
        matches!(&self.current().kind, TokenKind::Identifier(name) if name == word)
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.at_keyword(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, word: &str) {
        if !self.eat_keyword(word) {
            let token = self.current().clone();
            self.error_at(&token, format!("expected '{}'", word));
        }
    }

    fn at_operator(&self, symbol: &str) -> bool {
        matches!(&self.current().kind, TokenKind::Operator(op) if op == symbol)
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) {
        if &self.current().kind == kind {
            self.advance();
        } else {
            let token = self.current().clone();
            self.error_at(&token, format!("expected {}", what));
        }
    }

    // expression := if | quantified | for | or
    fn parse_expression(&mut self) -> Expr {
        if self.at_keyword("if") {
            return self.parse_if();
        }
        if self.at_keyword("some") || self.at_keyword("every") {
            return self.parse_quantified();
        }
        if self.at_keyword("for") {
            return self.parse_for();
        }
        self.parse_or()
    }

    fn parse_if(&mut self) -> Expr {
        self.expect_keyword("if");
        let condition = self.parse_expression();
        self.expect_keyword("then");
        let then_branch = self.parse_expression();
        self.expect_keyword("else");
        let else_branch = self.parse_expression();
        Expr::If {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        }
    }

    fn parse_quantified(&mut self) -> Expr {
        let quantifier = if self.eat_keyword("some") {
            Quantifier::Some
        } else {
            self.expect_keyword("every");
            Quantifier::Every
        };
        let variable = self.parse_binding_name();
        self.expect_keyword("in");
        let source = self.parse_expression();
        self.expect_keyword("satisfies");
        let condition = self.parse_expression();
        Expr::Quantified {
            quantifier,
            variable,
            source: Box::new(source),
            condition: Box::new(condition),
        }
    }

    fn parse_for(&mut self) -> Expr {
        self.expect_keyword("for");
        let variable = self.parse_binding_name();
        self.expect_keyword("in");
        let source = self.parse_expression();
        self.expect_keyword("return");
        let body = self.parse_expression();
        Expr::For {
            variable,
            source: Box::new(source),
            body: Box::new(body),
        }
    }

    fn parse_binding_name(&mut self) -> String {
        match &self.current().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                name
            }
            _ => {
                let token = self.current().clone();
                self.error_at(&token, "expected a name");
                String::from("_")
            }
        }
    }

    // or := and ("or" and)*
    fn parse_or(&mut self) -> Expr {
        let mut left = self.parse_and();
        while self.eat_keyword("or") {
            let right = self.parse_and();
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        left
    }

    // and := comparison ("and" comparison)*
    fn parse_and(&mut self) -> Expr {
        let mut left = self.parse_comparison();
        while self.eat_keyword("and") {
            let right = self.parse_comparison();
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        left
    }

    // comparison := membership (cmp-op membership)?
    fn parse_comparison(&mut self) -> Expr {
        let left = self.parse_membership();
        let op = match &self.current().kind {
            TokenKind::Operator(op) => match op.as_str() {
                "=" | "==" => Some(BinaryOp::Eq),
                "!=" => Some(BinaryOp::Ne),
                "<" => Some(BinaryOp::Lt),
                "<=" => Some(BinaryOp::Le),
                ">" => Some(BinaryOp::Gt),
                ">=" => Some(BinaryOp::Ge),
                _ => None,
            },
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let right = self.parse_membership();
            return Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        left
    }

    // membership := between ("in" additive)?
    fn parse_membership(&mut self) -> Expr {
        let left = self.parse_between();
        if self.eat_keyword("in") {
            let list = self.parse_additive();
            return Expr::In {
                value: Box::new(left),
                list: Box::new(list),
            };
        }
        left
    }

    // between := additive ("between" additive "and" additive)?
    fn parse_between(&mut self) -> Expr {
        let value = self.parse_additive();
        if self.eat_keyword("between") {
            let low = self.parse_additive();
            self.expect_keyword("and");
            let high = self.parse_additive();
            return Expr::Between {
                value: Box::new(value),
                low: Box::new(low),
                high: Box::new(high),
            };
        }
        value
    }

    // additive := multiplicative (("+"|"-") multiplicative)*
    fn parse_additive(&mut self) -> Expr {
        let mut left = self.parse_multiplicative();
        loop {
            let op = if self.at_operator("+") {
                BinaryOp::Add
            } else if self.at_operator("-") {
                BinaryOp::Sub
            } else {
                break;
            };
            self.advance();
            let right = self.parse_multiplicative();
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        left
    }

    // multiplicative := power (("*"|"/") power)*
    fn parse_multiplicative(&mut self) -> Expr {
        let mut left = self.parse_power();
        loop {
            let op = if self.at_operator("*") {
                BinaryOp::Mul
            } else if self.at_operator("/") {
                BinaryOp::Div
            } else {
                break;
            };
            self.advance();
            let right = self.parse_power();
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        left
    }

    // power := unary ("**" power)?   (right-associative)
    fn parse_power(&mut self) -> Expr {
        let base = self.parse_unary();
        if self.at_operator("**") {
            self.advance();
            let exponent = self.parse_power();
            return Expr::Binary {
                op: BinaryOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent),
            };
        }
        base
    }

    // unary := ("-" | "not") unary | postfix
    fn parse_unary(&mut self) -> Expr {
        if self.at_operator("-") {
            self.advance();
            return Expr::Neg(Box::new(self.parse_unary()));
        }
        if self.eat_keyword("not") {
            return Expr::Not(Box::new(self.parse_unary()));
        }
        self.parse_postfix()
    }

    // postfix := primary (("." IDENT) | "(" args ")" | "[" expression "]")*
    fn parse_postfix(&mut self) -> Expr {
        let mut expr = self.parse_primary();
        loop {
            match &self.current().kind {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.parse_binding_name();
                    expr = Expr::Path {
                        base: Box::new(expr),
                        property,
                    };
                }
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    if !matches!(self.current().kind, TokenKind::RParen) {
                        args.push(self.parse_expression());
                        while matches!(self.current().kind, TokenKind::Comma) {
                            self.advance();
                            args.push(self.parse_expression());
                        }
                    }
                    self.expect(&TokenKind::RParen, "')'");
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let filter = self.parse_expression();
                    self.expect(&TokenKind::RBracket, "']'");
                    expr = Expr::Filter {
                        base: Box::new(expr),
                        filter: Box::new(filter),
                    };
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_primary(&mut self) -> Expr {
        match self.current().kind.clone() {
            TokenKind::Number(n) => {
                self.advance();
                Expr::Literal(Literal::Number(n))
            }
            TokenKind::String(s) => {
                self.advance();
                Expr::Literal(Literal::String(s))
            }
            TokenKind::Boolean(b) => {
                self.advance();
                Expr::Literal(Literal::Boolean(b))
            }
            TokenKind::Null => {
                self.advance();
                Expr::Literal(Literal::Null)
            }
            TokenKind::LParen => self.parse_paren_or_open_range(),
            TokenKind::LBracket => self.parse_list_or_range(),
            TokenKind::LBrace => self.parse_context(),
            TokenKind::Identifier(name) => {
                if name == "function" && matches!(self.peek_kind(1), Some(TokenKind::LParen)) {
                    return self.parse_function_literal();
                }
                self.advance();
                Expr::Name(self.join_name(name))
            }
            _ => {
                let token = self.advance();
                self.error_at(&token, format!("unexpected token {:?}", token.kind));
                Expr::null()
            }
        }
    }

    /// Join multi-word FEEL names (`string length`, `substring before`).
    ///
    /// Keywords terminate the name, except for the two spec-mandated names
    /// that embed `and`: `date and time`, `years and months duration`.
    fn join_name(&mut self, first: String) -> String {
        let mut name = first;
        loop {
            match &self.current().kind {
                TokenKind::Identifier(word) if !KEYWORDS.contains(&word.as_str()) => {
                    name.push(' ');
                    name.push_str(word);
                    self.advance();
                }
                TokenKind::Identifier(word) if word == "and" => {
                    let next = self.peek_kind(1);
                    let joins = match (&name[..], next) {
                        ("date", Some(TokenKind::Identifier(w))) if w == "time" => true,
                        ("years", Some(TokenKind::Identifier(w))) if w == "months" => true,
                        _ => false,
                    };
                    if !joins {
                        break;
                    }
                    self.advance();
                    name.push_str(" and");
                }
                _ => break,
            }
        }
        name
    }

    fn parse_function_literal(&mut self) -> Expr {
        self.expect_keyword("function");
        self.expect(&TokenKind::LParen, "'('");
        let mut params = Vec::new();
        if !matches!(self.current().kind, TokenKind::RParen) {
            params.push(self.parse_binding_name());
            while matches!(self.current().kind, TokenKind::Comma) {
                self.advance();
                params.push(self.parse_binding_name());
            }
        }
        self.expect(&TokenKind::RParen, "')'");
        let body = self.parse_expression();
        Expr::Function {
            params,
            body: Box::new(body),
        }
    }

    // "(" expression ")" | "(" expression ".." expression ("]"|")")
    fn parse_paren_or_open_range(&mut self) -> Expr {
        self.expect(&TokenKind::LParen, "'('");
        let first = self.parse_expression();
        if matches!(self.current().kind, TokenKind::Range) {
            self.advance();
            let end = self.parse_expression();
            let end_closed = self.finish_range_end();
            return Expr::Range {
                start: Box::new(first),
                end: Box::new(end),
                start_closed: false,
                end_closed,
            };
        }
        self.expect(&TokenKind::RParen, "')'");
        first
    }

    // "[" "]" | "[" expression ".." expression ("]"|")") | list
    fn parse_list_or_range(&mut self) -> Expr {
        self.expect(&TokenKind::LBracket, "'['");
        if matches!(self.current().kind, TokenKind::RBracket) {
            self.advance();
            return Expr::List(Vec::new());
        }
        let first = self.parse_expression();
        if matches!(self.current().kind, TokenKind::Range) {
            self.advance();
            let end = self.parse_expression();
            let end_closed = self.finish_range_end();
            return Expr::Range {
                start: Box::new(first),
                end: Box::new(end),
                start_closed: true,
                end_closed,
            };
        }
        let mut items = vec![first];
        while matches!(self.current().kind, TokenKind::Comma) {
            self.advance();
            items.push(self.parse_expression());
        }
        self.expect(&TokenKind::RBracket, "']'");
        Expr::List(items)
    }

    /// Consume the closing bracket of a range, returning end-closedness
    fn finish_range_end(&mut self) -> bool {
        match self.current().kind {
            TokenKind::RBracket => {
                self.advance();
                true
            }
            TokenKind::RParen => {
                self.advance();
                false
            }
            _ => {
                let token = self.current().clone();
                self.error_at(&token, "expected ']' or ')' to close range");
                true
            }
        }
    }

    // context := "{" (key ":" expression ("," key ":" expression)*)? "}"
    fn parse_context(&mut self) -> Expr {
        self.expect(&TokenKind::LBrace, "'{'");
        let mut entries = Vec::new();
        if !matches!(self.current().kind, TokenKind::RBrace) {
            loop {
                let key = match self.current().kind.clone() {
                    TokenKind::Identifier(name) => {
                        self.advance();
                        name
                    }
                    TokenKind::String(name) => {
                        self.advance();
                        name
                    }
                    _ => {
                        let token = self.current().clone();
                        self.error_at(&token, "expected a context key");
                        String::from("_")
                    }
                };
                self.expect(&TokenKind::Colon, "':'");
                let value = self.parse_expression();
                entries.push((key, value));
                if matches!(self.current().kind, TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBrace, "'}'");
        Expr::Context(entries)
    }
}
