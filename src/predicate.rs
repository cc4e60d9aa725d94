//! Requiredness Expression Compiler
//!
//! Compiles a boolean expression over sibling input names (`!foo`,
//! `foo && !bar`, `a === b`) into a [`Predicate`] evaluated against a
//! presence vector. Evaluation is a pure walk over a small AST; names are
//! resolved to presence-vector indices at compile time, so a compiled
//! predicate cannot fail.

use std::collections::HashMap;

use crate::error::ExpressionError;

// ═══════════════════════════════════════════════════════════════════════════════
// TOKENS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Ident(String),
    True,
    False,
    Not,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Question,
    Colon,
    LParen,
    RParen,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    text: String,
    offset: usize,
}

fn tokenize(src: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < chars.len()
                && (chars[i].1.is_ascii_alphanumeric() || chars[i].1 == '_' || chars[i].1 == '$')
            {
                i += 1;
            }
            let text: String = chars[start..i].iter().map(|(_, c)| *c).collect();
            let kind = match text.as_str() {
                "true" => TokenKind::True,
                "false" => TokenKind::False,
                _ => TokenKind::Ident(text.clone()),
            };
            tokens.push(Token { kind, text, offset });
            continue;
        }

        let next = chars.get(i + 1).map(|(_, c)| *c);
        let next2 = chars.get(i + 2).map(|(_, c)| *c);

        let (kind, len) = match (c, next, next2) {
            ('=', Some('='), Some('=')) => (TokenKind::Eq, 3),
            ('=', Some('='), _) => (TokenKind::Eq, 2),
            ('!', Some('='), Some('=')) => (TokenKind::Ne, 3),
            ('!', Some('='), _) => (TokenKind::Ne, 2),
            ('!', _, _) => (TokenKind::Not, 1),
            ('&', Some('&'), _) => (TokenKind::And, 2),
            ('|', Some('|'), _) => (TokenKind::Or, 2),
            ('<', Some('='), _) => (TokenKind::Le, 2),
            ('<', _, _) => (TokenKind::Lt, 1),
            ('>', Some('='), _) => (TokenKind::Ge, 2),
            ('>', _, _) => (TokenKind::Gt, 1),
            ('?', _, _) => (TokenKind::Question, 1),
            (':', _, _) => (TokenKind::Colon, 1),
            ('(', _, _) => (TokenKind::LParen, 1),
            (')', _, _) => (TokenKind::RParen, 1),
            _ => return Err(ExpressionError::UnexpectedChar { ch: c, offset }),
        };

        let text: String = chars[i..i + len].iter().map(|(_, c)| *c).collect();
        tokens.push(Token { kind, text, offset });
        i += len;
    }

    Ok(tokens)
}

// ═══════════════════════════════════════════════════════════════════════════════
// AST
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Literal(bool),
    /// Index into the presence vector.
    Input(usize),
    Not(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

impl Expr {
    fn eval(&self, presence: &[bool]) -> bool {
        match self {
            Expr::Literal(value) => *value,
            Expr::Input(index) => presence.get(*index).copied().unwrap_or(false),
            Expr::Not(inner) => !inner.eval(presence),
            Expr::Binary(BinaryOp::And, lhs, rhs) => lhs.eval(presence) && rhs.eval(presence),
            Expr::Binary(BinaryOp::Or, lhs, rhs) => lhs.eval(presence) || rhs.eval(presence),
            Expr::Binary(op, lhs, rhs) => {
                let (l, r) = (lhs.eval(presence), rhs.eval(presence));
                match op {
                    BinaryOp::Eq => l == r,
                    BinaryOp::Ne => l != r,
                    BinaryOp::Lt => l < r,
                    BinaryOp::Le => l <= r,
                    BinaryOp::Gt => l > r,
                    BinaryOp::Ge => l >= r,
                    BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit ops handled above"),
                }
            }
            Expr::Conditional(cond, then, otherwise) => {
                if cond.eval(presence) {
                    then.eval(presence)
                } else {
                    otherwise.eval(presence)
                }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSER
// ═══════════════════════════════════════════════════════════════════════════════

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    names: &'a HashMap<String, usize>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> Result<(), ExpressionError> {
        match self.advance() {
            Some(token) if token.kind == kind => Ok(()),
            Some(token) => Err(unexpected(token)),
            None => Err(ExpressionError::UnexpectedEnd { expected }),
        }
    }

    fn conditional(&mut self) -> Result<Expr, ExpressionError> {
        let cond = self.or()?;
        if !self.eat(&TokenKind::Question) {
            return Ok(cond);
        }
        let then = self.conditional()?;
        self.expect(TokenKind::Colon, "`:`")?;
        let otherwise = self.conditional()?;
        Ok(Expr::Conditional(
            Box::new(cond),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    fn or(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.and()?;
        while self.eat(&TokenKind::Or) {
            let rhs = self.and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.equality()?;
        while self.eat(&TokenKind::And) {
            let rhs = self.equality()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.relational()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Eq) => BinaryOp::Eq,
                Some(TokenKind::Ne) => BinaryOp::Ne,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.relational()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn relational(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Lt) => BinaryOp::Lt,
                Some(TokenKind::Le) => BinaryOp::Le,
                Some(TokenKind::Gt) => BinaryOp::Gt,
                Some(TokenKind::Ge) => BinaryOp::Ge,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&TokenKind::Not) {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        let token = self.advance().ok_or(ExpressionError::UnexpectedEnd {
            expected: "an input name, `true`, `false` or `(`",
        })?;

        match token.kind {
            TokenKind::True => Ok(Expr::Literal(true)),
            TokenKind::False => Ok(Expr::Literal(false)),
            TokenKind::Ident(name) => match self.names.get(&name) {
                Some(index) => Ok(Expr::Input(*index)),
                None => Err(ExpressionError::UnknownName { name }),
            },
            TokenKind::LParen => {
                let inner = self.conditional()?;
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(inner)
            }
            _ => Err(unexpected(token)),
        }
    }
}

fn unexpected(token: Token) -> ExpressionError {
    ExpressionError::UnexpectedToken {
        found: token.text,
        offset: token.offset,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PUBLIC API
// ═══════════════════════════════════════════════════════════════════════════════

/// A compiled requiredness condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    source: String,
    arity: usize,
    expr: Expr,
}

impl Predicate {
    /// Evaluate against a presence vector laid out like the sibling list the
    /// predicate was compiled with.
    pub fn evaluate(&self, presence: &[bool]) -> bool {
        debug_assert_eq!(presence.len(), self.arity);
        self.expr.eval(presence)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Compile `expression` with each of `sibling_names` bound to its position in
/// the presence vector.
pub fn compile(sibling_names: &[String], expression: &str) -> Result<Predicate, ExpressionError> {
    compile_with_aliases(sibling_names, &[], expression)
}

/// Like [`compile`], additionally binding `(alias, index)` pairs. An alias
/// never shadows a sibling name.
pub fn compile_with_aliases(
    sibling_names: &[String],
    aliases: &[(String, usize)],
    expression: &str,
) -> Result<Predicate, ExpressionError> {
    let mut names: HashMap<String, usize> = HashMap::new();
    for (alias, index) in aliases {
        names.insert(alias.clone(), *index);
    }
    for (index, name) in sibling_names.iter().enumerate() {
        names.insert(name.clone(), index);
    }

    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        names: &names,
    };
    let expr = parser.conditional()?;
    if let Some(token) = parser.advance() {
        return Err(unexpected(token));
    }

    Ok(Predicate {
        source: expression.to_string(),
        arity: sibling_names.len(),
        expr,
    })
}
