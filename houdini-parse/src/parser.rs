#![forbid(unsafe_code)]

use std::mem;

use houdini_ast::{
    join, CallCmd, Cmd, Contract, Expr, ExprKind, PredicateCmd, Span, Spanned, UnaryOp, BinOp,
};

use crate::error::ParseError;
use crate::lexer::{Token, TokenKind};

pub struct Parser<'a> {
    tokens: &'a [Token],
    idx: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, idx: 0 }
    }

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_implies_expr()
    }

    pub fn parse_expr_eof(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expr()?;
        self.expect_eof()?;
        Ok(expr)
    }

    /// `call p` | `assert e` | `assume e`
    pub fn parse_cmd_eof(&mut self) -> Result<Cmd, ParseError> {
        let tok = self.expect_any()?;
        let cmd = match tok.kind {
            TokenKind::KwCall => {
                let callee = self.expect_ident()?;
                Cmd::Call(CallCmd {
                    span: join(tok.span, callee.span),
                    callee,
                })
            }
            TokenKind::KwAssert => {
                let expr = self.parse_expr()?;
                Cmd::Assert(PredicateCmd {
                    span: join(tok.span, expr.span),
                    expr,
                })
            }
            TokenKind::KwAssume => {
                let expr = self.parse_expr()?;
                Cmd::Assume(PredicateCmd {
                    span: join(tok.span, expr.span),
                    expr,
                })
            }
            _ => {
                return Err(ParseError {
                    message: "expected `call`, `assert` or `assume`".to_string(),
                    span: tok.span,
                });
            }
        };
        self.expect_eof()?;
        Ok(cmd)
    }

    /// `[free] e`
    pub fn parse_contract_eof(&mut self) -> Result<Contract, ParseError> {
        let free_span = if self.at(TokenKind::KwFree) {
            self.next().map(|t| t.span)
        } else {
            None
        };
        let condition = self.parse_expr()?;
        self.expect_eof()?;
        let span = match free_span {
            Some(s) => join(s, condition.span),
            None => condition.span,
        };
        Ok(Contract {
            span,
            free: free_span.is_some(),
            condition,
        })
    }

    fn parse_implies_expr(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_or_expr()?;
        if self.at(TokenKind::Implies) {
            self.next();
            let right = self.parse_implies_expr()?;
            return Ok(Expr::binary(left, BinOp::Implies, right));
        }
        Ok(left)
    }

    fn parse_or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expr()?;
        while self.at(TokenKind::OrOr) {
            self.next();
            let right = self.parse_and_expr()?;
            left = Expr::binary(left, BinOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_eq_expr()?;
        while self.at(TokenKind::AndAnd) {
            self.next();
            let right = self.parse_eq_expr()?;
            left = Expr::binary(left, BinOp::And, right);
        }
        Ok(left)
    }

    fn parse_eq_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary_expr()?;
        while self.at(TokenKind::EqEq) {
            self.next();
            let right = self.parse_unary_expr()?;
            left = Expr::binary(left, BinOp::Eq, right);
        }
        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, ParseError> {
        if self.at(TokenKind::Bang) {
            let t = self.expect_any()?;
            let expr = self.parse_unary_expr()?;
            let span = join(t.span, expr.span);
            return Ok(Expr::new(
                span,
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(expr),
                },
            ));
        }
        self.parse_primary_expr()
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, ParseError> {
        let Some(kind) = self.peek_kind().cloned() else {
            return Err(self.error_here("unexpected end of input"));
        };
        match kind {
            TokenKind::True | TokenKind::False => {
                let tok = self.expect_any()?;
                let value = matches!(tok.kind, TokenKind::True);
                Ok(Expr::new(tok.span, ExprKind::BoolLit(value)))
            }
            TokenKind::LParen => {
                let open = self.expect_any()?;
                let mut inner = self.parse_expr()?;
                let close = self.expect(TokenKind::RParen)?;
                inner.span = join(open.span, close.span);
                Ok(inner)
            }
            TokenKind::Ident(_) | TokenKind::Int(_) | TokenKind::Op(_) => self.parse_atom(),
            _ => Err(self.error_here("expected an expression")),
        }
    }

    /// A maximal run of identifier/number/operator tokens. A single identifier
    /// stays an identifier; anything longer becomes an opaque atom.
    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_span().unwrap_or_else(|| houdini_ast::no_span());
        let mut end = start;
        let mut pieces: Vec<String> = Vec::new();
        let mut lone_ident: Option<Spanned<String>> = None;

        loop {
            match self.peek_kind().cloned() {
                Some(TokenKind::Ident(_) | TokenKind::Int(_) | TokenKind::Op(_)) => {
                    let tok = self.expect_any()?;
                    end = tok.span;
                    let text = token_text(&tok.kind);
                    lone_ident = match (&tok.kind, pieces.is_empty()) {
                        (TokenKind::Ident(name), true) => Some(Spanned::new(tok.span, name.clone())),
                        _ => None,
                    };
                    pieces.push(text);
                }
                // Application inside an atom: `len(a)`.
                Some(TokenKind::LParen) if matches!(self.prev_kind(), Some(TokenKind::Ident(_))) => {
                    end = self.consume_group(&mut pieces)?;
                    lone_ident = None;
                }
                _ => break,
            }
        }

        if pieces.is_empty() {
            return Err(self.error_here("expected an expression"));
        }
        if let (Some(id), 1) = (lone_ident, pieces.len()) {
            return Ok(Expr::new(id.span, ExprKind::Ident(id)));
        }
        Ok(Expr::new(join(start, end), ExprKind::Atom(canonical_atom(&pieces))))
    }

    fn consume_group(&mut self, pieces: &mut Vec<String>) -> Result<Span, ParseError> {
        let mut depth = 0usize;
        loop {
            let tok = self.expect_any()?;
            match &tok.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => depth = depth.saturating_sub(1),
                TokenKind::Eof => {
                    return Err(ParseError {
                        message: "unclosed `(` in atom".to_string(),
                        span: tok.span,
                    });
                }
                _ => {}
            }
            pieces.push(token_text(&tok.kind));
            if depth == 0 {
                return Ok(tok.span);
            }
        }
    }

    fn expect_ident(&mut self) -> Result<Spanned<String>, ParseError> {
        let tok = self.expect_any()?;
        match tok.kind {
            TokenKind::Ident(name) => Ok(Spanned::new(tok.span, name)),
            _ => Err(ParseError {
                message: "expected identifier".to_string(),
                span: tok.span,
            }),
        }
    }

    fn expect_eof(&mut self) -> Result<(), ParseError> {
        if self.at(TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.error_here("expected end of input"))
        }
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token, ParseError> {
        let tok = self.expect_any()?;
        if mem::discriminant(&tok.kind) == mem::discriminant(&expected) {
            Ok(tok)
        } else {
            Err(ParseError {
                message: format!("expected {expected:?}"),
                span: tok.span,
            })
        }
    }

    fn expect_any(&mut self) -> Result<Token, ParseError> {
        self.next().ok_or_else(|| ParseError {
            message: "unexpected end of input".to_string(),
            span: self.tokens.last().map(|t| t.span).unwrap_or_else(houdini_ast::no_span),
        })
    }

    fn error_here(&self, message: &str) -> ParseError {
        ParseError {
            message: message.to_string(),
            span: self
                .peek_span()
                .or_else(|| self.tokens.last().map(|t| t.span))
                .unwrap_or_else(houdini_ast::no_span),
        }
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind()
            .is_some_and(|k| mem::discriminant(k) == mem::discriminant(&kind))
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.idx)?.clone();
        self.idx += 1;
        Some(tok)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.idx).map(|t| &t.kind)
    }

    fn prev_kind(&self) -> Option<&TokenKind> {
        self.idx.checked_sub(1).and_then(|i| self.tokens.get(i)).map(|t| &t.kind)
    }

    fn peek_span(&self) -> Option<Span> {
        self.tokens.get(self.idx).map(|t| t.span)
    }
}

fn token_text(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Op(s) | TokenKind::Int(s) | TokenKind::Ident(s) => s.clone(),
        TokenKind::LParen => "(".to_string(),
        TokenKind::RParen => ")".to_string(),
        TokenKind::True => "true".to_string(),
        TokenKind::False => "false".to_string(),
        TokenKind::Bang => "!".to_string(),
        TokenKind::EqEq => "==".to_string(),
        TokenKind::AndAnd => "&&".to_string(),
        TokenKind::OrOr => "||".to_string(),
        TokenKind::Implies => "==>".to_string(),
        TokenKind::KwCall => "call".to_string(),
        TokenKind::KwAssert => "assert".to_string(),
        TokenKind::KwAssume => "assume".to_string(),
        TokenKind::KwFree => "free".to_string(),
        TokenKind::Eof => String::new(),
    }
}

/// Joins atom tokens with single spaces, except around call parentheses and
/// commas, so `x>0` and `x > 0` name the same atom.
fn canonical_atom(pieces: &[String]) -> String {
    let mut out = String::new();
    let mut prev: Option<&str> = None;
    for piece in pieces {
        let glue = match (prev, piece.as_str()) {
            (None, _) => false,
            (Some("("), _) => false,
            (Some(_), "(" | ")" | ",") => false,
            _ => true,
        };
        if glue {
            out.push(' ');
        }
        out.push_str(piece);
        prev = Some(piece.as_str());
    }
    out
}
