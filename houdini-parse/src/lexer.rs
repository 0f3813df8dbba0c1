#![forbid(unsafe_code)]

use houdini_ast::{span_between, Span};
use logos::Logos;

use crate::error::ParseError;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum RawToken {
    #[token("==>")]
    Implies,
    #[token("||")]
    OrOr,
    #[token("&&")]
    AndAnd,
    #[token("==")]
    EqEq,
    #[token("!")]
    Bang,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("call")]
    KwCall,
    #[token("assert")]
    KwAssert,
    #[token("assume")]
    KwAssume,
    #[token("free")]
    KwFree,

    // Relational/arithmetic operators only ever appear inside opaque atoms.
    #[token("!=")]
    #[token("<=")]
    #[token(">=")]
    #[token("<")]
    #[token(">")]
    #[token("+")]
    #[token("-")]
    #[token("*")]
    #[token("/")]
    #[token("%")]
    #[token(".")]
    #[token(",")]
    #[token("[")]
    #[token("]")]
    #[token(":=")]
    Op,

    #[regex(r"[0-9]+")]
    Int,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Implies,
    OrOr,
    AndAnd,
    EqEq,
    Bang,
    LParen,
    RParen,

    True,
    False,
    KwCall,
    KwAssert,
    KwAssume,
    KwFree,

    Op(String),
    Int(String),
    Ident(String),

    Eof,
}

pub struct Lexer<'a> {
    src: &'a str,
    base: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, base: 0 }
    }

    /// Shifts every produced span by `base` bytes (text embedded in a manifest).
    pub fn with_offset(mut self, base: usize) -> Self {
        self.base = base;
        self
    }

    pub fn lex(&self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        let mut raw = RawToken::lexer(self.src);

        while let Some(next) = raw.next() {
            let range = raw.span();
            let span = span_between(self.base + range.start, self.base + range.end);
            let Ok(tok) = next else {
                return Err(ParseError {
                    message: format!("unexpected character(s) `{}`", raw.slice()),
                    span,
                });
            };
            let text = raw.slice().to_string();
            let kind = match tok {
                RawToken::Implies => TokenKind::Implies,
                RawToken::OrOr => TokenKind::OrOr,
                RawToken::AndAnd => TokenKind::AndAnd,
                RawToken::EqEq => TokenKind::EqEq,
                RawToken::Bang => TokenKind::Bang,
                RawToken::LParen => TokenKind::LParen,
                RawToken::RParen => TokenKind::RParen,
                RawToken::True => TokenKind::True,
                RawToken::False => TokenKind::False,
                RawToken::KwCall => TokenKind::KwCall,
                RawToken::KwAssert => TokenKind::KwAssert,
                RawToken::KwAssume => TokenKind::KwAssume,
                RawToken::KwFree => TokenKind::KwFree,
                RawToken::Op => TokenKind::Op(text),
                RawToken::Int => TokenKind::Int(text),
                RawToken::Ident => TokenKind::Ident(text),
            };
            tokens.push(Token { kind, span });
        }

        let end = self.base + self.src.len();
        tokens.push(Token {
            kind: TokenKind::Eof,
            span: span_between(end, end),
        });
        Ok(tokens)
    }
}
