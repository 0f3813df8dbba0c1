#![forbid(unsafe_code)]

mod error;
mod lexer;
mod manifest;
mod parser;

pub use error::ParseError;
pub use lexer::{Lexer, Token, TokenKind};
pub use manifest::parse_manifest;
pub use parser::Parser;

use houdini_ast::{Cmd, Contract, Expr};

pub fn parse_expr(src: &str) -> Result<Expr, ParseError> {
    let tokens = Lexer::new(src).lex()?;
    Parser::new(&tokens).parse_expr_eof()
}

pub fn parse_cmd(src: &str) -> Result<Cmd, ParseError> {
    let tokens = Lexer::new(src).lex()?;
    Parser::new(&tokens).parse_cmd_eof()
}

pub fn parse_contract(src: &str) -> Result<Contract, ParseError> {
    let tokens = Lexer::new(src).lex()?;
    Parser::new(&tokens).parse_contract_eof()
}
