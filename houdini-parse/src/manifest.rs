//! TOML program manifests.
//!
//! A manifest lists constants, procedures and implementations; contract and
//! command strings are parsed with the expression parser, with spans pointing
//! back into the manifest text.

use std::collections::BTreeMap;
use std::ops::Range;

use houdini_ast::{
    span_between, AttrValue, Attribute, Block, Cmd, ConstantDecl, Contract, Decl,
    ImplementationDecl, ProcedureDecl, Program, Spanned, TypeRef,
};
use serde::Deserialize;

use crate::error::ParseError;
use crate::lexer::Lexer;
use crate::parser::Parser;

type Located<T> = toml::Spanned<T>;

#[derive(Debug, Default, Deserialize)]
struct ManifestDoc {
    #[serde(default, rename = "constant")]
    constants: Vec<ConstantEntry>,
    #[serde(default, rename = "procedure")]
    procedures: Vec<ProcedureEntry>,
    #[serde(default, rename = "implementation")]
    implementations: Vec<ImplementationEntry>,
}

#[derive(Debug, Deserialize)]
struct ConstantEntry {
    name: Located<String>,
    #[serde(default, rename = "type")]
    ty: Option<String>,
    #[serde(default)]
    existential: Option<bool>,
    #[serde(default)]
    attributes: BTreeMap<String, Located<toml::Value>>,
}

#[derive(Debug, Deserialize)]
struct ProcedureEntry {
    name: Located<String>,
    #[serde(default)]
    requires: Vec<Located<String>>,
    #[serde(default)]
    ensures: Vec<Located<String>>,
}

#[derive(Debug, Deserialize)]
struct ImplementationEntry {
    #[serde(default)]
    name: Option<Located<String>>,
    procedure: Located<String>,
    #[serde(default)]
    body: Option<Vec<Located<String>>>,
    #[serde(default)]
    blocks: Option<Vec<BlockEntry>>,
}

#[derive(Debug, Deserialize)]
struct BlockEntry {
    label: Located<String>,
    #[serde(default)]
    cmds: Vec<Located<String>>,
}

/// Parses a whole manifest into a `Program`. Unknown top-level tables
/// (`[houdini]`, `[oracle]`) are left for other consumers.
pub fn parse_manifest(src: &str) -> Result<Program, ParseError> {
    let doc: ManifestDoc = toml::from_str(src).map_err(|e| ParseError {
        message: e.message().to_string(),
        span: e
            .span()
            .map(|r| span_between(r.start, r.end))
            .unwrap_or_else(houdini_ast::no_span),
    })?;

    let mut decls = Vec::new();
    for c in doc.constants {
        decls.push(Decl::Constant(lower_constant(c)?));
    }
    for p in doc.procedures {
        decls.push(Decl::Procedure(lower_procedure(p)?));
    }
    for i in doc.implementations {
        decls.push(Decl::Implementation(lower_implementation(i)?));
    }
    Ok(Program { decls })
}

fn located_ident(v: &Located<String>) -> Spanned<String> {
    Spanned::new(range_span(v.span()), v.get_ref().clone())
}

fn range_span(r: Range<usize>) -> houdini_ast::Span {
    span_between(r.start, r.end)
}

/// Byte offset of the first character inside a quoted TOML string.
fn inner_offset(v: &Located<String>) -> usize {
    v.span().start + 1
}

fn lower_constant(entry: ConstantEntry) -> Result<ConstantDecl, ParseError> {
    let name = located_ident(&entry.name);
    let ty = match entry.ty.as_deref() {
        None | Some("bool") => TypeRef::Bool,
        Some("int") => TypeRef::Int,
        Some(other) => TypeRef::Named(other.to_string()),
    };

    let mut attributes = Vec::new();
    if let Some(flag) = entry.existential {
        attributes.push(Attribute {
            span: name.span,
            key: Spanned::new(name.span, "existential".to_string()),
            value: AttrValue::Bool(flag),
        });
    }
    for (key, value) in entry.attributes {
        let span = range_span(value.span());
        let value = match value.into_inner() {
            toml::Value::Boolean(b) => AttrValue::Bool(b),
            toml::Value::Integer(i) => AttrValue::Int(i),
            toml::Value::String(s) => AttrValue::Str(s),
            other => {
                return Err(ParseError {
                    message: format!(
                        "attribute `{key}` on `{}` has unsupported {} value",
                        name.node,
                        other.type_str()
                    ),
                    span,
                });
            }
        };
        attributes.push(Attribute {
            span,
            key: Spanned::new(span, key),
            value,
        });
    }

    Ok(ConstantDecl {
        span: name.span,
        name,
        ty,
        attributes,
    })
}

fn lower_procedure(entry: ProcedureEntry) -> Result<ProcedureDecl, ParseError> {
    let name = located_ident(&entry.name);
    let requires = entry
        .requires
        .iter()
        .map(lower_contract)
        .collect::<Result<Vec<_>, _>>()?;
    let ensures = entry
        .ensures
        .iter()
        .map(lower_contract)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ProcedureDecl {
        span: name.span,
        name,
        requires,
        ensures,
    })
}

fn lower_contract(text: &Located<String>) -> Result<Contract, ParseError> {
    let tokens = Lexer::new(text.get_ref()).with_offset(inner_offset(text)).lex()?;
    Parser::new(&tokens).parse_contract_eof()
}

fn lower_cmd(text: &Located<String>) -> Result<Cmd, ParseError> {
    let tokens = Lexer::new(text.get_ref()).with_offset(inner_offset(text)).lex()?;
    Parser::new(&tokens).parse_cmd_eof()
}

fn lower_implementation(entry: ImplementationEntry) -> Result<ImplementationDecl, ParseError> {
    let procedure = located_ident(&entry.procedure);
    let name = entry
        .name
        .as_ref()
        .map(located_ident)
        .unwrap_or_else(|| procedure.clone());

    let blocks = match (entry.body, entry.blocks) {
        (Some(_), Some(_)) => {
            return Err(ParseError {
                message: format!(
                    "implementation `{}` declares both `body` and `blocks`",
                    name.node
                ),
                span: name.span,
            });
        }
        (Some(body), None) => vec![Block {
            span: name.span,
            label: Spanned::new(name.span, "entry".to_string()),
            cmds: body.iter().map(lower_cmd).collect::<Result<Vec<_>, _>>()?,
        }],
        (None, Some(blocks)) => blocks
            .into_iter()
            .map(|b| {
                let label = located_ident(&b.label);
                Ok(Block {
                    span: label.span,
                    cmds: b.cmds.iter().map(lower_cmd).collect::<Result<Vec<_>, _>>()?,
                    label,
                })
            })
            .collect::<Result<Vec<_>, ParseError>>()?,
        (None, None) => vec![Block {
            span: name.span,
            label: Spanned::new(name.span, "entry".to_string()),
            cmds: Vec::new(),
        }],
    };

    Ok(ImplementationDecl {
        span: name.span,
        name,
        procedure,
        blocks,
    })
}
