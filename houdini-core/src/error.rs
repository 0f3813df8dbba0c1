#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use houdini_ast::Span;
use houdini_verify::OracleFault;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Clone, Error, Diagnostic)]
#[error("configuration error: {message}")]
#[diagnostic(code(houdini::config))]
#[allow(unused_assignments)]
pub struct ConfigurationError {
    pub message: String,
    #[label]
    pub span: Span,
}

impl ConfigurationError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// Failure while constructing the engine. Runs themselves never fail.
#[derive(Debug, Error, Diagnostic)]
pub enum SetupError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Oracle(#[from] OracleFault),
}
