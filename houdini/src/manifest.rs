#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use houdini_ast::{span_between, Program, Span};
use houdini_core::HoudiniConfig;
use houdini_verify::{ModelOracle, SessionScript};
use miette::{Diagnostic, IntoDiagnostic, NamedSource};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("manifest error: {message}")]
#[diagnostic(code(houdini::manifest))]
pub struct ManifestError {
    pub message: String,
    #[label]
    pub span: Option<Span>,
}

/// The run tables of a manifest. Program tables are read by `houdini-parse`.
#[derive(Debug, Default, Deserialize)]
struct RunTables {
    #[serde(default)]
    houdini: HoudiniConfig,
    #[serde(default)]
    oracle: BTreeMap<String, toml::Spanned<SessionScript>>,
}

#[derive(Debug)]
pub struct ResolvedManifest {
    pub path: PathBuf,
    pub source: NamedSource<String>,
    pub program: Program,
    pub config: HoudiniConfig,
    pub scripts: BTreeMap<String, SessionScript>,
}

impl ResolvedManifest {
    pub fn oracle(&self) -> ModelOracle {
        let mut oracle = ModelOracle::new();
        for (name, script) in &self.scripts {
            oracle.set_script(name.clone(), script.clone());
        }
        oracle
    }

    /// Attaches the manifest text to a diagnostic.
    pub fn report(&self, diagnostic: impl Diagnostic + Send + Sync + 'static) -> miette::Report {
        miette::Report::new(diagnostic).with_source_code(self.source.clone())
    }
}

pub fn load_manifest(path: &Path) -> miette::Result<ResolvedManifest> {
    let text = fs::read_to_string(path)
        .into_diagnostic()
        .map_err(|e| e.wrap_err(format!("failed to read {}", path.display())))?;
    let source = NamedSource::new(display_path(path), text.clone());

    let program = houdini_parse::parse_manifest(&text)
        .map_err(|e| miette::Report::new(e).with_source_code(source.clone()))?;
    let tables = parse_run_tables(&text, &program)
        .map_err(|e| miette::Report::new(e).with_source_code(source.clone()))?;

    tracing::debug!(
        manifest = %path.display(),
        decls = program.decls.len(),
        scripts = tables.1.len(),
        "manifest loaded"
    );
    Ok(ResolvedManifest {
        path: path.to_path_buf(),
        source,
        program,
        config: tables.0,
        scripts: tables.1,
    })
}

/// Reads `[houdini]` and `[oracle.<implementation>]`. Scripts must name a
/// declared implementation.
fn parse_run_tables(
    text: &str,
    program: &Program,
) -> Result<(HoudiniConfig, BTreeMap<String, SessionScript>), ManifestError> {
    let tables: RunTables = toml::from_str(text).map_err(|e| ManifestError {
        message: e.message().to_string(),
        span: e.span().map(|r| span_between(r.start, r.end)),
    })?;

    let mut scripts = BTreeMap::new();
    for (name, script) in tables.oracle {
        if program.implementation(&name).is_none() {
            let r = script.span();
            return Err(ManifestError {
                message: format!("oracle script for undeclared implementation `{name}`"),
                span: Some(span_between(r.start, r.end)),
            });
        }
        scripts.insert(name, script.into_inner());
    }
    Ok((tables.houdini, scripts))
}

fn display_path(p: &Path) -> String {
    p.to_string_lossy().to_string()
}
