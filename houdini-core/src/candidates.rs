#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use houdini_ast::{Decl, Program, Span, TypeRef};

use crate::error::ConfigurationError;

/// Attribute that turns a boolean constant into an inference candidate.
pub const EXISTENTIAL_ATTRIBUTE: &str = "existential";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub span: Span,
}

/// The fixed candidate set of a program, in declaration order.
#[derive(Clone, Debug, Default)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
    index: BTreeMap<String, usize>,
}

impl CandidateSet {
    /// Scans the program's declarations in order.
    pub fn collect(program: &Program) -> Result<Self, ConfigurationError> {
        let mut set = Self::default();
        // Declaration index of each candidate's own constant.
        let mut owners = Vec::new();

        for (at, decl) in program.decls.iter().enumerate() {
            let Decl::Constant(constant) = decl else {
                continue;
            };
            if constant.bool_attribute(EXISTENTIAL_ATTRIBUTE) != Some(true) {
                continue;
            }
            let name = &constant.name.node;
            if constant.ty != TypeRef::Bool {
                return Err(ConfigurationError::new(
                    format!(
                        "existential constant `{name}` must have type bool, found {}",
                        constant.ty
                    ),
                    constant.span,
                ));
            }
            if set.contains(name) {
                return Err(ConfigurationError::new(
                    format!("candidate `{name}` is declared more than once"),
                    constant.name.span,
                ));
            }
            set.index.insert(name.clone(), set.candidates.len());
            owners.push(at);
            set.candidates.push(Candidate {
                name: name.clone(),
                span: constant.name.span,
            });
        }

        // A candidate name must not be shared with any other declaration.
        for (at, decl) in program.decls.iter().enumerate() {
            let name = decl.name();
            let Some(&idx) = set.index.get(&name.node) else {
                continue;
            };
            if owners[idx] == at {
                continue;
            }
            return Err(ConfigurationError::new(
                format!(
                    "candidate `{}` collides with {} `{}`",
                    name.node,
                    decl.kind_name(),
                    name.node
                ),
                name.span,
            ));
        }

        tracing::debug!(count = set.len(), "collected candidates");
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.candidates.iter().map(|c| c.name.as_str())
    }
}
