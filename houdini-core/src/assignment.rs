#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use houdini_ast::Expr;
use houdini_verify::Axiom;

use crate::candidates::CandidateSet;

/// Candidate name -> truth value, in candidate declaration order.
///
/// Values only move from `true` to `false`. Once frozen, no value changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assignment {
    entries: Vec<(String, bool)>,
    index: BTreeMap<String, usize>,
    frozen: bool,
}

impl Assignment {
    pub fn all_true(candidates: &CandidateSet) -> Self {
        let entries: Vec<(String, bool)> = candidates.names().map(|n| (n.to_string(), true)).collect();
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, (n, _))| (n.clone(), i))
            .collect();
        Self {
            entries,
            index,
            frozen: false,
        }
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.index.get(name).map(|&i| self.entries[i].1)
    }

    /// Sets `name` to false. Returns whether the value changed; unknown
    /// names, already-false candidates and frozen assignments are no-ops.
    pub fn disable(&mut self, name: &str) -> bool {
        if self.frozen {
            return false;
        }
        let Some(&i) = self.index.get(name) else {
            return false;
        };
        let value = &mut self.entries[i].1;
        if !*value {
            return false;
        }
        *value = false;
        true
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn count_true(&self) -> usize {
        self.entries.iter().filter(|(_, v)| *v).count()
    }

    pub fn snapshot(&self) -> Vec<(String, bool)> {
        self.entries.clone()
    }

    /// `c1 == v1 && c2 == v2 && ...`; `true` when there are no candidates.
    pub fn build_axiom(&self) -> Axiom {
        let expr = self
            .entries
            .iter()
            .map(|(n, v)| Expr::eq(Expr::ident(n.as_str()), Expr::bool_lit(*v)))
            .reduce(Expr::and)
            .unwrap_or_else(|| Expr::bool_lit(true));
        Axiom::new(expr)
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (n, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{n}: {v}")?;
        }
        f.write_str("}")
    }
}
