#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use houdini_ast::{Program, Span};

use crate::error::ConfigurationError;

/// Index of an implementation in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImplId(pub usize);

impl fmt::Display for ImplId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImplNode {
    pub name: String,
    pub procedure: String,
    pub span: Span,
}

/// Caller -> callee-implementation graph. One edge per call site and per
/// implementation realizing the called procedure.
#[derive(Clone, Debug, Default)]
pub struct CallGraph {
    nodes: Vec<ImplNode>,
    by_name: BTreeMap<String, ImplId>,
    edges: Vec<(ImplId, ImplId)>,
    successors: Vec<Vec<ImplId>>,
    predecessors: Vec<Vec<ImplId>>,
}

impl CallGraph {
    pub fn build(program: &Program) -> Result<Self, ConfigurationError> {
        let mut graph = Self::default();
        let mut realizations: BTreeMap<&str, Vec<ImplId>> = BTreeMap::new();

        let mut procedures = BTreeSet::new();
        for procedure in program.procedures() {
            let name = procedure.name.node.as_str();
            if !procedures.insert(name) {
                return Err(ConfigurationError::new(
                    format!("procedure `{name}` is declared more than once"),
                    procedure.name.span,
                ));
            }
        }

        for implementation in program.implementations() {
            let name = &implementation.name.node;
            if graph.by_name.contains_key(name) {
                return Err(ConfigurationError::new(
                    format!("implementation `{name}` is declared more than once"),
                    implementation.name.span,
                ));
            }
            let procedure = &implementation.procedure.node;
            if program.procedure(procedure).is_none() {
                return Err(ConfigurationError::new(
                    format!("implementation `{name}` refers to undeclared procedure `{procedure}`"),
                    implementation.procedure.span,
                ));
            }
            let id = ImplId(graph.nodes.len());
            graph.by_name.insert(name.clone(), id);
            graph.nodes.push(ImplNode {
                name: name.clone(),
                procedure: procedure.clone(),
                span: implementation.span,
            });
            realizations.entry(procedure.as_str()).or_default().push(id);
        }

        graph.successors = vec![Vec::new(); graph.nodes.len()];
        graph.predecessors = vec![Vec::new(); graph.nodes.len()];

        for (caller_idx, implementation) in program.implementations().enumerate() {
            let caller = ImplId(caller_idx);
            for call in implementation.calls() {
                let callee_proc = call.callee.node.as_str();
                if program.procedure(callee_proc).is_none() {
                    return Err(ConfigurationError::new(
                        format!("call to undeclared procedure `{callee_proc}`"),
                        call.callee.span,
                    ));
                }
                // Procedures without implementations contribute no edges.
                for &callee in realizations.get(callee_proc).into_iter().flatten() {
                    graph.add_edge(caller, callee);
                }
            }
        }

        tracing::debug!(
            implementations = graph.nodes.len(),
            edges = graph.edges.len(),
            "built call graph"
        );
        Ok(graph)
    }

    fn add_edge(&mut self, caller: ImplId, callee: ImplId) {
        self.edges.push((caller, callee));
        if !self.successors[caller.0].contains(&callee) {
            self.successors[caller.0].push(callee);
        }
        if !self.predecessors[callee.0].contains(&caller) {
            self.predecessors[callee.0].push(caller);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Implementations in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = ImplId> + '_ {
        (0..self.nodes.len()).map(ImplId)
    }

    pub fn node(&self, id: ImplId) -> &ImplNode {
        &self.nodes[id.0]
    }

    pub fn name(&self, id: ImplId) -> &str {
        &self.nodes[id.0].name
    }

    pub fn id(&self, name: &str) -> Option<ImplId> {
        self.by_name.get(name).copied()
    }

    /// Distinct callees, in first-call order.
    pub fn successors(&self, id: ImplId) -> &[ImplId] {
        &self.successors[id.0]
    }

    /// Distinct callers, in first-call order.
    pub fn predecessors(&self, id: ImplId) -> &[ImplId] {
        &self.predecessors[id.0]
    }

    /// Every call-site realization, including repeats.
    pub fn edges(&self) -> &[(ImplId, ImplId)] {
        &self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
