//! A deterministic verifier over the program model.
//!
//! Facts are kept as canonical expression text. Implications whose premise is
//! not yet known are parked and fire once the premise becomes provable. This
//! is enough to discharge candidate-guarded contracts without a theorem
//! prover; anything it cannot prove counts as a failing obligation.

#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use houdini_ast::{BinOp, Cmd, ExprKind, Expr, ImplementationDecl, ProcedureDecl, Program, UnaryOp};
use serde::Deserialize;

use crate::oracle::{
    as_binding, Axiom, Counterexample, FaultKind, OracleFault, Outcome, Verdict, VerifierOracle,
    VerifierSession,
};

/// Per-implementation overrides used to exercise non-`Correct` paths.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SessionScript {
    /// Reported instead of evaluating the body.
    #[serde(default)]
    pub forced: Option<Outcome>,
    /// 1-based `verify` call that raises a fault.
    #[serde(default)]
    pub fault_on_attempt: Option<usize>,
    #[serde(default)]
    pub fault_kind: FaultKind,
}

impl SessionScript {
    pub fn forced(outcome: Outcome) -> Self {
        Self {
            forced: Some(outcome),
            ..Self::default()
        }
    }

    pub fn fault_on(attempt: usize, kind: FaultKind) -> Self {
        Self {
            fault_on_attempt: Some(attempt),
            fault_kind: kind,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ModelOracle {
    scripts: BTreeMap<String, SessionScript>,
}

impl ModelOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(mut self, implementation: impl Into<String>, script: SessionScript) -> Self {
        self.set_script(implementation, script);
        self
    }

    pub fn set_script(&mut self, implementation: impl Into<String>, script: SessionScript) {
        self.scripts.insert(implementation.into(), script);
    }

    pub fn script(&self, implementation: &str) -> Option<&SessionScript> {
        self.scripts.get(implementation)
    }
}

impl VerifierOracle for ModelOracle {
    type Session = ModelSession;

    fn open_session(
        &mut self,
        program: &Program,
        implementation: &ImplementationDecl,
    ) -> Result<ModelSession, OracleFault> {
        let name = &implementation.name.node;
        let procedure = program
            .procedure(&implementation.procedure.node)
            .ok_or_else(|| {
                OracleFault::session(
                    name.as_str(),
                    format!("procedure `{}` is not declared", implementation.procedure.node),
                )
            })?
            .clone();

        let mut callees = BTreeMap::new();
        for call in implementation.calls() {
            let callee = program.procedure(&call.callee.node).ok_or_else(|| {
                OracleFault::session(
                    name.as_str(),
                    format!("call to undeclared procedure `{}`", call.callee.node),
                )
            })?;
            callees.insert(call.callee.node.clone(), callee.clone());
        }

        Ok(ModelSession {
            implementation: implementation.clone(),
            procedure,
            callees,
            script: self.scripts.get(name).cloned().unwrap_or_default(),
            stack: Vec::new(),
            verify_calls: 0,
            pushes: 0,
        })
    }
}

pub struct ModelSession {
    implementation: ImplementationDecl,
    procedure: ProcedureDecl,
    callees: BTreeMap<String, ProcedureDecl>,
    script: SessionScript,
    stack: Vec<Axiom>,
    verify_calls: usize,
    pushes: usize,
}

impl ModelSession {
    pub fn name(&self) -> &str {
        &self.implementation.name.node
    }

    /// Axioms currently pushed.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls
    }

    pub fn pushes(&self) -> usize {
        self.pushes
    }

    fn evaluate(&self) -> Verdict {
        let mut facts = Facts::default();
        let hypotheses: Vec<&Expr> = self.stack.iter().flat_map(|a| a.expr().conjuncts()).collect();
        for h in &hypotheses {
            if let Some((name, value)) = as_binding(h) {
                facts.bindings.insert(name.to_string(), value);
            }
        }
        for h in hypotheses.into_iter().filter(|h| as_binding(h).is_none()) {
            facts.assume(h);
        }
        for r in &self.procedure.requires {
            facts.assume(&r.condition);
        }

        let mut errors = Vec::new();
        let mut trace = Vec::new();
        for block in &self.implementation.blocks {
            trace.push(block.label.node.clone());
            for cmd in &block.cmds {
                match cmd {
                    Cmd::Assume(p) => facts.assume(&p.expr),
                    Cmd::Assert(p) => {
                        if !facts.holds(&p.expr) {
                            errors.push(Counterexample::Assertion {
                                condition: p.expr.clone(),
                                span: p.span,
                                trace: trace.clone(),
                            });
                        }
                        facts.assume(&p.expr);
                    }
                    Cmd::Call(call) => {
                        // Resolved when the session was opened.
                        let Some(callee) = self.callees.get(&call.callee.node) else {
                            continue;
                        };
                        for r in &callee.requires {
                            if !r.free && !facts.holds(&r.condition) {
                                errors.push(Counterexample::Precondition {
                                    callee: call.callee.node.clone(),
                                    condition: r.condition.clone(),
                                    call_site: call.span,
                                    trace: trace.clone(),
                                });
                            }
                            facts.assume(&r.condition);
                        }
                        for e in &callee.ensures {
                            facts.assume(&e.condition);
                        }
                    }
                }
            }
        }

        for e in self.procedure.ensures.iter().filter(|e| !e.free) {
            if !facts.holds(&e.condition) {
                errors.push(Counterexample::Postcondition {
                    condition: e.condition.clone(),
                    span: e.span,
                    trace: trace.clone(),
                });
            }
        }

        Verdict::from_errors(errors)
    }
}

impl VerifierSession for ModelSession {
    fn push(&mut self, axiom: &Axiom) -> Result<(), OracleFault> {
        self.pushes += 1;
        self.stack.push(axiom.clone());
        Ok(())
    }

    fn verify(&mut self) -> Result<Verdict, OracleFault> {
        self.verify_calls += 1;
        tracing::trace!(
            implementation = %self.name(),
            attempt = self.verify_calls,
            depth = self.stack.len(),
            "model verification"
        );

        if self.script.fault_on_attempt == Some(self.verify_calls) {
            let message = format!("scripted fault on attempt {}", self.verify_calls);
            return Err(OracleFault {
                implementation: self.name().to_string(),
                kind: self.script.fault_kind,
                message,
            });
        }
        if let Some(outcome) = self.script.forced {
            return Ok(Verdict::of(outcome));
        }
        Ok(self.evaluate())
    }

    fn pop(&mut self) -> Result<(), OracleFault> {
        match self.stack.pop() {
            Some(_) => Ok(()),
            None => Err(OracleFault::session(self.name(), "pop without a matching push")),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct Facts {
    bindings: BTreeMap<String, bool>,
    known: BTreeSet<String>,
    /// Implications whose premise is still undecided.
    pending: Vec<(Expr, Expr)>,
    /// Set once `false` was assumed; every obligation then holds.
    unreachable: bool,
}

impl Facts {
    fn assume(&mut self, e: &Expr) {
        match &e.kind {
            ExprKind::BoolLit(true) => {}
            ExprKind::BoolLit(false) => self.unreachable = true,
            ExprKind::Binary {
                left,
                op: BinOp::And,
                right,
            } => {
                self.assume(left);
                self.assume(right);
            }
            ExprKind::Binary {
                left,
                op: BinOp::Implies,
                right,
            } => match self.eval(left) {
                Some(true) => self.assume(right),
                Some(false) => {}
                None => self.pending.push(((**left).clone(), (**right).clone())),
            },
            _ => {
                if let Some((name, value)) = as_binding(e) {
                    if self.bindings.get(name).is_some_and(|v| *v != value) {
                        self.unreachable = true;
                    }
                }
                if self.known.insert(e.to_string()) {
                    self.fire_pending();
                }
            }
        }
    }

    fn fire_pending(&mut self) {
        while let Some(idx) = self.pending.iter().position(|(a, _)| self.eval(a) == Some(true)) {
            let (_, conclusion) = self.pending.remove(idx);
            self.assume(&conclusion);
        }
    }

    fn holds(&self, e: &Expr) -> bool {
        if self.unreachable {
            return true;
        }
        if let Some((premise, conclusion)) = e.as_implication() {
            if self.eval(premise) == Some(false) {
                return true;
            }
            let mut hypothetical = self.clone();
            hypothetical.assume(premise);
            return hypothetical.holds(conclusion);
        }
        self.eval(e) == Some(true)
    }

    /// Three-valued evaluation; `None` when the facts do not decide `e`.
    fn eval(&self, e: &Expr) -> Option<bool> {
        match &e.kind {
            ExprKind::BoolLit(b) => Some(*b),
            ExprKind::Ident(id) => self
                .bindings
                .get(&id.node)
                .copied()
                .or_else(|| self.lookup(e)),
            ExprKind::Atom(_) => self.lookup(e),
            ExprKind::Unary {
                op: UnaryOp::Not,
                expr,
            } => self.lookup(e).or_else(|| self.eval(expr).map(|v| !v)),
            ExprKind::Binary { left, op, right } => {
                if self.known.contains(&e.to_string()) {
                    return Some(true);
                }
                let l = self.eval(left);
                let r = self.eval(right);
                match op {
                    BinOp::And => match (l, r) {
                        (Some(false), _) | (_, Some(false)) => Some(false),
                        (Some(true), Some(true)) => Some(true),
                        _ => None,
                    },
                    BinOp::Or => match (l, r) {
                        (Some(true), _) | (_, Some(true)) => Some(true),
                        (Some(false), Some(false)) => Some(false),
                        _ => None,
                    },
                    BinOp::Implies => match (l, r) {
                        (Some(false), _) | (_, Some(true)) => Some(true),
                        (Some(true), Some(false)) => Some(false),
                        _ => None,
                    },
                    BinOp::Eq => Some(l? == r?),
                }
            }
        }
    }

    fn lookup(&self, e: &Expr) -> Option<bool> {
        if self.known.contains(&e.to_string()) {
            Some(true)
        } else if self.known.contains(&Expr::not(e.clone()).to_string()) {
            Some(false)
        } else {
            None
        }
    }
}
