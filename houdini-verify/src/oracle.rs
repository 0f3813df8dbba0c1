#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use std::fmt;

use houdini_ast::{Expr, ImplementationDecl, Program, Span};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result of one verification call on a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Correct,
    Errors,
    TimedOut,
    Inconclusive,
    OutOfMemory,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Correct => "Correct",
            Outcome::Errors => "Errors",
            Outcome::TimedOut => "TimedOut",
            Outcome::Inconclusive => "Inconclusive",
            Outcome::OutOfMemory => "OutOfMemory",
        })
    }
}

/// A failing proof obligation reported by the oracle.
#[derive(Clone, Debug, PartialEq)]
pub enum Counterexample {
    /// A callee's `requires` does not hold at a call site.
    Precondition {
        callee: String,
        condition: Expr,
        call_site: Span,
        trace: Vec<String>,
    },
    /// The implementation's own `ensures` does not hold on return.
    Postcondition {
        condition: Expr,
        span: Span,
        trace: Vec<String>,
    },
    Assertion {
        condition: Expr,
        span: Span,
        trace: Vec<String>,
    },
}

impl Counterexample {
    pub fn condition(&self) -> &Expr {
        match self {
            Counterexample::Precondition { condition, .. }
            | Counterexample::Postcondition { condition, .. }
            | Counterexample::Assertion { condition, .. } => condition,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Counterexample::Precondition { call_site, .. } => *call_site,
            Counterexample::Postcondition { span, .. } | Counterexample::Assertion { span, .. } => *span,
        }
    }

    /// Block labels visited on the failing path.
    pub fn trace(&self) -> &[String] {
        match self {
            Counterexample::Precondition { trace, .. }
            | Counterexample::Postcondition { trace, .. }
            | Counterexample::Assertion { trace, .. } => trace,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Counterexample::Precondition { .. } => "precondition violation",
            Counterexample::Postcondition { .. } => "postcondition violation",
            Counterexample::Assertion { .. } => "assertion violation",
        }
    }
}

impl fmt::Display for Counterexample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Counterexample::Precondition { callee, condition, .. } => {
                write!(f, "{} calling `{callee}`: {condition}", self.kind_label())
            }
            _ => write!(f, "{}: {}", self.kind_label(), self.condition()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Verdict {
    pub outcome: Outcome,
    /// Non-empty exactly when `outcome` is `Errors`.
    pub errors: Vec<Counterexample>,
}

impl Verdict {
    pub fn correct() -> Self {
        Self::of(Outcome::Correct)
    }

    pub fn inconclusive() -> Self {
        Self::of(Outcome::Inconclusive)
    }

    pub fn of(outcome: Outcome) -> Self {
        Self {
            outcome,
            errors: Vec::new(),
        }
    }

    /// `Correct` when `errors` is empty, `Errors` otherwise.
    pub fn from_errors(errors: Vec<Counterexample>) -> Self {
        let outcome = if errors.is_empty() {
            Outcome::Correct
        } else {
            Outcome::Errors
        };
        Self { outcome, errors }
    }
}

/// Extra hypothesis pushed onto a session before verification.
#[derive(Clone, Debug, PartialEq)]
pub struct Axiom {
    expr: Expr,
}

impl Axiom {
    pub fn new(expr: Expr) -> Self {
        Self { expr }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Reads back `name == true/false` conjuncts; other conjuncts are ignored.
    pub fn bindings(&self) -> Vec<(&str, bool)> {
        self.expr.conjuncts().into_iter().filter_map(as_binding).collect()
    }
}

/// Matches `name == true` / `name == false`.
pub fn as_binding(expr: &Expr) -> Option<(&str, bool)> {
    use houdini_ast::{BinOp, ExprKind};

    match &expr.kind {
        ExprKind::Binary {
            left,
            op: BinOp::Eq,
            right,
        } => match (&left.kind, &right.kind) {
            (ExprKind::Ident(id), ExprKind::BoolLit(b)) => Some((id.node.as_str(), *b)),
            _ => None,
        },
        _ => None,
    }
}

impl fmt::Display for Axiom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "axiom ({});", self.expr)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultKind {
    /// The verification session is unusable (VC generation failed, session died).
    #[default]
    Session,
    /// The prover answered with something the session could not interpret.
    UnexpectedOutput,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FaultKind::Session => "session fault",
            FaultKind::UnexpectedOutput => "unexpected prover output",
        })
    }
}

#[derive(Debug, Clone, Error, Diagnostic)]
#[error("oracle fault in `{implementation}` ({kind}): {message}")]
#[diagnostic(code(houdini::oracle))]
pub struct OracleFault {
    pub implementation: String,
    pub kind: FaultKind,
    pub message: String,
}

impl OracleFault {
    pub fn session(implementation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            implementation: implementation.into(),
            kind: FaultKind::Session,
            message: message.into(),
        }
    }

    pub fn unexpected_output(implementation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            implementation: implementation.into(),
            kind: FaultKind::UnexpectedOutput,
            message: message.into(),
        }
    }
}

/// One incremental verification session per implementation.
///
/// `push`/`pop` must be balanced; a successful `push` is always followed by
/// a `pop`, whether or not `verify` succeeded.
pub trait VerifierSession {
    fn push(&mut self, axiom: &Axiom) -> Result<(), OracleFault>;

    fn verify(&mut self) -> Result<Verdict, OracleFault>;

    fn pop(&mut self) -> Result<(), OracleFault>;
}

/// Opens verification sessions. Sessions live for the whole lifetime of the
/// inference engine and are reused across runs.
pub trait VerifierOracle {
    type Session: VerifierSession;

    fn open_session(
        &mut self,
        program: &Program,
        implementation: &ImplementationDecl,
    ) -> Result<Self::Session, OracleFault>;
}

impl<S: VerifierSession + ?Sized> VerifierSession for Box<S> {
    fn push(&mut self, axiom: &Axiom) -> Result<(), OracleFault> {
        (**self).push(axiom)
    }

    fn verify(&mut self) -> Result<Verdict, OracleFault> {
        (**self).verify()
    }

    fn pop(&mut self) -> Result<(), OracleFault> {
        (**self).pop()
    }
}
