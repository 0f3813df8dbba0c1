#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use houdini_ast::Program;

use crate::oracle::{Axiom, OracleFault, Verdict, VerifierOracle, VerifierSession};

/// Long-lived sessions, one per implementation, opened once up front.
pub struct SessionPool<S> {
    sessions: BTreeMap<String, S>,
}

impl<S: VerifierSession> SessionPool<S> {
    /// Opens a session for every implementation in declaration order. The
    /// first fault aborts setup.
    pub fn open<O>(oracle: &mut O, program: &Program) -> Result<Self, OracleFault>
    where
        O: VerifierOracle<Session = S>,
    {
        let mut sessions = BTreeMap::new();
        for implementation in program.implementations() {
            tracing::debug!(implementation = %implementation.name.node, "opening verifier session");
            let session = oracle.open_session(program, implementation)?;
            sessions.insert(implementation.name.node.clone(), session);
        }
        Ok(Self { sessions })
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn session(&self, implementation: &str) -> Option<&S> {
        self.sessions.get(implementation)
    }

    pub fn session_mut(&mut self, implementation: &str) -> Option<&mut S> {
        self.sessions.get_mut(implementation)
    }

    /// Runs one verification of `implementation` under `axiom`.
    ///
    /// A successful push is always popped, also when `verify` faults. A
    /// failed push is not popped.
    pub fn verify_under(&mut self, implementation: &str, axiom: &Axiom) -> Result<Verdict, OracleFault> {
        let session = self
            .sessions
            .get_mut(implementation)
            .ok_or_else(|| OracleFault::session(implementation, "no session was opened"))?;

        session.push(axiom)?;
        let mut scope = PushedScope {
            session,
            popped: false,
        };
        let verdict = scope.session.verify();
        let popped = scope.pop();

        match (verdict, popped) {
            (Ok(verdict), Ok(())) => Ok(verdict),
            (Err(fault), _) => Err(fault),
            (Ok(_), Err(fault)) => Err(fault),
        }
    }
}

/// Pops on drop if the scope was left without an explicit `pop` (unwinding).
struct PushedScope<'s, S: VerifierSession> {
    session: &'s mut S,
    popped: bool,
}

impl<S: VerifierSession> PushedScope<'_, S> {
    fn pop(&mut self) -> Result<(), OracleFault> {
        self.popped = true;
        self.session.pop()
    }
}

impl<S: VerifierSession> Drop for PushedScope<'_, S> {
    fn drop(&mut self) {
        if !self.popped {
            let _ = self.session.pop();
        }
    }
}
