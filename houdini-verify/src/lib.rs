#![forbid(unsafe_code)]

pub mod model;
pub mod oracle;
pub mod session;

pub use model::{ModelOracle, ModelSession, SessionScript};
pub use oracle::{
    as_binding, Axiom, Counterexample, FaultKind, OracleFault, Outcome, Verdict, VerifierOracle,
    VerifierSession,
};
pub use session::SessionPool;
