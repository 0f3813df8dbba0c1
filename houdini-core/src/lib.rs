#![forbid(unsafe_code)]

pub mod assignment;
pub mod call_graph;
pub mod candidates;
pub mod config;
pub mod error;
pub mod houdini;
pub mod observer;
pub mod outcome;
pub mod refutation;
pub mod reporters;
pub mod worklist;

pub use assignment::Assignment;
pub use call_graph::{CallGraph, ImplId, ImplNode};
pub use candidates::{Candidate, CandidateSet, EXISTENTIAL_ATTRIBUTE};
pub use config::{FlushEnd, HoudiniConfig, Schedule};
pub use error::{ConfigurationError, SetupError};
pub use houdini::Houdini;
pub use observer::{Event, EventLog, HoudiniObserver, ObserverBus, RunEnd};
pub use outcome::{OutcomeAggregator, OutcomeRecord, OutcomeStats, RunResult, Termination};
pub use refutation::{classify, classify_verdict, match_candidate, ClassifiedVerdict, Refutation, RefutedAnnotation};
pub use reporters::{IterationTimer, TextReporter, TracingObserver};
pub use worklist::{Blacklist, Worklist};
