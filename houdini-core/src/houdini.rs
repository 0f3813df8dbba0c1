//! The worklist scheduler.
//!
//! Each round pushes the current assignment as an axiom onto the session of
//! the implementation at the head of the worklist, verifies, and reacts to
//! the outcome. Every round either disables at least one candidate or
//! removes an implementation from the worklist; enqueues only happen on
//! disablement, so a run makes at most `K + N + K * N` oracle calls for `K`
//! candidates and `N` implementations.

#![forbid(unsafe_code)]

use houdini_ast::Program;
use houdini_verify::{Outcome, SessionPool, Verdict, VerifierOracle, VerifierSession};

use crate::assignment::Assignment;
use crate::call_graph::{CallGraph, ImplId};
use crate::candidates::CandidateSet;
use crate::config::{HoudiniConfig, Schedule};
use crate::error::SetupError;
use crate::observer::{ObserverBus, RunEnd};
use crate::outcome::{OutcomeAggregator, RunResult, Termination};
use crate::refutation::{classify_verdict, ClassifiedVerdict, RefutedAnnotation};
use crate::worklist::{Blacklist, Worklist};

/// Inference engine over one program. Candidates, call graph and sessions
/// are fixed at construction; every call to [`Houdini::infer`] is an
/// independent run reusing the same sessions.
pub struct Houdini<S> {
    candidates: CandidateSet,
    call_graph: CallGraph,
    sessions: SessionPool<S>,
    config: HoudiniConfig,
}

/// Mutable state of a single run.
struct RunState {
    assignment: Assignment,
    worklist: Worklist,
    blacklist: Blacklist,
    outcomes: OutcomeAggregator,
    iterations: usize,
}

enum Step {
    /// A candidate was disabled; the implementation stays queued.
    Stay,
    Leave,
    Flush,
}

impl<S: VerifierSession> Houdini<S> {
    pub fn new<O>(program: &Program, oracle: &mut O, config: HoudiniConfig) -> Result<Self, SetupError>
    where
        O: VerifierOracle<Session = S>,
    {
        let candidates = CandidateSet::collect(program)?;
        let call_graph = CallGraph::build(program)?;
        let sessions = SessionPool::open(oracle, program)?;
        Ok(Self {
            candidates,
            call_graph,
            sessions,
            config,
        })
    }

    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    pub fn call_graph(&self) -> &CallGraph {
        &self.call_graph
    }

    pub fn config(&self) -> &HoudiniConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: HoudiniConfig) {
        self.config = config;
    }

    pub fn sessions(&self) -> &SessionPool<S> {
        &self.sessions
    }

    pub fn infer(&mut self) -> RunResult {
        self.infer_observed(&mut ObserverBus::new())
    }

    pub fn infer_observed(&mut self, bus: &mut ObserverBus<'_>) -> RunResult {
        let mut run = RunState {
            assignment: Assignment::all_true(&self.candidates),
            worklist: Worklist::new(self.call_graph.ids()),
            blacklist: Blacklist::default(),
            outcomes: OutcomeAggregator::default(),
            iterations: 0,
        };
        tracing::info!(
            candidates = self.candidates.len(),
            implementations = self.call_graph.len(),
            schedule = ?self.config.schedule,
            continue_at_error = self.config.continue_at_error,
            "houdini run started"
        );
        bus.start(self.candidates.len());

        let mut termination = Termination::Fixpoint;
        'worklist: while let Some(current) = run.worklist.peek() {
            bus.iteration_begin(run.iterations);
            bus.implementation_selected(self.call_graph.name(current));

            loop {
                match self.round(current, &mut run, bus) {
                    Step::Stay => match self.config.schedule {
                        Schedule::Spin => bus.iteration_begin(run.iterations),
                        Schedule::RoundRobin => {
                            run.worklist.rotate();
                            break;
                        }
                    },
                    Step::Leave => {
                        run.worklist.dequeue();
                        bus.dequeue(self.call_graph.name(current));
                        break;
                    }
                    Step::Flush => {
                        run.worklist.dequeue();
                        bus.dequeue(self.call_graph.name(current));
                        self.flush(&mut run, bus);
                        termination = Termination::Flushed;
                        break 'worklist;
                    }
                }
            }
        }

        let end = match termination {
            Termination::Fixpoint => RunEnd::Normal,
            Termination::Flushed => self.config.flush_end.into(),
        };
        bus.end(end, run.iterations);
        run.assignment.freeze();
        tracing::info!(
            iterations = run.iterations,
            remaining = run.assignment.count_true(),
            ?termination,
            "houdini run finished"
        );
        run.outcomes
            .finish(run.assignment, termination, end, run.iterations)
    }

    /// Verifies `id` once under `assignment`. Oracle faults are reported and
    /// become `Inconclusive`, as do `Errors` verdicts without counterexamples.
    fn verify_round(
        &mut self,
        id: ImplId,
        assignment: &Assignment,
        bus: &mut ObserverBus<'_>,
    ) -> ClassifiedVerdict {
        let name = self.call_graph.name(id);
        let axiom = assignment.build_axiom();
        bus.assignment_snapshot(assignment, &axiom);
        tracing::trace!(implementation = name, %axiom, "verifying");

        let verdict = match self.sessions.verify_under(name, &axiom) {
            Ok(verdict) => verdict,
            Err(fault) => {
                tracing::warn!(implementation = name, error = %fault, "oracle fault");
                bus.exception_seen(name, &fault.to_string());
                Verdict::inconclusive()
            }
        };
        if verdict.outcome == Outcome::Errors && verdict.errors.is_empty() {
            tracing::warn!(implementation = name, "errors reported without counterexamples");
            bus.exception_seen(name, "oracle reported errors without counterexamples");
            return classify_verdict(Verdict::inconclusive(), &self.candidates);
        }
        classify_verdict(verdict, &self.candidates)
    }

    fn round(&mut self, current: ImplId, run: &mut RunState, bus: &mut ObserverBus<'_>) -> Step {
        run.iterations += 1;
        let mut verdict = self.verify_round(current, &run.assignment, bus);
        let name = self.call_graph.name(current);

        // Refutations must name an enabled candidate, or the round made no
        // progress and the response is malformed.
        let fresh = verdict
            .refuted
            .iter()
            .any(|r| run.assignment.get(r.constant()) == Some(true));
        if verdict.outcome == Outcome::Errors && !verdict.has_genuine() && !fresh {
            tracing::warn!(implementation = name, "refutations name only disabled candidates");
            bus.exception_seen(name, "oracle refuted only candidates that are already disabled");
            verdict.outcome = Outcome::Inconclusive;
            verdict.refuted.clear();
        }

        tracing::debug!(
            implementation = name,
            outcome = %verdict.outcome,
            refuted = verdict.refuted.len(),
            genuine = verdict.genuine.len(),
            "round finished"
        );
        run.outcomes
            .record(name, verdict.outcome, verdict.genuine.clone());
        bus.outcome_recorded(name, verdict.outcome);

        match verdict.outcome {
            Outcome::Correct => Step::Leave,
            Outcome::Errors => {
                if verdict.has_genuine() && !self.config.continue_at_error {
                    return Step::Flush;
                }
                // Every annotation naming a candidate that fell this round
                // propagates.
                let mut fell: Vec<&str> = Vec::new();
                for refutation in &verdict.refuted {
                    let constant = refutation.constant();
                    bus.candidate_refuted(name, refutation);
                    if run.assignment.disable(constant) {
                        tracing::debug!(constant, annotation = %refutation.annotation, "candidate disabled");
                        bus.candidate_disabled(constant);
                        fell.push(constant);
                    }
                    if fell.contains(&constant) {
                        self.propagate(current, &refutation.annotation, run, bus);
                    }
                }
                run.outcomes.refuted(name, &verdict.refuted);
                let progressed = !fell.is_empty();
                if progressed && !verdict.has_genuine() {
                    Step::Stay
                } else {
                    Step::Leave
                }
            }
            Outcome::TimedOut => {
                tracing::debug!(implementation = name, "blacklisted after timeout");
                run.blacklist.insert(current);
                Step::Leave
            }
            Outcome::Inconclusive | Outcome::OutOfMemory => Step::Leave,
        }
    }

    /// Single-hop enqueue of the implementations affected by `annotation`.
    fn propagate(
        &self,
        current: ImplId,
        annotation: &RefutedAnnotation,
        run: &mut RunState,
        bus: &mut ObserverBus<'_>,
    ) {
        let graph = &self.call_graph;
        let targets: Vec<ImplId> = match annotation {
            RefutedAnnotation::Requires { callee, .. } => graph
                .successors(current)
                .iter()
                .copied()
                .filter(|id| graph.node(*id).procedure == *callee)
                .collect(),
            RefutedAnnotation::Ensures { .. } => graph.predecessors(current).to_vec(),
            RefutedAnnotation::Assert { .. } => Vec::new(),
        };
        for target in targets {
            if run.worklist.enqueue(target, &run.blacklist) {
                tracing::debug!(implementation = graph.name(target), "enqueued");
                bus.enqueue(graph.name(target));
            }
        }
    }

    /// Verifies everything still queued once, under the frozen assignment.
    fn flush(&mut self, run: &mut RunState, bus: &mut ObserverBus<'_>) {
        run.assignment.freeze();
        tracing::info!(remaining = run.worklist.len(), "flushing worklist");
        bus.flush_begin();

        while let Some(id) = run.worklist.peek() {
            bus.iteration_begin(run.iterations);
            bus.implementation_selected(self.call_graph.name(id));
            run.iterations += 1;

            let verdict = self.verify_round(id, &run.assignment, bus);
            let name = self.call_graph.name(id);
            run.outcomes.record(name, verdict.outcome, verdict.genuine);
            bus.outcome_recorded(name, verdict.outcome);

            run.worklist.dequeue();
            bus.dequeue(name);
        }

        bus.flush_end();
    }
}
