#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use houdini_verify::{Counterexample, Outcome};
use serde::Serialize;

use crate::assignment::Assignment;
use crate::observer::RunEnd;
use crate::refutation::Refutation;

/// Latest verification result for one implementation.
#[derive(Clone, Debug, PartialEq)]
pub struct OutcomeRecord {
    pub outcome: Outcome,
    /// Violations not traceable to any candidate, from the latest round.
    pub genuine_errors: Vec<Counterexample>,
    /// Verification rounds spent on this implementation during the run.
    pub attempts: usize,
    /// Every refutation reported for this implementation, across rounds.
    pub refutations: Vec<Refutation>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Termination {
    /// The worklist drained with refinement active throughout.
    Fixpoint,
    /// A genuine violation stopped refinement and the worklist was flushed.
    Flushed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeStats {
    pub verified: usize,
    pub errors: usize,
    pub inconclusive: usize,
    pub timed_out: usize,
    pub out_of_memory: usize,
}

/// Collects per-implementation records during a run.
#[derive(Clone, Debug, Default)]
pub struct OutcomeAggregator {
    records: BTreeMap<String, OutcomeRecord>,
}

impl OutcomeAggregator {
    /// Replaces the previous outcome and genuine errors; attempts accumulate.
    pub fn record(&mut self, name: &str, outcome: Outcome, genuine_errors: Vec<Counterexample>) {
        let record = self
            .records
            .entry(name.to_string())
            .or_insert_with(|| OutcomeRecord {
                outcome,
                genuine_errors: Vec::new(),
                attempts: 0,
                refutations: Vec::new(),
            });
        record.outcome = outcome;
        record.genuine_errors = genuine_errors;
        record.attempts += 1;
    }

    /// Appends to the refutation history of an already recorded
    /// implementation.
    pub fn refuted(&mut self, name: &str, refutations: &[Refutation]) {
        if let Some(record) = self.records.get_mut(name) {
            record.refutations.extend_from_slice(refutations);
        }
    }

    pub fn get(&self, name: &str) -> Option<&OutcomeRecord> {
        self.records.get(name)
    }

    pub fn finish(
        self,
        assignment: Assignment,
        termination: Termination,
        end: RunEnd,
        iterations: usize,
    ) -> RunResult {
        RunResult {
            assignment,
            outcomes: self.records,
            termination,
            end,
            iterations,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RunResult {
    /// Frozen final assignment.
    pub assignment: Assignment,
    pub outcomes: BTreeMap<String, OutcomeRecord>,
    pub termination: Termination,
    /// What the `end` event reported.
    pub end: RunEnd,
    /// Oracle rounds performed, flush included.
    pub iterations: usize,
}

impl RunResult {
    pub fn outcome(&self, name: &str) -> Option<Outcome> {
        self.outcomes.get(name).map(|r| r.outcome)
    }

    fn names_where(&self, pred: impl Fn(Outcome) -> bool) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, r)| pred(r.outcome))
            .map(|(n, _)| n.as_str())
            .collect()
    }

    pub fn timed_out(&self) -> Vec<&str> {
        self.names_where(|o| o == Outcome::TimedOut)
    }

    /// Inconclusive and out-of-memory implementations.
    pub fn inconclusive(&self) -> Vec<&str> {
        self.names_where(|o| matches!(o, Outcome::Inconclusive | Outcome::OutOfMemory))
    }

    pub fn errors(&self) -> Vec<&str> {
        self.names_where(|o| o == Outcome::Errors)
    }

    pub fn stats(&self) -> OutcomeStats {
        let mut stats = OutcomeStats::default();
        for record in self.outcomes.values() {
            match record.outcome {
                Outcome::Correct => stats.verified += 1,
                Outcome::Errors => stats.errors += 1,
                Outcome::Inconclusive => stats.inconclusive += 1,
                Outcome::TimedOut => stats.timed_out += 1,
                Outcome::OutOfMemory => stats.out_of_memory += 1,
            }
        }
        stats
    }

    /// Reached a fixpoint and every implementation verified.
    pub fn is_clean(&self) -> bool {
        self.termination == Termination::Fixpoint
            && self.outcomes.values().all(|r| r.outcome == Outcome::Correct)
    }
}
