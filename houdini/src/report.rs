#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::io::{self, Write};

use houdini_core::{OutcomeStats, Refutation, RefutedAnnotation, RunEnd, RunResult, Termination};
use houdini_verify::{Counterexample, Outcome};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct InferenceReport {
    pub schema: &'static str,
    pub input: String,
    pub ok: bool,
    pub termination: Termination,
    pub end: RunEnd,
    pub iterations: usize,
    pub assignment: BTreeMap<String, bool>,
    pub outcomes: BTreeMap<String, ImplementationReport>,
    pub stats: OutcomeStats,
    pub timed_out: Vec<String>,
    pub inconclusive: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImplementationReport {
    pub outcome: Outcome,
    pub attempts: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub genuine_errors: Vec<ViolationReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub refuted: Vec<RefutationReport>,
}

/// Why a candidate fell: the annotation kind, its constant and where the
/// oracle disproved it.
#[derive(Debug, Clone, Serialize)]
pub struct RefutationReport {
    #[serde(flatten)]
    pub annotation: RefutedAnnotation,
    pub offset: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
}

impl From<&Refutation> for RefutationReport {
    fn from(r: &Refutation) -> Self {
        Self {
            annotation: r.annotation.clone(),
            offset: r.offset(),
            trace: r.counterexample.trace().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ViolationReport {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callee: Option<String>,
    pub condition: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
}

impl From<&Counterexample> for ViolationReport {
    fn from(cex: &Counterexample) -> Self {
        let callee = match cex {
            Counterexample::Precondition { callee, .. } => Some(callee.clone()),
            _ => None,
        };
        Self {
            kind: cex.kind_label(),
            callee,
            condition: cex.condition().to_string(),
            trace: cex.trace().to_vec(),
        }
    }
}

fn owned(names: Vec<&str>) -> Vec<String> {
    names.into_iter().map(str::to_string).collect()
}

impl InferenceReport {
    pub fn new(input: &str, result: &RunResult) -> Self {
        let outcomes = result
            .outcomes
            .iter()
            .map(|(name, record)| {
                let report = ImplementationReport {
                    outcome: record.outcome,
                    attempts: record.attempts,
                    genuine_errors: record.genuine_errors.iter().map(ViolationReport::from).collect(),
                    refuted: record.refutations.iter().map(RefutationReport::from).collect(),
                };
                (name.clone(), report)
            })
            .collect();
        Self {
            schema: "houdini.inference.v1",
            input: input.to_string(),
            ok: result.is_clean(),
            termination: result.termination,
            end: result.end,
            iterations: result.iterations,
            assignment: result
                .assignment
                .iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
            outcomes,
            stats: result.stats(),
            timed_out: owned(result.timed_out()),
            inconclusive: owned(result.inconclusive()),
            errors: owned(result.errors()),
        }
    }
}

/// Human-readable summary: final assignment, per-implementation outcomes,
/// then the bad-outcome lists.
pub fn print_text(out: &mut impl Write, result: &RunResult) -> io::Result<()> {
    writeln!(out, "Assignment computed by Houdini:")?;
    for (name, value) in result.assignment.iter() {
        writeln!(out, "{name} = {value}")?;
    }
    writeln!(out)?;
    for (name, record) in &result.outcomes {
        writeln!(out, "{name}: {} ({} attempts)", record.outcome, record.attempts)?;
        for cex in &record.genuine_errors {
            writeln!(out, "  {cex}")?;
        }
        for refutation in &record.refutations {
            writeln!(out, "  refuted {}", refutation.annotation)?;
        }
    }
    writeln!(out)?;

    let stats = result.stats();
    writeln!(out, "Number of true assignments = {}", result.assignment.count_true())?;
    writeln!(
        out,
        "Number of false assignments = {}",
        result.assignment.len() - result.assignment.count_true()
    )?;
    writeln!(out, "Number of prover queries = {}", result.iterations)?;
    writeln!(
        out,
        "Verified: {}, errors: {}, inconclusive: {}, timed out: {}, out of memory: {}",
        stats.verified, stats.errors, stats.inconclusive, stats.timed_out, stats.out_of_memory
    )?;

    print_bad_list(out, "TimedOut", &result.timed_out())?;
    print_bad_list(out, "Inconclusive", &result.inconclusive())?;
    print_bad_list(out, "Errors", &result.errors())?;

    if result.termination == Termination::Flushed {
        writeln!(out, "Refinement stopped at a genuine violation; remaining implementations were flushed.")?;
    }
    Ok(())
}

fn print_bad_list(out: &mut impl Write, kind: &str, names: &[&str]) -> io::Result<()> {
    if names.is_empty() {
        return Ok(());
    }
    writeln!(out, "----------------------------------------")?;
    writeln!(out, "Functions: {kind}")?;
    for name in names {
        writeln!(out, "{name}")?;
    }
    writeln!(out, "----------------------------------------")
}
