use houdini_core::{Event, FlushEnd, HoudiniConfig, RefutedAnnotation, RunEnd, Schedule, Termination};
use houdini_verify::{FaultKind, ModelOracle, Outcome, SessionScript};

mod common;
use common::engine_util::{engine, run_logged, run_manifest, sessions_balanced, total_verify_calls};

const CALLER_CALLEE: &str = r#"
[[constant]]
name = "P_pre"
existential = true

[[constant]]
name = "P_post"
existential = true

[[procedure]]
name = "Callee"
requires = ["P_pre ==> x > 0"]
ensures = ["P_post ==> r > 0"]

[[procedure]]
name = "Caller"

[[implementation]]
procedure = "Caller"
body = ["call Callee"]

[[implementation]]
procedure = "Callee"
body = ["assume x > 0 ==> r > 0"]
"#;

/// A fails unconditionally; B carries a refutable assertion; C is fine.
const GENUINE_FIRST: &str = r#"
[[constant]]
name = "Q"
existential = true

[[procedure]]
name = "A"

[[procedure]]
name = "B"

[[procedure]]
name = "C"

[[implementation]]
procedure = "A"
body = ["assert x > 0"]

[[implementation]]
procedure = "B"
body = ["assert Q ==> y > 0"]

[[implementation]]
procedure = "C"
body = ["assume z", "assert z"]
"#;

#[test]
fn caller_callee_scenario_event_order() {
    let (result, log) = run_manifest(CALLER_CALLEE, &mut ModelOracle::new(), HoudiniConfig::default());

    let snapshots: Vec<Vec<(String, bool)>> = log
        .events
        .iter()
        .filter_map(|e| match e {
            Event::AssignmentSnapshot { assignment } => Some(assignment.clone()),
            _ => None,
        })
        .collect();
    let pair = |a: bool, b: bool| vec![("P_pre".to_string(), a), ("P_post".to_string(), b)];
    assert_eq!(
        snapshots,
        vec![pair(true, true), pair(false, true), pair(false, true), pair(false, false), pair(false, false)]
    );
    assert_eq!(
        log.outcomes(),
        vec![
            ("Caller", Outcome::Errors),
            ("Caller", Outcome::Correct),
            ("Callee", Outcome::Errors),
            ("Callee", Outcome::Correct),
            ("Caller", Outcome::Correct),
        ]
    );
    assert_eq!(result.outcomes["Caller"].attempts, 3);
    assert_eq!(result.outcomes["Callee"].attempts, 2);
    assert!(matches!(log.events.first(), Some(Event::Start { candidates: 2 })));
    assert!(matches!(
        log.events.last(),
        Some(Event::End {
            end: RunEnd::Normal,
            iterations: 5
        })
    ));
}

#[test]
fn genuine_violation_flushes_under_frozen_assignment() {
    let mut houdini = engine(GENUINE_FIRST, &mut ModelOracle::new(), HoudiniConfig::default());
    let (result, log) = run_logged(&mut houdini);

    assert_eq!(result.termination, Termination::Flushed);
    assert_eq!(result.end, RunEnd::Abnormal);
    assert!(result.assignment.is_frozen());
    // B's refutation arrives during the flush and is not applied.
    assert_eq!(result.assignment.get("Q"), Some(true));
    assert_eq!(result.outcome("A"), Some(Outcome::Errors));
    assert_eq!(result.outcome("B"), Some(Outcome::Errors));
    assert_eq!(result.outcome("C"), Some(Outcome::Correct));
    assert_eq!(result.errors(), vec!["A", "B"]);
    assert_eq!(result.outcomes["A"].genuine_errors.len(), 1);
    assert!(result.outcomes["B"].genuine_errors.is_empty());

    let flush_start = log
        .events
        .iter()
        .position(|e| *e == Event::FlushBegin)
        .unwrap();
    let flushed: Vec<&Event> = log.events[flush_start..]
        .iter()
        .filter(|e| matches!(e, Event::ImplementationSelected { .. }))
        .collect();
    assert_eq!(flushed.len(), 2);
    assert!(log.disabled().is_empty());
    assert_eq!(total_verify_calls(&houdini), 3);
    assert!(sessions_balanced(&houdini));
}

#[test]
fn flush_end_can_report_normal() {
    let config = HoudiniConfig::default().flush_end(FlushEnd::Normal);
    let (result, log) = run_manifest(GENUINE_FIRST, &mut ModelOracle::new(), config);
    assert_eq!(result.termination, Termination::Flushed);
    assert_eq!(result.end, RunEnd::Normal);
    assert!(matches!(log.events.last(), Some(Event::End { end: RunEnd::Normal, .. })));
    assert!(!result.is_clean());
}

#[test]
fn continue_at_error_keeps_refining() {
    let config = HoudiniConfig::default().continue_at_error(true);
    let (result, log) = run_manifest(GENUINE_FIRST, &mut ModelOracle::new(), config);

    assert_eq!(result.termination, Termination::Fixpoint);
    assert_eq!(result.end, RunEnd::Normal);
    assert_eq!(result.assignment.get("Q"), Some(false));
    assert_eq!(result.outcome("B"), Some(Outcome::Correct));
    assert_eq!(result.errors(), vec!["A"]);
    assert!(!log.events.contains(&Event::FlushBegin));
    // Assertion refutations re-verify in place without enqueueing anything.
    assert!(log.enqueued().is_empty());
    assert_eq!(log.selected(), vec!["A", "B", "C"]);
}

#[test]
fn requires_refutation_enqueues_matching_callees_only() {
    let src = r#"
[[constant]]
name = "R"
existential = true

[[procedure]]
name = "Sort"
requires = ["R ==> n > 0"]

[[procedure]]
name = "Helper"

[[procedure]]
name = "Main"

[[implementation]]
name = "QuickSort"
procedure = "Sort"

[[implementation]]
name = "MergeSort"
procedure = "Sort"

[[implementation]]
procedure = "Helper"

[[implementation]]
procedure = "Main"
body = ["call Helper", "call Sort"]
"#;
    let (result, log) = run_manifest(src, &mut ModelOracle::new(), HoudiniConfig::default());
    assert_eq!(log.disabled(), vec!["R"]);
    assert_eq!(log.enqueued(), vec!["QuickSort", "MergeSort"]);
    assert_eq!(
        log.selected(),
        vec!["QuickSort", "MergeSort", "Helper", "Main", "QuickSort", "MergeSort"]
    );
    assert!(result.is_clean());
}

#[test]
fn ensures_refutation_enqueues_callers() {
    let src = r#"
[[constant]]
name = "E"
existential = true

[[procedure]]
name = "Lib"
ensures = ["E ==> ok"]

[[procedure]]
name = "A"

[[procedure]]
name = "B"

[[procedure]]
name = "C"

[[implementation]]
procedure = "A"
body = ["call Lib"]

[[implementation]]
procedure = "B"
body = ["call Lib", "call Lib"]

[[implementation]]
procedure = "C"

[[implementation]]
procedure = "Lib"
"#;
    let (result, log) = run_manifest(src, &mut ModelOracle::new(), HoudiniConfig::default());
    assert_eq!(log.disabled(), vec!["E"]);
    assert_eq!(log.enqueued(), vec!["A", "B"]);
    assert_eq!(result.assignment.get("E"), Some(false));
    assert!(result.is_clean());
}

/// X guards both Lib's precondition and Mid's postcondition; Mid refutes
/// both in one round.
const SHARED_GUARD: &str = r#"
[[constant]]
name = "X"
existential = true

[[procedure]]
name = "Lib"
requires = ["X ==> n > 0"]

[[procedure]]
name = "Mid"
ensures = ["X ==> r > 0"]

[[procedure]]
name = "Top"

[[implementation]]
procedure = "Top"
body = ["call Mid", "assert r > 0"]

[[implementation]]
procedure = "Mid"
body = ["call Lib"]

[[implementation]]
procedure = "Lib"
"#;

#[test]
fn every_refuted_annotation_of_a_fallen_candidate_propagates() {
    let (result, log) = run_manifest(SHARED_GUARD, &mut ModelOracle::new(), HoudiniConfig::default());

    assert_eq!(
        log.refuted(),
        vec![
            &RefutedAnnotation::Requires {
                constant: "X".into(),
                callee: "Lib".into()
            },
            &RefutedAnnotation::Ensures { constant: "X".into() },
        ]
    );
    assert_eq!(log.disabled(), vec!["X"]);
    // Lib is still queued; Top had already left and comes back.
    assert_eq!(log.enqueued(), vec!["Top"]);
    assert_eq!(log.selected(), vec!["Top", "Mid", "Lib", "Top"]);

    assert_eq!(result.assignment.get("X"), Some(false));
    assert_eq!(result.outcome("Mid"), Some(Outcome::Correct));
    assert_eq!(result.outcome("Lib"), Some(Outcome::Correct));
    // Without X, Mid no longer promises `r > 0`.
    assert_eq!(result.outcome("Top"), Some(Outcome::Errors));
    assert_eq!(result.outcomes["Top"].genuine_errors[0].condition().to_string(), "r > 0");
    assert_eq!(result.termination, Termination::Flushed);
    assert_eq!(result.iterations, 5);
    assert_eq!(result.outcomes["Mid"].refutations.len(), 2);
}

#[test]
fn timed_out_implementation_is_never_selected_again() {
    let src = r#"
[[constant]]
name = "R"
existential = true

[[procedure]]
name = "Lib"
requires = ["R ==> n > 0"]

[[procedure]]
name = "Main"

[[implementation]]
procedure = "Lib"

[[implementation]]
procedure = "Main"
body = ["call Lib"]
"#;
    let mut oracle = ModelOracle::new().with_script("Lib", SessionScript::forced(Outcome::TimedOut));
    let (result, log) = run_manifest(src, &mut oracle, HoudiniConfig::default());

    assert_eq!(log.disabled(), vec!["R"]);
    assert!(log.enqueued().is_empty());
    assert_eq!(log.selected(), vec!["Lib", "Main"]);
    assert_eq!(result.timed_out(), vec!["Lib"]);
    assert_eq!(result.outcomes["Lib"].attempts, 1);
    assert_eq!(result.termination, Termination::Fixpoint);
    assert!(!result.is_clean());
}

#[test]
fn oracle_fault_becomes_inconclusive_and_run_continues() {
    let mut oracle =
        ModelOracle::new().with_script("Callee", SessionScript::fault_on(1, FaultKind::UnexpectedOutput));
    let mut houdini = engine(CALLER_CALLEE, &mut oracle, HoudiniConfig::default());
    let (result, log) = run_logged(&mut houdini);

    assert_eq!(log.exceptions(), 1);
    assert!(sessions_balanced(&houdini));
    assert_eq!(result.outcome("Caller"), Some(Outcome::Correct));
    assert_eq!(result.outcome("Callee"), Some(Outcome::Inconclusive));
    assert_eq!(result.inconclusive(), vec!["Callee"]);
    // The faulted round refuted nothing.
    assert_eq!(result.assignment.get("P_pre"), Some(false));
    assert_eq!(result.assignment.get("P_post"), Some(true));
    assert_eq!(result.termination, Termination::Fixpoint);
    assert_eq!(log.selected(), vec!["Caller", "Callee"]);
}

#[test]
fn errors_without_counterexamples_are_malformed() {
    let mut oracle = ModelOracle::new().with_script("Caller", SessionScript::forced(Outcome::Errors));
    let (result, log) = run_manifest(CALLER_CALLEE, &mut oracle, HoudiniConfig::default());

    assert_eq!(result.outcome("Caller"), Some(Outcome::Inconclusive));
    assert_eq!(result.inconclusive(), vec!["Caller"]);
    assert!(log.exceptions() >= 1);
    assert_eq!(result.termination, Termination::Fixpoint);
}

#[test]
fn out_of_memory_is_reported_as_inconclusive() {
    let mut oracle = ModelOracle::new().with_script("Callee", SessionScript::forced(Outcome::OutOfMemory));
    let (result, _) = run_manifest(CALLER_CALLEE, &mut oracle, HoudiniConfig::default());
    assert_eq!(result.outcome("Callee"), Some(Outcome::OutOfMemory));
    assert_eq!(result.inconclusive(), vec!["Callee"]);
    assert_eq!(result.stats().out_of_memory, 1);
}

#[test]
fn no_candidates_means_one_call_per_implementation() {
    let src = r#"
[[constant]]
name = "K"

[[procedure]]
name = "A"

[[procedure]]
name = "B"
ensures = ["done"]

[[procedure]]
name = "C"

[[implementation]]
procedure = "A"

[[implementation]]
procedure = "B"

[[implementation]]
procedure = "C"
body = ["call B"]
"#;
    for continue_at_error in [false, true] {
        let config = HoudiniConfig::default().continue_at_error(continue_at_error);
        let mut houdini = engine(src, &mut ModelOracle::new(), config);
        let (result, _) = run_logged(&mut houdini);
        assert!(result.assignment.is_empty());
        assert_eq!(total_verify_calls(&houdini), 3);
        assert_eq!(result.outcome("A"), Some(Outcome::Correct));
        assert_eq!(result.outcome("B"), Some(Outcome::Errors));
        assert_eq!(result.outcome("C"), Some(Outcome::Correct));
    }
}

#[test]
fn round_robin_reaches_the_same_fixpoint() {
    let spin = run_manifest(CALLER_CALLEE, &mut ModelOracle::new(), HoudiniConfig::default()).0;
    let config = HoudiniConfig::default().schedule(Schedule::RoundRobin);
    let (rr, log) = run_manifest(CALLER_CALLEE, &mut ModelOracle::new(), config);

    assert_eq!(spin.assignment, rr.assignment);
    assert_eq!(spin.outcomes.keys().collect::<Vec<_>>(), rr.outcomes.keys().collect::<Vec<_>>());
    assert!(rr.is_clean());
    // Caller is rotated behind Callee after its first refutation.
    assert_eq!(&log.selected()[..2], &["Caller", "Callee"]);
}
