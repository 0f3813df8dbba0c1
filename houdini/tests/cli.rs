mod common;

use common::{corpus, houdini, infer_json};

#[test]
fn caller_callee_disables_both_candidates() {
    let (run, json) = infer_json("caller_callee.toml", &[]);
    assert!(run.ok, "{}", run.stderr);
    assert_eq!(json["assignment"]["P_pre"], false);
    assert_eq!(json["assignment"]["P_post"], false);
    assert_eq!(json["termination"], "fixpoint");
    assert_eq!(json["end"], "normal");
    assert_eq!(json["iterations"], 5);
    assert_eq!(json["outcomes"]["Caller"]["attempts"], 3);
}

#[test]
fn surviving_candidate_stays_true_under_manifest_schedule() {
    let (run, json) = infer_json("survivor.toml", &[]);
    assert!(run.ok, "{}", run.stderr);
    assert_eq!(json["assignment"]["Guard"], true);
    assert_eq!(json["assignment"]["Weak"], false);
    assert_eq!(json["stats"]["verified"], 2);
}

#[test]
fn schedule_flag_overrides_manifest() {
    let (run, json) = infer_json("survivor.toml", &["--schedule", "spin"]);
    assert!(run.ok, "{}", run.stderr);
    assert_eq!(json["assignment"]["Guard"], true);
    assert_eq!(json["assignment"]["Weak"], false);
}

#[test]
fn genuine_violation_flushes_and_fails() {
    let (run, json) = infer_json("genuine.toml", &[]);
    assert!(!run.ok);
    assert_eq!(json["termination"], "flushed");
    assert_eq!(json["end"], "abnormal");
    // Flushing does not refine.
    assert_eq!(json["assignment"]["Q"], true);
    assert_eq!(json["errors"], serde_json::json!(["A", "B"]));
    assert_eq!(json["outcomes"]["A"]["genuine_errors"][0]["condition"], "x > 0");
}

#[test]
fn flush_end_flag_changes_reported_end() {
    let (run, json) = infer_json("genuine.toml", &["--flush-end", "normal"]);
    assert!(!run.ok);
    assert_eq!(json["termination"], "flushed");
    assert_eq!(json["end"], "normal");
}

#[test]
fn continue_at_error_refines_past_violations() {
    let (run, json) = infer_json("genuine.toml", &["--continue-at-error"]);
    assert!(!run.ok);
    assert_eq!(json["termination"], "fixpoint");
    assert_eq!(json["assignment"]["Q"], false);
    // B's second query hits the scripted fault.
    assert_eq!(json["outcomes"]["B"]["outcome"], "inconclusive");
    assert_eq!(json["inconclusive"], serde_json::json!(["B"]));
}

#[test]
fn timed_out_implementation_is_listed() {
    let path = corpus("timeout.toml");
    let run = houdini(&["infer", &path.to_string_lossy()]);
    assert!(!run.ok);
    assert!(run.stdout.contains("R = false"), "{}", run.stdout);
    assert!(run.stdout.contains("Functions: TimedOut\nLib\n"), "{}", run.stdout);
}

#[test]
fn trace_flag_logs_events_to_stderr() {
    let path = corpus("caller_callee.toml");
    let run = houdini(&["infer", &path.to_string_lossy(), "--trace"]);
    assert!(run.ok, "{}", run.stderr);
    assert!(run.stderr.contains("Houdini started: #constants: 2"), "{}", run.stderr);
    assert!(run.stderr.contains("implementation under analysis: Callee"), "{}", run.stderr);
    assert!(run.stderr.contains("refuted call: P_pre in Caller calling Callee at offset"), "{}", run.stderr);
    assert!(run.stderr.contains("refuted return: P_post in Callee at offset"), "{}", run.stderr);
    assert!(run.stderr.contains("constant disabled: P_pre"), "{}", run.stderr);
    assert!(run.stderr.contains("Houdini ended: Normal"), "{}", run.stderr);
    assert!(!run.stdout.contains("Houdini iteration"), "{}", run.stdout);
}

#[test]
fn timings_flag_prints_table() {
    let path = corpus("caller_callee.toml");
    let run = houdini(&["infer", &path.to_string_lossy(), "--timings"]);
    assert!(run.ok, "{}", run.stderr);
    assert!(run.stdout.contains("Total implementations: 2"), "{}", run.stdout);
    assert!(run.stdout.contains("Times for Caller:"), "{}", run.stdout);
}

#[test]
fn graph_lists_candidates_and_edges() {
    let path = corpus("caller_callee.toml");
    let run = houdini(&["graph", &path.to_string_lossy()]);
    assert!(run.ok, "{}", run.stderr);
    assert!(run.stdout.contains("candidates (2): P_pre, P_post"), "{}", run.stdout);
    assert!(run.stdout.contains("  Caller -> Callee"), "{}", run.stdout);
}

#[test]
fn non_bool_candidate_is_a_configuration_error() {
    let path = corpus("bad_candidate.toml");
    let run = houdini(&["infer", &path.to_string_lossy()]);
    assert!(!run.ok);
    assert!(run.stderr.contains("houdini::config"), "{}", run.stderr);
    assert!(run.stderr.contains("Counter"), "{}", run.stderr);
    assert!(run.stdout.is_empty(), "{}", run.stdout);
}

#[test]
fn missing_manifest_is_reported() {
    let run = houdini(&["infer", "does/not/exist.toml"]);
    assert!(!run.ok);
    assert!(run.stderr.contains("failed to read"), "{}", run.stderr);
}
