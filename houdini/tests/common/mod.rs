#![allow(dead_code)]

use std::{path::PathBuf, process::Command};

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub ok: bool,
    pub stdout: String,
    pub stderr: String,
}

pub fn corpus(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("corpus")
        .join(name)
}

pub fn houdini(args: &[&str]) -> RunOutcome {
    let output = Command::new(env!("CARGO_BIN_EXE_houdini"))
        .args(args)
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to spawn houdini");
    RunOutcome {
        ok: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}

pub fn infer_json(manifest: &str, extra: &[&str]) -> (RunOutcome, serde_json::Value) {
    let path = corpus(manifest);
    let path = path.to_string_lossy();
    let mut args = vec!["infer", path.as_ref(), "--format", "json"];
    args.extend_from_slice(extra);
    let run = houdini(&args);
    let json = serde_json::from_str(&run.stdout)
        .unwrap_or_else(|e| panic!("invalid JSON ({e}):\n{}\n{}", run.stdout, run.stderr));
    (run, json)
}
