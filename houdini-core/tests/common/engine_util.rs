use houdini_core::{EventLog, Houdini, HoudiniConfig, ObserverBus, RunResult};
use houdini_verify::{ModelOracle, ModelSession};

pub fn engine(src: &str, oracle: &mut ModelOracle, config: HoudiniConfig) -> Houdini<ModelSession> {
    let program = houdini_parse::parse_manifest(src).unwrap();
    Houdini::new(&program, oracle, config).unwrap()
}

pub fn run_logged(houdini: &mut Houdini<ModelSession>) -> (RunResult, EventLog) {
    let mut log = EventLog::new();
    let result = {
        let mut bus = ObserverBus::new();
        bus.register(&mut log);
        houdini.infer_observed(&mut bus)
    };
    (result, log)
}

pub fn run_manifest(src: &str, oracle: &mut ModelOracle, config: HoudiniConfig) -> (RunResult, EventLog) {
    let mut houdini = engine(src, oracle, config);
    run_logged(&mut houdini)
}

/// Sum of `verify` calls across every session of the engine.
pub fn total_verify_calls(houdini: &Houdini<ModelSession>) -> usize {
    houdini
        .call_graph()
        .ids()
        .filter_map(|id| houdini.sessions().session(houdini.call_graph().name(id)))
        .map(|s| s.verify_calls())
        .sum()
}

pub fn sessions_balanced(houdini: &Houdini<ModelSession>) -> bool {
    houdini
        .call_graph()
        .ids()
        .filter_map(|id| houdini.sessions().session(houdini.call_graph().name(id)))
        .all(|s| s.depth() == 0)
}
