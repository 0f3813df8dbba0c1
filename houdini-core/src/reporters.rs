#![forbid(unsafe_code)]

use std::io::{self, Write};
use std::time::{Duration, Instant};

use houdini_verify::{Axiom, Outcome};

use crate::assignment::Assignment;
use crate::observer::{HoudiniObserver, RunEnd};
use crate::refutation::{Refutation, RefutedAnnotation};

const RULE: &str = "---------------------------------------";
const STARS: &str = "***************************************";

/// Line-oriented log of the run. The first write error is kept and later
/// events are dropped.
pub struct TextReporter<W: Write> {
    out: W,
    error: Option<io::Error>,
}

impl<W: Write> TextReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            error: None,
        }
    }

    pub fn finish(self) -> io::Result<W> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.out),
        }
    }

    fn line(&mut self, args: std::fmt::Arguments<'_>) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.out.write_fmt(args).and_then(|_| self.out.write_all(b"\n")) {
            self.error = Some(e);
        }
    }
}

impl<W: Write> HoudiniObserver for TextReporter<W> {
    fn start(&mut self, candidate_count: usize) {
        self.line(format_args!("Houdini started: #constants: {candidate_count}"));
    }

    fn iteration_begin(&mut self, iteration: usize) {
        self.line(format_args!("{RULE}"));
        self.line(format_args!("Houdini iteration #{iteration}"));
    }

    fn implementation_selected(&mut self, name: &str) {
        self.line(format_args!("implementation under analysis: {name}"));
    }

    fn assignment_snapshot(&mut self, _assignment: &Assignment, axiom: &Axiom) {
        self.line(format_args!("assignment under analysis: {axiom}"));
    }

    fn outcome_recorded(&mut self, _name: &str, outcome: Outcome) {
        self.line(format_args!("analysis outcome: {outcome}"));
    }

    fn enqueue(&mut self, name: &str) {
        self.line(format_args!("worklist enqueue: {name}"));
    }

    fn dequeue(&mut self, name: &str) {
        self.line(format_args!("worklist dequeue: {name}"));
    }

    fn candidate_refuted(&mut self, implementation: &str, refutation: &Refutation) {
        let offset = refutation.offset();
        match &refutation.annotation {
            RefutedAnnotation::Requires { constant, callee } => self.line(format_args!(
                "refuted call: {constant} in {implementation} calling {callee} at offset {offset}"
            )),
            RefutedAnnotation::Ensures { constant } => self.line(format_args!(
                "refuted return: {constant} in {implementation} at offset {offset}"
            )),
            RefutedAnnotation::Assert { constant } => self.line(format_args!(
                "refuted assert: {constant} in {implementation} at offset {offset}"
            )),
        }
        let trace = refutation.counterexample.trace();
        if !trace.is_empty() {
            self.line(format_args!("  trace: {}", trace.join(" -> ")));
        }
    }

    fn candidate_disabled(&mut self, constant: &str) {
        self.line(format_args!("constant disabled: {constant}"));
    }

    fn flush_begin(&mut self) {
        self.line(format_args!("{STARS}"));
        self.line(format_args!("Flushing remaining implementations"));
    }

    fn flush_end(&mut self) {
        self.line(format_args!("{STARS}"));
        self.line(format_args!("Flushing finished"));
    }

    fn exception_seen(&mut self, name: &str, message: &str) {
        self.line(format_args!("Caught exception in {name}: {message}"));
    }

    fn end(&mut self, end: RunEnd, iterations: usize) {
        let kind = match end {
            RunEnd::Normal => "Normal",
            RunEnd::Abnormal => "Abnormal",
        };
        self.line(format_args!("Houdini ended: {kind}"));
        self.line(format_args!("Number of iterations: {iterations}"));
    }
}

/// Wall time of every verification round, per implementation.
#[derive(Debug, Default)]
pub struct IterationTimer {
    started: Option<Instant>,
    times: Vec<(String, Vec<Duration>)>,
}

impl IterationTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_time(&mut self, name: &str, elapsed: Duration) {
        match self.times.iter_mut().find(|(n, _)| n == name) {
            Some((_, list)) => list.push(elapsed),
            None => self.times.push((name.to_string(), vec![elapsed])),
        }
    }

    /// Implementations in first-verified order with their round times.
    pub fn times(&self) -> &[(String, Vec<Duration>)] {
        &self.times
    }

    pub fn total(&self) -> Duration {
        self.times.iter().flat_map(|(_, l)| l.iter()).sum()
    }

    pub fn rounds(&self) -> usize {
        self.times.iter().map(|(_, l)| l.len()).sum()
    }

    pub fn print_times(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "{RULE}")?;
        writeln!(out, "Times for each iteration for each implementation")?;
        writeln!(out, "{RULE}")?;
        writeln!(out, "Total implementations: {}", self.times.len())?;
        for (name, list) in &self.times {
            writeln!(out, "Times for {name}:")?;
            for (i, d) in list.iter().enumerate() {
                writeln!(out, "  ({i})\t{:.3}ms", d.as_secs_f64() * 1000.0)?;
            }
        }
        let total = self.total().as_secs_f64();
        writeln!(out, "Total time: {total:.3} (s)")?;
        let avg = match self.rounds() {
            0 => 0.0,
            n => total / n as f64,
        };
        writeln!(out, "Avg: {avg:.3} (s/iter)")
    }
}

impl HoudiniObserver for IterationTimer {
    fn iteration_begin(&mut self, _iteration: usize) {
        self.started = Some(Instant::now());
    }

    fn outcome_recorded(&mut self, name: &str, _outcome: Outcome) {
        let elapsed = self.started.take().map(|s| s.elapsed()).unwrap_or_default();
        self.add_time(name, elapsed);
    }
}

/// Forwards every event to `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl HoudiniObserver for TracingObserver {
    fn start(&mut self, candidate_count: usize) {
        tracing::info!(candidates = candidate_count, "houdini started");
    }

    fn iteration_begin(&mut self, iteration: usize) {
        tracing::debug!(iteration, "iteration");
    }

    fn implementation_selected(&mut self, name: &str) {
        tracing::debug!(implementation = name, "implementation under analysis");
    }

    fn assignment_snapshot(&mut self, _assignment: &Assignment, axiom: &Axiom) {
        tracing::trace!(%axiom, "assignment under analysis");
    }

    fn outcome_recorded(&mut self, name: &str, outcome: Outcome) {
        tracing::debug!(implementation = name, %outcome, "analysis outcome");
    }

    fn enqueue(&mut self, name: &str) {
        tracing::debug!(implementation = name, "worklist enqueue");
    }

    fn dequeue(&mut self, name: &str) {
        tracing::debug!(implementation = name, "worklist dequeue");
    }

    fn candidate_refuted(&mut self, implementation: &str, refutation: &Refutation) {
        tracing::debug!(
            implementation,
            annotation = %refutation.annotation,
            offset = refutation.offset(),
            "candidate refuted"
        );
    }

    fn candidate_disabled(&mut self, constant: &str) {
        tracing::debug!(constant, "constant disabled");
    }

    fn flush_begin(&mut self) {
        tracing::info!("flushing remaining implementations");
    }

    fn flush_end(&mut self) {
        tracing::info!("flushing finished");
    }

    fn exception_seen(&mut self, name: &str, message: &str) {
        tracing::warn!(implementation = name, detail = message, "caught oracle exception");
    }

    fn end(&mut self, end: RunEnd, iterations: usize) {
        tracing::info!(?end, iterations, "houdini ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::ObserverBus;

    #[test]
    fn text_reporter_writes_one_line_per_event() {
        let mut reporter = TextReporter::new(Vec::new());
        {
            let mut bus = ObserverBus::new();
            bus.register(&mut reporter);
            bus.start(2);
            bus.iteration_begin(0);
            bus.implementation_selected("Caller");
            bus.outcome_recorded("Caller", Outcome::Errors);
            bus.candidate_disabled("P_pre");
            bus.enqueue("Callee");
            bus.end(RunEnd::Normal, 1);
        }
        let text = String::from_utf8(reporter.finish().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Houdini started: #constants: 2");
        assert_eq!(lines[2], "Houdini iteration #0");
        assert_eq!(lines[3], "implementation under analysis: Caller");
        assert_eq!(lines[4], "analysis outcome: Errors");
        assert_eq!(lines[5], "constant disabled: P_pre");
        assert_eq!(lines[6], "worklist enqueue: Callee");
        assert_eq!(lines[7], "Houdini ended: Normal");
        assert_eq!(lines[8], "Number of iterations: 1");
    }

    #[test]
    fn text_reporter_describes_each_refuted_annotation() {
        use houdini_ast::span;
        use houdini_parse::parse_expr;
        use houdini_verify::Counterexample;

        let call = Refutation {
            annotation: RefutedAnnotation::Requires {
                constant: "X".into(),
                callee: "Lib".into(),
            },
            counterexample: Counterexample::Precondition {
                callee: "Lib".into(),
                condition: parse_expr("X ==> n > 0").unwrap(),
                call_site: span(42, 8),
                trace: vec!["entry".into(), "loop".into()],
            },
        };
        let ret = Refutation {
            annotation: RefutedAnnotation::Ensures { constant: "X".into() },
            counterexample: Counterexample::Postcondition {
                condition: parse_expr("X ==> r > 0").unwrap(),
                span: span(7, 11),
                trace: Vec::new(),
            },
        };

        let mut reporter = TextReporter::new(Vec::new());
        {
            let mut bus = ObserverBus::new();
            bus.register(&mut reporter);
            bus.candidate_refuted("Mid", &call);
            bus.candidate_refuted("Mid", &ret);
        }
        let text = String::from_utf8(reporter.finish().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "refuted call: X in Mid calling Lib at offset 42",
                "  trace: entry -> loop",
                "refuted return: X in Mid at offset 7",
            ]
        );
    }

    #[test]
    fn timer_groups_rounds_by_implementation() {
        let mut timer = IterationTimer::new();
        timer.add_time("A", Duration::from_millis(10));
        timer.add_time("B", Duration::from_millis(5));
        timer.add_time("A", Duration::from_millis(20));
        assert_eq!(timer.rounds(), 3);
        assert_eq!(timer.total(), Duration::from_millis(35));
        assert_eq!(timer.times()[0].1.len(), 2);

        let mut out = Vec::new();
        timer.print_times(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Total implementations: 2"), "{text}");
        assert!(text.contains("Times for A:"), "{text}");
        assert!(text.contains("Total time: 0.035 (s)"), "{text}");
    }

    #[test]
    fn empty_timer_prints_zero_average() {
        let mut out = Vec::new();
        IterationTimer::new().print_times(&mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("Avg: 0.000 (s/iter)"));
    }
}
