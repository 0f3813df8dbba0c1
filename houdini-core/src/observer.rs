//! Lifecycle notifications.
//!
//! Observers see every scheduling decision in order but cannot influence it:
//! they receive shared references only, and a run behaves identically with
//! no observer attached.

#![forbid(unsafe_code)]

use houdini_verify::{Axiom, Outcome};
use serde::Serialize;

use crate::assignment::Assignment;
use crate::refutation::{Refutation, RefutedAnnotation};

/// How a run reports its end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunEnd {
    Normal,
    Abnormal,
}

/// Every method defaults to a no-op.
#[allow(unused_variables)]
pub trait HoudiniObserver {
    fn start(&mut self, candidate_count: usize) {}

    fn iteration_begin(&mut self, iteration: usize) {}

    fn implementation_selected(&mut self, name: &str) {}

    fn assignment_snapshot(&mut self, assignment: &Assignment, axiom: &Axiom) {}

    fn outcome_recorded(&mut self, name: &str, outcome: Outcome) {}

    fn enqueue(&mut self, name: &str) {}

    fn dequeue(&mut self, name: &str) {}

    /// Fired for every refuted annotation of a round, before its candidate
    /// is disabled. A candidate may be refuted several times in one round.
    fn candidate_refuted(&mut self, implementation: &str, refutation: &Refutation) {}

    fn candidate_disabled(&mut self, constant: &str) {}

    fn flush_begin(&mut self) {}

    fn flush_end(&mut self) {}

    fn exception_seen(&mut self, name: &str, message: &str) {}

    fn end(&mut self, end: RunEnd, iterations: usize) {}
}

/// Registered observers, notified synchronously in registration order.
#[derive(Default)]
pub struct ObserverBus<'a> {
    observers: Vec<&'a mut dyn HoudiniObserver>,
}

impl<'a> ObserverBus<'a> {
    pub fn new() -> Self {
        Self { observers: Vec::new() }
    }

    pub fn register(&mut self, observer: &'a mut dyn HoudiniObserver) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    fn each(&mut self, mut f: impl FnMut(&mut dyn HoudiniObserver)) {
        for observer in self.observers.iter_mut() {
            f(&mut **observer);
        }
    }

    pub fn start(&mut self, candidate_count: usize) {
        self.each(|o| o.start(candidate_count));
    }

    pub fn iteration_begin(&mut self, iteration: usize) {
        self.each(|o| o.iteration_begin(iteration));
    }

    pub fn implementation_selected(&mut self, name: &str) {
        self.each(|o| o.implementation_selected(name));
    }

    pub fn assignment_snapshot(&mut self, assignment: &Assignment, axiom: &Axiom) {
        self.each(|o| o.assignment_snapshot(assignment, axiom));
    }

    pub fn outcome_recorded(&mut self, name: &str, outcome: Outcome) {
        self.each(|o| o.outcome_recorded(name, outcome));
    }

    pub fn enqueue(&mut self, name: &str) {
        self.each(|o| o.enqueue(name));
    }

    pub fn dequeue(&mut self, name: &str) {
        self.each(|o| o.dequeue(name));
    }

    pub fn candidate_refuted(&mut self, implementation: &str, refutation: &Refutation) {
        self.each(|o| o.candidate_refuted(implementation, refutation));
    }

    pub fn candidate_disabled(&mut self, constant: &str) {
        self.each(|o| o.candidate_disabled(constant));
    }

    pub fn flush_begin(&mut self) {
        self.each(|o| o.flush_begin());
    }

    pub fn flush_end(&mut self) {
        self.each(|o| o.flush_end());
    }

    pub fn exception_seen(&mut self, name: &str, message: &str) {
        self.each(|o| o.exception_seen(name, message));
    }

    pub fn end(&mut self, end: RunEnd, iterations: usize) {
        self.each(|o| o.end(end, iterations));
    }
}

/// One recorded lifecycle event.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Event {
    Start { candidates: usize },
    IterationBegin { iteration: usize },
    ImplementationSelected { name: String },
    AssignmentSnapshot { assignment: Vec<(String, bool)> },
    OutcomeRecorded { name: String, outcome: Outcome },
    Enqueue { name: String },
    Dequeue { name: String },
    CandidateRefuted {
        implementation: String,
        annotation: RefutedAnnotation,
        offset: usize,
        trace: Vec<String>,
    },
    CandidateDisabled { constant: String },
    FlushBegin,
    FlushEnd,
    ExceptionSeen { name: String, message: String },
    End { end: RunEnd, iterations: usize },
}

/// Keeps the full event stream.
#[derive(Clone, Debug, Default, Serialize)]
pub struct EventLog {
    pub events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names passed to `implementation_selected`, in order.
    pub fn selected(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::ImplementationSelected { name } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn disabled(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::CandidateDisabled { constant } => Some(constant.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Refuted annotations in the order the oracle reported them.
    pub fn refuted(&self) -> Vec<&RefutedAnnotation> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::CandidateRefuted { annotation, .. } => Some(annotation),
                _ => None,
            })
            .collect()
    }

    pub fn enqueued(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Enqueue { name } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn outcomes(&self) -> Vec<(&str, Outcome)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::OutcomeRecorded { name, outcome } => Some((name.as_str(), *outcome)),
                _ => None,
            })
            .collect()
    }

    pub fn exceptions(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::ExceptionSeen { .. }))
            .count()
    }
}

impl HoudiniObserver for EventLog {
    fn start(&mut self, candidate_count: usize) {
        self.events.push(Event::Start {
            candidates: candidate_count,
        });
    }

    fn iteration_begin(&mut self, iteration: usize) {
        self.events.push(Event::IterationBegin { iteration });
    }

    fn implementation_selected(&mut self, name: &str) {
        self.events.push(Event::ImplementationSelected { name: name.to_string() });
    }

    fn assignment_snapshot(&mut self, assignment: &Assignment, _axiom: &Axiom) {
        self.events.push(Event::AssignmentSnapshot {
            assignment: assignment.snapshot(),
        });
    }

    fn outcome_recorded(&mut self, name: &str, outcome: Outcome) {
        self.events.push(Event::OutcomeRecorded {
            name: name.to_string(),
            outcome,
        });
    }

    fn enqueue(&mut self, name: &str) {
        self.events.push(Event::Enqueue { name: name.to_string() });
    }

    fn dequeue(&mut self, name: &str) {
        self.events.push(Event::Dequeue { name: name.to_string() });
    }

    fn candidate_refuted(&mut self, implementation: &str, refutation: &Refutation) {
        self.events.push(Event::CandidateRefuted {
            implementation: implementation.to_string(),
            annotation: refutation.annotation.clone(),
            offset: refutation.offset(),
            trace: refutation.counterexample.trace().to_vec(),
        });
    }

    fn candidate_disabled(&mut self, constant: &str) {
        self.events.push(Event::CandidateDisabled {
            constant: constant.to_string(),
        });
    }

    fn flush_begin(&mut self) {
        self.events.push(Event::FlushBegin);
    }

    fn flush_end(&mut self) {
        self.events.push(Event::FlushEnd);
    }

    fn exception_seen(&mut self, name: &str, message: &str) {
        self.events.push(Event::ExceptionSeen {
            name: name.to_string(),
            message: message.to_string(),
        });
    }

    fn end(&mut self, end: RunEnd, iterations: usize) {
        self.events.push(Event::End { end, iterations });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Tagger {
        tag: &'static str,
        seen: Vec<String>,
    }

    impl HoudiniObserver for Tagger {
        fn enqueue(&mut self, name: &str) {
            self.seen.push(format!("{}:{name}", self.tag));
        }
    }

    #[test]
    fn observers_run_in_registration_order() {
        let mut first = Tagger { tag: "a", ..Tagger::default() };
        let mut second = Tagger { tag: "b", ..Tagger::default() };
        let mut log = EventLog::new();
        {
            let mut bus = ObserverBus::new();
            bus.register(&mut first);
            bus.register(&mut second);
            bus.register(&mut log);
            bus.enqueue("X");
            bus.dequeue("X");
            assert_eq!(bus.len(), 3);
        }
        assert_eq!(first.seen, vec!["a:X"]);
        assert_eq!(second.seen, vec!["b:X"]);
        assert_eq!(
            log.events,
            vec![
                Event::Enqueue { name: "X".into() },
                Event::Dequeue { name: "X".into() }
            ]
        );
    }
}
