#![forbid(unsafe_code)]

use std::fmt;

use houdini_ast::Expr;
use houdini_verify::{Counterexample, Outcome, Verdict};
use serde::Serialize;

use crate::candidates::CandidateSet;

/// A candidate-guarded annotation that the oracle disproved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RefutedAnnotation {
    /// Guarded `requires` of `callee`, violated at a call site.
    Requires { constant: String, callee: String },
    Ensures { constant: String },
    Assert { constant: String },
}

impl RefutedAnnotation {
    pub fn constant(&self) -> &str {
        match self {
            RefutedAnnotation::Requires { constant, .. }
            | RefutedAnnotation::Ensures { constant }
            | RefutedAnnotation::Assert { constant } => constant,
        }
    }
}

impl fmt::Display for RefutedAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefutedAnnotation::Requires { constant, callee } => write!(f, "requires({constant}, {callee})"),
            RefutedAnnotation::Ensures { constant } => write!(f, "ensures({constant})"),
            RefutedAnnotation::Assert { constant } => write!(f, "assert({constant})"),
        }
    }
}

/// The candidate guarding `condition`, if it has the shape `c ==> property`
/// with `c` a known candidate.
pub fn match_candidate<'e>(condition: &'e Expr, candidates: &CandidateSet) -> Option<&'e str> {
    let (guard, _) = condition.as_implication()?;
    let name = guard.as_ident()?;
    candidates.contains(name).then_some(name)
}

/// A refuted annotation with the counterexample that disproved it.
#[derive(Clone, Debug, PartialEq)]
pub struct Refutation {
    pub annotation: RefutedAnnotation,
    pub counterexample: Counterexample,
}

impl Refutation {
    pub fn constant(&self) -> &str {
        self.annotation.constant()
    }

    /// Source offset of the failing call site, return or assertion.
    pub fn offset(&self) -> usize {
        self.counterexample.span().offset()
    }
}

/// `None` means the counterexample is a genuine violation.
pub fn classify(cex: &Counterexample, candidates: &CandidateSet) -> Option<RefutedAnnotation> {
    let constant = match_candidate(cex.condition(), candidates)?.to_string();
    Some(match cex {
        Counterexample::Precondition { callee, .. } => RefutedAnnotation::Requires {
            constant,
            callee: callee.clone(),
        },
        Counterexample::Postcondition { .. } => RefutedAnnotation::Ensures { constant },
        Counterexample::Assertion { .. } => RefutedAnnotation::Assert { constant },
    })
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassifiedVerdict {
    pub outcome: Outcome,
    pub refuted: Vec<Refutation>,
    pub genuine: Vec<Counterexample>,
}

impl ClassifiedVerdict {
    pub fn has_genuine(&self) -> bool {
        !self.genuine.is_empty()
    }
}

/// Splits the counterexamples of a verdict into refutations and genuine
/// violations, keeping the oracle's order within each group.
pub fn classify_verdict(verdict: Verdict, candidates: &CandidateSet) -> ClassifiedVerdict {
    let mut refuted = Vec::new();
    let mut genuine = Vec::new();
    for cex in verdict.errors {
        match classify(&cex, candidates) {
            Some(annotation) => refuted.push(Refutation {
                annotation,
                counterexample: cex,
            }),
            None => genuine.push(cex),
        }
    }
    ClassifiedVerdict {
        outcome: verdict.outcome,
        refuted,
        genuine,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use houdini_ast::no_span;
    use houdini_parse::{parse_expr, parse_manifest};

    fn candidates() -> CandidateSet {
        let program = parse_manifest(
            "[[constant]]\nname = \"P\"\nexistential = true\n\n[[constant]]\nname = \"K\"\n",
        )
        .unwrap();
        CandidateSet::collect(&program).unwrap()
    }

    fn assertion(src: &str) -> Counterexample {
        Counterexample::Assertion {
            condition: parse_expr(src).unwrap(),
            span: no_span(),
            trace: Vec::new(),
        }
    }

    #[test]
    fn matches_only_candidate_guards() {
        let set = candidates();
        assert_eq!(match_candidate(&parse_expr("P ==> x > 0").unwrap(), &set), Some("P"));
        assert_eq!(match_candidate(&parse_expr("K ==> x > 0").unwrap(), &set), None);
        assert_eq!(match_candidate(&parse_expr("x > 0 ==> P").unwrap(), &set), None);
        assert_eq!(match_candidate(&parse_expr("P && x > 0").unwrap(), &set), None);
        assert_eq!(match_candidate(&parse_expr("(P ==> a) ==> b").unwrap(), &set), None);
    }

    #[test]
    fn kind_follows_counterexample_variant() {
        let set = candidates();
        let pre = Counterexample::Precondition {
            callee: "Callee".into(),
            condition: parse_expr("P ==> x > 0").unwrap(),
            call_site: no_span(),
            trace: Vec::new(),
        };
        assert_eq!(
            classify(&pre, &set),
            Some(RefutedAnnotation::Requires {
                constant: "P".into(),
                callee: "Callee".into()
            })
        );
        let post = Counterexample::Postcondition {
            condition: parse_expr("P ==> r").unwrap(),
            span: no_span(),
            trace: Vec::new(),
        };
        assert_eq!(classify(&post, &set), Some(RefutedAnnotation::Ensures { constant: "P".into() }));
        assert_eq!(
            classify(&assertion("P ==> y"), &set),
            Some(RefutedAnnotation::Assert { constant: "P".into() })
        );
    }

    #[test]
    fn splits_mixed_verdicts() {
        let verdict = Verdict::from_errors(vec![assertion("x > 0"), assertion("P ==> y")]);
        let classified = classify_verdict(verdict, &candidates());
        assert_eq!(classified.outcome, Outcome::Errors);
        assert_eq!(classified.refuted.len(), 1);
        assert_eq!(classified.refuted[0].annotation.to_string(), "assert(P)");
        assert_eq!(classified.refuted[0].counterexample.condition().to_string(), "P ==> y");
        assert!(classified.has_genuine());
        assert_eq!(classified.genuine[0].condition().to_string(), "x > 0");
    }
}
