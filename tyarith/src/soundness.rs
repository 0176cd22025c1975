//! Executable checks of the metatheory: determinism, progress, preservation
//! and soundness, run over enumerated or generated term populations.

use log::{debug, info};
use thiserror::Error;

use crate::{
    eval::{big_step, step, EvalConfig, Normalized, StepLimitExceeded},
    term::Term,
    typing::{type_of, Type, TypeError},
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("`{term}` stepped to {} and then to {}", describe_step(.first), describe_step(.second))]
    Nondeterministic {
        term: Term,
        first: Option<Term>,
        second: Option<Term>,
    },
    #[error("value `{term}` stepped to `{next}`")]
    ValueSteps { term: Term, next: Term },
    #[error("`{term}` has type {ty} but is stuck")]
    NoProgress { term: Term, ty: Type },
    #[error("`{term}` has type {before} but stepped to `{next}` of type {after}")]
    TypeChanged {
        term: Term,
        next: Term,
        before: Type,
        after: Type,
    },
    #[error("`{term}` has type {before} but stepped to ill-typed `{next}`")]
    TypeLost {
        term: Term,
        next: Term,
        before: Type,
        #[source]
        error: TypeError,
    },
    #[error("`{term}` has type {ty} but normalized to stuck term `{normal_form}`")]
    StuckNormalForm {
        term: Term,
        ty: Type,
        normal_form: Term,
    },
    #[error("`{term}` stepped to `{next}` which is no smaller")]
    NotShrinking { term: Term, next: Term },
    #[error("`{term}` normalized to `{normal_form}` but big-step evaluation {}", describe(.big))]
    BigStepMismatch {
        term: Term,
        normal_form: Term,
        big: Option<Term>,
    },
    #[error(transparent)]
    Diverged(#[from] StepLimitExceeded),
}

fn describe_step(next: &Option<Term>) -> String {
    match next {
        Some(next) => format!("`{next}`"),
        None => "nothing".to_string(),
    }
}

fn describe(big: &Option<Term>) -> String {
    match big {
        Some(value) => format!("gave `{value}`"),
        None => "went wrong".to_string(),
    }
}

/// A normal form that is not a value.
pub fn is_stuck(term: &Term) -> bool {
    !term.is_value() && step(term).is_none()
}

pub fn check_determinism(term: &Term) -> Result<(), Violation> {
    let first = step(term);
    let second = step(term);
    if first == second {
        Ok(())
    } else {
        Err(Violation::Nondeterministic {
            term: term.clone(),
            first,
            second,
        })
    }
}

pub fn check_values_are_normal(term: &Term) -> Result<(), Violation> {
    if !term.is_value() {
        return Ok(());
    }
    match step(term) {
        Some(next) => Err(Violation::ValueSteps {
            term: term.clone(),
            next,
        }),
        None => Ok(()),
    }
}

pub fn check_progress(term: &Term) -> Result<(), Violation> {
    match type_of(term) {
        Ok(ty) if is_stuck(term) => Err(Violation::NoProgress {
            term: term.clone(),
            ty,
        }),
        _ => Ok(()),
    }
}

pub fn check_preservation(term: &Term) -> Result<(), Violation> {
    let Ok(before) = type_of(term) else {
        return Ok(());
    };
    let Some(next) = step(term) else {
        return Ok(());
    };
    match type_of(&next) {
        Ok(after) if after == before => Ok(()),
        Ok(after) => Err(Violation::TypeChanged {
            term: term.clone(),
            next,
            before,
            after,
        }),
        Err(error) => Err(Violation::TypeLost {
            term: term.clone(),
            next,
            before,
            error,
        }),
    }
}

/// Normalizes a well-typed term and checks the normal form is a value.
pub fn check_soundness(term: &Term, config: &EvalConfig) -> Result<(), Violation> {
    if type_of(term).is_err() {
        return Ok(());
    }
    check_normal_form_is_value(term, &config.normalize(term.clone())?.term)
}

fn check_normal_form_is_value(term: &Term, normal_form: &Term) -> Result<(), Violation> {
    match type_of(term) {
        Ok(ty) if !normal_form.is_value() => Err(Violation::StuckNormalForm {
            term: term.clone(),
            ty,
            normal_form: normal_form.clone(),
        }),
        _ => Ok(()),
    }
}

/// Every step strictly decreases the size of the term, so `normalize`
/// terminates after at most `term.size()` steps.
pub fn check_shrinking(term: &Term) -> Result<(), Violation> {
    match step(term) {
        Some(next) if next.size() >= term.size() => Err(Violation::NotShrinking {
            term: term.clone(),
            next,
        }),
        _ => Ok(()),
    }
}

/// Small-step normalization reaches a value exactly when big-step
/// evaluation succeeds, and both agree on it.
pub fn check_big_step_agreement(term: &Term, config: &EvalConfig) -> Result<(), Violation> {
    check_agrees_with_big_step(term, &config.normalize(term.clone())?.term)
}

fn check_agrees_with_big_step(term: &Term, normal_form: &Term) -> Result<(), Violation> {
    let big = big_step(term);
    let agrees = match &big {
        Some(value) => value == normal_form,
        None => !normal_form.is_value(),
    };
    if agrees {
        Ok(())
    } else {
        Err(Violation::BigStepMismatch {
            term: term.clone(),
            normal_form: normal_form.clone(),
            big,
        })
    }
}

/// Tally of a population checked by [`Harness::survey`].
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Survey {
    pub terms: usize,
    pub well_typed: usize,
    pub values: usize,
    pub stuck: usize,
    /// Ill-typed terms that still normalize to a value.
    pub ill_typed_values: usize,
    pub steps: usize,
    pub longest_chain: usize,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Harness {
    pub eval: EvalConfig,
}

impl Harness {
    pub fn new(eval: EvalConfig) -> Self {
        Self { eval }
    }

    /// Runs every check on `term` and returns its normal form.
    pub fn check(&self, term: &Term) -> Result<Normalized, Violation> {
        check_determinism(term)?;
        check_values_are_normal(term)?;
        check_shrinking(term)?;
        check_progress(term)?;
        check_preservation(term)?;
        let normalized = self.eval.normalize(term.clone())?;
        check_normal_form_is_value(term, &normalized.term)?;
        check_agrees_with_big_step(term, &normalized.term)?;
        Ok(normalized)
    }

    /// Checks every step of the multistep chain from `term`, not only the
    /// starting point.
    pub fn check_chain(&self, term: &Term) -> Result<usize, Violation> {
        let mut current = term.clone();
        let mut steps = 0;
        loop {
            self.check(&current)?;
            let Some(next) = step(&current) else {
                return Ok(steps);
            };
            if steps == self.eval.max_steps {
                return Err(StepLimitExceeded {
                    limit: self.eval.max_steps,
                    term: current,
                }
                .into());
            }
            current = next;
            steps += 1;
        }
    }

    pub fn survey<'a>(
        &self,
        terms: impl IntoIterator<Item = &'a Term>,
    ) -> Result<Survey, Violation> {
        let mut survey = Survey::default();
        for term in terms {
            let normalized = self.check(term)?;
            let well_typed = type_of(term).is_ok();
            survey.terms += 1;
            survey.well_typed += usize::from(well_typed);
            survey.values += usize::from(term.is_value());
            survey.stuck += usize::from(is_stuck(term));
            survey.ill_typed_values += usize::from(!well_typed && normalized.term.is_value());
            survey.steps += normalized.steps;
            survey.longest_chain = survey.longest_chain.max(normalized.steps);
            if is_stuck(&normalized.term) {
                debug!("`{term}` gets stuck at `{}`", normalized.term);
            }
        }
        info!("checked {survey:?}");
        Ok(survey)
    }
}

/// All terms of depth at most `depth`.
pub fn terms_up_to_depth(depth: usize) -> Vec<Term> {
    let mut terms = vec![Term::True, Term::False, Term::Zero];
    for _ in 0..depth {
        let mut next = vec![Term::True, Term::False, Term::Zero];
        for t in &terms {
            next.push(Term::succ(t.clone()));
            next.push(Term::pred(t.clone()));
            next.push(Term::is_zero(t.clone()));
        }
        for cond in &terms {
            for positive in &terms {
                for negative in &terms {
                    next.push(Term::if_then_else(
                        cond.clone(),
                        positive.clone(),
                        negative.clone(),
                    ));
                }
            }
        }
        terms = next;
    }
    terms
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::term::Term::*;

    #[test]
    fn test_is_stuck() {
        assert!(is_stuck(&Term::succ(True)));
        assert!(is_stuck(&Term::if_then_else(Zero, True, False)));
        assert!(is_stuck(&Term::is_zero(False)));
        assert!(!is_stuck(&True));
        assert!(!is_stuck(&Term::nat(2)));
        assert!(!is_stuck(&Term::pred(Zero)));
        assert!(!is_stuck(&Term::succ(Term::if_then_else(True, True, True))));
    }

    #[test]
    fn test_checks_pass_on_ill_typed_terms() {
        let term = Term::succ(Term::if_then_else(True, True, True));
        assert!(Harness::default().check(&term).is_ok());
        assert!(Harness::default().check(&Term::succ(True)).is_ok());
    }

    #[test]
    fn test_check_returns_normal_form() {
        let normalized = Harness::default()
            .check(&Term::is_zero(Term::pred(Term::nat(1))))
            .unwrap();
        assert_eq!(normalized.term, True);
        assert_eq!(normalized.steps, 2);
        let normalized = Harness::default().check(&Term::succ(True)).unwrap();
        assert_eq!(normalized.term, Term::succ(True));
        assert_eq!(normalized.steps, 0);
    }

    #[test]
    fn test_violations() {
        let config = EvalConfig::default();
        assert_eq!(
            check_soundness(&Term::pred(Term::pred(Zero)), &EvalConfig::with_max_steps(1)),
            Err(Violation::Diverged(StepLimitExceeded {
                limit: 1,
                term: Term::pred(Zero),
            }))
        );
        assert!(check_soundness(&Term::pred(Term::pred(Zero)), &config).is_ok());
        assert!(check_big_step_agreement(&Term::succ(True), &config).is_ok());
        assert_eq!(
            check_agrees_with_big_step(&Term::pred(Zero), &True),
            Err(Violation::BigStepMismatch {
                term: Term::pred(Zero),
                normal_form: True,
                big: Some(Zero),
            })
        );
        assert_eq!(
            check_normal_form_is_value(&Term::nat(1), &Term::succ(True)),
            Err(Violation::StuckNormalForm {
                term: Term::nat(1),
                ty: Type::Nat,
                normal_form: Term::succ(True),
            })
        );
    }

    #[test]
    fn test_violation_messages() {
        let violation = Violation::BigStepMismatch {
            term: Term::pred(Zero),
            normal_form: Zero,
            big: None,
        };
        assert_eq!(
            violation.to_string(),
            "`pred 0` normalized to `0` but big-step evaluation went wrong"
        );
        let violation = Violation::NoProgress {
            term: Term::succ(True),
            ty: Type::Nat,
        };
        assert_eq!(violation.to_string(), "`succ true` has type Nat but is stuck");
    }

    #[test]
    fn test_check_chain() {
        let harness = Harness::default();
        let term = Term::is_zero(Term::pred(Term::nat(1)));
        assert_eq!(harness.check_chain(&term), Ok(2));
        assert_eq!(harness.check_chain(&True), Ok(0));
    }

    #[test]
    fn test_enumeration() {
        assert_eq!(terms_up_to_depth(0).len(), 3);
        assert_eq!(terms_up_to_depth(1).len(), 3 + 3 * 3 + 27);
        let terms = terms_up_to_depth(1);
        assert!(terms.iter().all(|t| t.depth() <= 1));
        assert!(terms.contains(&Term::if_then_else(Zero, True, False)));
    }

    #[test]
    fn test_survey() {
        let survey = Harness::default().survey(&terms_up_to_depth(1)).unwrap();
        assert_eq!(survey.terms, 39);
        // the six leaves and operators applied to 0, and ten conditionals with a
        // boolean condition and branches of one type
        assert_eq!(survey.well_typed, 3 + 3 + 2 * 4 + 2);
        assert_eq!(survey.values, 4);
        assert!(survey.stuck > 0);
        assert_eq!(survey.longest_chain, 1);
    }
}
