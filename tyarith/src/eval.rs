use log::trace;
use thiserror::Error;

use crate::term::{Func, Term, MIN_STACK_RED_ZONE, STACK_GROWTH_SIZE};

pub const DEFAULT_MAX_STEPS: usize = 1 << 16;

/// Performs one step of call-by-value reduction, or returns `None` if `term`
/// is a normal form.
pub fn step(term: &Term) -> Option<Term> {
    stacker::maybe_grow(MIN_STACK_RED_ZONE, STACK_GROWTH_SIZE, || step_impl(term))
}

fn step_impl(term: &Term) -> Option<Term> {
    match term {
        Term::True | Term::False | Term::Zero => None,
        Term::IfThenElse {
            cond,
            positive,
            negative,
        } => match cond.as_ref() {
            Term::True => Some(positive.as_ref().clone()),
            Term::False => Some(negative.as_ref().clone()),
            _ => Some(Term::if_then_else(
                step(cond)?,
                positive.as_ref().clone(),
                negative.as_ref().clone(),
            )),
        },
        _ => {
            let (func, operand) = term.func()?;
            compute(func, operand).or_else(|| step(operand).map(|next| Term::apply(func, next)))
        }
    }
}

/// The computation rules of `pred` and `iszero`, which fire only on a
/// numeric value.
fn compute(func: Func, operand: &Term) -> Option<Term> {
    match (func, operand) {
        (Func::Pred, Term::Zero) => Some(Term::Zero),
        (Func::IsZero, Term::Zero) => Some(Term::True),
        (Func::Pred, Term::Succ(v)) if v.is_numeric_value() => Some(v.as_ref().clone()),
        (Func::IsZero, Term::Succ(v)) if v.is_numeric_value() => Some(Term::False),
        _ => None,
    }
}

/// Iterator over `t0, t1, ..., tn` where each term steps to the next and
/// `tn` is a normal form.
#[derive(Clone, Debug)]
pub struct Multistep {
    next: Option<Term>,
}

impl Iterator for Multistep {
    type Item = Term;

    fn next(&mut self) -> Option<Term> {
        let current = self.next.take()?;
        self.next = step(&current);
        Some(current)
    }
}

pub fn multistep(term: Term) -> Multistep {
    Multistep { next: Some(term) }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("`{term}` did not reach a normal form within {limit} steps")]
pub struct StepLimitExceeded {
    pub limit: usize,
    /// The last term reached before giving up.
    pub term: Term,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Normalized {
    pub term: Term,
    pub steps: usize,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EvalConfig {
    pub max_steps: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl EvalConfig {
    pub fn with_max_steps(max_steps: usize) -> Self {
        Self { max_steps }
    }

    /// Steps `term` until it reaches a normal form, which may be stuck.
    pub fn normalize(&self, mut term: Term) -> Result<Normalized, StepLimitExceeded> {
        let mut steps = 0;
        while let Some(next) = step(&term) {
            if steps == self.max_steps {
                return Err(StepLimitExceeded {
                    limit: self.max_steps,
                    term,
                });
            }
            trace!("{next}");
            term = next;
            steps += 1;
        }
        Ok(Normalized { term, steps })
    }
}

pub fn normalize(term: Term) -> Result<Term, StepLimitExceeded> {
    EvalConfig::default()
        .normalize(term)
        .map(|normalized| normalized.term)
}

/// Natural semantics: evaluates `term` straight to a value, or returns
/// `None` if evaluation goes wrong.
pub fn big_step(term: &Term) -> Option<Term> {
    stacker::maybe_grow(MIN_STACK_RED_ZONE, STACK_GROWTH_SIZE, || big_step_impl(term))
}

fn big_step_impl(term: &Term) -> Option<Term> {
    match term {
        Term::True | Term::False | Term::Zero => Some(term.clone()),
        Term::IfThenElse {
            cond,
            positive,
            negative,
        } => match big_step(cond)? {
            Term::True => big_step(positive),
            Term::False => big_step(negative),
            _ => None,
        },
        _ => {
            let (func, operand) = term.func()?;
            let value = big_step(operand)?;
            match func {
                // `value` is a value, so it is numeric unless it is a boolean.
                Func::Succ => (!value.is_boolean_value()).then(|| Term::succ(value)),
                Func::Pred | Func::IsZero => compute(func, &value),
            }
        }
    }
}
