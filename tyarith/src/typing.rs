use log::trace;
use thiserror::Error;

use crate::term::{Func, Term, MIN_STACK_RED_ZONE, STACK_GROWTH_SIZE};

#[derive(PartialEq, Eq, Hash, Clone, Copy, derive_more::Display, Debug)]
pub enum Type {
    #[display(fmt = "Bool")]
    Bool,
    #[display(fmt = "Nat")]
    Nat,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("condition `{cond}` has type {found}, expected Bool")]
    ConditionNotBool { cond: Term, found: Type },
    #[error(
        "branches disagree: `{positive}` has type {positive_type} but `{negative}` has type {negative_type}"
    )]
    BranchTypeMismatch {
        positive: Term,
        positive_type: Type,
        negative: Term,
        negative_type: Type,
    },
    #[error("operand `{operand}` of {func} has type {found}, expected Nat")]
    OperandNotNat {
        func: Func,
        operand: Term,
        found: Type,
    },
}

impl TypeError {
    /// The subterm the error is reported against.
    pub fn term(&self) -> &Term {
        match self {
            TypeError::ConditionNotBool { cond, .. } => cond,
            TypeError::BranchTypeMismatch { negative, .. } => negative,
            TypeError::OperandNotNat { operand, .. } => operand,
        }
    }
}

pub fn type_of(term: &Term) -> Result<Type, TypeError> {
    trace!("infer type of {term}");
    infer(term)
}

fn infer(term: &Term) -> Result<Type, TypeError> {
    stacker::maybe_grow(MIN_STACK_RED_ZONE, STACK_GROWTH_SIZE, || infer_impl(term))
}

/// Walks a run of `succ`/`pred`/`iszero` down to its innermost operand, then
/// checks the operands outward, innermost first.
fn infer_impl(term: &Term) -> Result<Type, TypeError> {
    let mut applications = Vec::new();
    let mut current = term;
    while let Some((func, operand)) = current.func() {
        applications.push((func, operand));
        current = operand;
    }
    let mut ty = match current {
        Term::True | Term::False => Type::Bool,
        Term::IfThenElse {
            cond,
            positive,
            negative,
        } => infer_if(cond, positive, negative)?,
        _ => Type::Nat,
    };
    for (func, operand) in applications.into_iter().rev() {
        if ty != Type::Nat {
            return Err(TypeError::OperandNotNat {
                func,
                operand: operand.clone(),
                found: ty,
            });
        }
        ty = match func {
            Func::Succ | Func::Pred => Type::Nat,
            Func::IsZero => Type::Bool,
        };
    }
    Ok(ty)
}

fn infer_if(cond: &Term, positive: &Term, negative: &Term) -> Result<Type, TypeError> {
    let found = infer(cond)?;
    if found != Type::Bool {
        return Err(TypeError::ConditionNotBool {
            cond: cond.clone(),
            found,
        });
    }
    let positive_type = infer(positive)?;
    let negative_type = infer(negative)?;
    if positive_type != negative_type {
        return Err(TypeError::BranchTypeMismatch {
            positive: positive.clone(),
            positive_type,
            negative: negative.clone(),
            negative_type,
        });
    }
    Ok(positive_type)
}

impl Term {
    pub fn type_of(&self) -> Result<Type, TypeError> {
        type_of(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::term::Term::*;

    #[test]
    fn test_well_typed() {
        assert_eq!(type_of(&True), Ok(Type::Bool));
        assert_eq!(type_of(&False), Ok(Type::Bool));
        assert_eq!(type_of(&Zero), Ok(Type::Nat));
        assert_eq!(type_of(&Term::nat(3)), Ok(Type::Nat));
        assert_eq!(type_of(&Term::pred(Term::nat(3))), Ok(Type::Nat));
        assert_eq!(type_of(&Term::is_zero(Term::pred(Zero))), Ok(Type::Bool));
        assert_eq!(
            type_of(&Term::if_then_else(Term::is_zero(Zero), True, False)),
            Ok(Type::Bool)
        );
        assert_eq!(
            Term::if_then_else(False, Zero, Term::nat(1)).type_of(),
            Ok(Type::Nat)
        );
    }

    #[test]
    fn test_condition_not_bool() {
        assert_eq!(
            type_of(&Term::if_then_else(Zero, True, False)),
            Err(TypeError::ConditionNotBool {
                cond: Zero,
                found: Type::Nat,
            })
        );
    }

    #[test]
    fn test_branch_type_mismatch() {
        let err = type_of(&Term::if_then_else(True, Zero, False)).unwrap_err();
        assert_eq!(
            err,
            TypeError::BranchTypeMismatch {
                positive: Zero,
                positive_type: Type::Nat,
                negative: False,
                negative_type: Type::Bool,
            }
        );
        assert_eq!(err.term(), &False);
    }

    #[test]
    fn test_operand_not_nat() {
        assert_eq!(
            type_of(&Term::succ(True)),
            Err(TypeError::OperandNotNat {
                func: Func::Succ,
                operand: True,
                found: Type::Bool,
            })
        );
        assert_eq!(
            type_of(&Term::is_zero(Term::is_zero(Zero))),
            Err(TypeError::OperandNotNat {
                func: Func::IsZero,
                operand: Term::is_zero(Zero),
                found: Type::Bool,
            })
        );
        assert_eq!(
            type_of(&Term::succ(Term::if_then_else(True, True, True))),
            Err(TypeError::OperandNotNat {
                func: Func::Succ,
                operand: Term::if_then_else(True, True, True),
                found: Type::Bool,
            })
        );
    }

    #[test]
    fn test_inner_errors_propagate() {
        let inner = TypeError::OperandNotNat {
            func: Func::Pred,
            operand: False,
            found: Type::Bool,
        };
        assert_eq!(
            type_of(&Term::if_then_else(Term::is_zero(Term::pred(False)), Zero, Zero)),
            Err(inner.clone())
        );
        assert_eq!(
            type_of(&Term::if_then_else(True, Term::pred(False), Zero)),
            Err(inner.clone())
        );
        assert_eq!(type_of(&Term::succ(Term::pred(False))), Err(inner));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            type_of(&Term::pred(True)).unwrap_err().to_string(),
            "operand `true` of pred has type Bool, expected Nat"
        );
        assert_eq!(
            type_of(&Term::if_then_else(Term::nat(1), True, False))
                .unwrap_err()
                .to_string(),
            "condition `1` has type Nat, expected Bool"
        );
    }

    #[test]
    fn test_deep_numerals() {
        let n = 100_000;
        assert_eq!(type_of(&Term::nat(n)), Ok(Type::Nat));
        assert_eq!(type_of(&Term::pred(Term::nat(n))), Ok(Type::Nat));
        assert_eq!(type_of(&Term::is_zero(Term::nat(n))), Ok(Type::Bool));
    }

    #[test]
    fn test_deep_error_reports_innermost_mismatch() {
        let n = 100_000;
        let term = Term::succ(Term::pred((0..n).fold(Term::is_zero(Zero), |t, _| {
            Term::if_then_else(True, t, Term::is_zero(Zero))
        })));
        let err = type_of(&term).unwrap_err();
        assert!(matches!(
            err,
            TypeError::OperandNotNat {
                func: Func::Pred,
                found: Type::Bool,
                ..
            }
        ));
        assert_eq!(err.term().depth(), n + 1);

        let term = (0..n).fold(Term::succ(True), |t, _| Term::pred(t));
        assert_eq!(
            type_of(&term),
            Err(TypeError::OperandNotNat {
                func: Func::Succ,
                operand: True,
                found: Type::Bool,
            })
        );
    }
}
