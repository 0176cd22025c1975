//! Typed arithmetic expressions: booleans, naturals, conditionals and the
//! `succ`/`pred`/`iszero` operators, with a small-step evaluator, a type checker
//! and executable checks of their soundness.

pub mod eval;
pub mod soundness;
pub mod term;
pub mod typing;

pub use eval::{big_step, multistep, normalize, step, EvalConfig, Normalized, StepLimitExceeded};
pub use soundness::{is_stuck, Harness, Violation};
pub use term::{Func, Term};
pub use typing::{type_of, Type, TypeError};
