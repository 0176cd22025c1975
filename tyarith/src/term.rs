use std::{
    fmt,
    hash::{Hash, Hasher},
    mem,
};

/// Minimum stack space to reserve before recursing into a subterm (32 KB).
pub(crate) const MIN_STACK_RED_ZONE: usize = 32 * 1024;

/// Stack size to grow to when running low (1 MB).
pub(crate) const STACK_GROWTH_SIZE: usize = 1024 * 1024;

/// The three arithmetic operators that take a single operand.
#[derive(PartialEq, Eq, Hash, Clone, Copy, derive_more::Display, Debug)]
pub enum Func {
    #[display(fmt = "succ")]
    Succ,
    #[display(fmt = "pred")]
    Pred,
    #[display(fmt = "iszero")]
    IsZero,
}

/// Numerals are unary, so terms nest as deep as the numbers they mention.
/// Every structural traversal here is either a loop or guarded by
/// `stacker::maybe_grow`.
pub enum Term {
    /// `true`
    True,
    /// `false`
    False,
    /// `0`
    Zero,
    /// `if t then t else t`
    IfThenElse {
        cond: Box<Term>,
        positive: Box<Term>,
        negative: Box<Term>,
    },
    /// `succ t`
    Succ(Box<Term>),
    /// `pred t`
    Pred(Box<Term>),
    /// `iszero t`
    IsZero(Box<Term>),
}

impl Term {
    pub fn if_then_else(cond: Term, positive: Term, negative: Term) -> Self {
        Term::IfThenElse {
            cond: cond.into(),
            positive: positive.into(),
            negative: negative.into(),
        }
    }

    pub fn succ(term: Term) -> Self {
        Term::Succ(term.into())
    }

    pub fn pred(term: Term) -> Self {
        Term::Pred(term.into())
    }

    pub fn is_zero(term: Term) -> Self {
        Term::IsZero(term.into())
    }

    pub fn apply(func: Func, term: Term) -> Self {
        match func {
            Func::Succ => Term::succ(term),
            Func::Pred => Term::pred(term),
            Func::IsZero => Term::is_zero(term),
        }
    }

    /// The unary numeral `succ (succ ... 0)` with `n` wrappers.
    pub fn nat(n: u32) -> Self {
        (0..n).fold(Term::Zero, |t, _| Term::succ(t))
    }

    /// Splits a unary node into its operator and operand.
    pub fn func(&self) -> Option<(Func, &Term)> {
        match self {
            Term::Succ(t) => Some((Func::Succ, t.as_ref())),
            Term::Pred(t) => Some((Func::Pred, t.as_ref())),
            Term::IsZero(t) => Some((Func::IsZero, t.as_ref())),
            _ => None,
        }
    }

    pub fn is_boolean_value(&self) -> bool {
        matches!(self, Term::True | Term::False)
    }

    /// `0`, or `succ v` for a numeric value `v`.
    pub fn is_numeric_value(&self) -> bool {
        let mut term = self;
        loop {
            match term {
                Term::Zero => return true,
                Term::Succ(v) => term = v.as_ref(),
                _ => return false,
            }
        }
    }

    pub fn is_value(&self) -> bool {
        self.is_boolean_value() || self.is_numeric_value()
    }

    /// Decodes a numeric value into the number it represents.
    pub fn as_nat(&self) -> Option<u32> {
        let mut n = 0u32;
        let mut term = self;
        loop {
            match term {
                Term::Zero => return Some(n),
                Term::Succ(inner) => {
                    n = n.checked_add(1)?;
                    term = inner.as_ref();
                }
                _ => return None,
            }
        }
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        let mut size = 0;
        let mut pending = vec![self];
        while let Some(term) = pending.pop() {
            size += 1;
            term.push_children(&mut pending);
        }
        size
    }

    /// Length of the longest path from the root to a leaf; leaves have depth 0.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut pending = vec![(self, 0)];
        while let Some((term, d)) = pending.pop() {
            depth = depth.max(d);
            let mut children = Vec::new();
            term.push_children(&mut children);
            pending.extend(children.into_iter().map(|child| (child, d + 1)));
        }
        depth
    }

    fn push_children<'a>(&'a self, pending: &mut Vec<&'a Term>) {
        match self {
            Term::True | Term::False | Term::Zero => {}
            Term::IfThenElse {
                cond,
                positive,
                negative,
            } => pending.extend([cond.as_ref(), positive.as_ref(), negative.as_ref()]),
            Term::Succ(t) | Term::Pred(t) | Term::IsZero(t) => pending.push(t.as_ref()),
        }
    }

    /// Moves the children out, leaving `0` in their place.
    fn detach_children(&mut self, pending: &mut Vec<Term>) {
        match self {
            Term::True | Term::False | Term::Zero => {}
            Term::IfThenElse {
                cond,
                positive,
                negative,
            } => {
                pending.push(mem::replace(&mut **cond, Term::Zero));
                pending.push(mem::replace(&mut **positive, Term::Zero));
                pending.push(mem::replace(&mut **negative, Term::Zero));
            }
            Term::Succ(t) | Term::Pred(t) | Term::IsZero(t) => {
                pending.push(mem::replace(&mut **t, Term::Zero))
            }
        }
    }
}

impl Drop for Term {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.detach_children(&mut pending);
        while let Some(mut term) = pending.pop() {
            term.detach_children(&mut pending);
        }
    }
}

impl Clone for Term {
    fn clone(&self) -> Self {
        stacker::maybe_grow(MIN_STACK_RED_ZONE, STACK_GROWTH_SIZE, || match self {
            Term::True => Term::True,
            Term::False => Term::False,
            Term::Zero => Term::Zero,
            Term::IfThenElse {
                cond,
                positive,
                negative,
            } => Term::IfThenElse {
                cond: cond.clone(),
                positive: positive.clone(),
                negative: negative.clone(),
            },
            Term::Succ(t) => Term::Succ(t.clone()),
            Term::Pred(t) => Term::Pred(t.clone()),
            Term::IsZero(t) => Term::IsZero(t.clone()),
        })
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        stacker::maybe_grow(MIN_STACK_RED_ZONE, STACK_GROWTH_SIZE, || match (self, other) {
            (Term::True, Term::True) | (Term::False, Term::False) | (Term::Zero, Term::Zero) => {
                true
            }
            (
                Term::IfThenElse {
                    cond: c1,
                    positive: p1,
                    negative: n1,
                },
                Term::IfThenElse {
                    cond: c2,
                    positive: p2,
                    negative: n2,
                },
            ) => c1 == c2 && p1 == p2 && n1 == n2,
            (Term::Succ(a), Term::Succ(b))
            | (Term::Pred(a), Term::Pred(b))
            | (Term::IsZero(a), Term::IsZero(b)) => a == b,
            _ => false,
        })
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        stacker::maybe_grow(MIN_STACK_RED_ZONE, STACK_GROWTH_SIZE, || {
            mem::discriminant(self).hash(state);
            match self {
                Term::True | Term::False | Term::Zero => {}
                Term::IfThenElse {
                    cond,
                    positive,
                    negative,
                } => {
                    cond.hash(state);
                    positive.hash(state);
                    negative.hash(state);
                }
                Term::Succ(t) | Term::Pred(t) | Term::IsZero(t) => t.hash(state),
            }
        })
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        stacker::maybe_grow(MIN_STACK_RED_ZONE, STACK_GROWTH_SIZE, || match self {
            Term::True => f.write_str("True"),
            Term::False => f.write_str("False"),
            Term::Zero => f.write_str("Zero"),
            Term::IfThenElse {
                cond,
                positive,
                negative,
            } => f
                .debug_struct("IfThenElse")
                .field("cond", cond)
                .field("positive", positive)
                .field("negative", negative)
                .finish(),
            Term::Succ(t) => f.debug_tuple("Succ").field(t).finish(),
            Term::Pred(t) => f.debug_tuple("Pred").field(t).finish(),
            Term::IsZero(t) => f.debug_tuple("IsZero").field(t).finish(),
        })
    }
}

/// Renders a subterm, parenthesised unless it is atomic.
struct Operand<'a>(&'a Term);

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_value() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "({})", self.0)
        }
    }
}

impl Term {
    /// Renders a run of unary operators in one pass. Trailing `succ`s over `0`
    /// print as a decimal numeral.
    fn fmt_applications(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut funcs = Vec::new();
        let mut base = self;
        while let Some((func, operand)) = base.func() {
            funcs.push(func);
            base = operand;
        }
        let numeral = match base {
            Term::Zero => funcs
                .iter()
                .rev()
                .take_while(|func| **func == Func::Succ)
                .count(),
            _ => 0,
        };
        let prefix = &funcs[..funcs.len() - numeral];
        let mut open = 0;
        for (i, func) in prefix.iter().enumerate() {
            write!(f, "{func} ")?;
            let last = i + 1 == prefix.len();
            if !(last && (numeral > 0 || base.is_value())) {
                f.write_str("(")?;
                open += 1;
            }
        }
        if numeral > 0 {
            write!(f, "{numeral}")?;
        } else {
            write!(f, "{base}")?;
        }
        for _ in 0..open {
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        stacker::maybe_grow(MIN_STACK_RED_ZONE, STACK_GROWTH_SIZE, || match self {
            Term::True => f.write_str("true"),
            Term::False => f.write_str("false"),
            Term::Zero => f.write_str("0"),
            Term::IfThenElse {
                cond,
                positive,
                negative,
            } => write!(
                f,
                "if {} then {} else {}",
                Operand(cond),
                Operand(positive),
                Operand(negative)
            ),
            Term::Succ(_) | Term::Pred(_) | Term::IsZero(_) => self.fmt_applications(f),
        })
    }
}
