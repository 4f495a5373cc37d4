//! Combine operators applied by the reduction tree.

use crate::element::Element;
use crate::types::ReduceOp;

/// A binary combine function over element type `E`.
///
/// Implementations must be associative and commutative: the tree applies
/// `combine` in an order that depends on the group size and the root, and
/// the engine does not check either property. A non-conforming operator
/// produces undefined (but memory-safe) results.
pub trait Operator<E>: Send + Sync {
    fn combine(&self, a: E, b: E) -> E;

    /// Name used in log output.
    fn name(&self) -> &'static str {
        "custom"
    }
}

impl<E, O: Operator<E> + ?Sized> Operator<E> for &O {
    #[inline]
    fn combine(&self, a: E, b: E) -> E {
        (**self).combine(a, b)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Numeric element types supported by the built-in [`ReduceOp`] operators.
pub trait Reducible: Element + PartialOrd {
    fn reduce(a: Self, b: Self, op: ReduceOp) -> Self;

    /// Neutral element of `op`: `reduce(identity, x, op) == x`.
    fn identity(op: ReduceOp) -> Self;
}

macro_rules! impl_reducible {
    (int: $($ty:ty),*) => {
        $(
            impl Reducible for $ty {
                #[inline]
                fn reduce(a: Self, b: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => a.wrapping_add(b),
                        ReduceOp::Prod => a.wrapping_mul(b),
                        ReduceOp::Min => a.min(b),
                        ReduceOp::Max => a.max(b),
                    }
                }

                #[inline]
                fn identity(op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => 0,
                        ReduceOp::Prod => 1,
                        ReduceOp::Min => <$ty>::MAX,
                        ReduceOp::Max => <$ty>::MIN,
                    }
                }
            }
        )*
    };
    (float: $($ty:ty),*) => {
        $(
            impl Reducible for $ty {
                #[inline]
                fn reduce(a: Self, b: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => a + b,
                        ReduceOp::Prod => a * b,
                        ReduceOp::Min => a.min(b),
                        ReduceOp::Max => a.max(b),
                    }
                }

                #[inline]
                fn identity(op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => 0.0,
                        ReduceOp::Prod => 1.0,
                        ReduceOp::Min => <$ty>::INFINITY,
                        ReduceOp::Max => <$ty>::NEG_INFINITY,
                    }
                }
            }
        )*
    };
}

impl_reducible!(int: i8, i16, i32, i64, u8, u16, u32, u64);
impl_reducible!(float: f32, f64);

impl<E: Reducible> Operator<E> for ReduceOp {
    #[inline]
    fn combine(&self, a: E, b: E) -> E {
        E::reduce(a, b, *self)
    }

    fn name(&self) -> &'static str {
        ReduceOp::name(*self)
    }
}

impl ReduceOp {
    /// Identity element of this operation for `E`.
    pub fn identity<E: Reducible>(self) -> E {
        E::identity(self)
    }
}

/// An operator backed by a closure.
///
/// This is how aggregate element types are reduced:
///
/// ```
/// use treefold::{Operator, from_fn};
///
/// let add_pairs = from_fn("pair_sum", |a: (i32, i32), b: (i32, i32)| (a.0 + b.0, a.1 + b.1));
/// assert_eq!(add_pairs.combine((1, 2), (3, 4)), (4, 6));
/// ```
#[derive(Clone, Copy)]
pub struct FnOp<F> {
    name: &'static str,
    f: F,
}

impl<F> std::fmt::Debug for FnOp<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnOp").field("name", &self.name).finish()
    }
}

/// Wrap a closure as an [`Operator`].
pub fn from_fn<E, F>(name: &'static str, f: F) -> FnOp<F>
where
    F: Fn(E, E) -> E + Send + Sync,
{
    FnOp { name, f }
}

impl<E, F> Operator<E> for FnOp<F>
where
    F: Fn(E, E) -> E + Send + Sync,
{
    #[inline]
    fn combine(&self, a: E, b: E) -> E {
        (self.f)(a, b)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Fold `src` into `dst` element-wise: `dst[i] = op(dst[i], src[i])`.
pub(crate) fn combine_into<E: Copy, O: Operator<E> + ?Sized>(dst: &mut [E], src: &[E], op: &O) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, s) in dst.iter_mut().zip(src) {
        *d = op.combine(*d, *s);
    }
}
