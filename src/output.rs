//! Who owns the receive buffer after a reduction.

use crate::element::Element;
use crate::error::{Result, TreefoldError};

/// Receive side of a slice-form reduction.
///
/// Non-root processes never see the folded result: they get back exactly
/// what they passed in (`Null` or their untouched buffer). The root gets
/// either its own buffer, now filled, or a fresh buffer it owns.
#[derive(Debug, PartialEq)]
pub enum ReduceOutput<'a, E> {
    /// No receive buffer was supplied and this process is not the root.
    Null,
    /// The caller's buffer, handed back.
    Provided(&'a mut [E]),
    /// Buffer allocated by the engine on the root. The caller owns it.
    Allocated(Vec<E>),
}

impl<'a, E> ReduceOutput<'a, E> {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// True when the engine allocated the buffer.
    pub fn is_allocated(&self) -> bool {
        matches!(self, Self::Allocated(_))
    }

    pub fn as_slice(&self) -> Option<&[E]> {
        match self {
            Self::Null => None,
            Self::Provided(buf) => Some(buf),
            Self::Allocated(buf) => Some(buf),
        }
    }

    /// Take the engine-allocated buffer, if any.
    pub fn into_allocated(self) -> Option<Vec<E>> {
        match self {
            Self::Allocated(buf) => Some(buf),
            _ => None,
        }
    }

    /// Take the caller's buffer back, if one was supplied.
    pub fn into_provided(self) -> Option<&'a mut [E]> {
        match self {
            Self::Provided(buf) => Some(buf),
            _ => None,
        }
    }
}

/// Reject calls that carry neither send data nor a receive buffer.
pub(crate) fn check_usage(send_len: usize, recv_len: Option<usize>) -> Result<()> {
    if send_len == 0 && recv_len.unwrap_or(0) == 0 {
        return Err(TreefoldError::invalid(
            "nothing to reduce: send data and receive buffer are both empty",
        ));
    }
    Ok(())
}

/// Fail fast when a caller-owned buffer cannot hold `required` elements.
pub(crate) fn check_capacity(required: usize, actual: usize) -> Result<()> {
    if actual < required {
        return Err(TreefoldError::SizeMismatch {
            expected: required,
            actual,
        });
    }
    Ok(())
}

/// Allocate an output buffer of exactly `len` default elements.
pub(crate) fn allocate<E: Element>(len: usize) -> Result<Vec<E>> {
    let mut buf = Vec::new();
    grow(&mut buf, len)?;
    Ok(buf)
}

/// Grow `buf` to at least `len` elements. Existing contents are kept and new
/// positions hold `E::default()`.
pub(crate) fn grow<E: Element>(buf: &mut Vec<E>, len: usize) -> Result<()> {
    if buf.len() >= len {
        return Ok(());
    }
    buf.try_reserve_exact(len - buf.len())
        .map_err(|_| TreefoldError::AllocationFailed { elements: len })?;
    buf.resize(len, E::default());
    Ok(())
}
