//! Fixed-size byte encoding for values that cross the transport.

use crate::error::{Result, TreefoldError};

/// Plain data that can be reduced across processes.
///
/// An element is copied by value and has a fixed encoded size. The engine
/// never looks inside it: it only moves `SIZE` bytes per element between
/// processes and hands decoded values to the operator.
///
/// `Default` supplies the value of output positions the engine allocates but
/// no slot writes to (sparse receive maps).
///
/// Built-in numeric types are implemented here. Aggregate types implement it
/// by encoding their fields back to back:
///
/// ```
/// use treefold::Element;
///
/// #[derive(Debug, Clone, Copy, Default, PartialEq)]
/// struct Pair {
///     count: i32,
///     total: f64,
/// }
///
/// impl Element for Pair {
///     const SIZE: usize = 12;
///
///     fn write_le(&self, out: &mut [u8]) {
///         self.count.write_le(&mut out[..4]);
///         self.total.write_le(&mut out[4..]);
///     }
///
///     fn read_le(bytes: &[u8]) -> Self {
///         Pair {
///             count: i32::read_le(&bytes[..4]),
///             total: f64::read_le(&bytes[4..]),
///         }
///     }
/// }
/// ```
pub trait Element: Copy + Default + Send + Sync + 'static {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Write `self` into `out`, which is exactly `SIZE` bytes long.
    fn write_le(&self, out: &mut [u8]);

    /// Read a value from `bytes`, which is exactly `SIZE` bytes long.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($($ty:ty),*) => {
        $(
            impl Element for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn write_le(&self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    Self::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_element!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

/// Encode a run of elements into a byte vector.
pub(crate) fn encode_slice<E: Element>(values: &[E]) -> Vec<u8> {
    let mut buf = vec![0u8; values.len() * E::SIZE];
    for (v, chunk) in values.iter().zip(buf.chunks_exact_mut(E::SIZE)) {
        v.write_le(chunk);
    }
    buf
}

/// Decode a byte buffer holding exactly `expected` elements.
pub(crate) fn decode_slice<E: Element>(bytes: &[u8], expected: usize) -> Result<Vec<E>> {
    let expected_bytes = expected * E::SIZE;
    if bytes.len() != expected_bytes {
        return Err(TreefoldError::SizeMismatch {
            expected: expected_bytes,
            actual: bytes.len(),
        });
    }
    Ok(bytes.chunks_exact(E::SIZE).map(E::read_le).collect())
}
