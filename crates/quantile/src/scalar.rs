//! Scalar kinds that can be accumulated, and the ordering seam used to sort
//! them.
//!
//! The numeric kinds (`f64`, `i32`, `i64`) come with a native total order,
//! exposed as [`NativeOrder`]. The decimal kind ([`Numeric`](crate::Numeric))
//! is only ever compared through a [`Comparator`] handed to the buffer, so
//! hosts can plug in their own decimal ordering.

use crate::error::CorruptionError;
use ordered_float::OrderedFloat;
use std::{
    cmp::Ordering,
    fmt::{self, Debug, Display},
};

/// Tag identifying the scalar kind of a state, recorded in its wire header.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ScalarKind {
    /// 64-bit IEEE float.
    Float64 = 0,
    /// 32-bit signed integer.
    Int32 = 1,
    /// 64-bit signed integer.
    Int64 = 2,
    /// Arbitrary-precision decimal.
    Numeric = 3,
}

impl ScalarKind {
    /// Wire tag of this kind.
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Parses a wire tag.
    pub fn from_tag(tag: u8) -> Result<Self, CorruptionError> {
        match tag {
            0 => Ok(Self::Float64),
            1 => Ok(Self::Int32),
            2 => Ok(Self::Int64),
            3 => Ok(Self::Numeric),
            _ => Err(CorruptionError::UnknownKind(tag)),
        }
    }
}

impl Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Float64 => "float64",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Numeric => "numeric",
        };
        f.write_str(name)
    }
}

/// A total order over `T`.
pub trait Comparator<T>: Clone {
    /// Compares two values.
    fn compare(&self, left: &T, right: &T) -> Ordering;

    /// Returns true if `left` sorts strictly before `right`.
    #[inline]
    fn less(&self, left: &T, right: &T) -> bool {
        self.compare(left, right) == Ordering::Less
    }
}

/// The built-in total order of the numeric scalar kinds.
///
/// Floats are ordered by [`OrderedFloat`], so NaN sorts after every other
/// value and sorting never depends on input order.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NativeOrder;

impl Comparator<f64> for NativeOrder {
    #[inline]
    fn compare(&self, left: &f64, right: &f64) -> Ordering {
        OrderedFloat(*left).cmp(&OrderedFloat(*right))
    }
}

impl Comparator<i32> for NativeOrder {
    #[inline]
    fn compare(&self, left: &i32, right: &i32) -> Ordering {
        left.cmp(right)
    }
}

impl Comparator<i64> for NativeOrder {
    #[inline]
    fn compare(&self, left: &i64, right: &i64) -> Ordering {
        left.cmp(right)
    }
}

/// A [`Comparator`] backed by a host-provided comparison function.
///
/// ```
/// use feldera_quantile::{Comparator, OrderBy};
///
/// let descending = OrderBy(|a: &i64, b: &i64| b.cmp(a));
/// assert!(descending.less(&2, &1));
/// ```
#[derive(Copy, Clone)]
pub struct OrderBy<F>(pub F);

impl<T, F> Comparator<T> for OrderBy<F>
where
    F: Fn(&T, &T) -> Ordering + Clone,
{
    #[inline]
    fn compare(&self, left: &T, right: &T) -> Ordering {
        (self.0)(left, right)
    }
}

impl<F> Debug for OrderBy<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OrderBy(..)")
    }
}

/// A value that can be accumulated by a quantile state.
pub trait Scalar: Clone + Debug + Send + 'static {
    /// Wire tag for this kind.
    const KIND: ScalarKind;

    /// Smallest capacity a buffer of this kind is created with.
    const MIN_CAPACITY: usize;

    /// Encoded width in bytes, or `None` for variable-width kinds whose
    /// records delimit themselves.
    const WIDTH: Option<usize>;

    /// Ordering used when the caller does not supply one.
    type Order: Comparator<Self> + Default;

    /// Appends the encoding of `self` to `out`.
    fn encode(&self, out: &mut Vec<u8>);

    /// Decodes one value from the front of `bytes`.
    ///
    /// Returns the value and the number of bytes it occupied, or `None` if
    /// `bytes` does not start with a well-formed encoding.
    fn decode(bytes: &[u8]) -> Option<(Self, usize)>;
}

macro_rules! fixed_width_scalar {
    ($type:ty, $kind:ident, $min_capacity:expr, $to_bits:expr, $from_bits:expr, $bits:ty) => {
        impl Scalar for $type {
            const KIND: ScalarKind = ScalarKind::$kind;
            const MIN_CAPACITY: usize = $min_capacity;
            const WIDTH: Option<usize> = Some(std::mem::size_of::<$bits>());

            type Order = NativeOrder;

            #[inline]
            fn encode(&self, out: &mut Vec<u8>) {
                let to_bits: fn($type) -> $bits = $to_bits;
                out.extend_from_slice(&to_bits(*self).to_le_bytes());
            }

            #[inline]
            fn decode(bytes: &[u8]) -> Option<(Self, usize)> {
                const WIDTH: usize = std::mem::size_of::<$bits>();
                let from_bits: fn($bits) -> $type = $from_bits;
                let raw = bytes.get(..WIDTH)?.try_into().ok()?;
                Some((from_bits(<$bits>::from_le_bytes(raw)), WIDTH))
            }
        }
    };
}

fixed_width_scalar!(f64, Float64, 4, f64::to_bits, f64::from_bits, u64);
fixed_width_scalar!(i32, Int32, 8, |v| v, |v| v, i32);
fixed_width_scalar!(i64, Int64, 4, |v| v, |v| v, i64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags() {
        for kind in [
            ScalarKind::Float64,
            ScalarKind::Int32,
            ScalarKind::Int64,
            ScalarKind::Numeric,
        ] {
            assert_eq!(ScalarKind::from_tag(kind.tag()), Ok(kind));
        }
        assert_eq!(
            ScalarKind::from_tag(9),
            Err(CorruptionError::UnknownKind(9))
        );
        assert_eq!(ScalarKind::Int64.to_string(), "int64");
    }

    #[test]
    fn float_order_is_total() {
        let order = NativeOrder;
        assert_eq!(order.compare(&1.0, &2.0), Ordering::Less);
        assert_eq!(order.compare(&f64::NAN, &f64::INFINITY), Ordering::Greater);
        assert_eq!(order.compare(&f64::NAN, &f64::NAN), Ordering::Equal);
        assert_eq!(order.compare(&-0.0, &0.0), Ordering::Equal);
    }

    #[test]
    fn fixed_width_encoding() {
        let mut out = Vec::new();
        (-7i32).encode(&mut out);
        42i64.encode(&mut out);
        2.5f64.encode(&mut out);
        assert_eq!(out.len(), 4 + 8 + 8);

        let (a, n) = i32::decode(&out).unwrap();
        assert_eq!((a, n), (-7, 4));
        let (b, m) = i64::decode(&out[n..]).unwrap();
        assert_eq!((b, m), (42, 8));
        let (c, _) = f64::decode(&out[n + m..]).unwrap();
        assert_eq!(c, 2.5);

        assert!(i64::decode(&out[..7]).is_none());
    }
}
