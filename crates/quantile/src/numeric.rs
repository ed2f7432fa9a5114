//! Arbitrary-precision decimal values.

use crate::scalar::{Comparator, Scalar, ScalarKind};
use num_bigint::{BigInt, Sign};
use num_traits::{Signed, Zero};
use std::{
    cmp::Ordering,
    fmt::{self, Debug, Display},
    str::FromStr,
};
use thiserror::Error as ThisError;

/// Largest decimal exponent accepted by [`Numeric::from_str`], and the
/// largest scale a [`Numeric`] can carry.
pub const MAX_EXPONENT: u32 = 16_384;

/// `log10(2)`.
const LOG10_2: f64 = 0.301_029_995_663_981_2;

/// Decimal real number of unbounded precision.
///
/// # Representation
///
/// The number is represented as a [`BigInt`] significand and a `u32` scale,
/// that together express the value `significand * 10**-scale`.
///
/// # Invariants
///
/// * If `significand != 0 && scale != 0`, then `significand` is not a
///   multiple of 10.
/// * If `significand == 0`, then `scale` is zero.
/// * `scale <= MAX_EXPONENT`.
///
/// Because every value has exactly one representation, the derived equality
/// agrees with [`Ord`]: `1.0` and `1.00` are the same `Numeric`.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Numeric {
    sig: BigInt,
    scale: u32,
}

impl Numeric {
    /// Constructs the value `sig * 10**-scale`.
    ///
    /// # Panics
    ///
    /// Panics if `scale` exceeds [`MAX_EXPONENT`]. Use [`Numeric::try_new`]
    /// for untrusted input.
    pub fn new(sig: impl Into<BigInt>, scale: u32) -> Self {
        match Self::try_new(sig, scale) {
            Some(value) => value,
            None => panic!("decimal scale {scale} exceeds {MAX_EXPONENT}"),
        }
    }

    /// Constructs the value `sig * 10**-scale`, or returns `None` if `scale`
    /// exceeds [`MAX_EXPONENT`].
    pub fn try_new(sig: impl Into<BigInt>, scale: u32) -> Option<Self> {
        if scale > MAX_EXPONENT {
            return None;
        }
        let mut sig = sig.into();
        let mut scale = scale;
        if sig.is_zero() {
            return Some(Self { sig, scale: 0 });
        }
        let ten = BigInt::from(10u8);
        while scale > 0 && (&sig % &ten).is_zero() {
            sig /= &ten;
            scale -= 1;
        }
        Some(Self { sig, scale })
    }

    /// Lower and upper bounds on `log10(|self|)`, for a nonzero value.
    fn magnitude_bounds(&self) -> (f64, f64) {
        let bits = self.sig.bits() as f64;
        let scale = f64::from(self.scale);
        ((bits - 1.0) * LOG10_2 - scale, bits * LOG10_2 - scale)
    }

    /// Zero.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Returns the canonical significand.
    pub fn significand(&self) -> &BigInt {
        &self.sig
    }

    /// Returns the canonical scale.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Returns true if the value is below zero.
    pub fn is_negative(&self) -> bool {
        self.sig.is_negative()
    }

    /// Returns the sign of the value.
    pub fn sign(&self) -> Sign {
        self.sig.sign()
    }
}

impl From<i64> for Numeric {
    fn from(value: i64) -> Self {
        Self::new(value, 0)
    }
}

impl From<i32> for Numeric {
    fn from(value: i32) -> Self {
        Self::new(value, 0)
    }
}

impl From<BigInt> for Numeric {
    fn from(value: BigInt) -> Self {
        Self::new(value, 0)
    }
}

impl PartialOrd for Numeric {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Numeric {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.sig.sign().cmp(&other.sig.sign()) {
            Ordering::Equal => (),
            ordering => return ordering,
        }
        if self.sig.is_zero() {
            return Ordering::Equal;
        }

        // Values whose magnitudes are far apart are ordered without
        // rescaling. The margin absorbs floating-point error.
        let (low, high) = self.magnitude_bounds();
        let (other_low, other_high) = other.magnitude_bounds();
        let magnitude = if high + 1.0 < other_low {
            Some(Ordering::Less)
        } else if other_high + 1.0 < low {
            Some(Ordering::Greater)
        } else {
            None
        };
        if let Some(ordering) = magnitude {
            return if self.is_negative() {
                ordering.reverse()
            } else {
                ordering
            };
        }

        match self.scale.cmp(&other.scale) {
            Ordering::Equal => self.sig.cmp(&other.sig),
            Ordering::Less => {
                let multiplier = BigInt::from(10u8).pow(other.scale - self.scale);
                (&self.sig * multiplier).cmp(&other.sig)
            }
            Ordering::Greater => {
                let multiplier = BigInt::from(10u8).pow(self.scale - other.scale);
                self.sig.cmp(&(&other.sig * multiplier))
            }
        }
    }
}

impl Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.sig.magnitude().to_string();
        let scale = self.scale as usize;
        let digits = if digits.len() <= scale {
            format!("{}{digits}", "0".repeat(scale + 1 - digits.len()))
        } else {
            digits
        };
        let (integer, fraction) = digits.split_at(digits.len() - scale);
        let mut buf = String::with_capacity(digits.len() + 1);
        buf.push_str(integer);
        if !fraction.is_empty() {
            buf.push('.');
            buf.push_str(fraction);
        }
        f.pad_integral(!self.is_negative(), "", &buf)
    }
}

impl Debug for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Error returned when parsing a [`Numeric`].
#[derive(ThisError, Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParseNumericError {
    /// Invalid syntax.
    #[error("invalid decimal syntax")]
    SyntaxError,

    /// Exponent beyond [`MAX_EXPONENT`].
    #[error("decimal exponent out of range")]
    OutOfRange,
}

impl FromStr for Numeric {
    type Err = ParseNumericError;

    /// Parses `s` as a decimal.
    ///
    /// Accepts an optional sign, digits with at most one decimal point, and
    /// an optional `e`/`E` exponent. Infinities and NaN are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (mantissa, exponent) = match s.find(['e', 'E']) {
            Some(pos) => {
                let e: i64 = s[pos + 1..]
                    .parse()
                    .map_err(|_| ParseNumericError::SyntaxError)?;
                (&s[..pos], e)
            }
            None => (s, 0),
        };

        let (negative, unsigned) = match mantissa.as_bytes().first() {
            Some(b'-') => (true, &mantissa[1..]),
            Some(b'+') => (false, &mantissa[1..]),
            _ => (false, mantissa),
        };

        let mut digits = String::with_capacity(unsigned.len());
        let mut fraction_digits = 0i64;
        let mut saw_dot = false;
        for c in unsigned.chars() {
            match c {
                '0'..='9' => {
                    digits.push(c);
                    if saw_dot {
                        fraction_digits += 1;
                    }
                }
                '.' if !saw_dot => saw_dot = true,
                _ => return Err(ParseNumericError::SyntaxError),
            }
        }
        if digits.is_empty() {
            return Err(ParseNumericError::SyntaxError);
        }

        let mut sig: BigInt = digits
            .parse()
            .map_err(|_| ParseNumericError::SyntaxError)?;
        if sig.is_zero() {
            return Ok(Self::zero());
        }
        if negative {
            sig = -sig;
        }

        let exponent = exponent.saturating_sub(fraction_digits);
        if exponent.unsigned_abs() > MAX_EXPONENT as u64 {
            return Err(ParseNumericError::OutOfRange);
        }
        if exponent >= 0 {
            Ok(Self::new(sig * BigInt::from(10u8).pow(exponent as u32), 0))
        } else {
            Ok(Self::new(sig, (-exponent) as u32))
        }
    }
}

/// Each value is one self-delimiting record:
///
/// ```text
/// [body_len: u32][scale: u32][significand: two's-complement LE bytes]
/// ```
///
/// where `body_len` counts the scale and significand bytes.
impl Scalar for Numeric {
    const KIND: ScalarKind = ScalarKind::Numeric;
    const MIN_CAPACITY: usize = 4;
    const WIDTH: Option<usize> = None;

    type Order = NumericOrder;

    fn encode(&self, out: &mut Vec<u8>) {
        let sig = self.sig.to_signed_bytes_le();
        let body_len = (4 + sig.len()) as u32;
        out.extend_from_slice(&body_len.to_le_bytes());
        out.extend_from_slice(&self.scale.to_le_bytes());
        out.extend_from_slice(&sig);
    }

    fn decode(bytes: &[u8]) -> Option<(Self, usize)> {
        let body_len = u32::from_le_bytes(bytes.get(..4)?.try_into().ok()?) as usize;
        if body_len < 5 {
            return None;
        }
        let body = bytes.get(4..4 + body_len)?;
        let scale = u32::from_le_bytes(body[..4].try_into().ok()?);
        let sig = BigInt::from_signed_bytes_le(&body[4..]);
        Some((Self::try_new(sig, scale)?, 4 + body_len))
    }
}

/// Orders [`Numeric`] values by their numeric value.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NumericOrder;

impl Comparator<Numeric> for NumericOrder {
    #[inline]
    fn compare(&self, left: &Numeric, right: &Numeric) -> Ordering {
        left.cmp(right)
    }
}
