//! Quantile fraction sets.

use crate::{config::EmptyFractions, error::QuantileError};
use smallvec::SmallVec;
use std::ops::Deref;

/// An array of fractions as handed over by the host, with its shape.
///
/// Hosts with multi-dimensional arrays pass their dimensions through so
/// that anything other than a flat list can be rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct FractionArray {
    dims: SmallVec<[usize; 2]>,
    values: Vec<f64>,
}

impl FractionArray {
    /// A one-dimensional array.
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            dims: SmallVec::from_slice(&[values.len()]),
            values,
        }
    }

    /// An array with explicit dimensions, stored in row-major order.
    pub fn with_dims(dims: &[usize], values: Vec<f64>) -> Self {
        Self {
            dims: SmallVec::from_slice(dims),
            values,
        }
    }

    /// Number of dimensions.
    pub fn ndims(&self) -> usize {
        self.dims.len()
    }

    /// Flattened values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

impl From<Vec<f64>> for FractionArray {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

impl From<&[f64]> for FractionArray {
    fn from(values: &[f64]) -> Self {
        Self::new(values.to_vec())
    }
}

/// The quantile fractions requested from one state, each in `[0,1]`.
///
/// Fixed when the state is created; later fractions are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct Fractions(SmallVec<[f64; 4]>);

impl Fractions {
    /// A single fraction.
    pub fn single(fraction: f64) -> Result<Self, QuantileError> {
        check_fraction(fraction)?;
        Ok(Self(SmallVec::from_slice(&[fraction])))
    }

    /// Reads fractions from a host array.
    ///
    /// The array must be one-dimensional; a zero-dimensional array is
    /// accepted only if it holds no elements (the usual shape of an empty
    /// array). Fails on the first fraction outside `[0,1]`.
    pub fn from_array(
        array: &FractionArray,
        empty: EmptyFractions,
    ) -> Result<Self, QuantileError> {
        let len = array.values.len();
        let well_formed = match array.dims.as_slice() {
            [] => len == 0,
            [n] => *n == len,
            _ => false,
        };
        if !well_formed {
            return Err(QuantileError::MalformedArrayInput {
                ndims: array.ndims(),
                len,
            });
        }
        if len == 0 && empty == EmptyFractions::Reject {
            return Err(QuantileError::EmptyFractions);
        }
        Self::from_slice(&array.values)
    }

    /// Validates and copies `fractions`.
    pub fn from_slice(fractions: &[f64]) -> Result<Self, QuantileError> {
        for fraction in fractions {
            check_fraction(*fraction)?;
        }
        Ok(Self(SmallVec::from_slice(fractions)))
    }

    /// Adopts fractions that were already checked to be in `[0,1]`.
    pub(crate) fn from_valid(fractions: &[f64]) -> Self {
        debug_assert!(fractions.iter().all(|f| check_fraction(*f).is_ok()));
        Self(SmallVec::from_slice(fractions))
    }

    /// The first fraction, used by single-quantile finalization.
    pub fn first(&self) -> Option<f64> {
        self.0.first().copied()
    }
}

impl Deref for Fractions {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

/// Fails unless `fraction` is in `[0,1]`. NaN fails.
pub fn check_fraction(fraction: f64) -> Result<(), QuantileError> {
    if (0.0..=1.0).contains(&fraction) {
        Ok(())
    } else {
        Err(QuantileError::InvalidFraction { value: fraction })
    }
}
