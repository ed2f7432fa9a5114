//! Per-group accumulator state.

use crate::{
    buffer::OrderedBuffer,
    config::QuantileConfig,
    error::QuantileError,
    fractions::{FractionArray, Fractions},
    scalar::{Comparator, Scalar},
    select::select,
};

/// Accumulates the values of one group and answers quantile queries over
/// them.
///
/// A state is created by the first non-null value of its group and fixes
/// the group's quantile fractions at that point.
#[derive(Debug, Clone)]
pub struct QuantileState<T, C = <T as Scalar>::Order>
where
    T: Scalar,
{
    fractions: Fractions,
    buffer: OrderedBuffer<T, C>,
}

impl<T> QuantileState<T>
where
    T: Scalar,
{
    /// Accumulates `value` for a single-quantile aggregate, with the default
    /// configuration and ordering.
    ///
    /// See [`Self::append_with`].
    pub fn append(
        state: Option<Self>,
        value: Option<T>,
        fraction: f64,
    ) -> Result<Option<Self>, QuantileError> {
        Self::append_with(
            state,
            value,
            fraction,
            &QuantileConfig::default(),
            T::Order::default(),
        )
    }

    /// Accumulates `value` for a multi-quantile aggregate, with the default
    /// configuration and ordering.
    ///
    /// See [`Self::append_array_with`].
    pub fn append_array(
        state: Option<Self>,
        value: Option<T>,
        fractions: &FractionArray,
    ) -> Result<Option<Self>, QuantileError> {
        Self::append_array_with(
            state,
            value,
            fractions,
            &QuantileConfig::default(),
            T::Order::default(),
        )
    }
}

impl<T, C> QuantileState<T, C>
where
    T: Scalar,
    C: Comparator<T>,
{
    /// Creates an empty state.
    pub fn new(fractions: Fractions, config: &QuantileConfig, order: C) -> Self {
        let buffer = OrderedBuffer::with_policy(
            config.capacity_for(T::MIN_CAPACITY),
            config.growth,
            order,
        );
        Self { fractions, buffer }
    }

    pub(crate) fn from_parts(fractions: Fractions, buffer: OrderedBuffer<T, C>) -> Self {
        Self { fractions, buffer }
    }

    pub(crate) fn into_parts(self) -> (Fractions, OrderedBuffer<T, C>) {
        (self.fractions, self.buffer)
    }

    /// One step of a single-quantile aggregate.
    ///
    /// A null `value` leaves `state` untouched, including a null `state`.
    /// Otherwise a missing state is created with `fraction` as its only
    /// fraction (which must be in `[0,1]`), and `value` is appended. The
    /// `fraction` of later calls is ignored.
    pub fn append_with(
        state: Option<Self>,
        value: Option<T>,
        fraction: f64,
        config: &QuantileConfig,
        order: C,
    ) -> Result<Option<Self>, QuantileError> {
        let Some(value) = value else {
            return Ok(state);
        };
        let mut state = match state {
            Some(state) => state,
            None => Self::new(Fractions::single(fraction)?, config, order),
        };
        state.push(value);
        Ok(Some(state))
    }

    /// One step of a multi-quantile aggregate.
    ///
    /// Like [`Self::append_with`], except that a new state reads its
    /// fractions from `fractions`, which must be a one-dimensional array of
    /// values in `[0,1]`.
    pub fn append_array_with(
        state: Option<Self>,
        value: Option<T>,
        fractions: &FractionArray,
        config: &QuantileConfig,
        order: C,
    ) -> Result<Option<Self>, QuantileError> {
        let Some(value) = value else {
            return Ok(state);
        };
        let mut state = match state {
            Some(state) => state,
            None => Self::new(
                Fractions::from_array(fractions, config.empty_fractions)?,
                config,
                order,
            ),
        };
        state.push(value);
        Ok(Some(state))
    }

    /// Appends a non-null value.
    pub fn push(&mut self, value: T) {
        self.buffer.append(value);
    }

    /// The value at the first stored fraction, or `None` if there is no
    /// fraction or no value.
    pub fn finalize(&mut self) -> Option<T> {
        let fraction = self.fractions.first()?;
        self.buffer.ensure_sorted();
        select(self.buffer.as_slice(), fraction).cloned()
    }

    /// One value per stored fraction, in the order the fractions were given.
    ///
    /// Empty if the state has no fraction or no value.
    pub fn finalize_array(&mut self) -> Vec<T> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        self.buffer.ensure_sorted();
        let sorted = self.buffer.as_slice();
        self.fractions
            .iter()
            .filter_map(|fraction| select(sorted, *fraction).cloned())
            .collect()
    }

    /// Sorts the values if they are not sorted yet.
    pub fn ensure_sorted(&mut self) {
        self.buffer.ensure_sorted();
    }

    /// Sorts the values if needed and returns them.
    pub fn sorted_values(&mut self) -> &[T] {
        self.buffer.ensure_sorted();
        self.buffer.as_slice()
    }

    /// The fractions fixed when this state was created.
    pub fn fractions(&self) -> &Fractions {
        &self.fractions
    }

    /// The accumulated values.
    pub fn buffer(&self) -> &OrderedBuffer<T, C> {
        &self.buffer
    }

    /// Number of accumulated values.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no value was accumulated.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
