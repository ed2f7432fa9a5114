//! Per-kind aggregate entry points.
//!
//! Each scalar kind gets the same family of functions, operating on states
//! stored in an [`AggregateArena`]:
//!
//! | function                           | step                                  |
//! |------------------------------------|---------------------------------------|
//! | `quantile_append_<kind>`           | accumulate, one fraction              |
//! | `quantile_append_array_<kind>`     | accumulate, array of fractions        |
//! | `quantile_<kind>`                  | final value at the first fraction     |
//! | `quantile_array_<kind>`            | final values at every fraction        |
//! | `quantile_serialize_<kind>`        | state to bytes (consumes the state)   |
//! | `quantile_deserialize_<kind>`      | bytes to state                        |
//! | `quantile_combine_<kind>`          | merge two partial states              |
//!
//! where `<kind>` is one of `f64`, `i32`, `i64` and `numeric`.

use crate::{
    arena::{AggregateArena, StateHandle},
    error::QuantileError,
    fractions::FractionArray,
    merge,
    numeric::Numeric,
    scalar::{Comparator, Scalar},
    state::QuantileState,
};

/// Arena of `f64` quantile states.
pub type Float64Arena = AggregateArena<f64>;

/// Arena of `i32` quantile states.
pub type Int32Arena = AggregateArena<i32>;

/// Arena of `i64` quantile states.
pub type Int64Arena = AggregateArena<i64>;

/// Arena of decimal quantile states.
pub type NumericArena = AggregateArena<Numeric>;

fn append_in<T, C>(
    arena: &mut AggregateArena<T, C>,
    function: &'static str,
    state: Option<StateHandle<T>>,
    value: Option<T>,
    fraction: f64,
) -> Result<Option<StateHandle<T>>, QuantileError>
where
    T: Scalar,
    C: Comparator<T>,
{
    match state {
        Some(handle) => accumulate(arena, function, handle, value),
        None => {
            let order = arena.order().clone();
            let state = QuantileState::append_with(None, value, fraction, arena.config(), order)?;
            Ok(state.map(|state| arena.insert(state)))
        }
    }
}

fn append_array_in<T, C>(
    arena: &mut AggregateArena<T, C>,
    function: &'static str,
    state: Option<StateHandle<T>>,
    value: Option<T>,
    fractions: &FractionArray,
) -> Result<Option<StateHandle<T>>, QuantileError>
where
    T: Scalar,
    C: Comparator<T>,
{
    match state {
        Some(handle) => accumulate(arena, function, handle, value),
        None => {
            let order = arena.order().clone();
            let state =
                QuantileState::append_array_with(None, value, fractions, arena.config(), order)?;
            Ok(state.map(|state| arena.insert(state)))
        }
    }
}

/// Adds `value` to a live state. Fractions passed after the first step are
/// ignored.
fn accumulate<T, C>(
    arena: &mut AggregateArena<T, C>,
    function: &'static str,
    handle: StateHandle<T>,
    value: Option<T>,
) -> Result<Option<StateHandle<T>>, QuantileError>
where
    T: Scalar,
    C: Comparator<T>,
{
    let state = arena.resolve(handle, function)?;
    if let Some(value) = value {
        state.push(value);
    }
    Ok(Some(handle))
}

fn finalize_in<T, C>(
    arena: &mut AggregateArena<T, C>,
    function: &'static str,
    state: Option<StateHandle<T>>,
) -> Result<Option<T>, QuantileError>
where
    T: Scalar,
    C: Comparator<T>,
{
    match state {
        None => Ok(None),
        Some(handle) => Ok(arena.resolve(handle, function)?.finalize()),
    }
}

fn finalize_array_in<T, C>(
    arena: &mut AggregateArena<T, C>,
    function: &'static str,
    state: Option<StateHandle<T>>,
) -> Result<Option<Vec<T>>, QuantileError>
where
    T: Scalar,
    C: Comparator<T>,
{
    match state {
        None => Ok(None),
        Some(handle) => Ok(Some(arena.resolve(handle, function)?.finalize_array())),
    }
}

fn serialize_in<T, C>(
    arena: &mut AggregateArena<T, C>,
    function: &'static str,
    state: StateHandle<T>,
) -> Result<Vec<u8>, QuantileError>
where
    T: Scalar,
    C: Comparator<T>,
{
    let mut state = arena.take(state, function)?;
    Ok(state.to_bytes())
}

fn deserialize_in<T, C>(
    arena: &mut AggregateArena<T, C>,
    bytes: &[u8],
) -> Result<StateHandle<T>, QuantileError>
where
    T: Scalar,
    C: Comparator<T>,
{
    let state = QuantileState::from_bytes_with(bytes, arena.config(), arena.order().clone())?;
    Ok(arena.insert(state))
}

fn combine_in<T, C>(
    arena: &mut AggregateArena<T, C>,
    function: &'static str,
    left: Option<StateHandle<T>>,
    right: Option<StateHandle<T>>,
) -> Result<Option<StateHandle<T>>, QuantileError>
where
    T: Scalar,
    C: Comparator<T>,
{
    let Some(right) = right else {
        if let Some(left) = left {
            arena.resolve(left, function)?;
        }
        return Ok(left);
    };

    // Check both handles before consuming either.
    let misuse = QuantileError::ContextMisuse { function };
    if left == Some(right)
        || !arena.contains(right)
        || left.is_some_and(|left| !arena.contains(left))
    {
        return Err(misuse);
    }

    let right = arena.take(right, function)?;
    let left = left
        .map(|left| arena.take(left, function))
        .transpose()?;
    Ok(merge::combine(left, Some(right)).map(|state| arena.insert(state)))
}

macro_rules! quantile_entry_points {
    ($short_name:ident, $type:ty) => {
        ::paste::paste! {
            #[doc = concat!("Accumulates a `", stringify!($type), "` value for a single quantile.")]
            ///
            /// A null `value` leaves `state` as it is. The first non-null value
            /// creates the state and fixes its fraction, which must be in
            /// `[0,1]`; `fraction` is ignored afterwards.
            pub fn [<quantile_append_ $short_name>]<C: Comparator<$type>>(
                arena: &mut AggregateArena<$type, C>,
                state: Option<StateHandle<$type>>,
                value: Option<$type>,
                fraction: f64,
            ) -> Result<Option<StateHandle<$type>>, QuantileError> {
                append_in(
                    arena,
                    concat!("quantile_append_", stringify!($short_name)),
                    state,
                    value,
                    fraction,
                )
            }

            #[doc = concat!("Accumulates a `", stringify!($type), "` value for an array of quantiles.")]
            ///
            /// Like the single-quantile variant, except that a new state reads
            /// its fractions from the one-dimensional array `fractions`.
            pub fn [<quantile_append_array_ $short_name>]<C: Comparator<$type>>(
                arena: &mut AggregateArena<$type, C>,
                state: Option<StateHandle<$type>>,
                value: Option<$type>,
                fractions: &FractionArray,
            ) -> Result<Option<StateHandle<$type>>, QuantileError> {
                append_array_in(
                    arena,
                    concat!("quantile_append_array_", stringify!($short_name)),
                    state,
                    value,
                    fractions,
                )
            }

            #[doc = concat!("The `", stringify!($type), "` value at the state's first fraction, or null for an empty group.")]
            pub fn [<quantile_ $short_name>]<C: Comparator<$type>>(
                arena: &mut AggregateArena<$type, C>,
                state: Option<StateHandle<$type>>,
            ) -> Result<Option<$type>, QuantileError> {
                finalize_in(
                    arena,
                    concat!("quantile_", stringify!($short_name)),
                    state,
                )
            }

            #[doc = concat!("One `", stringify!($type), "` value per fraction of the state, or null for an empty group.")]
            pub fn [<quantile_array_ $short_name>]<C: Comparator<$type>>(
                arena: &mut AggregateArena<$type, C>,
                state: Option<StateHandle<$type>>,
            ) -> Result<Option<Vec<$type>>, QuantileError> {
                finalize_array_in(
                    arena,
                    concat!("quantile_array_", stringify!($short_name)),
                    state,
                )
            }

            /// Serializes a state, removing it from the arena.
            pub fn [<quantile_serialize_ $short_name>]<C: Comparator<$type>>(
                arena: &mut AggregateArena<$type, C>,
                state: StateHandle<$type>,
            ) -> Result<Vec<u8>, QuantileError> {
                serialize_in(
                    arena,
                    concat!("quantile_serialize_", stringify!($short_name)),
                    state,
                )
            }

            /// Deserializes a state into the arena.
            pub fn [<quantile_deserialize_ $short_name>]<C: Comparator<$type>>(
                arena: &mut AggregateArena<$type, C>,
                bytes: &[u8],
            ) -> Result<StateHandle<$type>, QuantileError> {
                deserialize_in(arena, bytes)
            }

            /// Combines two partial states.
            ///
            /// Every state passed in is consumed, except for `left` when
            /// `right` is null. Use the returned handle afterwards.
            pub fn [<quantile_combine_ $short_name>]<C: Comparator<$type>>(
                arena: &mut AggregateArena<$type, C>,
                left: Option<StateHandle<$type>>,
                right: Option<StateHandle<$type>>,
            ) -> Result<Option<StateHandle<$type>>, QuantileError> {
                combine_in(
                    arena,
                    concat!("quantile_combine_", stringify!($short_name)),
                    left,
                    right,
                )
            }
        }
    };
}

quantile_entry_points!(f64, f64);
quantile_entry_points!(i32, i32);
quantile_entry_points!(i64, i64);
quantile_entry_points!(numeric, Numeric);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{EmptyFractions, QuantileConfig},
        scalar::{NativeOrder, OrderBy},
    };

    #[test]
    fn median() {
        let mut arena = Float64Arena::new();
        let mut state = None;
        for v in [5.0, 1.0, 3.0, 2.0, 4.0] {
            state = quantile_append_f64(&mut arena, state, Some(v), 0.5).unwrap();
        }
        assert_eq!(quantile_f64(&mut arena, state).unwrap(), Some(3.0));
        assert_eq!(arena.live(), 1);
    }

    #[test]
    fn nulls() {
        let mut arena = Int64Arena::new();
        assert_eq!(quantile_append_i64(&mut arena, None, None, 0.5).unwrap(), None);
        assert_eq!(quantile_i64(&mut arena, None).unwrap(), None);
        assert_eq!(quantile_array_i64(&mut arena, None).unwrap(), None);
        assert_eq!(quantile_combine_i64(&mut arena, None, None).unwrap(), None);

        let state = quantile_append_i64(&mut arena, None, Some(1), 0.5).unwrap();
        assert_eq!(quantile_append_i64(&mut arena, state, None, 0.5).unwrap(), state);
        assert_eq!(arena.live(), 1);
    }

    #[test]
    fn stale_handles_are_misuse() {
        let mut arena = Int32Arena::new();
        let state = quantile_append_i32(&mut arena, None, Some(1), 0.5)
            .unwrap()
            .unwrap();
        let bytes = quantile_serialize_i32(&mut arena, state).unwrap();
        assert!(!bytes.is_empty());

        assert_eq!(
            quantile_i32(&mut arena, Some(state)).unwrap_err(),
            QuantileError::ContextMisuse {
                function: "quantile_i32"
            }
        );
        assert_eq!(
            quantile_append_i32(&mut arena, Some(state), None, 0.5).unwrap_err(),
            QuantileError::ContextMisuse {
                function: "quantile_append_i32"
            }
        );
        assert_eq!(
            quantile_serialize_i32(&mut arena, state)
                .unwrap_err()
                .to_string(),
            "quantile_serialize_i32 called in non-aggregate context"
        );
    }

    #[test]
    fn combine_consumes_operands() {
        let mut arena = Float64Arena::new();
        let left = quantile_append_f64(&mut arena, None, Some(1.0), 0.5).unwrap();
        let left = quantile_append_f64(&mut arena, left, Some(3.0), 0.5).unwrap();
        let right = quantile_append_f64(&mut arena, None, Some(2.0), 0.5).unwrap();
        let right = quantile_append_f64(&mut arena, right, Some(4.0), 0.5).unwrap();

        let merged = quantile_combine_f64(&mut arena, left, right).unwrap();
        assert_eq!(arena.live(), 1);
        assert!(!arena.contains(left.unwrap()));
        assert!(!arena.contains(right.unwrap()));
        assert_eq!(quantile_f64(&mut arena, merged).unwrap(), Some(2.0));

        // Right absent: left is returned as it is.
        assert_eq!(quantile_combine_f64(&mut arena, merged, None).unwrap(), merged);

        // Left absent: right moves to a new handle.
        let moved = quantile_combine_f64(&mut arena, None, merged).unwrap();
        assert_ne!(moved, merged);
        assert!(!arena.contains(merged.unwrap()));
        assert_eq!(quantile_f64(&mut arena, moved).unwrap(), Some(2.0));
    }

    #[test]
    fn combine_rejects_bad_operands_without_consuming() {
        let mut arena = Int64Arena::new();
        let state = quantile_append_i64(&mut arena, None, Some(1), 0.5).unwrap();
        assert!(matches!(
            quantile_combine_i64(&mut arena, state, state),
            Err(QuantileError::ContextMisuse { .. })
        ));

        let mut other = Int64Arena::new();
        let foreign = quantile_append_i64(&mut other, None, Some(2), 0.5).unwrap();
        assert!(quantile_combine_i64(&mut arena, state, foreign).is_err());
        assert!(quantile_combine_i64(&mut arena, foreign, state).is_err());
        assert!(arena.contains(state.unwrap()));
        assert!(other.contains(foreign.unwrap()));
    }

    #[test]
    fn transport_between_arenas() {
        let fractions = FractionArray::new(vec![0.0, 0.5, 1.0]);
        let mut worker = Int32Arena::new();
        let mut state = None;
        for v in [40, 10, 30, 20] {
            state = quantile_append_array_i32(&mut worker, state, Some(v), &fractions).unwrap();
        }
        let bytes = quantile_serialize_i32(&mut worker, state.unwrap()).unwrap();
        assert_eq!(worker.live(), 0);

        let mut coordinator = Int32Arena::new();
        let state = quantile_deserialize_i32(&mut coordinator, &bytes).unwrap();
        assert_eq!(
            quantile_array_i32(&mut coordinator, Some(state)).unwrap(),
            Some(vec![10, 20, 40])
        );
    }

    #[test]
    fn numeric_with_custom_order() {
        let descending = OrderBy(|a: &Numeric, b: &Numeric| b.cmp(a));
        let mut arena =
            AggregateArena::with_order(Default::default(), descending).unwrap();
        let mut state = None;
        for v in ["1.5", "-2", "10"] {
            let value: Numeric = v.parse().unwrap();
            state = quantile_append_numeric(&mut arena, state, Some(value), 0.0).unwrap();
        }
        assert_eq!(
            quantile_numeric(&mut arena, state).unwrap(),
            Some(Numeric::from(10))
        );
    }

    #[test]
    fn first_step_matches_direct_state() {
        let config = QuantileConfig {
            empty_fractions: EmptyFractions::Reject,
            ..Default::default()
        };
        let mut arena = Int32Arena::with_config(config.clone()).unwrap();
        let arrays = [
            FractionArray::new(vec![]),
            FractionArray::new(vec![0.5, 2.0]),
            FractionArray::with_dims(&[2, 1], vec![0.1, 0.2]),
            FractionArray::new(vec![0.25, 0.75]),
        ];
        for fractions in &arrays {
            for value in [None, Some(4)] {
                let direct = QuantileState::<i32>::append_array_with(
                    None,
                    value,
                    fractions,
                    &config,
                    NativeOrder,
                );
                match (direct, quantile_append_array_i32(&mut arena, None, value, fractions)) {
                    (Ok(None), Ok(None)) => {}
                    (Ok(Some(mut direct)), Ok(Some(handle))) => {
                        let stored = arena.get_mut(handle).unwrap();
                        assert_eq!(stored.fractions(), direct.fractions());
                        assert_eq!(stored.finalize_array(), direct.finalize_array());
                    }
                    (Err(direct), Err(stepped)) => assert_eq!(stepped, direct),
                    (direct, stepped) => panic!("direct {direct:?}, arena {stepped:?}"),
                }
            }
        }
        assert_eq!(arena.live(), 1);

        let mut arena = Float64Arena::new();
        for fraction in [-0.1, 0.0, 0.5, 1.0, 1.5] {
            for value in [None, Some(2.5)] {
                let direct = QuantileState::<f64>::append(None, value, fraction);
                match (direct, quantile_append_f64(&mut arena, None, value, fraction)) {
                    (Ok(None), Ok(None)) => {}
                    (Ok(Some(mut direct)), Ok(Some(handle))) => {
                        let stored = arena.get_mut(handle).unwrap();
                        assert_eq!(stored.fractions(), direct.fractions());
                        assert_eq!(stored.finalize(), direct.finalize());
                    }
                    (Err(direct), Err(stepped)) => assert_eq!(stepped, direct),
                    (direct, stepped) => panic!("direct {direct:?}, arena {stepped:?}"),
                }
            }
        }
        assert_eq!(arena.live(), 3);
    }

    #[test]
    fn invalid_fraction_creates_nothing() {
        let mut arena = Float64Arena::new();
        assert_eq!(
            quantile_append_f64(&mut arena, None, Some(1.0), 1.5).unwrap_err(),
            QuantileError::InvalidFraction { value: 1.5 }
        );
        assert_eq!(arena.live(), 0);
    }
}
