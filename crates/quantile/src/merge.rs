//! Combining partial states.

use crate::{
    buffer::OrderedBuffer,
    scalar::{Comparator, Scalar},
    state::QuantileState,
};
use tracing::{debug, warn};

/// Combines two partial states built over disjoint partitions of a group.
///
/// Either side may be absent. With both present, the result holds the
/// values of both in sorted order and keeps `left`'s fractions; `right` is
/// consumed. Combining is associative and commutative over the values, so
/// the final quantiles do not depend on how the input was partitioned.
pub fn combine<T, C>(
    left: Option<QuantileState<T, C>>,
    right: Option<QuantileState<T, C>>,
) -> Option<QuantileState<T, C>>
where
    T: Scalar,
    C: Comparator<T>,
{
    match (left, right) {
        (left, None) => left,
        (None, right) => right,
        (Some(left), Some(right)) => Some(combine_states(left, right)),
    }
}

fn combine_states<T, C>(
    left: QuantileState<T, C>,
    right: QuantileState<T, C>,
) -> QuantileState<T, C>
where
    T: Scalar,
    C: Comparator<T>,
{
    let (fractions, left) = left.into_parts();
    let (right_fractions, right) = right.into_parts();
    if fractions != right_fractions {
        warn!(
            kind = %T::KIND,
            left = ?fractions,
            right = ?right_fractions,
            "combining quantile states with different fractions, keeping the left ones"
        );
    }
    debug!(
        kind = %T::KIND,
        left = left.len(),
        right = right.len(),
        "combining quantile states"
    );
    QuantileState::from_parts(fractions, OrderedBuffer::merge_sorted(left, right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fractions::FractionArray;

    fn state(values: &[f64], fraction: f64) -> QuantileState<f64> {
        let mut state = None;
        for v in values {
            state = QuantileState::append(state, Some(*v), fraction).unwrap();
        }
        state.unwrap()
    }

    #[test]
    fn absent_operands() {
        assert!(combine::<f64, <f64 as Scalar>::Order>(None, None).is_none());

        let merged = combine(Some(state(&[2.0, 1.0], 0.5)), None).unwrap();
        assert_eq!(merged.buffer().as_slice(), &[2.0, 1.0]);

        let merged = combine(None, Some(state(&[2.0, 1.0], 0.5))).unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn medians_of_partitions() {
        let mut merged = combine(
            Some(state(&[1.0, 3.0], 0.5)),
            Some(state(&[2.0, 4.0], 0.5)),
        )
        .unwrap();
        assert!(merged.buffer().is_sorted());
        assert_eq!(merged.buffer().as_slice(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(merged.finalize(), Some(2.0));
    }

    #[test]
    fn left_fractions_win() {
        let mut merged = combine(
            Some(state(&[1.0, 3.0], 1.0)),
            Some(state(&[2.0, 4.0], 0.0)),
        )
        .unwrap();
        assert_eq!(&**merged.fractions(), &[1.0]);
        assert_eq!(merged.finalize(), Some(4.0));

        let mut merged = combine(
            Some(state(&[2.0, 4.0], 0.0)),
            Some(state(&[1.0, 3.0], 1.0)),
        )
        .unwrap();
        assert_eq!(merged.finalize(), Some(1.0));
    }

    #[test]
    fn merged_state_keeps_accumulating() {
        let fractions = FractionArray::new(vec![0.0, 1.0]);
        let left = QuantileState::<i64>::append_array(None, Some(5), &fractions).unwrap();
        let right = QuantileState::<i64>::append_array(None, Some(7), &fractions).unwrap();
        let merged = combine(left, right);
        let merged = QuantileState::append_array(merged, Some(-1), &fractions).unwrap();
        let mut merged = merged.unwrap();
        assert!(!merged.buffer().is_sorted());
        assert_eq!(merged.finalize_array(), vec![-1, 7]);
    }
}
