//! Append-only value buffer with lazy sorting.
//!
//! The buffer is in one of two states:
//!
//! ```text
//!            append()                     ensure_sorted()
//!  Sorted ─────────────▶ Unsorted ─────────────────────────▶ Sorted
//!                           ▲   │
//!                           └───┘ append()
//! ```
//!
//! Appending never tries to keep the values in order, so it stays O(1)
//! amortized. Anything that reads the values in order (selection,
//! serialization, merging) calls [`OrderedBuffer::ensure_sorted`] first.

use crate::{config::GrowthPolicy, scalar::Comparator};
use tracing::trace;

/// Growable buffer of scalar values, ordered by `C` on demand.
#[derive(Debug, Clone)]
pub struct OrderedBuffer<T, C> {
    values: Vec<T>,

    /// Logical capacity. Grows according to `growth` once `values` is full.
    capacity: usize,

    /// Capacity the buffer was created with; never shrinks below this.
    min_capacity: usize,

    growth: GrowthPolicy,

    /// Invariant: `sorted` implies `values` is non-decreasing under `order`.
    sorted: bool,

    order: C,
}

impl<T, C> OrderedBuffer<T, C>
where
    C: Comparator<T>,
{
    /// Creates an empty buffer.
    ///
    /// A fresh buffer counts as unsorted even though it is trivially in
    /// order.
    pub fn with_policy(capacity: usize, growth: GrowthPolicy, order: C) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: Vec::with_capacity(capacity),
            capacity,
            min_capacity: capacity,
            growth,
            sorted: false,
            order,
        }
    }

    /// Adopts `values`, which must already be sorted under `order`.
    pub fn from_sorted(
        values: Vec<T>,
        min_capacity: usize,
        growth: GrowthPolicy,
        order: C,
    ) -> Self {
        debug_assert!(values.windows(2).all(|w| !order.less(&w[1], &w[0])));
        let min_capacity = min_capacity.max(1);
        let mut values = values;
        let capacity = values.len().max(min_capacity);
        values.reserve_exact(capacity - values.len());
        Self {
            values,
            capacity,
            min_capacity,
            growth,
            sorted: true,
            order,
        }
    }

    /// Appends `value`, growing the buffer if it is full.
    pub fn append(&mut self, value: T) {
        if self.values.len() == self.capacity {
            let capacity = self.growth.next_capacity(self.capacity);
            trace!(from = self.capacity, to = capacity, "growing value buffer");
            self.values.reserve_exact(capacity - self.values.len());
            self.capacity = capacity;
        }
        debug_assert!(self.values.len() < self.capacity);
        self.values.push(value);
        self.sorted = false;
    }

    /// Sorts the values if they are not sorted yet.
    pub fn ensure_sorted(&mut self) {
        if self.sorted {
            return;
        }
        trace!(len = self.values.len(), "sorting value buffer");
        let order = &self.order;
        self.values.sort_by(|a, b| order.compare(a, b));
        self.sorted = true;
    }

    /// Merges two buffers into one sorted buffer in a single linear pass.
    ///
    /// Both inputs are sorted first if needed. The result takes its ordering
    /// and growth policy from `left`; on equal values, `left`'s come first.
    pub fn merge_sorted(mut left: Self, mut right: Self) -> Self {
        left.ensure_sorted();
        right.ensure_sorted();

        let len = left.values.len() + right.values.len();
        let capacity = len.max(left.min_capacity);
        let mut merged = Vec::with_capacity(capacity);

        let order = left.order;
        let mut left_iter = left.values.into_iter();
        let mut right_iter = right.values.into_iter();
        let (mut l, mut r) = (left_iter.next(), right_iter.next());
        loop {
            match (l.take(), r.take()) {
                (Some(a), Some(b)) => {
                    if order.less(&b, &a) {
                        merged.push(b);
                        l = Some(a);
                        r = right_iter.next();
                    } else {
                        merged.push(a);
                        l = left_iter.next();
                        r = Some(b);
                    }
                }
                (Some(a), None) => {
                    merged.push(a);
                    merged.extend(left_iter);
                    break;
                }
                (None, Some(b)) => {
                    merged.push(b);
                    merged.extend(right_iter);
                    break;
                }
                (None, None) => break,
            }
        }
        debug_assert_eq!(merged.len(), len);

        Self {
            values: merged,
            capacity,
            min_capacity: left.min_capacity,
            growth: left.growth,
            sorted: true,
            order,
        }
    }
}

impl<T, C> OrderedBuffer<T, C> {
    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no value was appended.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Logical capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true if the values are known to be sorted.
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// The values, in insertion order unless [`Self::is_sorted`].
    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    /// The ordering of this buffer.
    pub fn order(&self) -> &C {
        &self.order
    }

    /// The growth policy of this buffer.
    pub fn growth(&self) -> GrowthPolicy {
        self.growth
    }

    /// Consumes the buffer, returning its values.
    pub fn into_vec(self) -> Vec<T> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::{NativeOrder, OrderBy};

    fn buffer(values: &[i64]) -> OrderedBuffer<i64, NativeOrder> {
        let mut buffer = OrderedBuffer::with_policy(4, GrowthPolicy::Doubling, NativeOrder);
        for v in values {
            buffer.append(*v);
        }
        buffer
    }

    #[test]
    fn fresh_buffer_is_unsorted() {
        let buffer = buffer(&[]);
        assert!(buffer.is_empty());
        assert!(!buffer.is_sorted());
        assert_eq!(buffer.capacity(), 4);
    }

    #[test]
    fn doubling_keeps_insertion_order() {
        let values = [9, 3, 7, 1, 8, 2, 6, 4, 5];
        let buffer = buffer(&values);
        assert_eq!(buffer.capacity(), 16);
        assert_eq!(buffer.as_slice(), &values);
        assert!(!buffer.is_sorted());
    }

    #[test]
    fn slice_growth() {
        let mut buffer =
            OrderedBuffer::with_policy(4, GrowthPolicy::Slice { size: 3 }, NativeOrder);
        for v in 0..5i32 {
            buffer.append(v);
        }
        assert_eq!(buffer.capacity(), 7);
        for v in 5..8 {
            buffer.append(v);
        }
        assert_eq!(buffer.capacity(), 10);
        assert_eq!(buffer.len(), 8);
    }

    #[test]
    fn ensure_sorted_is_idempotent() {
        let mut buffer = buffer(&[5, 1, 3, 1, 4]);
        buffer.ensure_sorted();
        let once = buffer.as_slice().to_vec();
        buffer.ensure_sorted();
        assert_eq!(buffer.as_slice(), once.as_slice());
        assert_eq!(once, vec![1, 1, 3, 4, 5]);
        assert!(buffer.is_sorted());
    }

    #[test]
    fn append_after_sort_clears_flag() {
        let mut buffer = buffer(&[2, 1]);
        buffer.ensure_sorted();
        buffer.append(3);
        assert!(!buffer.is_sorted());
    }

    #[test]
    fn merge_sorted_runs() {
        let merged = OrderedBuffer::merge_sorted(buffer(&[3, 1, 5]), buffer(&[4, 2, 2, 6]));
        assert!(merged.is_sorted());
        assert_eq!(merged.as_slice(), &[1, 2, 2, 3, 4, 5, 6]);
        assert_eq!(merged.capacity(), 7);

        let merged = OrderedBuffer::merge_sorted(buffer(&[1]), buffer(&[]));
        assert_eq!(merged.as_slice(), &[1]);
        assert_eq!(merged.capacity(), 4);
    }

    #[test]
    fn custom_order() {
        let descending = OrderBy(|a: &i64, b: &i64| b.cmp(a));
        let mut left = OrderedBuffer::with_policy(4, GrowthPolicy::Doubling, descending);
        let mut right = OrderedBuffer::with_policy(4, GrowthPolicy::Doubling, descending);
        left.append(1);
        left.append(3);
        right.append(2);
        let merged = OrderedBuffer::merge_sorted(left, right);
        assert_eq!(merged.as_slice(), &[3, 2, 1]);
    }

    #[test]
    fn from_sorted_respects_minimum() {
        let buffer =
            OrderedBuffer::from_sorted(vec![1i32, 2], 8, GrowthPolicy::Doubling, NativeOrder);
        assert!(buffer.is_sorted());
        assert_eq!(buffer.capacity(), 8);
        assert_eq!(buffer.into_vec(), vec![1, 2]);
    }
}
