//! Nearest-rank selection.
//!
//! For a sorted sequence of `n` values and a fraction `f`, the selected
//! value is the one at 0-based index
//!
//! ```text
//! 0                   if f <= 0
//! n - 1               if f >= 1
//! ceil(n * f) - 1     otherwise
//! ```
//!
//! The upper bound is clamped explicitly instead of relying on
//! `ceil(n * 1.0) - 1 == n - 1`.

/// Returns the index selected for `fraction` in a sorted sequence of `len`
/// values, or `None` if `len == 0`.
#[inline]
pub fn select_index(len: usize, fraction: f64) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let index = if fraction <= 0.0 {
        0
    } else if fraction >= 1.0 {
        len - 1
    } else {
        // `len * fraction` is in `(0, len)`, so the ceiling is in `[1, len]`.
        let rank = (len as f64 * fraction).ceil() as usize;
        rank.clamp(1, len) - 1
    };
    Some(index)
}

/// Returns the value selected for `fraction` from `sorted`.
///
/// `sorted` must be in non-decreasing order.
#[inline]
pub fn select<T>(sorted: &[T], fraction: f64) -> Option<&T> {
    select_index(sorted.len(), fraction).map(|index| &sorted[index])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries() {
        assert_eq!(select_index(0, 0.5), None);
        assert_eq!(select_index(1, 0.0), Some(0));
        assert_eq!(select_index(1, 0.5), Some(0));
        assert_eq!(select_index(1, 1.0), Some(0));
        assert_eq!(select_index(10, 0.0), Some(0));
        assert_eq!(select_index(10, -0.0), Some(0));
        assert_eq!(select_index(10, 1.0), Some(9));
    }

    #[test]
    fn nearest_rank() {
        assert_eq!(select_index(4, 0.5), Some(1));
        assert_eq!(select_index(5, 0.5), Some(2));
        assert_eq!(select_index(4, 0.25), Some(0));
        assert_eq!(select_index(4, 0.26), Some(1));
        assert_eq!(select_index(4, 0.75), Some(2));
        assert_eq!(select_index(4, 0.99), Some(3));
        assert_eq!(select_index(100, 0.9), Some(89));
        assert_eq!(select_index(3, f64::MIN_POSITIVE), Some(0));
    }

    #[test]
    fn values() {
        let sorted = [10, 20, 30, 40];
        assert_eq!(select(&sorted, 0.0), Some(&10));
        assert_eq!(select(&sorted, 0.5), Some(&20));
        assert_eq!(select(&sorted, 1.0), Some(&40));
        assert_eq!(select::<i32>(&[], 0.5), None);
    }
}
