// Warn about missing docs, but not for item declared with `#[cfg(test)]`.
#![cfg_attr(not(test), warn(missing_docs))]

//! Exact, mergeable quantile aggregates.
//!
//! This crate computes percentiles over groups of values the way a SQL
//! engine evaluates an aggregate: values are fed one at a time into a
//! per-group [`QuantileState`], partial states built by different workers
//! are [combined](combine), and the result is extracted once at the end.
//! Results are exact: every value is kept, and the quantile for fraction
//! `f` over `n` sorted values is the value at 0-based index
//! `ceil(n * f) - 1` (nearest rank), with `f = 0` selecting the minimum and
//! `f = 1` the maximum.
//!
//! States can be flattened into a checksummed byte string (see
//! [`codec`]) so that partial aggregates can be moved between workers.
//!
//! # Supported kinds
//!
//! `f64`, `i32`, `i64` and the arbitrary-precision decimal [`Numeric`]. The
//! ordering of a state is a [`Comparator`], so hosts can supply their own
//! ordering (for example their own decimal comparison).
//!
//! # Entry points
//!
//! Hosts that manage ownership themselves use [`QuantileState`] and
//! [`combine`] directly:
//!
//! ```
//! use feldera_quantile::{combine, QuantileState};
//!
//! let mut left = None;
//! for v in [1.0, 3.0] {
//!     left = QuantileState::append(left, Some(v), 0.5)?;
//! }
//! let mut right = None;
//! for v in [2.0, 4.0] {
//!     right = QuantileState::append(right, Some(v), 0.5)?;
//! }
//!
//! let mut merged = combine(left, right).unwrap();
//! assert_eq!(merged.finalize(), Some(2.0));
//! # Ok::<(), feldera_quantile::QuantileError>(())
//! ```
//!
//! Hosts that drive aggregates through opaque state references use an
//! [`AggregateArena`] and the per-kind functions in [`aggregate`], such as
//! [`quantile_append_f64`] and [`quantile_f64`].

pub mod aggregate;
pub mod arena;
pub mod buffer;
pub mod codec;
pub mod config;
pub mod error;
pub mod fractions;
pub mod merge;
pub mod numeric;
pub mod scalar;
pub mod select;
pub mod state;

pub use aggregate::*;
pub use arena::{AggregateArena, StateHandle};
pub use buffer::OrderedBuffer;
pub use config::{EmptyFractions, GrowthPolicy, QuantileConfig};
pub use error::{CorruptionError, QuantileError};
pub use fractions::{FractionArray, Fractions};
pub use merge::combine;
pub use numeric::{Numeric, NumericOrder, ParseNumericError};
pub use scalar::{Comparator, NativeOrder, OrderBy, Scalar, ScalarKind};
pub use select::{select, select_index};
pub use state::QuantileState;
