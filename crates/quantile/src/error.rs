//! Errors reported by quantile aggregates.

use crate::scalar::ScalarKind;
use thiserror::Error as ThisError;

/// Any kind of error encountered while accumulating, merging or transporting
/// a quantile state.
///
/// Every variant aborts the current aggregation step. Appending a null value
/// is not an error and never produces one.
#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum QuantileError {
    /// A quantile fraction outside `[0,1]` (or NaN) was supplied when the
    /// state was constructed.
    #[error("invalid percentile value {value} - needs to be in [0,1]")]
    InvalidFraction {
        /// The offending fraction.
        value: f64,
    },

    /// The fractions array is not one-dimensional, or its dimensions do not
    /// describe its element count.
    #[error("quantile fractions must be a one-dimensional array (got {ndims} dimension(s) over {len} element(s))")]
    MalformedArrayInput {
        /// Number of dimensions reported for the array.
        ndims: usize,
        /// Number of elements actually present.
        len: usize,
    },

    /// An empty fractions array was supplied and the configuration rejects
    /// those.
    #[error("quantile fractions array is empty")]
    EmptyFractions,

    /// A serialized state failed validation.
    #[error("Corrupt quantile state: {0}")]
    CorruptWireState(#[from] CorruptionError),

    /// An entry point was handed a state handle that does not belong to the
    /// aggregation arena it was called with, or that was already consumed.
    #[error("{function} called in non-aggregate context")]
    ContextMisuse {
        /// Name of the entry point.
        function: &'static str,
    },

    /// The configuration failed validation.
    #[error("invalid quantile configuration: {0}")]
    InvalidConfig(String),
}

/// Errors that indicate a problem with the contents of a serialized state.
#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum CorruptionError {
    /// The buffer cannot even hold the fixed-size header.
    #[error("state is {actual} bytes long, shorter than the {expected}-byte header")]
    TooShort {
        /// Actual length.
        actual: usize,
        /// Header length.
        expected: usize,
    },

    /// CRC32C checksum verification failed.
    #[error("state has invalid checksum {found:#x} (expected {expected:#x})")]
    ChecksumMismatch {
        /// Checksum computed over the received bytes.
        expected: u32,
        /// Checksum stored in the header.
        found: u32,
    },

    /// Wrong magic number.
    #[error("invalid magic: expected {expected:?}, found {found:?}")]
    InvalidMagic {
        /// Expected magic.
        expected: [u8; 4],
        /// Magic found in the header.
        found: [u8; 4],
    },

    /// Unknown format version.
    #[error("state has invalid version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Supported version.
        expected: u16,
        /// Version found in the header.
        found: u16,
    },

    /// Unknown scalar kind tag.
    #[error("unknown scalar kind tag {0}")]
    UnknownKind(u8),

    /// The state holds a different kind of scalar than the one requested.
    #[error("state holds {found} values but {expected} values were expected")]
    KindMismatch {
        /// Kind requested by the caller.
        expected: ScalarKind,
        /// Kind recorded in the header.
        found: ScalarKind,
    },

    /// The header does not describe a sorted payload.
    #[error("state is not flagged as sorted (flags {0:#04x})")]
    NotSorted(u8),

    /// Declared counts do not add up to the buffer length.
    #[error("{fractions} fraction(s) and a {payload}-byte payload need {expected} bytes, but the state is {actual} bytes long")]
    LengthMismatch {
        /// Declared fraction count.
        fractions: u64,
        /// Declared payload length.
        payload: u64,
        /// Total length implied by the header.
        expected: u64,
        /// Actual total length.
        actual: usize,
    },

    /// Fixed-width payload length disagrees with the element count.
    #[error("{count} element(s) of {width} bytes each need {expected} payload bytes, found {actual}")]
    PayloadMismatch {
        /// Declared element count.
        count: u64,
        /// Width of one element.
        width: usize,
        /// Payload length implied by the count.
        expected: u64,
        /// Declared payload length.
        actual: u64,
    },

    /// A variable-width record runs past the end of the payload or is
    /// internally inconsistent.
    #[error("record {index} at payload offset {offset} is malformed")]
    InvalidRecord {
        /// Index of the record.
        index: u64,
        /// Byte offset of the record within the payload.
        offset: usize,
    },

    /// Payload bytes remain after the declared number of records.
    #[error("{0} trailing byte(s) after the last record")]
    TrailingBytes(usize),

    /// A stored fraction is outside `[0,1]`.
    #[error("stored fraction {0} is outside [0,1]")]
    InvalidFraction(f64),

    /// Elements are not in non-decreasing order.
    #[error("element {0} is smaller than its predecessor")]
    Unsorted(u64),
}
