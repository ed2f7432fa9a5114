//! Transport format for quantile states.
//!
//! A state is flattened into one checksummed byte string so that partial
//! aggregates can be shipped between workers and merged elsewhere. Values
//! are always written in sorted order, so a decoded state never needs to be
//! sorted again.
//!
//! # Layout
//!
//! All integers are little-endian.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Header (32 bytes)                                        │
//! │   [0..4]   checksum: u32 (CRC32C of bytes [4..])         │
//! │   [4..8]   magic: [u8; 4] = "QNTS"                       │
//! │   [8..10]  version: u16                                  │
//! │   [10]     scalar kind tag                               │
//! │   [11]     flags (bit 0: sorted)                         │
//! │   [12..16] num_fractions: u32                            │
//! │   [16..24] num_values: u64                               │
//! │   [24..32] payload_len: u64                              │
//! ├──────────────────────────────────────────────────────────┤
//! │ Fractions: num_fractions × f64                           │
//! ├──────────────────────────────────────────────────────────┤
//! │ Payload (payload_len bytes)                              │
//! │   fixed-width values, or self-delimiting decimal records │
//! └──────────────────────────────────────────────────────────┘
//! ```

use crate::{
    buffer::OrderedBuffer,
    config::QuantileConfig,
    error::{CorruptionError, QuantileError},
    fractions::{check_fraction, Fractions},
    scalar::{Comparator, Scalar, ScalarKind},
    state::QuantileState,
};
use tracing::debug;

/// Size of the fixed header.
pub const HEADER_SIZE: usize = 4 + 4 + 2 + 1 + 1 + 4 + 8 + 8; // 32 bytes

/// Magic number: "QNTS" (QuaNTile State).
pub const MAGIC: [u8; 4] = *b"QNTS";

/// Format version.
pub const FORMAT_VERSION: u16 = 1;

/// Header flag: the payload is in non-decreasing order.
pub const FLAG_SORTED: u8 = 1;

const FRACTION_SIZE: usize = 8;

/// Fixed-size header of a serialized state.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Header {
    kind_tag: u8,
    flags: u8,
    num_fractions: u32,
    num_values: u64,
    payload_len: u64,
}

impl Header {
    /// Writes the header into `block`, leaving the checksum zeroed.
    fn write(&self, block: &mut [u8]) {
        block[4..8].copy_from_slice(&MAGIC);
        block[8..10].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        block[10] = self.kind_tag;
        block[11] = self.flags;
        block[12..16].copy_from_slice(&self.num_fractions.to_le_bytes());
        block[16..24].copy_from_slice(&self.num_values.to_le_bytes());
        block[24..32].copy_from_slice(&self.payload_len.to_le_bytes());
    }

    /// Parses the header at the front of `bytes`, verifying the checksum
    /// over all of `bytes` if requested.
    fn read(bytes: &[u8], verify_checksum: bool) -> Result<Self, CorruptionError> {
        if bytes.len() < HEADER_SIZE {
            return Err(CorruptionError::TooShort {
                actual: bytes.len(),
                expected: HEADER_SIZE,
            });
        }

        if verify_checksum {
            let stored_checksum = le_u32(bytes, 0);
            let computed_checksum = crc32c::crc32c(&bytes[4..]);
            if stored_checksum != computed_checksum {
                return Err(CorruptionError::ChecksumMismatch {
                    expected: computed_checksum,
                    found: stored_checksum,
                });
            }
        }

        if bytes[4..8] != MAGIC {
            return Err(CorruptionError::InvalidMagic {
                expected: MAGIC,
                found: [bytes[4], bytes[5], bytes[6], bytes[7]],
            });
        }

        let version = u16::from_le_bytes([bytes[8], bytes[9]]);
        if version != FORMAT_VERSION {
            return Err(CorruptionError::UnsupportedVersion {
                expected: FORMAT_VERSION,
                found: version,
            });
        }

        Ok(Self {
            kind_tag: bytes[10],
            flags: bytes[11],
            num_fractions: le_u32(bytes, 12),
            num_values: le_u64(bytes, 16),
            payload_len: le_u64(bytes, 24),
        })
    }

    /// Total length of a state with this header.
    fn total_len(&self) -> Option<u64> {
        (self.num_fractions as u64)
            .checked_mul(FRACTION_SIZE as u64)?
            .checked_add(HEADER_SIZE as u64)?
            .checked_add(self.payload_len)
    }
}

fn le_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

fn le_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}

/// Serializes `fractions` and `sorted`, which must be in non-decreasing
/// order.
pub fn encode<T: Scalar>(fractions: &[f64], sorted: &[T]) -> Vec<u8> {
    let payload_hint = T::WIDTH.unwrap_or(16) * sorted.len();
    let mut out = Vec::with_capacity(HEADER_SIZE + fractions.len() * FRACTION_SIZE + payload_hint);
    out.resize(HEADER_SIZE, 0);
    for fraction in fractions {
        out.extend_from_slice(&fraction.to_bits().to_le_bytes());
    }
    let payload_start = out.len();
    for value in sorted {
        value.encode(&mut out);
    }

    let header = Header {
        kind_tag: T::KIND.tag(),
        flags: FLAG_SORTED,
        num_fractions: fractions.len() as u32,
        num_values: sorted.len() as u64,
        payload_len: (out.len() - payload_start) as u64,
    };
    header.write(&mut out[..HEADER_SIZE]);
    let checksum = crc32c::crc32c(&out[4..]);
    out[0..4].copy_from_slice(&checksum.to_le_bytes());
    out
}

/// Parses a serialized state holding values of kind `T`.
///
/// Returns the fractions and the values, which are guaranteed to be sorted
/// under `order`. Nothing is recovered from a state that fails any check.
pub fn decode<T, C>(
    bytes: &[u8],
    order: &C,
    verify_checksum: bool,
) -> Result<(Fractions, Vec<T>), CorruptionError>
where
    T: Scalar,
    C: Comparator<T>,
{
    let header = Header::read(bytes, verify_checksum)?;

    let found = ScalarKind::from_tag(header.kind_tag)?;
    if found != T::KIND {
        return Err(CorruptionError::KindMismatch {
            expected: T::KIND,
            found,
        });
    }
    if header.flags & FLAG_SORTED == 0 {
        return Err(CorruptionError::NotSorted(header.flags));
    }

    let total_len = header.total_len();
    if total_len != Some(bytes.len() as u64) {
        return Err(CorruptionError::LengthMismatch {
            fractions: header.num_fractions as u64,
            payload: header.payload_len,
            expected: total_len.unwrap_or(u64::MAX),
            actual: bytes.len(),
        });
    }
    if let Some(width) = T::WIDTH {
        let expected = header.num_values.checked_mul(width as u64);
        if expected != Some(header.payload_len) {
            return Err(CorruptionError::PayloadMismatch {
                count: header.num_values,
                width,
                expected: expected.unwrap_or(u64::MAX),
                actual: header.payload_len,
            });
        }
    }

    let payload_start = HEADER_SIZE + header.num_fractions as usize * FRACTION_SIZE;
    let mut fractions = Vec::with_capacity(header.num_fractions as usize);
    for chunk in bytes[HEADER_SIZE..payload_start].chunks_exact(FRACTION_SIZE) {
        let fraction = f64::from_bits(le_u64(chunk, 0));
        if check_fraction(fraction).is_err() {
            return Err(CorruptionError::InvalidFraction(fraction));
        }
        fractions.push(fraction);
    }

    let payload = &bytes[payload_start..];
    // Every record takes at least one byte, which bounds the allocation for
    // a bogus count.
    let capacity = usize::try_from(header.num_values)
        .unwrap_or(usize::MAX)
        .min(payload.len());
    let mut values: Vec<T> = Vec::with_capacity(capacity);
    let mut offset = 0;
    for index in 0..header.num_values {
        let (value, len) = T::decode(&payload[offset..])
            .ok_or(CorruptionError::InvalidRecord { index, offset })?;
        if let Some(previous) = values.last() {
            if order.less(&value, previous) {
                return Err(CorruptionError::Unsorted(index));
            }
        }
        values.push(value);
        offset += len;
    }
    if offset != payload.len() {
        return Err(CorruptionError::TrailingBytes(payload.len() - offset));
    }

    debug!(
        kind = %T::KIND,
        values = values.len(),
        bytes = bytes.len(),
        "decoded quantile state"
    );
    Ok((Fractions::from_valid(&fractions), values))
}

impl<T> QuantileState<T>
where
    T: Scalar,
{
    /// Deserializes a state with the default configuration and ordering.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, QuantileError> {
        Self::from_bytes_with(bytes, &QuantileConfig::default(), T::Order::default())
    }
}

impl<T, C> QuantileState<T, C>
where
    T: Scalar,
    C: Comparator<T>,
{
    /// Serializes this state, sorting it first if needed.
    pub fn to_bytes(&mut self) -> Vec<u8> {
        self.ensure_sorted();
        let bytes = encode(self.fractions(), self.buffer().as_slice());
        debug!(
            kind = %T::KIND,
            values = self.len(),
            bytes = bytes.len(),
            "encoded quantile state"
        );
        bytes
    }

    /// Deserializes a state produced by [`Self::to_bytes`].
    ///
    /// The result is sorted under `order` and grows according to `config`.
    pub fn from_bytes_with(
        bytes: &[u8],
        config: &QuantileConfig,
        order: C,
    ) -> Result<Self, QuantileError> {
        let (fractions, values) = decode::<T, C>(bytes, &order, config.verify_checksum)?;
        let buffer = OrderedBuffer::from_sorted(
            values,
            config.capacity_for(T::MIN_CAPACITY),
            config.growth,
            order,
        );
        Ok(Self::from_parts(fractions, buffer))
    }
}
