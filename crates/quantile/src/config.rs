//! Tuning knobs for quantile aggregation.

use crate::error::QuantileError;
use serde::{Deserialize, Serialize};

/// Default growth increment of [`GrowthPolicy::Slice`].
pub const DEFAULT_SLICE_SIZE: usize = 1024;

/// How a value buffer grows once it is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthPolicy {
    /// Double the capacity.
    #[default]
    Doubling,

    /// Grow by a fixed number of elements.
    Slice {
        /// Number of elements added on each growth step.
        #[serde(default = "default_slice_size")]
        size: usize,
    },
}

impl GrowthPolicy {
    /// Returns the capacity a full buffer of `capacity` elements grows to.
    pub fn next_capacity(&self, capacity: usize) -> usize {
        match self {
            Self::Doubling => capacity.max(1).saturating_mul(2),
            Self::Slice { size } => capacity.saturating_add((*size).max(1)),
        }
    }
}

const fn default_slice_size() -> usize {
    DEFAULT_SLICE_SIZE
}

/// What to do with an empty fractions array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyFractions {
    /// Accept it; array results have no elements.
    #[default]
    Allow,

    /// Fail with [`QuantileError::EmptyFractions`].
    Reject,
}

/// Configuration shared by all states of one aggregation arena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantileConfig {
    /// Initial buffer capacity.
    ///
    /// Values below the scalar kind's minimum are raised to it. The default
    /// is the kind's minimum.
    pub initial_capacity: Option<usize>,

    /// Buffer growth policy.
    ///
    /// The default is [`GrowthPolicy::Doubling`].
    pub growth: GrowthPolicy,

    /// Handling of empty fractions arrays.
    ///
    /// The default is [`EmptyFractions::Allow`].
    pub empty_fractions: EmptyFractions,

    /// Verify the CRC32C checksum of serialized states.
    ///
    /// Length and ordering checks are performed either way. The default is
    /// `true`.
    pub verify_checksum: bool,
}

impl Default for QuantileConfig {
    fn default() -> Self {
        Self {
            initial_capacity: None,
            growth: GrowthPolicy::default(),
            empty_fractions: EmptyFractions::default(),
            verify_checksum: true,
        }
    }
}

impl QuantileConfig {
    /// Checks the configuration for values that can never work.
    pub fn validate(&self) -> Result<(), QuantileError> {
        if self.initial_capacity == Some(0) {
            return Err(QuantileError::InvalidConfig(
                "initial_capacity must be positive".to_string(),
            ));
        }
        if let GrowthPolicy::Slice { size: 0 } = self.growth {
            return Err(QuantileError::InvalidConfig(
                "growth slice size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Initial capacity for a buffer whose kind needs at least `minimum`
    /// elements.
    pub fn capacity_for(&self, minimum: usize) -> usize {
        self.initial_capacity.unwrap_or(minimum).max(minimum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_json() {
        let config: QuantileConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, QuantileConfig::default());
        assert!(config.verify_checksum);
        assert_eq!(config.capacity_for(4), 4);
        config.validate().unwrap();
    }

    #[test]
    fn slice_growth_from_json() {
        let config: QuantileConfig = serde_json::from_str(
            r#"{"initial_capacity": 2, "growth": {"slice": {"size": 16}}, "empty_fractions": "reject"}"#,
        )
        .unwrap();
        assert_eq!(config.growth, GrowthPolicy::Slice { size: 16 });
        assert_eq!(config.empty_fractions, EmptyFractions::Reject);
        assert_eq!(config.capacity_for(8), 8);
        assert_eq!(config.capacity_for(1), 2);
        assert_eq!(config.growth.next_capacity(8), 24);

        let config: QuantileConfig =
            serde_json::from_str(r#"{"growth": {"slice": {}}}"#).unwrap();
        assert_eq!(
            config.growth,
            GrowthPolicy::Slice {
                size: DEFAULT_SLICE_SIZE
            }
        );
    }

    #[test]
    fn doubling() {
        assert_eq!(GrowthPolicy::Doubling.next_capacity(4), 8);
        assert_eq!(GrowthPolicy::Doubling.next_capacity(0), 2);
    }

    #[test]
    fn validation() {
        let config = QuantileConfig {
            growth: GrowthPolicy::Slice { size: 0 },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(QuantileError::InvalidConfig(_))
        ));

        let config = QuantileConfig {
            initial_capacity: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
