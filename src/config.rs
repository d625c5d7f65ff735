use serde::{Deserialize, Serialize};

use crate::error::{RepError, Result};
use crate::pose::{Side, TrackedJoint};

/// Observed span (degrees) required before thresholds exist
pub const ACTIVATION_RANGE_DEG: f64 = 15.0;

/// Fraction of the calibrated range below which the limb counts as "up"
pub const UP_FRACTION: f64 = 0.3;

/// Fraction of the calibrated range above which the limb counts as "down"
pub const DOWN_FRACTION: f64 = 0.7;

/// Minimum landmark confidence for a joint to count as detected
pub const MIN_CONFIDENCE: f64 = 0.5;

/// Tunable thresholds for the rep counter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepCounterConfig {
    /// Counting stays disabled until max - min exceeds this
    pub activation_range_deg: f64,

    /// Hysteresis band as fractions of the calibrated range
    pub up_fraction: f64,
    pub down_fraction: f64,
}

impl Default for RepCounterConfig {
    fn default() -> Self {
        Self {
            activation_range_deg: ACTIVATION_RANGE_DEG,
            up_fraction: UP_FRACTION,
            down_fraction: DOWN_FRACTION,
        }
    }
}

impl RepCounterConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.activation_range_deg.is_finite() || self.activation_range_deg < 0.0 {
            return Err(RepError::InvalidConfig(format!(
                "activation_range_deg must be a non-negative number, got {}",
                self.activation_range_deg
            )));
        }
        for (name, value) in [
            ("up_fraction", self.up_fraction),
            ("down_fraction", self.down_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RepError::InvalidConfig(format!(
                    "{} must lie in [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.up_fraction >= self.down_fraction {
            return Err(RepError::InvalidConfig(format!(
                "up_fraction ({}) must be below down_fraction ({})",
                self.up_fraction, self.down_fraction
            )));
        }
        Ok(())
    }
}

/// Which joint to read from each pose frame, and how strictly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    pub joint: TrackedJoint,
    pub side: Side,

    /// Read the opposite side when `side` is occluded
    pub fallback_to_other_side: bool,

    /// Keypoints below this confidence are treated as undetected
    pub min_confidence: f64,

    /// Use the model's z coordinate and measure the angle in 3D
    pub use_depth: bool,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            joint: TrackedJoint::Elbow,
            side: Side::Right,
            fallback_to_other_side: false,
            min_confidence: MIN_CONFIDENCE,
            use_depth: false,
        }
    }
}

impl PoseConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(RepError::InvalidConfig(format!(
                "min_confidence must lie in [0, 1], got {}",
                self.min_confidence
            )));
        }
        Ok(())
    }
}

/// Everything needed to start a counting session.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub counter: RepCounterConfig,
    pub pose: PoseConfig,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        self.counter.validate()?;
        self.pose.validate()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RepError::InvalidConfig(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}
