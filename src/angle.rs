//! Joint angle extraction
//!
//! Computes the angle at a pivot joint from the rays to its two neighbours
//! (e.g. shoulder → elbow ← wrist) and validates angles before they reach the
//! counter.

use serde::{Deserialize, Serialize};

use crate::error::{RepError, Result};

/// Largest angle a joint can report, in degrees
pub const MAX_ANGLE_DEG: f64 = 180.0;

/// Shortest ray accepted by the 3D extractor
const MIN_RAY_LENGTH: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    fn length(self) -> f64 {
        self.dot(self).sqrt()
    }
}

/// Three joints of one limb segment for a single frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSample {
    pub proximal: Point2,
    pub pivot: Point2,
    pub distal: Point2,
}

impl JointSample {
    pub fn angle(&self) -> Result<AngleSample> {
        AngleSample::new(angle_at(self.proximal, self.pivot, self.distal)?)
    }
}

/// [`JointSample`] with depth, for models that report a z coordinate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSample3 {
    pub proximal: Point3,
    pub pivot: Point3,
    pub distal: Point3,
}

impl JointSample3 {
    pub fn angle(&self) -> Result<AngleSample> {
        AngleSample::new(angle_at_3d(self.proximal, self.pivot, self.distal)?)
    }
}

/// Angle at `pivot` in degrees, always within [0, 180].
///
/// Takes the direction of each ray with `atan2`, subtracts them and folds
/// reflex angles back (`360 - angle`). Coincident points give 0.
pub fn angle_at(proximal: Point2, pivot: Point2, distal: Point2) -> Result<f64> {
    if !(proximal.is_finite() && pivot.is_finite() && distal.is_finite()) {
        return Err(RepError::InvalidInput(format!(
            "non-finite joint coordinates: {:?} {:?} {:?}",
            proximal, pivot, distal
        )));
    }

    let radians = (distal.y - pivot.y).atan2(distal.x - pivot.x)
        - (proximal.y - pivot.y).atan2(proximal.x - pivot.x);
    let angle = radians.to_degrees().abs();

    if angle > MAX_ANGLE_DEG {
        Ok(360.0 - angle)
    } else {
        Ok(angle)
    }
}

/// Angle at `pivot` in degrees using the dot product of the two rays.
///
/// cos(θ) = (v1 · v2) / (|v1| × |v2|), clamped before `acos`.
pub fn angle_at_3d(proximal: Point3, pivot: Point3, distal: Point3) -> Result<f64> {
    if !(proximal.is_finite() && pivot.is_finite() && distal.is_finite()) {
        return Err(RepError::InvalidInput(format!(
            "non-finite joint coordinates: {:?} {:?} {:?}",
            proximal, pivot, distal
        )));
    }

    let upper = proximal.sub(pivot);
    let lower = distal.sub(pivot);
    let (len_upper, len_lower) = (upper.length(), lower.length());

    if len_upper < MIN_RAY_LENGTH || len_lower < MIN_RAY_LENGTH {
        return Err(RepError::InvalidInput(
            "zero-length ray at pivot joint".to_string(),
        ));
    }

    let cos_angle = (upper.dot(lower) / (len_upper * len_lower)).clamp(-1.0, 1.0);
    Ok(cos_angle.acos().to_degrees())
}

/// A validated joint angle in degrees.
///
/// Only finite values in [0, 180] can be constructed, so calibration never
/// sees NaN.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct AngleSample(f64);

impl AngleSample {
    pub fn new(degrees: f64) -> Result<Self> {
        if !degrees.is_finite() {
            return Err(RepError::InvalidInput(format!(
                "angle is not finite: {}",
                degrees
            )));
        }
        if !(0.0..=MAX_ANGLE_DEG).contains(&degrees) {
            return Err(RepError::InvalidInput(format!(
                "angle {:.3} outside [0, {}]",
                degrees, MAX_ANGLE_DEG
            )));
        }
        Ok(Self(degrees))
    }

    pub fn degrees(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for AngleSample {
    type Error = RepError;

    fn try_from(degrees: f64) -> Result<Self> {
        Self::new(degrees)
    }
}
