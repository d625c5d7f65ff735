//! Pose landmarks → tracked joint angle
//!
//! Picks the proximal/pivot/distal keypoints of the configured joint out of
//! a MediaPipe Pose frame (33 landmarks), gates them on confidence and turns
//! them into an angle. Occlusion of the configured side is either reported
//! as "no angle" or, when enabled, covered by the opposite side.

use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::angle::{AngleSample, JointSample, JointSample3, Point2, Point3};
use crate::config::PoseConfig;
use crate::error::{RepError, Result};

// ============================================================================
// LANDMARK INDICES (MediaPipe Pose - 33 total)
// ============================================================================

pub const LANDMARK_COUNT: usize = 33;

pub const LEFT_SHOULDER: usize = 11;
pub const RIGHT_SHOULDER: usize = 12;
pub const LEFT_ELBOW: usize = 13;
pub const RIGHT_ELBOW: usize = 14;
pub const LEFT_WRIST: usize = 15;
pub const RIGHT_WRIST: usize = 16;
pub const LEFT_HIP: usize = 23;
pub const RIGHT_HIP: usize = 24;
pub const LEFT_KNEE: usize = 25;
pub const RIGHT_KNEE: usize = 26;
pub const LEFT_ANKLE: usize = 27;
pub const RIGHT_ANKLE: usize = 28;

fn full_confidence() -> f64 {
    1.0
}

/// One landmark as reported by the pose model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseKeypoint {
    pub x: f64,
    pub y: f64,
    /// Relative depth; 0 when the model has none
    #[serde(default)]
    pub z: f64,
    /// Visibility / detection confidence (0-1)
    #[serde(default = "full_confidence", alias = "visibility")]
    pub confidence: f64,
}

impl PoseKeypoint {
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            confidence,
        }
    }

    /// Keypoint from a bare `[x, y, confidence]` or `[x, y, z, confidence]`
    /// row. Depth tracking only accepts the four-component form.
    pub fn from_row(row: &[f64], use_depth: bool) -> Result<Self> {
        match *row {
            [x, y, z, confidence] => Ok(Self { x, y, z, confidence }),
            [_, _, _] if use_depth => Err(RepError::InvalidInput(
                "depth tracking needs (x, y, z, confidence) landmarks".to_string(),
            )),
            [x, y, confidence] => Ok(Self::new(x, y, confidence)),
            _ => Err(RepError::InvalidInput(format!(
                "landmark needs 3 or 4 components, got {}",
                row.len()
            ))),
        }
    }

    fn point2(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }

    fn point3(&self) -> Point3 {
        Point3::new(self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Side {
    type Err = RepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(Side::Left),
            "right" => Ok(Side::Right),
            other => Err(RepError::InvalidConfig(format!("unknown side: {}", other))),
        }
    }
}

/// Joint whose angle drives the counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedJoint {
    /// shoulder → elbow → wrist (curls, presses)
    Elbow,
    /// hip → shoulder → elbow (lateral and front raises)
    Shoulder,
    /// hip → knee → ankle (squats, lunges)
    Knee,
    /// shoulder → hip → knee (hinges, sit-ups)
    Hip,
}

impl TrackedJoint {
    pub fn name(&self) -> &'static str {
        match self {
            TrackedJoint::Elbow => "elbow",
            TrackedJoint::Shoulder => "shoulder",
            TrackedJoint::Knee => "knee",
            TrackedJoint::Hip => "hip",
        }
    }

    /// Landmark indices as (proximal, pivot, distal)
    pub fn landmarks(&self, side: Side) -> (usize, usize, usize) {
        match (self, side) {
            (TrackedJoint::Elbow, Side::Left) => (LEFT_SHOULDER, LEFT_ELBOW, LEFT_WRIST),
            (TrackedJoint::Elbow, Side::Right) => (RIGHT_SHOULDER, RIGHT_ELBOW, RIGHT_WRIST),
            (TrackedJoint::Shoulder, Side::Left) => (LEFT_HIP, LEFT_SHOULDER, LEFT_ELBOW),
            (TrackedJoint::Shoulder, Side::Right) => (RIGHT_HIP, RIGHT_SHOULDER, RIGHT_ELBOW),
            (TrackedJoint::Knee, Side::Left) => (LEFT_HIP, LEFT_KNEE, LEFT_ANKLE),
            (TrackedJoint::Knee, Side::Right) => (RIGHT_HIP, RIGHT_KNEE, RIGHT_ANKLE),
            (TrackedJoint::Hip, Side::Left) => (LEFT_SHOULDER, LEFT_HIP, LEFT_KNEE),
            (TrackedJoint::Hip, Side::Right) => (RIGHT_SHOULDER, RIGHT_HIP, RIGHT_KNEE),
        }
    }
}

impl fmt::Display for TrackedJoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TrackedJoint {
    type Err = RepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "elbow" => Ok(TrackedJoint::Elbow),
            "shoulder" => Ok(TrackedJoint::Shoulder),
            "knee" => Ok(TrackedJoint::Knee),
            "hip" => Ok(TrackedJoint::Hip),
            other => Err(RepError::InvalidConfig(format!("unknown joint: {}", other))),
        }
    }
}

/// Angle read from a frame, tagged with the side it came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SidedAngle {
    pub side: Side,
    pub angle: AngleSample,
}

/// Reads the configured joint angle from pose frames.
#[derive(Debug, Clone)]
pub struct JointReader {
    config: PoseConfig,
}

impl JointReader {
    pub fn new(config: PoseConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PoseConfig {
        &self.config
    }

    /// `Ok(None)` when the frame is missing or the joint is not confidently
    /// detected on any allowed side.
    pub fn read(&self, landmarks: Option<&[PoseKeypoint]>) -> Result<Option<SidedAngle>> {
        let Some(landmarks) = landmarks else {
            return Ok(None);
        };

        let primary = self.config.side;
        if let Some(triple) = self.detected(landmarks, primary) {
            return self.measure(triple, primary).map(Some);
        }

        if !self.config.fallback_to_other_side {
            debug!("{} {} not detected", primary, self.config.joint);
            return Ok(None);
        }

        let fallback = primary.other();
        match self.detected(landmarks, fallback) {
            Some(triple) => {
                debug!(
                    "{} {} not detected, falling back to {}",
                    primary, self.config.joint, fallback
                );
                self.measure(triple, fallback).map(Some)
            }
            None => {
                debug!("{} not detected on either side", self.config.joint);
                Ok(None)
            }
        }
    }

    fn detected(&self, landmarks: &[PoseKeypoint], side: Side) -> Option<[PoseKeypoint; 3]> {
        let (p, v, d) = self.config.joint.landmarks(side);
        let triple = [*landmarks.get(p)?, *landmarks.get(v)?, *landmarks.get(d)?];

        // NaN confidence fails this check too
        let confident = triple
            .iter()
            .all(|k| k.confidence >= self.config.min_confidence);
        confident.then_some(triple)
    }

    fn measure(&self, [proximal, pivot, distal]: [PoseKeypoint; 3], side: Side) -> Result<SidedAngle> {
        let angle = if self.config.use_depth {
            JointSample3 {
                proximal: proximal.point3(),
                pivot: pivot.point3(),
                distal: distal.point3(),
            }
            .angle()?
        } else {
            JointSample {
                proximal: proximal.point2(),
                pivot: pivot.point2(),
                distal: distal.point2(),
            }
            .angle()?
        };
        Ok(SidedAngle { side, angle })
    }
}

impl Default for JointReader {
    fn default() -> Self {
        Self {
            config: PoseConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A full frame with every landmark at the origin, fully visible
    fn blank_frame() -> Vec<PoseKeypoint> {
        vec![PoseKeypoint::new(0.0, 0.0, 1.0); LANDMARK_COUNT]
    }

    /// Places an arm bent at 90° (shoulder above elbow, wrist to the side)
    fn set_arm(frame: &mut [PoseKeypoint], side: Side, confidence: f64) {
        let (s, e, w) = TrackedJoint::Elbow.landmarks(side);
        frame[s] = PoseKeypoint::new(0.5, 0.2, confidence);
        frame[e] = PoseKeypoint::new(0.5, 0.5, confidence);
        frame[w] = PoseKeypoint::new(0.8, 0.5, confidence);
    }

    #[test]
    fn test_reads_right_elbow_by_default() {
        let mut frame = blank_frame();
        set_arm(&mut frame, Side::Right, 0.9);
        let reader = JointReader::default();
        let read = reader.read(Some(&frame)).unwrap().unwrap();
        assert_eq!(read.side, Side::Right);
        assert!((read.angle.degrees() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_frame_is_none() {
        let reader = JointReader::default();
        assert_eq!(reader.read(None).unwrap(), None);
    }

    #[test]
    fn test_keypoint_from_row() {
        let planar = PoseKeypoint::from_row(&[0.1, 0.2, 0.9], false).unwrap();
        assert_eq!(planar, PoseKeypoint::new(0.1, 0.2, 0.9));

        let spatial = PoseKeypoint::from_row(&[0.1, 0.2, -0.3, 0.9], true).unwrap();
        assert_eq!(spatial.z, -0.3);
        assert_eq!(spatial.confidence, 0.9);

        // a planar row under depth tracking would silently read z = 0
        assert!(matches!(
            PoseKeypoint::from_row(&[0.1, 0.2, 0.9], true),
            Err(RepError::InvalidInput(_))
        ));
        assert!(PoseKeypoint::from_row(&[0.1, 0.2], false).is_err());
    }

    #[test]
    fn test_depth_rows_change_the_angle() {
        // forearm folded back over the upper arm in the image, but tilted
        // 45 degrees out of the plane
        let mut rows = vec![vec![0.0, 0.0, 0.0, 0.0]; LANDMARK_COUNT];
        let (s, e, w) = TrackedJoint::Elbow.landmarks(Side::Right);
        rows[s] = vec![0.5, 0.2, 0.0, 0.9];
        rows[e] = vec![0.5, 0.5, 0.0, 0.9];
        rows[w] = vec![0.5, 0.2, -0.3, 0.9];
        let frame: Vec<PoseKeypoint> = rows
            .iter()
            .map(|r| PoseKeypoint::from_row(r, true))
            .collect::<Result<_>>()
            .unwrap();

        let flat = JointReader::default();
        let read = flat.read(Some(&frame)).unwrap().unwrap();
        assert!(read.angle.degrees().abs() < 1e-6);

        let deep = JointReader::new(PoseConfig {
            use_depth: true,
            ..Default::default()
        })
        .unwrap();
        let read = deep.read(Some(&frame)).unwrap().unwrap();
        assert!((read.angle.degrees() - 45.0).abs() < 1e-6);
    }

    #[test]
    fn test_short_frame_is_none() {
        let reader = JointReader::default();
        let frame = vec![PoseKeypoint::new(0.1, 0.1, 1.0); 12];
        assert_eq!(reader.read(Some(&frame)).unwrap(), None);
    }

    #[test]
    fn test_low_confidence_without_fallback() {
        let mut frame = blank_frame();
        set_arm(&mut frame, Side::Right, 0.3);
        set_arm(&mut frame, Side::Left, 0.9);
        let reader = JointReader::default();
        assert_eq!(reader.read(Some(&frame)).unwrap(), None);
    }

    #[test]
    fn test_fallback_reports_other_side() {
        let mut frame = blank_frame();
        set_arm(&mut frame, Side::Right, 0.3);
        set_arm(&mut frame, Side::Left, 0.9);
        let reader = JointReader::new(PoseConfig {
            fallback_to_other_side: true,
            ..Default::default()
        })
        .unwrap();
        let read = reader.read(Some(&frame)).unwrap().unwrap();
        assert_eq!(read.side, Side::Left);

        set_arm(&mut frame, Side::Left, 0.1);
        assert_eq!(reader.read(Some(&frame)).unwrap(), None);
    }

    #[test]
    fn test_nan_coordinates_rejected() {
        let mut frame = blank_frame();
        set_arm(&mut frame, Side::Right, 0.9);
        frame[RIGHT_WRIST].x = f64::NAN;
        let reader = JointReader::default();
        assert!(matches!(
            reader.read(Some(&frame)),
            Err(RepError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_depth_angle() {
        let mut frame = blank_frame();
        frame[RIGHT_HIP] = PoseKeypoint { x: 0.5, y: 0.9, z: 0.0, confidence: 1.0 };
        frame[RIGHT_KNEE] = PoseKeypoint { x: 0.5, y: 0.6, z: 0.0, confidence: 1.0 };
        frame[RIGHT_ANKLE] = PoseKeypoint { x: 0.5, y: 0.6, z: 0.3, confidence: 1.0 };
        let reader = JointReader::new(PoseConfig {
            joint: TrackedJoint::Knee,
            use_depth: true,
            ..Default::default()
        })
        .unwrap();
        let read = reader.read(Some(&frame)).unwrap().unwrap();
        assert!((read.angle.degrees() - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("Left".parse::<Side>().unwrap(), Side::Left);
        assert_eq!("knee".parse::<TrackedJoint>().unwrap(), TrackedJoint::Knee);
        assert!("wrist".parse::<TrackedJoint>().is_err());
        assert!("middle".parse::<Side>().is_err());
    }

    #[test]
    fn test_keypoint_json_defaults() {
        let k: PoseKeypoint = serde_json::from_str(r#"{"x": 0.1, "y": 0.2}"#).unwrap();
        assert_eq!(k.z, 0.0);
        assert_eq!(k.confidence, 1.0);
        let k: PoseKeypoint =
            serde_json::from_str(r#"{"x": 0.1, "y": 0.2, "visibility": 0.4}"#).unwrap();
        assert_eq!(k.confidence, 0.4);
    }
}
