//! Adaptive repetition counter for pose-estimation streams.
//!
//! One joint angle per frame goes in; a rep count and diagnostics come out.
//! The counter learns the exercise's range of motion on the fly, so no
//! per-exercise thresholds are needed.
//!
//! ```
//! use rep_engine::{AngleSample, RepCounter};
//!
//! let mut counter = RepCounter::default();
//! for a in [100.0, 100.0, 40.0, 40.0, 100.0, 100.0] {
//!     counter.step(Some(AngleSample::new(a).unwrap()));
//! }
//! assert_eq!(counter.rep_count(), 1);
//! ```

pub mod angle;
pub mod config;
pub mod counter;
pub mod error;
pub mod pose;
pub mod session;

#[cfg(feature = "python")]
mod python;

pub use angle::{angle_at, angle_at_3d, AngleSample, JointSample, JointSample3, Point2, Point3};
pub use config::{
    PoseConfig, RepCounterConfig, SessionConfig, ACTIVATION_RANGE_DEG, DOWN_FRACTION, UP_FRACTION,
};
pub use counter::{fold_min_max, thresholds_from_range, AngleRange, Diagnostics, Phase, RepCounter, Thresholds};
pub use error::RepError;
pub use pose::{JointReader, PoseKeypoint, Side, SidedAngle, TrackedJoint};
pub use session::{FrameReport, RepSession, SessionSummary};
