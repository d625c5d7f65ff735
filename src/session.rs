//! Counting session: pose frames in, diagnostics and a summary out.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::angle::AngleSample;
use crate::config::SessionConfig;
use crate::counter::{AngleRange, Diagnostics, RepCounter};
use crate::error::Result;
use crate::pose::{JointReader, PoseKeypoint, Side};

/// Result of processing one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub frame_index: u64,
    /// Side the angle was read from; `None` for angle frames and misses
    pub side: Option<Side>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub frames: u64,
    /// Frames that produced an angle
    pub detected_frames: u64,
    /// Frames whose angle came from the opposite side
    pub fallback_frames: u64,
    /// Frames rejected as invalid input
    pub rejected_frames: u64,
    pub reps: u32,
    pub calibration: Option<AngleRange>,
    pub duration_ms: Option<u64>,
}

/// One counting session over a single, ordered frame stream.
pub struct RepSession {
    reader: JointReader,
    counter: RepCounter,
    frames: u64,
    detected_frames: u64,
    fallback_frames: u64,
    rejected_frames: u64,
    first_timestamp: Option<u64>,
    last_timestamp: Option<u64>,
}

impl RepSession {
    pub fn new(config: SessionConfig) -> Result<Self> {
        Ok(Self::from_parts(
            JointReader::new(config.pose)?,
            RepCounter::new(config.counter)?,
        ))
    }

    fn from_parts(reader: JointReader, counter: RepCounter) -> Self {
        Self {
            reader,
            counter,
            frames: 0,
            detected_frames: 0,
            fallback_frames: 0,
            rejected_frames: 0,
            first_timestamp: None,
            last_timestamp: None,
        }
    }

    /// Feed one frame of pose landmarks, `None` if the model found no body.
    ///
    /// Invalid coordinates are counted, reported as an error and leave the
    /// counter untouched.
    pub fn process_landmarks(
        &mut self,
        landmarks: Option<&[PoseKeypoint]>,
        timestamp_ms: Option<u64>,
    ) -> Result<FrameReport> {
        let read = self.reader.read(landmarks);
        let read = self.track(read, timestamp_ms)?;

        let side = read.map(|r| r.side);
        if side.is_some_and(|s| s != self.reader.config().side) {
            self.fallback_frames += 1;
        }
        Ok(self.advance(read.map(|r| r.angle), side))
    }

    /// Feed one precomputed angle in degrees
    pub fn process_angle(
        &mut self,
        degrees: Option<f64>,
        timestamp_ms: Option<u64>,
    ) -> Result<FrameReport> {
        let sample = degrees.map(AngleSample::new).transpose();
        let sample = self.track(sample, timestamp_ms)?;
        Ok(self.advance(sample, None))
    }

    pub fn reader(&self) -> &JointReader {
        &self.reader
    }

    pub fn counter(&self) -> &RepCounter {
        &self.counter
    }

    pub fn summary(&self) -> SessionSummary {
        let duration_ms = match (self.first_timestamp, self.last_timestamp) {
            (Some(first), Some(last)) => Some(last.saturating_sub(first)),
            _ => None,
        };

        SessionSummary {
            frames: self.frames,
            detected_frames: self.detected_frames,
            fallback_frames: self.fallback_frames,
            rejected_frames: self.rejected_frames,
            reps: self.counter.rep_count(),
            calibration: self.counter.calibration(),
            duration_ms,
        }
    }

    /// Frame bookkeeping shared by both entry points
    fn track<T>(&mut self, read: Result<T>, timestamp_ms: Option<u64>) -> Result<T> {
        self.frames += 1;
        if let Some(ts) = timestamp_ms {
            self.first_timestamp.get_or_insert(ts);
            self.last_timestamp = Some(ts);
        }

        read.map_err(|e| {
            self.rejected_frames += 1;
            warn!("frame {} rejected: {}", self.frames - 1, e);
            e
        })
    }

    fn advance(&mut self, sample: Option<AngleSample>, side: Option<Side>) -> FrameReport {
        if sample.is_some() {
            self.detected_frames += 1;
        }
        FrameReport {
            frame_index: self.frames - 1,
            side,
            diagnostics: self.counter.step(sample),
        }
    }
}

impl Default for RepSession {
    fn default() -> Self {
        Self::from_parts(JointReader::default(), RepCounter::default())
    }
}
