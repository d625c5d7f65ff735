//! Adaptive rep counter
//!
//! Learns the joint's range of motion while counting: every valid angle
//! widens the calibrated `[min, max]` span, and once that span exceeds the
//! activation range a 30%/70% hysteresis band is derived from it. A rep is
//! one full excursion: below the up threshold, then back above the down
//! threshold.

use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::angle::AngleSample;
use crate::config::RepCounterConfig;
use crate::error::Result;

/// Which half of the motion cycle the limb is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Extended: large joint angle
    #[default]
    Down,
    /// Contracted: small joint angle
    Up,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Down => "down",
            Phase::Up => "up",
        })
    }
}

/// Smallest and largest angle observed in the session so far.
///
/// `min <= max` always holds; [`fold_min_max`] only ever widens it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleRange {
    pub min: f64,
    pub max: f64,
}

impl AngleRange {
    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Hysteresis band derived from the calibrated range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub up: f64,
    pub down: f64,
}

/// Widen `range` to include `sample`, or start a new range from it.
pub fn fold_min_max(range: Option<AngleRange>, sample: AngleSample) -> AngleRange {
    let a = sample.degrees();
    match range {
        None => AngleRange { min: a, max: a },
        Some(r) => AngleRange {
            min: r.min.min(a),
            max: r.max.max(a),
        },
    }
}

/// Thresholds for `range`, or `None` while the span is within the
/// activation range.
pub fn thresholds_from_range(range: AngleRange, config: &RepCounterConfig) -> Option<Thresholds> {
    let span = range.span();
    if span <= config.activation_range_deg {
        return None;
    }
    Some(Thresholds {
        up: range.min + config.up_fraction * span,
        down: range.min + config.down_fraction * span,
    })
}

/// Snapshot of the counter after a step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub reps: u32,
    pub phase: Phase,
    /// Angle consumed by the step, absent when the joint was not detected
    pub angle: Option<f64>,
    pub calibration: Option<AngleRange>,
    pub thresholds: Option<Thresholds>,
    /// True only on the step that completed a rep
    pub rep_completed: bool,
}

/// Per-session rep counting state machine.
///
/// Feed it one sample per frame, in frame order. `None` means the joint was
/// not detected and leaves every piece of state untouched.
#[derive(Debug, Clone)]
pub struct RepCounter {
    config: RepCounterConfig,
    calibration: Option<AngleRange>,
    phase: Phase,
    reps: u32,
    last_angle: Option<AngleSample>,
    last_rep_completed: bool,
}

impl RepCounter {
    pub fn new(config: RepCounterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::unchecked(config))
    }

    fn unchecked(config: RepCounterConfig) -> Self {
        Self {
            config,
            calibration: None,
            phase: Phase::Down,
            reps: 0,
            last_angle: None,
            last_rep_completed: false,
        }
    }

    pub fn config(&self) -> &RepCounterConfig {
        &self.config
    }

    /// Advance by one frame
    pub fn step(&mut self, sample: Option<AngleSample>) -> Diagnostics {
        self.last_angle = sample;
        self.last_rep_completed = false;

        let Some(sample) = sample else {
            return self.diagnostics();
        };

        let was_active = self.thresholds().is_some();
        let range = fold_min_max(self.calibration, sample);
        self.calibration = Some(range);

        let Some(thresholds) = thresholds_from_range(range, &self.config) else {
            return self.diagnostics();
        };
        if !was_active {
            debug!(
                "counter active: range {:.1}..{:.1}, up < {:.1}, down > {:.1}",
                range.min, range.max, thresholds.up, thresholds.down
            );
        }

        let a = sample.degrees();
        match self.phase {
            Phase::Down if a < thresholds.up => {
                debug!("phase {} -> {} at {:.1}", self.phase, Phase::Up, a);
                self.phase = Phase::Up;
            }
            Phase::Up if a > thresholds.down => {
                self.phase = Phase::Down;
                self.reps += 1;
                self.last_rep_completed = true;
                info!("rep counted: reps={} angle={:.1}", self.reps, a);
            }
            _ => {}
        }

        self.diagnostics()
    }

    /// Like [`step`](Self::step) for raw degrees.
    ///
    /// An invalid angle is rejected before any state changes.
    pub fn step_degrees(&mut self, degrees: Option<f64>) -> Result<Diagnostics> {
        let sample = degrees.map(AngleSample::new).transpose()?;
        Ok(self.step(sample))
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            reps: self.reps,
            phase: self.phase,
            angle: self.last_angle.map(AngleSample::degrees),
            calibration: self.calibration,
            thresholds: self.thresholds(),
            rep_completed: self.last_rep_completed,
        }
    }

    pub fn rep_count(&self) -> u32 {
        self.reps
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn calibration(&self) -> Option<AngleRange> {
        self.calibration
    }

    pub fn thresholds(&self) -> Option<Thresholds> {
        self.calibration
            .and_then(|range| thresholds_from_range(range, &self.config))
    }
}

impl Default for RepCounter {
    fn default() -> Self {
        Self::unchecked(RepCounterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn angle(deg: f64) -> AngleSample {
        AngleSample::new(deg).unwrap()
    }

    fn feed(counter: &mut RepCounter, angles: &[f64]) -> Vec<Diagnostics> {
        angles.iter().map(|&a| counter.step(Some(angle(a)))).collect()
    }

    #[test]
    fn test_fold_min_max() {
        let r = fold_min_max(None, angle(90.0));
        assert_eq!(r, AngleRange { min: 90.0, max: 90.0 });
        let r = fold_min_max(Some(r), angle(40.0));
        assert_eq!(r, AngleRange { min: 40.0, max: 90.0 });
        let r = fold_min_max(Some(r), angle(60.0));
        assert_eq!(r, AngleRange { min: 40.0, max: 90.0 });
        let r = fold_min_max(Some(r), angle(120.0));
        assert_eq!(r, AngleRange { min: 40.0, max: 120.0 });
    }

    #[test]
    fn test_thresholds_need_activation_range() {
        let config = RepCounterConfig::default();
        let narrow = AngleRange { min: 80.0, max: 95.0 };
        assert_eq!(thresholds_from_range(narrow, &config), None);

        let wide = AngleRange { min: 40.0, max: 100.0 };
        let t = thresholds_from_range(wide, &config).unwrap();
        assert!((t.up - 58.0).abs() < 1e-9);
        assert!((t.down - 82.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_rep_trace() {
        let mut counter = RepCounter::default();
        let trace = feed(&mut counter, &[100.0, 100.0, 40.0, 40.0, 100.0, 100.0]);

        let phases: Vec<Phase> = trace.iter().map(|d| d.phase).collect();
        assert_eq!(
            phases,
            vec![Phase::Down, Phase::Down, Phase::Up, Phase::Up, Phase::Down, Phase::Down]
        );
        let reps: Vec<u32> = trace.iter().map(|d| d.reps).collect();
        assert_eq!(reps, vec![0, 0, 0, 0, 1, 1]);
        let completed: Vec<bool> = trace.iter().map(|d| d.rep_completed).collect();
        assert_eq!(completed, vec![false, false, false, false, true, false]);

        // thresholds only exist once 40 has been seen
        assert!(trace[1].thresholds.is_none());
        let t = trace[5].thresholds.unwrap();
        assert!((t.up - 58.0).abs() < 1e-9);
        assert!((t.down - 82.0).abs() < 1e-9);
        assert_eq!(counter.calibration(), Some(AngleRange { min: 40.0, max: 100.0 }));
        assert_eq!(counter.rep_count(), 1);
    }

    #[test]
    fn test_absent_sample_holds_state() {
        let mut counter = RepCounter::default();
        feed(&mut counter, &[100.0, 40.0]);
        let before = counter.diagnostics();

        let after = counter.step(None);
        assert_eq!(after.angle, None);
        assert_eq!(after.reps, before.reps);
        assert_eq!(after.phase, before.phase);
        assert_eq!(after.calibration, before.calibration);
        assert_eq!(after.thresholds, before.thresholds);
        assert!(!after.rep_completed);
    }

    #[test]
    fn test_no_reps_below_activation_range() {
        let mut counter = RepCounter::default();
        for i in 0..500 {
            let a = 90.0 + if i % 2 == 0 { 7.5 } else { -7.5 };
            let d = counter.step(Some(angle(a)));
            assert!(d.thresholds.is_none());
        }
        assert_eq!(counter.rep_count(), 0);
        assert_eq!(counter.phase(), Phase::Down);
    }

    #[test]
    fn test_hysteresis_prevents_double_count() {
        let mut counter = RepCounter::default();
        // calibrate 40..100, go up, come down once
        feed(&mut counter, &[100.0, 40.0, 100.0]);
        assert_eq!(counter.rep_count(), 1);

        // jitter around the down threshold (82) without re-entering "up"
        feed(&mut counter, &[81.0, 83.0, 80.0, 84.0, 79.0, 85.0, 60.0, 90.0]);
        assert_eq!(counter.rep_count(), 1);

        // a genuine excursion counts again
        feed(&mut counter, &[45.0, 95.0]);
        assert_eq!(counter.rep_count(), 2);
    }

    #[test]
    fn test_equal_to_threshold_does_not_transition() {
        let mut counter = RepCounter::default();
        feed(&mut counter, &[100.0, 40.0, 100.0]);
        // strict comparisons: exactly 58 is not "up"
        let d = counter.step(Some(angle(58.0)));
        assert_eq!(d.phase, Phase::Down);
        let d = counter.step(Some(angle(57.9)));
        assert_eq!(d.phase, Phase::Up);
        // exactly 82 is not "down"
        let d = counter.step(Some(angle(82.0)));
        assert_eq!(d.phase, Phase::Up);
        assert_eq!(d.reps, 1);
    }

    #[test]
    fn test_step_degrees_rejects_invalid_without_side_effects() {
        let mut counter = RepCounter::default();
        counter.step_degrees(Some(100.0)).unwrap();
        let before = counter.diagnostics();

        assert!(counter.step_degrees(Some(f64::NAN)).is_err());
        assert!(counter.step_degrees(Some(200.0)).is_err());
        assert_eq!(counter.diagnostics(), before);

        let d = counter.step_degrees(None).unwrap();
        assert_eq!(d.angle, None);
    }

    #[test]
    fn test_diagnostics_read_is_idempotent() {
        let mut counter = RepCounter::default();
        assert_eq!(counter.diagnostics(), counter.diagnostics());
        feed(&mut counter, &[100.0, 40.0, 100.0]);
        let first = counter.diagnostics();
        let second = counter.diagnostics();
        assert_eq!(first, second);
        assert!(first.rep_completed);
    }

    #[test]
    fn test_custom_config() {
        let config = RepCounterConfig {
            activation_range_deg: 30.0,
            up_fraction: 0.4,
            down_fraction: 0.6,
        };
        let mut counter = RepCounter::new(config).unwrap();
        assert_eq!(counter.config(), &config);
        // 20 degree span stays inactive under a 30 degree floor
        feed(&mut counter, &[100.0, 80.0, 100.0, 80.0]);
        assert!(counter.thresholds().is_none());

        // 60..120: up < 84, down > 96
        feed(&mut counter, &[120.0, 60.0, 100.0]);
        assert_eq!(counter.rep_count(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RepCounterConfig {
            up_fraction: 0.8,
            ..Default::default()
        };
        assert!(RepCounter::new(config).is_err());
    }

    #[test]
    fn test_phase_display_matches_serde() {
        for phase in [Phase::Down, Phase::Up] {
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json, format!("\"{}\"", phase));
        }
    }
}
