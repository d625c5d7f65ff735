//! Python extension module (`--features python`)
//!
//! Lets a Python pose-model loop (e.g. MediaPipe) drive a counting session
//! one frame at a time.

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use serde::Serialize;

use crate::config::{PoseConfig, RepCounterConfig, SessionConfig};
use crate::error::RepError;
use crate::pose::{PoseKeypoint, Side, TrackedJoint};
use crate::session::RepSession;

impl From<RepError> for PyErr {
    fn from(e: RepError) -> Self {
        PyValueError::new_err(e.to_string())
    }
}

fn to_python<T: Serialize>(py: Python<'_>, value: &T) -> PyResult<PyObject> {
    pythonize::pythonize(py, value)
        .map(|bound| bound.unbind())
        .map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

#[pyclass]
pub struct RepEngine {
    session: RepSession,
}

#[pymethods]
impl RepEngine {
    #[new]
    #[pyo3(signature = (
        joint = "elbow",
        side = "right",
        fallback_to_other_side = false,
        min_confidence = 0.5,
        use_depth = false,
        activation_range_deg = 15.0,
        up_fraction = 0.3,
        down_fraction = 0.7,
    ))]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        joint: &str,
        side: &str,
        fallback_to_other_side: bool,
        min_confidence: f64,
        use_depth: bool,
        activation_range_deg: f64,
        up_fraction: f64,
        down_fraction: f64,
    ) -> PyResult<Self> {
        let config = SessionConfig {
            counter: RepCounterConfig {
                activation_range_deg,
                up_fraction,
                down_fraction,
            },
            pose: PoseConfig {
                joint: joint.parse::<TrackedJoint>()?,
                side: side.parse::<Side>()?,
                fallback_to_other_side,
                min_confidence,
                use_depth,
            },
        };

        Ok(RepEngine {
            session: RepSession::new(config)?,
        })
    }

    /// Landmarks as `(x, y, confidence)` or `(x, y, z, confidence)`
    /// tuples, or `None` for no detection. With `use_depth` every landmark
    /// must carry `z`.
    #[pyo3(signature = (landmarks, timestamp_ms = None))]
    pub fn push_landmarks(
        &mut self,
        py: Python<'_>,
        landmarks: Option<Vec<Vec<f64>>>,
        timestamp_ms: Option<u64>,
    ) -> PyResult<PyObject> {
        let use_depth = self.session.reader().config().use_depth;
        let keypoints = landmarks
            .map(|rows| {
                rows.iter()
                    .map(|row| PoseKeypoint::from_row(row, use_depth))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        let report = self
            .session
            .process_landmarks(keypoints.as_deref(), timestamp_ms)?;
        to_python(py, &report)
    }

    #[pyo3(signature = (angle, timestamp_ms = None))]
    pub fn push_angle(
        &mut self,
        py: Python<'_>,
        angle: Option<f64>,
        timestamp_ms: Option<u64>,
    ) -> PyResult<PyObject> {
        let report = self.session.process_angle(angle, timestamp_ms)?;
        to_python(py, &report)
    }

    pub fn diagnostics(&self, py: Python<'_>) -> PyResult<PyObject> {
        to_python(py, &self.session.counter().diagnostics())
    }

    pub fn summary(&self, py: Python<'_>) -> PyResult<PyObject> {
        to_python(py, &self.session.summary())
    }

    #[getter]
    pub fn rep_count(&self) -> u32 {
        self.session.counter().rep_count()
    }
}

#[pymodule]
fn rep_engine(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<RepEngine>()?;
    Ok(())
}
