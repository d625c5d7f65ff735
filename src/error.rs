use thiserror::Error;

/// Errors raised at the engine's input and configuration boundaries.
///
/// The counter itself never fails; everything here is a caller-side
/// precondition violation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RepError {
    /// Coordinates or angles that cannot enter calibration (NaN, infinite,
    /// out of range, or a zero-length 3D ray)
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Tunables that would make the state machine meaningless
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, RepError>;
