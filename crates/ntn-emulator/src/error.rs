//! Emulator error kinds
//!
//! Every component error is folded into one of these kinds at the operation
//! boundary. None of them is retried internally.

use ntn_fading::FadingError;
use ntn_geometry::GeometryError;
use ntn_propagation::PropagationError;
use rf_frontend::FrontEndError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmulatorError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid fading profile: {0}")]
    InvalidProfile(String),

    #[error("Platform not visible: elevation {elevation_deg:.2}° below minimum {min_elevation_deg:.2}°")]
    NotVisible {
        elevation_deg: f64,
        min_elevation_deg: f64,
    },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Insufficient signal for calibration: {power_dbfs:.1} dBFS")]
    InsufficientSignal { power_dbfs: f64 },

    #[error("{parameter} out of range: {value} not in [{min}, {max}]")]
    OutOfRange {
        parameter: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

pub type Result<T> = std::result::Result<T, EmulatorError>;

impl EmulatorError {
    pub fn channel_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "channel",
            id: id.to_string(),
        }
    }

    pub fn device_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "device",
            id: id.to_string(),
        }
    }

    /// Caller supplied an unusable option set
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration(_) | Self::InvalidProfile(_)
        )
    }
}

impl From<GeometryError> for EmulatorError {
    fn from(err: GeometryError) -> Self {
        match err {
            GeometryError::NotVisible {
                elevation_deg,
                min_elevation_deg,
            } => Self::NotVisible {
                elevation_deg,
                min_elevation_deg,
            },
            other => Self::InvalidConfiguration(other.to_string()),
        }
    }
}

impl From<PropagationError> for EmulatorError {
    fn from(err: PropagationError) -> Self {
        Self::InvalidConfiguration(err.to_string())
    }
}

impl From<FadingError> for EmulatorError {
    fn from(err: FadingError) -> Self {
        match err {
            FadingError::InvalidProfile(name) => Self::InvalidProfile(name),
            rate @ FadingError::InvalidSampleRate(_) => {
                Self::InvalidConfiguration(rate.to_string())
            }
            other => Self::InvalidProfile(other.to_string()),
        }
    }
}

impl From<FrontEndError> for EmulatorError {
    fn from(err: FrontEndError) -> Self {
        match err {
            FrontEndError::InsufficientSignal { power_dbfs } => {
                Self::InsufficientSignal { power_dbfs }
            }
            FrontEndError::OutOfRange {
                parameter,
                value,
                min,
                max,
            } => Self::OutOfRange {
                parameter,
                value,
                min,
                max,
            },
            other => Self::InvalidConfiguration(other.to_string()),
        }
    }
}
