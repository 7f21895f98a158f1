//! RF Front-End Simulation
//!
//! Transmit/receive hardware non-idealities for an emulated SDR, the
//! calibration routines that estimate and null them, device capability
//! tables and stimulus generators.
//!
//! ## Receive chain
//!
//! frequency offset -> phase noise -> IQ imbalance -> DC offset -> calibration correction

use num_complex::Complex64;
use thiserror::Error;

pub mod calibration;
pub mod device;
pub mod impairments;
pub mod signal;

pub use calibration::{
    CalibrationKind, CalibrationReport, CalibrationState, IqEstimate, MIN_CALIBRATION_POWER,
};
pub use device::{DeviceCapabilities, DeviceClass, DeviceProfile, DeviceSettings};
pub use impairments::{HardwareImpairments, ImpairmentChain, ImpairmentSimulator};

/// Complex baseband sample
pub type IqSample = Complex64;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrontEndError {
    #[error("Insufficient signal for calibration: {power_dbfs:.1} dBFS")]
    InsufficientSignal { power_dbfs: f64 },
    #[error("{parameter} out of range: {value} not in [{min}, {max}]")]
    OutOfRange {
        parameter: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(f64),
    #[error("Invalid reference tone: {0}")]
    InvalidTone(String),
}

pub type Result<T> = std::result::Result<T, FrontEndError>;
