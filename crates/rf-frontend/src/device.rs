//! Device Profiles
//!
//! Control surface of the two emulated transceiver classes. Settings are
//! validated against the class capabilities before anything is applied.

use crate::calibration::CalibrationState;
use crate::impairments::HardwareImpairments;
use crate::{signal, FrontEndError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_CENTER_FREQUENCY_HZ: f64 = 1.8e9;
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 30.72e6;
pub const DEFAULT_BANDWIDTH_HZ: f64 = 30e6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    /// High-cost class, narrow gain range and wide tuning
    X310,
    /// Low-cost class, wide gain range
    B210,
}

/// Static hardware limits of a device class
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DeviceCapabilities {
    pub tx_gain_min_db: f64,
    pub tx_gain_max_db: f64,
    pub rx_gain_min_db: f64,
    pub rx_gain_max_db: f64,
    pub frequency_min_hz: f64,
    pub frequency_max_hz: f64,
    pub max_sample_rate_hz: f64,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X310 => "x310",
            Self::B210 => "b210",
        }
    }

    pub fn capabilities(&self) -> DeviceCapabilities {
        match self {
            Self::X310 => DeviceCapabilities {
                tx_gain_min_db: 0.0,
                tx_gain_max_db: 31.5,
                rx_gain_min_db: 0.0,
                rx_gain_max_db: 31.5,
                frequency_min_hz: 10e6,
                frequency_max_hz: 6e9,
                max_sample_rate_hz: 200e6,
            },
            Self::B210 => DeviceCapabilities {
                tx_gain_min_db: 0.0,
                tx_gain_max_db: 89.8,
                rx_gain_min_db: 0.0,
                rx_gain_max_db: 76.0,
                frequency_min_hz: 70e6,
                frequency_max_hz: 6e9,
                max_sample_rate_hz: 61.44e6,
            },
        }
    }

    /// Factory gains as (tx, rx)
    pub fn default_gains_db(&self) -> (f64, f64) {
        match self {
            Self::X310 => (20.0, 30.0),
            Self::B210 => (0.0, 40.0),
        }
    }

    /// Typical bench impairments for the class
    pub fn default_impairments(&self) -> HardwareImpairments {
        match self {
            Self::X310 => HardwareImpairments {
                dc_offset_i: 0.01,
                dc_offset_q: -0.008,
                iq_gain_db: 0.1,
                iq_phase_deg: 0.5,
                phase_noise_dbc: Some(-45.0),
                phase_noise_alpha: 0.99,
                frequency_offset_hz: 20.0,
            },
            Self::B210 => HardwareImpairments {
                dc_offset_i: 0.03,
                dc_offset_q: -0.02,
                iq_gain_db: 0.5,
                iq_phase_deg: 2.0,
                phase_noise_dbc: Some(-35.0),
                phase_noise_alpha: 0.99,
                frequency_offset_hz: 120.0,
            },
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x310" => Ok(Self::X310),
            "b210" => Ok(Self::B210),
            other => Err(format!("unknown device class: {}", other)),
        }
    }
}

/// Partial reconfiguration, `None` keeps the current value
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceSettings {
    pub center_frequency_hz: Option<f64>,
    pub tx_gain_db: Option<f64>,
    pub rx_gain_db: Option<f64>,
    pub bandwidth_hz: Option<f64>,
    pub sample_rate_hz: Option<f64>,
}

impl DeviceSettings {
    pub fn frequency(mut self, hz: f64) -> Self {
        self.center_frequency_hz = Some(hz);
        self
    }

    pub fn tx_gain(mut self, db: f64) -> Self {
        self.tx_gain_db = Some(db);
        self
    }

    pub fn rx_gain(mut self, db: f64) -> Self {
        self.rx_gain_db = Some(db);
        self
    }

    pub fn bandwidth(mut self, hz: f64) -> Self {
        self.bandwidth_hz = Some(hz);
        self
    }

    pub fn sample_rate(mut self, hz: f64) -> Self {
        self.sample_rate_hz = Some(hz);
        self
    }
}

/// Per-device tuning, impairments and calibration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceProfile {
    pub class: DeviceClass,
    pub center_frequency_hz: f64,
    pub sample_rate_hz: f64,
    pub bandwidth_hz: f64,
    pub tx_gain_db: f64,
    pub rx_gain_db: f64,
    pub tx_impairments: HardwareImpairments,
    pub rx_impairments: HardwareImpairments,
    pub calibration: CalibrationState,
}

fn check_range(parameter: &'static str, value: f64, min: f64, max: f64) -> Result<f64> {
    if value.is_finite() && value >= min && value <= max {
        Ok(value)
    } else {
        Err(FrontEndError::OutOfRange {
            parameter,
            value,
            min,
            max,
        })
    }
}

impl DeviceProfile {
    pub fn new(class: DeviceClass) -> Self {
        let (tx_gain_db, rx_gain_db) = class.default_gains_db();
        let impairments = class.default_impairments();
        Self {
            class,
            center_frequency_hz: DEFAULT_CENTER_FREQUENCY_HZ,
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            bandwidth_hz: DEFAULT_BANDWIDTH_HZ,
            tx_gain_db,
            rx_gain_db,
            tx_impairments: impairments,
            rx_impairments: impairments,
            calibration: CalibrationState::default(),
        }
    }

    pub fn with_impairments(mut self, tx: HardwareImpairments, rx: HardwareImpairments) -> Self {
        self.tx_impairments = tx;
        self.rx_impairments = rx;
        self
    }

    pub fn capabilities(&self) -> DeviceCapabilities {
        self.class.capabilities()
    }

    /// Validate every supplied field, then apply them together
    pub fn configure(&mut self, settings: &DeviceSettings) -> Result<()> {
        let caps = self.capabilities();

        let frequency = settings
            .center_frequency_hz
            .map(|f| {
                check_range(
                    "center_frequency_hz",
                    f,
                    caps.frequency_min_hz,
                    caps.frequency_max_hz,
                )
            })
            .transpose()?;
        let tx_gain = settings
            .tx_gain_db
            .map(|g| check_range("tx_gain_db", g, caps.tx_gain_min_db, caps.tx_gain_max_db))
            .transpose()?;
        let rx_gain = settings
            .rx_gain_db
            .map(|g| check_range("rx_gain_db", g, caps.rx_gain_min_db, caps.rx_gain_max_db))
            .transpose()?;
        let sample_rate = settings
            .sample_rate_hz
            .map(|r| check_range("sample_rate_hz", r, 1.0, caps.max_sample_rate_hz))
            .transpose()?;
        let bandwidth = settings
            .bandwidth_hz
            .map(|b| check_range("bandwidth_hz", b, 1.0, caps.max_sample_rate_hz))
            .transpose()?;

        if let Some(f) = frequency {
            self.center_frequency_hz = f;
        }
        if let Some(g) = tx_gain {
            self.tx_gain_db = g;
        }
        if let Some(g) = rx_gain {
            self.rx_gain_db = g;
        }
        if let Some(r) = sample_rate {
            self.sample_rate_hz = r;
        }
        if let Some(b) = bandwidth {
            self.bandwidth_hz = b;
        }
        Ok(())
    }

    /// Amplitude back-off from full-scale TX gain
    pub fn tx_gain_scale(&self) -> f64 {
        signal::db_to_amplitude(self.tx_gain_db - self.capabilities().tx_gain_max_db)
    }

    pub fn rx_gain_scale(&self) -> f64 {
        signal::db_to_amplitude(self.rx_gain_db - self.capabilities().rx_gain_max_db)
    }
}
