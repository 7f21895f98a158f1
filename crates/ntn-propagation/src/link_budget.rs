//! RF Link Budget
//!
//! EIRP, received power, thermal noise floor and margin against a required
//! SNR. The status is derived from the computed margin only.

use crate::{LossBreakdown, PropagationError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const BOLTZMANN_J_K: f64 = 1.380_649e-23;

/// Margin below which a closing link is reported as marginal
pub const MARGINAL_THRESHOLD_DB: f64 = 3.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modulation {
    Bpsk,
    Qpsk,
    #[serde(rename = "16QAM")]
    Qam16,
    #[serde(rename = "64QAM")]
    Qam64,
}

impl Modulation {
    pub fn bits_per_symbol(&self) -> f64 {
        match self {
            Self::Bpsk => 1.0,
            Self::Qpsk => 2.0,
            Self::Qam16 => 4.0,
            Self::Qam64 => 6.0,
        }
    }

    /// Required Eb/N0-style SNR at BER 1e-3, 1e-6 and 1e-9
    fn snr_table(&self) -> [f64; 3] {
        match self {
            Self::Bpsk => [6.8, 10.5, 12.6],
            Self::Qpsk => [9.8, 13.5, 15.6],
            Self::Qam16 => [16.5, 20.2, 22.3],
            Self::Qam64 => [22.5, 26.2, 28.3],
        }
    }

    /// Required SNR for a target BER, log-interpolated between table points
    pub fn required_snr_db(&self, target_ber: f64) -> f64 {
        const LOG_BER: [f64; 3] = [-3.0, -6.0, -9.0];
        let table = self.snr_table();

        if target_ber.is_nan() || target_ber <= 0.0 {
            return table[2];
        }
        let log_ber = target_ber.log10();
        if log_ber >= LOG_BER[0] {
            return table[0];
        }
        if log_ber <= LOG_BER[2] {
            return table[2];
        }

        let i = if log_ber > LOG_BER[1] { 0 } else { 1 };
        let t = (log_ber - LOG_BER[i]) / (LOG_BER[i + 1] - LOG_BER[i]);
        table[i] + t * (table[i + 1] - table[i])
    }
}

impl fmt::Display for Modulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Bpsk => "BPSK",
            Self::Qpsk => "QPSK",
            Self::Qam16 => "16QAM",
            Self::Qam64 => "64QAM",
        };
        f.write_str(s)
    }
}

impl FromStr for Modulation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BPSK" => Ok(Self::Bpsk),
            "QPSK" => Ok(Self::Qpsk),
            "16QAM" | "QAM16" => Ok(Self::Qam16),
            "64QAM" | "QAM64" => Ok(Self::Qam64),
            other => Err(format!("unknown modulation: {}", other)),
        }
    }
}

/// Link closure status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LinkStatus {
    Pass,
    Marginal,
    Fail,
}

impl LinkStatus {
    pub fn from_margin(margin_db: f64) -> Self {
        if margin_db >= MARGINAL_THRESHOLD_DB {
            Self::Pass
        } else if margin_db >= 0.0 {
            Self::Marginal
        } else {
            Self::Fail
        }
    }
}

/// Terminal parameters for a link budget
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinkBudgetRequest {
    pub tx_power_dbm: f64,
    pub tx_antenna_gain_dbi: f64,
    pub tx_cable_loss_db: f64,
    pub rx_antenna_gain_dbi: f64,
    pub rx_cable_loss_db: f64,
    pub noise_figure_db: f64,
    pub noise_temperature_k: f64,
    /// Overrides the modulation table when set
    pub required_snr_db: Option<f64>,
    pub modulation: Modulation,
    pub target_ber: f64,
    pub code_rate: f64,
}

impl Default for LinkBudgetRequest {
    fn default() -> Self {
        Self {
            tx_power_dbm: 33.0,
            tx_antenna_gain_dbi: 3.0,
            tx_cable_loss_db: 0.0,
            rx_antenna_gain_dbi: 20.0,
            rx_cable_loss_db: 0.0,
            noise_figure_db: 5.0,
            noise_temperature_k: 290.0,
            required_snr_db: None,
            modulation: Modulation::Qpsk,
            target_ber: 1e-6,
            code_rate: 0.5,
        }
    }
}

impl LinkBudgetRequest {
    pub fn new(
        tx_power_dbm: f64,
        tx_gain_dbi: f64,
        rx_gain_dbi: f64,
        required_snr_db: f64,
    ) -> Self {
        Self {
            tx_power_dbm,
            tx_antenna_gain_dbi: tx_gain_dbi,
            rx_antenna_gain_dbi: rx_gain_dbi,
            required_snr_db: Some(required_snr_db),
            ..Default::default()
        }
    }

    pub fn eirp_dbm(&self) -> f64 {
        self.tx_power_dbm + self.tx_antenna_gain_dbi - self.tx_cable_loss_db
    }

    pub fn required_snr(&self) -> f64 {
        self.required_snr_db
            .unwrap_or_else(|| self.modulation.required_snr_db(self.target_ber))
    }
}

/// Thermal noise floor in dBm including receiver noise figure
pub fn noise_floor_dbm(bandwidth_hz: f64, temperature_k: f64, noise_figure_db: f64) -> f64 {
    10.0 * (BOLTZMANN_J_K * temperature_k * bandwidth_hz * 1000.0).log10() + noise_figure_db
}

/// Computed link budget
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LinkBudget {
    pub eirp_dbm: f64,
    pub total_loss_db: f64,
    pub rx_power_dbm: f64,
    pub noise_floor_dbm: f64,
    pub snr_db: f64,
    pub required_snr_db: f64,
    pub margin_db: f64,
    pub status: LinkStatus,
    /// Bandwidth x bits/symbol x code rate
    pub data_rate_bps: f64,
}

impl LinkBudget {
    pub fn compute(
        request: &LinkBudgetRequest,
        loss: &LossBreakdown,
        bandwidth_hz: f64,
    ) -> Result<Self> {
        if !bandwidth_hz.is_finite() || bandwidth_hz <= 0.0 {
            return Err(PropagationError::InvalidBandwidth(bandwidth_hz));
        }

        let eirp = request.eirp_dbm();
        let total_loss = loss.total_db();
        let rx_power =
            eirp - total_loss + request.rx_antenna_gain_dbi - request.rx_cable_loss_db;
        let noise = noise_floor_dbm(
            bandwidth_hz,
            request.noise_temperature_k,
            request.noise_figure_db,
        );
        let snr = rx_power - noise;
        let required = request.required_snr();
        let margin = snr - required;

        Ok(Self {
            eirp_dbm: eirp,
            total_loss_db: total_loss,
            rx_power_dbm: rx_power,
            noise_floor_dbm: noise,
            snr_db: snr,
            required_snr_db: required,
            margin_db: margin,
            status: LinkStatus::from_margin(margin),
            data_rate_bps: bandwidth_hz
                * request.modulation.bits_per_symbol()
                * request.code_rate.clamp(0.0, 1.0),
        })
    }

    pub fn closes(&self) -> bool {
        self.status != LinkStatus::Fail
    }
}
