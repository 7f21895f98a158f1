//! Front-End Calibration
//!
//! Estimates DC offset and IQ imbalance from a captured reference tone and
//! stores the correction. Captures below [`MIN_CALIBRATION_POWER`] are
//! rejected instead of producing an estimate.
//!
//! IQ imbalance turns a tone `x` into `y = μx + νx*`. Correlating the
//! DC-free capture at `+f` and `-f` yields `X+ = μA` and `X- = νA*`, so
//! `ρ = X- / conj(X+) = ν/μ*` and `y - ρy*` removes the image.

use crate::{signal, FrontEndError, Result};
use chrono::{DateTime, Utc};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

/// AC power floor for a usable capture (-60 dBFS)
pub const MIN_CALIBRATION_POWER: f64 = 1e-6;

/// Stored correction applied on receive
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct CalibrationState {
    pub dc_offset: Complex64,
    /// Image coefficient ρ
    pub iq_correction: Complex64,
    pub iq_gain_estimate: Option<f64>,
    pub iq_phase_deg_estimate: Option<f64>,
    pub image_rejection_db: Option<f64>,
    /// RMS sample-to-sample phase jitter seen in the last IQ capture
    pub phase_jitter_rms_rad: Option<f64>,
    pub dc_calibrated_at: Option<DateTime<Utc>>,
    pub iq_calibrated_at: Option<DateTime<Utc>>,
}

impl CalibrationState {
    pub fn is_dc_calibrated(&self) -> bool {
        self.dc_calibrated_at.is_some()
    }

    pub fn is_iq_calibrated(&self) -> bool {
        self.iq_calibrated_at.is_some()
    }

    pub fn correct_sample(&self, y: Complex64) -> Complex64 {
        let z = y - self.dc_offset;
        z - self.iq_correction * z.conj()
    }

    pub fn correct(&self, samples: &[Complex64]) -> Vec<Complex64> {
        if self.dc_offset == Complex64::default() && self.iq_correction == Complex64::default() {
            return samples.to_vec();
        }
        samples.iter().map(|&y| self.correct_sample(y)).collect()
    }
}

/// IQ imbalance estimate from a tone capture
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct IqEstimate {
    pub correction: Complex64,
    /// Q/I gain ratio (linear)
    pub gain: f64,
    pub phase_deg: f64,
    pub image_rejection_before_db: f64,
    pub image_rejection_after_db: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationKind {
    DcOffset,
    IqImbalance,
}

/// Result returned to the caller after a calibration run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalibrationReport {
    pub kind: CalibrationKind,
    pub capture_power_dbfs: f64,
    pub dc_offset_i: f64,
    pub dc_offset_q: f64,
    /// Mean bias remaining after applying the new correction
    pub residual_dc: f64,
    pub iq_gain: Option<f64>,
    pub iq_phase_deg: Option<f64>,
    pub image_rejection_before_db: Option<f64>,
    pub image_rejection_after_db: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Power of the capture around its mean
pub fn ac_power(samples: &[Complex64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean = signal::mean(samples);
    samples.iter().map(|&s| (s - mean).norm_sqr()).sum::<f64>() / samples.len() as f64
}

fn require_signal(samples: &[Complex64]) -> Result<f64> {
    let power = ac_power(samples);
    if !(power >= MIN_CALIBRATION_POWER) {
        return Err(FrontEndError::InsufficientSignal {
            power_dbfs: signal::to_dbfs(power),
        });
    }
    Ok(power)
}

/// DC offset as the complex sample mean
pub fn estimate_dc_offset(samples: &[Complex64]) -> Result<Complex64> {
    require_signal(samples)?;
    Ok(signal::mean(samples))
}

fn correlate(samples: &[Complex64], freq_hz: f64, sample_rate_hz: f64) -> Complex64 {
    let w = 2.0 * PI * freq_hz / sample_rate_hz;
    let sum: Complex64 = samples
        .iter()
        .enumerate()
        .map(|(n, &s)| s * Complex64::from_polar(1.0, -w * n as f64))
        .sum();
    sum / samples.len() as f64
}

fn image_rejection_db(desired: Complex64, image: Complex64) -> f64 {
    10.0 * (desired.norm_sqr() / image.norm_sqr().max(1e-30)).log10()
}

/// Image-frequency analysis of a reference tone at `tone_hz`
pub fn estimate_iq_imbalance(
    samples: &[Complex64],
    tone_hz: f64,
    sample_rate_hz: f64,
) -> Result<IqEstimate> {
    if !sample_rate_hz.is_finite() || sample_rate_hz <= 0.0 {
        return Err(FrontEndError::InvalidSampleRate(sample_rate_hz));
    }
    if !tone_hz.is_finite() || tone_hz == 0.0 || tone_hz.abs() >= sample_rate_hz / 2.0 {
        return Err(FrontEndError::InvalidTone(format!(
            "{} Hz at {} S/s",
            tone_hz, sample_rate_hz
        )));
    }
    require_signal(samples)?;

    let dc = signal::mean(samples);
    let centred: Vec<Complex64> = samples.iter().map(|&s| s - dc).collect();

    let desired = correlate(&centred, tone_hz, sample_rate_hz);
    let image = correlate(&centred, -tone_hz, sample_rate_hz);
    let rho = image / desired.conj();

    // g·e^{-jφ} = (1 - ρ) / (1 + ρ)
    let one = Complex64::new(1.0, 0.0);
    let u = (one - rho) / (one + rho);

    let corrected: Vec<Complex64> = centred.iter().map(|&z| z - rho * z.conj()).collect();
    let desired_after = correlate(&corrected, tone_hz, sample_rate_hz);
    let image_after = correlate(&corrected, -tone_hz, sample_rate_hz);

    let estimate = IqEstimate {
        correction: rho,
        gain: u.norm(),
        phase_deg: -u.arg().to_degrees(),
        image_rejection_before_db: image_rejection_db(desired, image),
        image_rejection_after_db: image_rejection_db(desired_after, image_after),
    };
    debug!(
        gain = estimate.gain,
        phase_deg = estimate.phase_deg,
        irr_before_db = estimate.image_rejection_before_db,
        irr_after_db = estimate.image_rejection_after_db,
        "IQ imbalance estimated"
    );
    Ok(estimate)
}

/// RMS of the de-trended sample-to-sample phase step
pub fn phase_jitter_rms(samples: &[Complex64]) -> Option<f64> {
    if samples.len() < 3 {
        return None;
    }
    let steps: Vec<f64> = samples
        .windows(2)
        .map(|w| (w[1] * w[0].conj()).arg())
        .collect();
    let mean = steps.iter().sum::<f64>() / steps.len() as f64;
    let var = steps.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / steps.len() as f64;
    Some(var.sqrt())
}
