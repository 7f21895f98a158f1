//! Hardware Impairments
//!
//! Oscillator and mixer non-idealities applied to complex baseband samples.
//!
//! - **Frequency offset**: residual LO error, rotation restarts every buffer
//! - **Phase noise**: first-order IIR filtered random walk
//! - **IQ imbalance**: I' = I, Q' = g(Q cos φ + I sin φ)
//! - **DC offset**: constant I/Q bias from LO leakage

use crate::calibration::CalibrationState;
use nalgebra::{Matrix2, Vector2};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// One direction's impairment set
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HardwareImpairments {
    pub dc_offset_i: f64,
    pub dc_offset_q: f64,
    /// Q-rail gain relative to I
    pub iq_gain_db: f64,
    /// Quadrature skew
    pub iq_phase_deg: f64,
    /// Phase noise magnitude (dBc), `None` disables it
    pub phase_noise_dbc: Option<f64>,
    /// IIR coefficient, closer to 1 is more low-frequency content
    pub phase_noise_alpha: f64,
    pub frequency_offset_hz: f64,
}

impl Default for HardwareImpairments {
    fn default() -> Self {
        Self::none()
    }
}

impl HardwareImpairments {
    pub fn none() -> Self {
        Self {
            dc_offset_i: 0.0,
            dc_offset_q: 0.0,
            iq_gain_db: 0.0,
            iq_phase_deg: 0.0,
            phase_noise_dbc: None,
            phase_noise_alpha: 0.99,
            frequency_offset_hz: 0.0,
        }
    }

    /// Randomised set with the spreads seen on bench hardware
    pub fn sampled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut draw = |std: f64| -> f64 { std * rng.sample::<f64, _>(StandardNormal) };
        let dc_offset_i = draw(0.01);
        let dc_offset_q = draw(0.01);
        let gain_ratio = 1.0 + draw(0.02);
        let iq_phase_deg = draw(1.0);
        let frequency_offset_hz = draw(50.0);

        Self {
            dc_offset_i,
            dc_offset_q,
            iq_gain_db: 20.0 * gain_ratio.abs().max(1e-3).log10(),
            iq_phase_deg,
            phase_noise_dbc: Some(-40.0),
            phase_noise_alpha: 0.99,
            frequency_offset_hz,
        }
    }

    pub fn dc_offset(&self) -> Complex64 {
        Complex64::new(self.dc_offset_i, self.dc_offset_q)
    }

    /// Maps [I, Q] to the imbalanced [I', Q']
    pub fn iq_matrix(&self) -> Matrix2<f64> {
        let g = 10f64.powf(self.iq_gain_db / 20.0);
        let phi = self.iq_phase_deg.to_radians();
        Matrix2::new(1.0, 0.0, g * phi.sin(), g * phi.cos())
    }

    pub fn has_iq_imbalance(&self) -> bool {
        self.iq_gain_db != 0.0 || self.iq_phase_deg != 0.0
    }
}

/// Filtered random phase walk
#[derive(Debug, Clone)]
pub struct PhaseNoise {
    /// Linear white-noise standard deviation
    std: f64,
    alpha: f64,
    state: f64,
}

impl PhaseNoise {
    pub fn new(magnitude_dbc: f64, alpha: f64) -> Self {
        Self {
            std: 10f64.powf(magnitude_dbc / 20.0),
            alpha: alpha.clamp(0.0, 0.9999),
            state: 0.0,
        }
    }

    pub fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> f64 {
        let white: f64 = self.std * rng.sample::<f64, _>(StandardNormal);
        self.state = self.alpha * self.state + (1.0 - self.alpha) * white;
        self.state
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}

/// Stateful impairment chain for one direction
#[derive(Debug)]
pub struct ImpairmentChain {
    impairments: HardwareImpairments,
    phase_noise: Option<PhaseNoise>,
    rng: StdRng,
}

impl ImpairmentChain {
    pub fn new(impairments: HardwareImpairments) -> Self {
        Self::with_rng(impairments, StdRng::from_entropy())
    }

    pub fn seeded(impairments: HardwareImpairments, seed: u64) -> Self {
        Self::with_rng(impairments, StdRng::seed_from_u64(seed))
    }

    fn with_rng(impairments: HardwareImpairments, rng: StdRng) -> Self {
        Self {
            phase_noise: impairments
                .phase_noise_dbc
                .map(|dbc| PhaseNoise::new(dbc, impairments.phase_noise_alpha)),
            impairments,
            rng,
        }
    }

    pub fn impairments(&self) -> &HardwareImpairments {
        &self.impairments
    }

    pub fn apply(&mut self, samples: &[Complex64], sample_rate_hz: f64) -> Vec<Complex64> {
        let imp = self.impairments;
        let cfo_step = if sample_rate_hz > 0.0 {
            2.0 * PI * imp.frequency_offset_hz / sample_rate_hz
        } else {
            0.0
        };
        let iq = imp.iq_matrix();
        let apply_iq = imp.has_iq_imbalance();
        let dc = imp.dc_offset();

        samples
            .iter()
            .enumerate()
            .map(|(n, &s)| {
                let mut phase = cfo_step * n as f64;
                if let Some(pn) = self.phase_noise.as_mut() {
                    phase += pn.next(&mut self.rng);
                }
                let mut y = if phase != 0.0 {
                    s * Complex64::from_polar(1.0, phase)
                } else {
                    s
                };
                if apply_iq {
                    let v = iq * Vector2::new(y.re, y.im);
                    y = Complex64::new(v[0], v[1]);
                }
                y + dc
            })
            .collect()
    }
}

/// Paired TX and RX chains for one device
#[derive(Debug)]
pub struct ImpairmentSimulator {
    tx: ImpairmentChain,
    rx: ImpairmentChain,
}

impl ImpairmentSimulator {
    pub fn new(tx: HardwareImpairments, rx: HardwareImpairments) -> Self {
        Self {
            tx: ImpairmentChain::new(tx),
            rx: ImpairmentChain::new(rx),
        }
    }

    pub fn seeded(tx: HardwareImpairments, rx: HardwareImpairments, seed: u64) -> Self {
        Self {
            tx: ImpairmentChain::seeded(tx, seed),
            rx: ImpairmentChain::seeded(rx, seed.wrapping_add(1)),
        }
    }

    pub fn tx_impairments(&self) -> &HardwareImpairments {
        self.tx.impairments()
    }

    pub fn rx_impairments(&self) -> &HardwareImpairments {
        self.rx.impairments()
    }

    /// Transmit-side distortion
    pub fn transmit(&mut self, samples: &[Complex64], sample_rate_hz: f64) -> Vec<Complex64> {
        self.tx.apply(samples, sample_rate_hz)
    }

    /// Receive-side distortion followed by the stored calibration correction
    pub fn receive(
        &mut self,
        samples: &[Complex64],
        sample_rate_hz: f64,
        calibration: &CalibrationState,
    ) -> Vec<Complex64> {
        let impaired = self.rx.apply(samples, sample_rate_hz);
        calibration.correct(&impaired)
    }

    /// Receive-side distortion only, as seen by a calibration capture
    pub fn capture(&mut self, samples: &[Complex64], sample_rate_hz: f64) -> Vec<Complex64> {
        self.rx.apply(samples, sample_rate_hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal;
    use approx::assert_relative_eq;

    const FS: f64 = 30.72e6;

    #[test]
    fn test_no_impairments_identity() {
        let tone = signal::test_tone(100e3, 1e-4, 0.7, FS).unwrap();
        let mut chain = ImpairmentChain::seeded(HardwareImpairments::none(), 1);
        assert_eq!(chain.apply(&tone, FS), tone);
    }

    #[test]
    fn test_dc_offset_shifts_mean() {
        let imp = HardwareImpairments {
            dc_offset_i: 0.05,
            dc_offset_q: -0.02,
            ..HardwareImpairments::none()
        };
        let tone = signal::test_tone(100e3, 1e-3, 0.5, FS).unwrap();
        let out = ImpairmentChain::seeded(imp, 1).apply(&tone, FS);
        let mean = signal::mean(&out);
        assert_relative_eq!(mean.re, 0.05, epsilon = 1e-6);
        assert_relative_eq!(mean.im, -0.02, epsilon = 1e-6);
    }

    #[test]
    fn test_iq_imbalance_model() {
        let imp = HardwareImpairments {
            iq_gain_db: 20.0 * 1.1f64.log10(),
            iq_phase_deg: 5.0,
            ..HardwareImpairments::none()
        };
        let x = Complex64::new(0.3, -0.4);
        let out = ImpairmentChain::seeded(imp, 1).apply(&[x], FS);
        let phi = 5f64.to_radians();
        assert_relative_eq!(out[0].re, 0.3, epsilon = 1e-12);
        assert_relative_eq!(
            out[0].im,
            1.1 * (-0.4 * phi.cos() + 0.3 * phi.sin()),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_phase_noise_preserves_envelope() {
        let imp = HardwareImpairments {
            phase_noise_dbc: Some(-30.0),
            phase_noise_alpha: 0.9,
            ..HardwareImpairments::none()
        };
        let signal = vec![Complex64::new(1.0, 0.0); 1000];
        let noisy = ImpairmentChain::seeded(imp, 3).apply(&signal, FS);
        for z in &noisy {
            assert!((z.norm() - 1.0).abs() < 1e-9);
        }
        assert!(noisy.iter().any(|z| z.im != 0.0));
    }

    #[test]
    fn test_frequency_offset_restarts_each_buffer() {
        let imp = HardwareImpairments {
            frequency_offset_hz: 1000.0,
            ..HardwareImpairments::none()
        };
        let ones = vec![Complex64::new(1.0, 0.0); 64];
        let mut chain = ImpairmentChain::seeded(imp, 1);
        let first = chain.apply(&ones, 1e6);
        let second = chain.apply(&ones, 1e6);
        assert_eq!(first, second);
        let expected = 2.0 * PI * 1000.0 * 10.0 / 1e6;
        assert_relative_eq!(first[10].arg(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_sampled_spreads() {
        let mut rng = StdRng::seed_from_u64(11);
        let imp = HardwareImpairments::sampled(&mut rng);
        assert!(imp.dc_offset_i.abs() < 0.1);
        assert!(imp.iq_gain_db.abs() < 2.0);
        assert!(imp.phase_noise_dbc.is_some());
    }
}
