//! Fading Engine
//!
//! Output is the weighted, delayed sum of taps. Delays are rounded to whole
//! samples and the start of the buffer is zero-padded, so output length always
//! equals input length.

use crate::{FadingError, Result, TapDelayProfile};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use tracing::debug;

/// Tap resolved for a concrete sample rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedTap {
    pub delay_samples: usize,
    pub weight: Complex64,
}

#[derive(Debug)]
pub struct FadingEngine {
    rng: StdRng,
    /// Per-tap phase drawn uniformly from [-spread, spread]
    phase_spread_rad: f64,
}

impl Default for FadingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FadingEngine {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            phase_spread_rad: PI,
        }
    }

    /// Reproducible tap phases
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            phase_spread_rad: PI,
        }
    }

    pub fn with_phase_spread(mut self, spread_rad: f64) -> Self {
        self.phase_spread_rad = spread_rad.abs().min(PI);
        self
    }

    pub fn phase_spread_rad(&self) -> f64 {
        self.phase_spread_rad
    }

    /// Draw one realisation of the channel taps
    pub fn resolve(
        &mut self,
        profile: &TapDelayProfile,
        sample_rate_hz: f64,
    ) -> Result<Vec<ResolvedTap>> {
        if !sample_rate_hz.is_finite() || sample_rate_hz <= 0.0 {
            return Err(FadingError::InvalidSampleRate(sample_rate_hz));
        }
        profile.validate()?;

        let randomise = profile.taps.len() > 1 && self.phase_spread_rad > 0.0;
        let amplitudes = profile.amplitudes();

        Ok(profile
            .taps
            .iter()
            .zip(amplitudes)
            .map(|(tap, amplitude)| {
                let phase = if randomise {
                    self.rng
                        .gen_range(-self.phase_spread_rad..=self.phase_spread_rad)
                } else {
                    0.0
                };
                ResolvedTap {
                    delay_samples: (tap.delay_ns * 1e-9 * sample_rate_hz).round() as usize,
                    weight: Complex64::from_polar(amplitude, phase),
                }
            })
            .collect())
    }

    /// Filter a buffer through one channel realisation
    pub fn apply(
        &mut self,
        profile: &TapDelayProfile,
        samples: &[Complex64],
        sample_rate_hz: f64,
    ) -> Result<Vec<Complex64>> {
        let taps = self.resolve(profile, sample_rate_hz)?;
        if profile.is_identity() {
            return Ok(samples.to_vec());
        }

        debug!(
            profile = %profile.name,
            taps = taps.len(),
            samples = samples.len(),
            "applying fading"
        );
        Ok(convolve(&taps, samples))
    }
}

/// Weighted sum of delayed copies, zero before the first sample
pub fn convolve(taps: &[ResolvedTap], samples: &[Complex64]) -> Vec<Complex64> {
    let mut output = vec![Complex64::new(0.0, 0.0); samples.len()];
    for tap in taps {
        if tap.delay_samples >= samples.len() {
            continue;
        }
        for (out, &x) in output[tap.delay_samples..].iter_mut().zip(samples) {
            *out += x * tap.weight;
        }
    }
    output
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::FadingProfile;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        // Single-tap, zero-delay, unity-gain profile returns its input
        #[test]
        fn identity_profile(
            samples in prop::collection::vec((-10.0f64..10.0, -10.0f64..10.0), 0..512),
            fs in 1e3f64..1e9,
        ) {
            let input: Vec<Complex64> =
                samples.iter().map(|&(re, im)| Complex64::new(re, im)).collect();
            let out = FadingEngine::new().apply(&FadingProfile::Los.taps(), &input, fs).unwrap();
            prop_assert_eq!(out, input);
        }
    }
}
