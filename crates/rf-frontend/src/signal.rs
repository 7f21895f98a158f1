//! Stimulus generators and buffer measurements

use crate::{FrontEndError, Result};
use num_complex::Complex64;
use rand::Rng;
use rustfft::FftPlanner;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Floor used when converting zero power to dBFS
const POWER_FLOOR: f64 = 1e-20;

/// Complex exponential at `offset_hz` from the centre frequency
pub fn test_tone(
    offset_hz: f64,
    duration_s: f64,
    amplitude: f64,
    sample_rate_hz: f64,
) -> Result<Vec<Complex64>> {
    if !sample_rate_hz.is_finite() || sample_rate_hz <= 0.0 {
        return Err(FrontEndError::InvalidSampleRate(sample_rate_hz));
    }
    if !offset_hz.is_finite() || offset_hz.abs() >= sample_rate_hz / 2.0 {
        return Err(FrontEndError::InvalidTone(format!(
            "offset {} Hz exceeds Nyquist at {} S/s",
            offset_hz, sample_rate_hz
        )));
    }
    if !duration_s.is_finite() || duration_s < 0.0 || !amplitude.is_finite() {
        return Err(FrontEndError::InvalidTone(format!(
            "duration {} s, amplitude {}",
            duration_s, amplitude
        )));
    }

    let num_samples = (duration_s * sample_rate_hz).round() as usize;
    let w = 2.0 * PI * offset_hz / sample_rate_hz;
    Ok((0..num_samples)
        .map(|n| Complex64::from_polar(amplitude, w * n as f64))
        .collect())
}

/// Wideband block: random QPSK on every subcarrier, one IFFT, tiled to length
pub fn multicarrier_block<R: Rng + ?Sized>(
    num_subcarriers: usize,
    num_samples: usize,
    rng: &mut R,
) -> Result<Vec<Complex64>> {
    if num_subcarriers == 0 {
        return Err(FrontEndError::InvalidTone(
            "multicarrier block needs at least one subcarrier".to_string(),
        ));
    }

    let mut symbol: Vec<Complex64> = (0..num_subcarriers)
        .map(|_| {
            let i = if rng.gen::<bool>() { 1.0 } else { -1.0 };
            let q = if rng.gen::<bool>() { 1.0 } else { -1.0 };
            Complex64::new(i * FRAC_1_SQRT_2, q * FRAC_1_SQRT_2)
        })
        .collect();

    let mut planner = FftPlanner::new();
    let ifft = planner.plan_fft_inverse(num_subcarriers);
    ifft.process(&mut symbol);

    let scale = 0.5 / (num_subcarriers as f64).sqrt();
    Ok(symbol
        .iter()
        .cycle()
        .take(num_samples)
        .map(|&s| s * scale)
        .collect())
}

pub fn mean(samples: &[Complex64]) -> Complex64 {
    if samples.is_empty() {
        return Complex64::new(0.0, 0.0);
    }
    samples.iter().sum::<Complex64>() / samples.len() as f64
}

pub fn mean_power(samples: &[Complex64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(Complex64::norm_sqr).sum::<f64>() / samples.len() as f64
}

/// Power relative to a unit-amplitude full-scale tone
pub fn to_dbfs(power: f64) -> f64 {
    10.0 * power.max(POWER_FLOOR).log10()
}

pub fn power_dbfs(samples: &[Complex64]) -> f64 {
    to_dbfs(mean_power(samples))
}

/// Linear amplitude factor for a gain in dB
pub fn db_to_amplitude(gain_db: f64) -> f64 {
    10f64.powf(gain_db / 20.0)
}

pub fn scale(samples: &[Complex64], factor: f64) -> Vec<Complex64> {
    samples.iter().map(|&s| s * factor).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_tone_length_and_power() {
        let tone = test_tone(100e3, 1e-3, 0.7, 30.72e6).unwrap();
        assert_eq!(tone.len(), 30_720);
        assert_relative_eq!(mean_power(&tone), 0.49, epsilon = 1e-9);
        assert!(mean(&tone).norm() < 1e-9);
    }

    #[test]
    fn test_tone_rejects_bad_input() {
        assert!(matches!(
            test_tone(1e3, 1e-3, 1.0, 0.0),
            Err(FrontEndError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            test_tone(20e6, 1e-3, 1.0, 30.72e6),
            Err(FrontEndError::InvalidTone(_))
        ));
        assert!(test_tone(1e3, -1.0, 1.0, 1e6).is_err());
    }

    #[test]
    fn test_multicarrier_power() {
        let mut rng = StdRng::seed_from_u64(4);
        let block = multicarrier_block(64, 640, &mut rng).unwrap();
        assert_eq!(block.len(), 640);
        // Unitary IFFT keeps unit symbol power, then 0.5 amplitude
        assert_relative_eq!(mean_power(&block), 0.25, epsilon = 1e-9);
        // Tiled with period 64
        assert_eq!(block[3], block[67]);
    }

    #[test]
    fn test_multicarrier_seeded() {
        let a = multicarrier_block(128, 300, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = multicarrier_block(128, 300, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
        assert!(multicarrier_block(0, 10, &mut StdRng::seed_from_u64(9)).is_err());
    }

    #[test]
    fn test_dbfs() {
        assert_relative_eq!(to_dbfs(1.0), 0.0);
        assert_relative_eq!(to_dbfs(1e-6), -60.0, epsilon = 1e-9);
        assert!(power_dbfs(&[]).is_finite());
        assert_relative_eq!(db_to_amplitude(-20.0), 0.1, epsilon = 1e-12);
    }
}
