//! NTN Propagation Loss
//!
//! Converts link geometry into path loss. Accounts for:
//! - Free space path loss
//! - Atmospheric absorption (oxygen + water vapour)
//! - Rain fade (power-law specific attenuation)
//! - Scintillation and implementation allowances
//!
//! Every term is additive in dB and can be disabled individually.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod link_budget;

pub use link_budget::{
    noise_floor_dbm, LinkBudget, LinkBudgetRequest, LinkStatus, Modulation, MARGINAL_THRESHOLD_DB,
};

/// Satellite/terrestrial split for effective path lengths
const SATELLITE_PATH_KM: f64 = 100.0;

/// Atmospheric scale height
const SCALE_HEIGHT_KM: f64 = 8.0;

/// Rain layer depth used for satellite paths
const RAIN_HEIGHT_KM: f64 = 5.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PropagationError {
    #[error("Invalid distance: {0} km")]
    InvalidDistance(f64),
    #[error("Invalid frequency: {0} Hz")]
    InvalidFrequency(f64),
    #[error("Invalid rain rate: {0} mm/hr")]
    InvalidRainRate(f64),
    #[error("Invalid bandwidth: {0} Hz")]
    InvalidBandwidth(f64),
}

pub type Result<T> = std::result::Result<T, PropagationError>;

/// Which loss terms apply and their fixed allowances
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LossConfig {
    pub atmospheric_enabled: bool,
    pub rain_enabled: bool,
    pub rain_rate_mm_hr: f64,
    pub scintillation_enabled: bool,
    pub scintillation_db: f64,
    pub implementation_margin_enabled: bool,
    pub implementation_margin_db: f64,
}

impl Default for LossConfig {
    fn default() -> Self {
        Self {
            atmospheric_enabled: true,
            rain_enabled: true,
            rain_rate_mm_hr: 0.0,
            scintillation_enabled: false,
            scintillation_db: 1.5,
            implementation_margin_enabled: true,
            implementation_margin_db: 2.0,
        }
    }
}

impl LossConfig {
    /// Free-space only, every allowance off
    pub fn free_space_only() -> Self {
        Self {
            atmospheric_enabled: false,
            rain_enabled: false,
            rain_rate_mm_hr: 0.0,
            scintillation_enabled: false,
            scintillation_db: 0.0,
            implementation_margin_enabled: false,
            implementation_margin_db: 0.0,
        }
    }
}

/// Loss terms in dB, all non-negative
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct LossBreakdown {
    pub free_space_db: f64,
    pub atmospheric_db: f64,
    pub rain_db: f64,
    pub scintillation_db: f64,
    pub implementation_db: f64,
}

impl LossBreakdown {
    pub fn total_db(&self) -> f64 {
        self.free_space_db
            + self.atmospheric_db
            + self.rain_db
            + self.scintillation_db
            + self.implementation_db
    }

    /// Linear amplitude factor 10^(-L/20)
    pub fn amplitude_scale(&self) -> f64 {
        10f64.powf(-self.total_db() / 20.0)
    }
}

/// Loss model bound to a configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct LossModel {
    pub config: LossConfig,
}

impl LossModel {
    pub fn new(config: LossConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(
        &self,
        distance_km: f64,
        frequency_hz: f64,
        elevation_deg: f64,
    ) -> Result<LossBreakdown> {
        validate_distance(distance_km)?;
        validate_frequency(frequency_hz)?;
        let cfg = &self.config;
        if !cfg.rain_rate_mm_hr.is_finite() || cfg.rain_rate_mm_hr < 0.0 {
            return Err(PropagationError::InvalidRainRate(cfg.rain_rate_mm_hr));
        }

        let freq_ghz = frequency_hz / 1e9;

        Ok(LossBreakdown {
            free_space_db: free_space_path_loss(distance_km, freq_ghz),
            atmospheric_db: if cfg.atmospheric_enabled {
                atmospheric_loss(distance_km, freq_ghz, elevation_deg)
            } else {
                0.0
            },
            rain_db: if cfg.rain_enabled {
                rain_attenuation(distance_km, freq_ghz, cfg.rain_rate_mm_hr, elevation_deg)
            } else {
                0.0
            },
            scintillation_db: if cfg.scintillation_enabled {
                cfg.scintillation_db.max(0.0)
            } else {
                0.0
            },
            implementation_db: if cfg.implementation_margin_enabled {
                cfg.implementation_margin_db.max(0.0)
            } else {
                0.0
            },
        })
    }
}

fn validate_distance(distance_km: f64) -> Result<()> {
    if !distance_km.is_finite() || distance_km <= 0.0 {
        return Err(PropagationError::InvalidDistance(distance_km));
    }
    Ok(())
}

fn validate_frequency(frequency_hz: f64) -> Result<()> {
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return Err(PropagationError::InvalidFrequency(frequency_hz));
    }
    Ok(())
}

/// Free space path loss in dB (d in km, f in GHz)
pub fn free_space_path_loss(distance_km: f64, freq_ghz: f64) -> f64 {
    20.0 * distance_km.log10() + 20.0 * freq_ghz.log10() + 92.45
}

/// Gaseous absorption over the effective atmospheric path
pub fn atmospheric_loss(distance_km: f64, freq_ghz: f64, elevation_deg: f64) -> f64 {
    let gamma_o = if freq_ghz < 57.0 {
        0.0019 * freq_ghz * freq_ghz
    } else {
        0.5
    };
    let gamma_w = if freq_ghz < 22.0 {
        0.005 * freq_ghz * freq_ghz
    } else {
        0.1
    };

    // Short links sit entirely inside the atmosphere
    let path_km = if distance_km < SATELLITE_PATH_KM {
        distance_km
    } else {
        let sin_el = elevation_deg.to_radians().sin().max(0.0);
        SCALE_HEIGHT_KM * (1.0 - (-distance_km * sin_el / SCALE_HEIGHT_KM).exp())
    };

    (gamma_o + gamma_w) * path_km
}

/// Power-law rain coefficients (k, alpha)
fn rain_coefficients(freq_ghz: f64) -> (f64, f64) {
    if freq_ghz < 2.5 {
        (0.003 * freq_ghz * freq_ghz, 1.0)
    } else if freq_ghz < 10.0 {
        (0.02 * freq_ghz.powf(1.5), 1.1)
    } else {
        (0.1 * freq_ghz, 1.2)
    }
}

pub fn rain_attenuation(
    distance_km: f64,
    freq_ghz: f64,
    rain_rate_mm_hr: f64,
    elevation_deg: f64,
) -> f64 {
    if rain_rate_mm_hr <= 0.0 {
        return 0.0;
    }

    let (k, alpha) = rain_coefficients(freq_ghz);
    let gamma = k * rain_rate_mm_hr.powf(alpha);

    let path_km = if distance_km > SATELLITE_PATH_KM {
        RAIN_HEIGHT_KM / elevation_deg.max(5.0).to_radians().sin()
    } else {
        distance_km
    };

    gamma * path_km
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_geo_45_loss() {
        let loss = LossModel::default()
            .evaluate(37_410.0, 1.5e9, 45.0)
            .unwrap();
        let total = loss.total_db();
        assert!(total > 187.0 && total < 193.0, "GEO loss {} dB", total);
        assert_relative_eq!(loss.implementation_db, 2.0);
        assert_eq!(loss.rain_db, 0.0);
    }

    #[test]
    fn test_haps_60_loss() {
        let loss = LossModel::default().evaluate(34.64, 2e9, 60.0).unwrap();
        let total = loss.total_db();
        assert!(total > 125.0 && total < 135.0, "HAPS loss {} dB", total);
        // full path inside the atmosphere
        assert_relative_eq!(loss.atmospheric_db, 0.0276 * 34.64, epsilon = 1e-9);
    }

    #[test]
    fn test_fspl_reference() {
        // 1 km at 1 GHz
        assert_relative_eq!(free_space_path_loss(1.0, 1.0), 92.45);
    }

    #[test]
    fn test_rain_bands() {
        let low = rain_attenuation(600.0, 2.0, 10.0, 30.0);
        let mid = rain_attenuation(600.0, 8.0, 10.0, 30.0);
        let high = rain_attenuation(600.0, 20.0, 10.0, 30.0);
        assert!(low > 0.0 && low < mid && mid < high);
        assert_eq!(rain_attenuation(600.0, 20.0, 0.0, 30.0), 0.0);

        // Low elevation floors at 5°
        assert_relative_eq!(
            rain_attenuation(600.0, 2.0, 10.0, 1.0),
            rain_attenuation(600.0, 2.0, 10.0, 5.0)
        );
    }

    #[test]
    fn test_terms_disable_individually() {
        let config = LossConfig {
            rain_rate_mm_hr: 25.0,
            scintillation_enabled: true,
            ..Default::default()
        };
        let all = LossModel::new(config).evaluate(1000.0, 2e9, 30.0).unwrap();
        assert!(all.rain_db > 0.0);
        assert_relative_eq!(all.scintillation_db, 1.5);

        let no_rain = LossModel::new(LossConfig {
            rain_enabled: false,
            ..config
        })
        .evaluate(1000.0, 2e9, 30.0)
        .unwrap();
        assert_eq!(no_rain.rain_db, 0.0);
        assert_relative_eq!(all.total_db() - no_rain.total_db(), all.rain_db, epsilon = 1e-9);

        let bare = LossModel::new(LossConfig::free_space_only())
            .evaluate(1000.0, 2e9, 30.0)
            .unwrap();
        assert_relative_eq!(bare.total_db(), bare.free_space_db);
    }

    #[test]
    fn test_invalid_inputs() {
        let model = LossModel::default();
        assert_eq!(
            model.evaluate(0.0, 2e9, 30.0),
            Err(PropagationError::InvalidDistance(0.0))
        );
        assert_eq!(
            model.evaluate(100.0, -1.0, 30.0),
            Err(PropagationError::InvalidFrequency(-1.0))
        );
        let wet = LossModel::new(LossConfig {
            rain_rate_mm_hr: -3.0,
            ..Default::default()
        });
        assert!(matches!(
            wet.evaluate(100.0, 2e9, 30.0),
            Err(PropagationError::InvalidRainRate(_))
        ));
    }

    #[test]
    fn test_amplitude_scale() {
        let loss = LossBreakdown {
            free_space_db: 20.0,
            ..Default::default()
        };
        assert_relative_eq!(loss.amplitude_scale(), 0.1, epsilon = 1e-12);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(5000))]

        // Doubling distance adds exactly 20*log10(2) dB of free-space loss
        #[test]
        fn fspl_doubling(d in 0.01f64..100_000.0, f_hz in 1e8f64..1e11) {
            let model = LossModel::new(LossConfig::free_space_only());
            let near = model.evaluate(d, f_hz, 45.0).unwrap();
            let far = model.evaluate(2.0 * d, f_hz, 45.0).unwrap();
            let delta = far.free_space_db - near.free_space_db;
            prop_assert!((delta - 20.0 * 2f64.log10()).abs() < 1e-9, "delta {}", delta);
        }

        // All terms non-negative for valid inputs
        #[test]
        fn loss_terms_non_negative(
            d in 1.0f64..50_000.0,
            f_hz in 1e8f64..6e10,
            el in 0.0f64..=90.0,
            rain in 0.0f64..150.0,
        ) {
            let model = LossModel::new(LossConfig {
                rain_rate_mm_hr: rain,
                scintillation_enabled: true,
                ..Default::default()
            });
            let loss = model.evaluate(d, f_hz, el).unwrap();
            prop_assert!(loss.atmospheric_db >= 0.0);
            prop_assert!(loss.rain_db >= 0.0);
            prop_assert!(loss.scintillation_db >= 0.0);
        }
    }
}
