//! Channel configuration
//!
//! [`ChannelOptions`] is the loose, named option set accepted from callers
//! and scenario files. Resolving it against an orbit type fills the per-type
//! defaults and validates everything up front, producing a
//! [`ChannelConfiguration`].

use crate::error::{EmulatorError, Result};
use ntn_fading::{FadingProfile, TapDelayProfile};
use ntn_geometry::{
    validate_altitude, validate_elevation, validate_frequency, OrbitType, PassProfile,
    DEFAULT_MIN_ELEVATION_DEG,
};
use ntn_propagation::LossConfig;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BANDWIDTH_HZ: f64 = 30e6;
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 30.72e6;

/// Named channel options; anything left out takes the orbit type's default
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChannelOptions {
    pub orbit_type: Option<String>,
    pub altitude_km: Option<f64>,
    pub elevation_deg: Option<f64>,
    pub frequency_hz: Option<f64>,
    pub bandwidth_hz: Option<f64>,
    pub sample_rate_hz: Option<f64>,
    pub fading_profile: Option<String>,
    pub rain_rate_mm_hr: Option<f64>,
    pub doppler_enabled: Option<bool>,
    pub fading_enabled: Option<bool>,
    pub rain_enabled: Option<bool>,
    pub atmospheric_enabled: Option<bool>,
    pub scintillation_enabled: Option<bool>,
    pub implementation_margin_enabled: Option<bool>,
    /// Adds white noise at this SNR relative to the received signal
    pub awgn_snr_db: Option<f64>,
    pub min_elevation_deg: Option<f64>,
    /// Makes tap phases and noise reproducible
    pub fading_seed: Option<u64>,
    pub pass_peak_elevation_deg: Option<f64>,
    pub update_interval_ms: Option<u64>,
}

impl ChannelOptions {
    pub fn for_orbit(orbit_type: OrbitType) -> Self {
        Self {
            orbit_type: Some(orbit_type.as_str().to_string()),
            ..Default::default()
        }
    }

    pub fn altitude_km(mut self, altitude_km: f64) -> Self {
        self.altitude_km = Some(altitude_km);
        self
    }

    pub fn elevation_deg(mut self, elevation_deg: f64) -> Self {
        self.elevation_deg = Some(elevation_deg);
        self
    }

    pub fn frequency_hz(mut self, frequency_hz: f64) -> Self {
        self.frequency_hz = Some(frequency_hz);
        self
    }

    pub fn fading_profile(mut self, name: impl Into<String>) -> Self {
        self.fading_profile = Some(name.into());
        self
    }

    pub fn rain_rate_mm_hr(mut self, rate: f64) -> Self {
        self.rain_rate_mm_hr = Some(rate);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.fading_seed = Some(seed);
        self
    }

    /// Orbit type named in the options, if any
    pub fn parsed_orbit_type(&self) -> Result<Option<OrbitType>> {
        self.orbit_type
            .as_deref()
            .map(|s| s.parse::<OrbitType>().map_err(EmulatorError::from))
            .transpose()
    }

    /// Fill defaults for `orbit_type` and validate every value
    pub fn resolve(&self, orbit_type: OrbitType) -> Result<ChannelConfiguration> {
        if let Some(named) = self.parsed_orbit_type()? {
            if named != orbit_type {
                return Err(EmulatorError::InvalidConfiguration(format!(
                    "orbit_type option {} conflicts with requested {}",
                    named, orbit_type
                )));
            }
        }

        let altitude_km = self
            .altitude_km
            .unwrap_or_else(|| orbit_type.default_altitude_km());
        validate_altitude(altitude_km)?;

        let elevation_deg = self
            .elevation_deg
            .unwrap_or_else(|| orbit_type.default_elevation_deg());
        validate_elevation(elevation_deg)?;

        let min_elevation_deg = self.min_elevation_deg.unwrap_or(DEFAULT_MIN_ELEVATION_DEG);
        if !min_elevation_deg.is_finite() || !(0.0..90.0).contains(&min_elevation_deg) {
            return Err(EmulatorError::InvalidConfiguration(format!(
                "min_elevation_deg must be in [0, 90), got {}",
                min_elevation_deg
            )));
        }

        let frequency_hz = self
            .frequency_hz
            .unwrap_or_else(|| orbit_type.default_frequency_hz());
        validate_frequency(frequency_hz)?;

        let bandwidth_hz =
            positive("bandwidth_hz", self.bandwidth_hz.unwrap_or(DEFAULT_BANDWIDTH_HZ))?;
        let sample_rate_hz =
            positive("sample_rate_hz", self.sample_rate_hz.unwrap_or(DEFAULT_SAMPLE_RATE_HZ))?;

        let rain_rate_mm_hr = self.rain_rate_mm_hr.unwrap_or(0.0);
        validate_rain_rate(rain_rate_mm_hr)?;

        let fading_profile = match &self.fading_profile {
            Some(name) => TapDelayProfile::lookup(name)?,
            None => default_profile(orbit_type).taps(),
        };

        if let Some(snr) = self.awgn_snr_db {
            if !snr.is_finite() {
                return Err(EmulatorError::InvalidConfiguration(format!(
                    "awgn_snr_db must be finite, got {}",
                    snr
                )));
            }
        }

        let defaults = LossConfig::default();
        let loss = LossConfig {
            atmospheric_enabled: self.atmospheric_enabled.unwrap_or(defaults.atmospheric_enabled),
            rain_enabled: self.rain_enabled.unwrap_or(defaults.rain_enabled),
            rain_rate_mm_hr,
            scintillation_enabled: self
                .scintillation_enabled
                .unwrap_or(defaults.scintillation_enabled),
            implementation_margin_enabled: self
                .implementation_margin_enabled
                .unwrap_or(defaults.implementation_margin_enabled),
            ..defaults
        };

        let default_pass = PassProfile::default();
        let pass = PassProfile {
            peak_elevation_deg: self
                .pass_peak_elevation_deg
                .unwrap_or(default_pass.peak_elevation_deg),
            update_interval_ms: self
                .update_interval_ms
                .unwrap_or(default_pass.update_interval_ms),
            ..default_pass
        };
        pass.validate()?;

        Ok(ChannelConfiguration {
            orbit_type,
            altitude_km,
            elevation_deg,
            min_elevation_deg,
            frequency_hz,
            bandwidth_hz,
            sample_rate_hz,
            fading_profile,
            doppler_enabled: self
                .doppler_enabled
                .unwrap_or(orbit_type != OrbitType::Haps),
            fading_enabled: self.fading_enabled.unwrap_or(true),
            loss,
            awgn_snr_db: self.awgn_snr_db,
            fading_seed: self.fading_seed,
            pass,
        })
    }
}

fn positive(name: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(EmulatorError::InvalidConfiguration(format!(
            "{} must be positive, got {}",
            name, value
        )));
    }
    Ok(value)
}

pub(crate) fn validate_rain_rate(rate: f64) -> Result<()> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(EmulatorError::InvalidConfiguration(format!(
            "rain_rate_mm_hr must be non-negative, got {}",
            rate
        )));
    }
    Ok(())
}

/// Multipath profile typical of each scenario
pub fn default_profile(orbit_type: OrbitType) -> FadingProfile {
    match orbit_type {
        OrbitType::Geo => FadingProfile::TdlA,
        OrbitType::Leo | OrbitType::Meo => FadingProfile::TdlD,
        OrbitType::Haps => FadingProfile::Los,
    }
}

/// Fully resolved configuration owned by one channel instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelConfiguration {
    pub orbit_type: OrbitType,
    pub altitude_km: f64,
    /// Last commanded elevation; station-kept platforms hold it during a pass
    pub elevation_deg: f64,
    pub min_elevation_deg: f64,
    pub frequency_hz: f64,
    pub bandwidth_hz: f64,
    pub sample_rate_hz: f64,
    pub fading_profile: TapDelayProfile,
    pub doppler_enabled: bool,
    pub fading_enabled: bool,
    pub loss: LossConfig,
    pub awgn_snr_db: Option<f64>,
    pub fading_seed: Option<u64>,
    /// Shaping applied by `start_dynamic_simulation`
    pub pass: PassProfile,
}

impl ChannelConfiguration {
    pub fn rain_rate_mm_hr(&self) -> f64 {
        self.loss.rain_rate_mm_hr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orbit_defaults() {
        let geo = ChannelOptions::default().resolve(OrbitType::Geo).unwrap();
        assert_eq!(geo.altitude_km, 35_786.0);
        assert_eq!(geo.elevation_deg, 45.0);
        assert_eq!(geo.frequency_hz, 1.5e9);
        assert_eq!(geo.fading_profile.name, "tdl-a");
        assert!(geo.doppler_enabled);

        let haps = ChannelOptions::default().resolve(OrbitType::Haps).unwrap();
        assert_eq!(haps.altitude_km, 30.0);
        assert_eq!(haps.elevation_deg, 60.0);
        assert!(!haps.doppler_enabled);
        assert!(haps.fading_profile.is_identity());

        let leo = ChannelOptions::default().resolve(OrbitType::Leo).unwrap();
        assert_eq!(leo.fading_profile.name, "tdl-d");
        assert!(leo.doppler_enabled);
    }

    #[test]
    fn test_partial_json() {
        let opts: ChannelOptions = serde_json::from_str(
            r#"{"orbit_type": "leo", "altitude_km": 1200, "rain_rate_mm_hr": 12.5}"#,
        )
        .unwrap();
        let cfg = opts.resolve(OrbitType::Leo).unwrap();
        assert_eq!(cfg.altitude_km, 1200.0);
        assert_eq!(cfg.rain_rate_mm_hr(), 12.5);
        assert_eq!(cfg.bandwidth_hz, DEFAULT_BANDWIDTH_HZ);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cases = [
            ChannelOptions::default().altitude_km(0.0),
            ChannelOptions::default().frequency_hz(-1.0),
            ChannelOptions::default().rain_rate_mm_hr(-2.0),
            ChannelOptions::default().elevation_deg(f64::NAN),
            ChannelOptions {
                bandwidth_hz: Some(0.0),
                ..Default::default()
            },
        ];
        for opts in cases {
            let err = opts.resolve(OrbitType::Geo).unwrap_err();
            assert!(err.is_configuration_error(), "{:?}", err);
        }
    }

    #[test]
    fn test_unknown_profile() {
        let err = ChannelOptions::default()
            .fading_profile("rayleigh-x")
            .resolve(OrbitType::Geo)
            .unwrap_err();
        assert_eq!(err, EmulatorError::InvalidProfile("rayleigh-x".to_string()));
    }

    #[test]
    fn test_orbit_type_conflict() {
        let err = ChannelOptions::for_orbit(OrbitType::Leo)
            .resolve(OrbitType::Geo)
            .unwrap_err();
        assert!(matches!(err, EmulatorError::InvalidConfiguration(_)));

        let err = ChannelOptions {
            orbit_type: Some("lunar".into()),
            ..Default::default()
        }
        .resolve(OrbitType::Geo)
        .unwrap_err();
        assert!(err.is_configuration_error());
    }
}
