//! NTN Link Geometry
//!
//! Slant range, one-way delay and Doppler for a ground terminal looking at a
//! GEO, MEO, LEO or HAPS platform. Each orbit type supplies its own
//! [`OrbitModel`] implementation; moving platforms additionally support a
//! time-stepped pass so a controller can simulate rise, culmination and set
//! without full orbital propagation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod orbit;
pub mod pass;
pub mod timing;

pub use orbit::{GeoOrbit, HapsOrbit, MovingOrbit, Orbit};
pub use pass::{PassProfile, PassTrack};

/// Mean Earth radius (km)
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Speed of light (km/s)
pub const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;

/// Earth gravitational parameter (km^3/s^2)
pub const EARTH_MU_KM3_S2: f64 = 398_600.4418;

/// Default visibility threshold (degrees above horizon)
pub const DEFAULT_MIN_ELEVATION_DEG: f64 = 10.0;

/// Tolerance applied when a pass endpoint lands exactly on the threshold
const ELEVATION_EPSILON_DEG: f64 = 1e-6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Platform not visible: elevation {elevation_deg:.2}° below minimum {min_elevation_deg:.2}°")]
    NotVisible {
        elevation_deg: f64,
        min_elevation_deg: f64,
    },
    #[error("Invalid elevation: {0}")]
    InvalidElevation(f64),
    #[error("Invalid altitude: {0} km")]
    InvalidAltitude(f64),
    #[error("Invalid carrier frequency: {0} Hz")]
    InvalidFrequency(f64),
    #[error("Invalid pass profile: {0}")]
    InvalidPass(String),
    #[error("Unknown orbit type: {0}")]
    UnknownOrbitType(String),
}

pub type Result<T> = std::result::Result<T, GeometryError>;

/// Link scenario class
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrbitType {
    Geo,
    Meo,
    Leo,
    Haps,
}

impl OrbitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Geo => "GEO",
            Self::Meo => "MEO",
            Self::Leo => "LEO",
            Self::Haps => "HAPS",
        }
    }

    pub fn default_altitude_km(&self) -> f64 {
        match self {
            Self::Geo => 35_786.0,
            Self::Meo => 10_500.0,
            Self::Leo => 600.0,
            Self::Haps => 30.0,
        }
    }

    pub fn default_elevation_deg(&self) -> f64 {
        match self {
            Self::Geo => 45.0,
            Self::Meo => 40.0,
            Self::Leo => 30.0,
            Self::Haps => 60.0,
        }
    }

    pub fn default_frequency_hz(&self) -> f64 {
        match self {
            Self::Geo => 1.5e9,
            Self::Meo | Self::Leo | Self::Haps => 2.0e9,
        }
    }

    /// Platforms that hold a fixed pointing relative to the ground
    pub fn is_station_kept(&self) -> bool {
        matches!(self, Self::Geo | Self::Haps)
    }
}

impl fmt::Display for OrbitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrbitType {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GEO" => Ok(Self::Geo),
            "MEO" => Ok(Self::Meo),
            "LEO" => Ok(Self::Leo),
            "HAPS" => Ok(Self::Haps),
            other => Err(GeometryError::UnknownOrbitType(other.to_string())),
        }
    }
}

/// What the geometry is evaluated at
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeometryInput {
    /// Fixed elevation angle in degrees
    Elevation(f64),
    /// Time into a pass. Station-kept platforms hold `pointing_deg`.
    Time {
        elapsed_s: f64,
        pass: PassProfile,
        pointing_deg: f64,
    },
}

/// Derived link geometry snapshot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SatelliteState {
    pub orbit_type: OrbitType,
    pub altitude_km: f64,
    pub elevation_deg: f64,
    pub slant_range_km: f64,
    pub delay_s: f64,
    /// Positive while the platform approaches the terminal
    pub doppler_hz: f64,
    pub doppler_rate_hz_s: f64,
    /// Seconds into the pass, when evaluated from a time input
    pub elapsed_s: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl SatelliteState {
    pub fn delay_ms(&self) -> f64 {
        self.delay_s * 1e3
    }

    pub fn round_trip_s(&self) -> f64 {
        timing::round_trip_s(self.delay_s)
    }
}

/// Shared capability of every orbit variant
pub trait OrbitModel {
    fn orbit_type(&self) -> OrbitType;

    fn altitude_km(&self) -> f64;

    fn min_elevation_deg(&self) -> f64;

    /// Evaluate the link geometry for a carrier frequency
    fn geometry_at(&self, input: GeometryInput, carrier_hz: f64) -> Result<SatelliteState>;

    /// Visibility check shared by all variants
    fn check_visible(&self, elevation_deg: f64) -> Result<f64> {
        validate_elevation(elevation_deg)?;
        let min = self.min_elevation_deg();
        if elevation_deg < min - ELEVATION_EPSILON_DEG {
            return Err(GeometryError::NotVisible {
                elevation_deg,
                min_elevation_deg: min,
            });
        }
        Ok(elevation_deg.clamp(min, 90.0))
    }
}

pub fn validate_elevation(elevation_deg: f64) -> Result<()> {
    if !elevation_deg.is_finite() || elevation_deg.abs() > 90.0 {
        return Err(GeometryError::InvalidElevation(elevation_deg));
    }
    Ok(())
}

pub fn validate_altitude(altitude_km: f64) -> Result<()> {
    if !altitude_km.is_finite() || altitude_km <= 0.0 {
        return Err(GeometryError::InvalidAltitude(altitude_km));
    }
    Ok(())
}

pub fn validate_frequency(carrier_hz: f64) -> Result<()> {
    if !carrier_hz.is_finite() || carrier_hz <= 0.0 {
        return Err(GeometryError::InvalidFrequency(carrier_hz));
    }
    Ok(())
}

/// Slant range from terminal to platform (law of cosines)
pub fn slant_range_km(elevation_deg: f64, altitude_km: f64) -> f64 {
    let el = elevation_deg.to_radians();
    let orbit_r = EARTH_RADIUS_KM + altitude_km;
    let ground = EARTH_RADIUS_KM * el.cos();

    (orbit_r * orbit_r - ground * ground).sqrt() - EARTH_RADIUS_KM * el.sin()
}

/// One-way propagation delay in seconds
pub fn propagation_delay_s(slant_range_km: f64) -> f64 {
    slant_range_km / SPEED_OF_LIGHT_KM_S
}

/// Earth central angle between terminal and sub-platform point (radians)
pub fn central_angle_rad(elevation_deg: f64, altitude_km: f64) -> f64 {
    let el = elevation_deg.to_radians();
    let ratio = EARTH_RADIUS_KM * el.cos() / (EARTH_RADIUS_KM + altitude_km);
    ratio.clamp(-1.0, 1.0).acos() - el
}

/// Elevation seen from the ground for a given central angle (degrees)
pub fn elevation_from_central_angle(theta_rad: f64, altitude_km: f64) -> f64 {
    let ratio = EARTH_RADIUS_KM / (EARTH_RADIUS_KM + altitude_km);
    (theta_rad.cos() - ratio).atan2(theta_rad.sin()).to_degrees()
}

/// Circular orbit angular rate (rad/s)
pub fn orbital_rate_rad_s(altitude_km: f64) -> f64 {
    let r = EARTH_RADIUS_KM + altitude_km;
    (EARTH_MU_KM3_S2 / (r * r * r)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_slant_range_zenith_equals_altitude() {
        assert_relative_eq!(slant_range_km(90.0, 600.0), 600.0, epsilon = 1e-6);
        assert_relative_eq!(slant_range_km(90.0, 35_786.0), 35_786.0, epsilon = 1e-6);
    }

    #[test]
    fn test_geo_45_delay() {
        let range = slant_range_km(45.0, 35_786.0);
        let delay_ms = propagation_delay_s(range) * 1e3;
        assert!((range - 37_410.0).abs() < 20.0, "range {}", range);
        assert!((delay_ms - 125.0).abs() < 1.0, "delay {} ms", delay_ms);
    }

    #[test]
    fn test_haps_60_delay() {
        let range = slant_range_km(60.0, 30.0);
        let delay_us = propagation_delay_s(range) * 1e6;
        assert!((range - 34.64).abs() < 0.1, "range {}", range);
        assert!(delay_us > 100.0 && delay_us < 170.0, "delay {} us", delay_us);
    }

    #[test]
    fn test_central_angle_roundtrip() {
        for el in [10.0, 25.0, 45.0, 70.0, 89.0] {
            let theta = central_angle_rad(el, 600.0);
            assert_relative_eq!(elevation_from_central_angle(theta, 600.0), el, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_orbit_type_parse() {
        assert_eq!("geo".parse::<OrbitType>().unwrap(), OrbitType::Geo);
        assert_eq!(" Haps ".parse::<OrbitType>().unwrap(), OrbitType::Haps);
        assert!(matches!(
            "uav".parse::<OrbitType>(),
            Err(GeometryError::UnknownOrbitType(_))
        ));
    }

    #[test]
    fn test_orbit_type_serde() {
        let json = serde_json::to_string(&OrbitType::Leo).unwrap();
        assert_eq!(json, "\"LEO\"");
    }

    #[test]
    fn test_elevation_validation() {
        assert!(validate_elevation(f64::NAN).is_err());
        assert!(validate_elevation(91.0).is_err());
        assert!(validate_elevation(-5.0).is_ok());
    }
}
