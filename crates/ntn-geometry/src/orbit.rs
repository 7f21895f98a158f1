//! Orbit Variants
//!
//! GEO is fixed relative to the ground and has no Doppler. LEO and MEO share
//! the moving-platform model. HAPS holds station with a small bounded drift.

use crate::pass::PassTrack;
use crate::{
    central_angle_rad, orbital_rate_rad_s, propagation_delay_s, slant_range_km,
    validate_altitude, validate_elevation, validate_frequency, GeometryError, GeometryInput,
    OrbitModel, OrbitType, Result, SatelliteState, DEFAULT_MIN_ELEVATION_DEG, EARTH_RADIUS_KM,
    SPEED_OF_LIGHT_KM_S,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

fn snapshot(
    orbit_type: OrbitType,
    altitude_km: f64,
    elevation_deg: f64,
    doppler: (f64, f64),
    elapsed_s: Option<f64>,
) -> SatelliteState {
    let range = slant_range_km(elevation_deg, altitude_km);
    SatelliteState {
        orbit_type,
        altitude_km,
        elevation_deg,
        slant_range_km: range,
        delay_s: propagation_delay_s(range),
        doppler_hz: doppler.0,
        doppler_rate_hz_s: doppler.1,
        elapsed_s,
        timestamp: Utc::now(),
    }
}

// ============================================================================
// GEO
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoOrbit {
    pub altitude_km: f64,
    pub min_elevation_deg: f64,
}

impl OrbitModel for GeoOrbit {
    fn orbit_type(&self) -> OrbitType {
        OrbitType::Geo
    }

    fn altitude_km(&self) -> f64 {
        self.altitude_km
    }

    fn min_elevation_deg(&self) -> f64 {
        self.min_elevation_deg
    }

    fn geometry_at(&self, input: GeometryInput, carrier_hz: f64) -> Result<SatelliteState> {
        validate_frequency(carrier_hz)?;
        let (elevation, elapsed) = match input {
            GeometryInput::Elevation(el) => (el, None),
            GeometryInput::Time {
                elapsed_s,
                pointing_deg,
                ..
            } => (pointing_deg, Some(elapsed_s)),
        };
        let elevation = self.check_visible(elevation)?;
        Ok(snapshot(
            OrbitType::Geo,
            self.altitude_km,
            elevation,
            (0.0, 0.0),
            elapsed,
        ))
    }
}

// ============================================================================
// LEO / MEO
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MovingOrbit {
    pub orbit_type: OrbitType,
    pub altitude_km: f64,
    pub min_elevation_deg: f64,
}

impl MovingOrbit {
    /// Doppler and Doppler rate for along-track angle `beta_rad` on a pass
    /// with cross-track offset `theta_min_rad`. `beta_rate` is dβ/dt.
    pub fn doppler(
        &self,
        theta_min_rad: f64,
        beta_rad: f64,
        carrier_hz: f64,
        beta_rate: f64,
    ) -> (f64, f64) {
        let orbit_r = EARTH_RADIUS_KM + self.altitude_km;
        let omega = orbital_rate_rad_s(self.altitude_km);
        let scale = carrier_hz / SPEED_OF_LIGHT_KM_S * EARTH_RADIUS_KM * orbit_r;
        let cos_tm = theta_min_rad.cos();

        let cos_theta = (cos_tm * beta_rad.cos()).clamp(-1.0, 1.0);
        let range = (EARTH_RADIUS_KM * EARTH_RADIUS_KM + orbit_r * orbit_r
            - 2.0 * EARTH_RADIUS_KM * orbit_r * cos_theta)
            .sqrt();
        if range <= f64::EPSILON {
            return (0.0, 0.0);
        }

        let doppler = scale * cos_tm * (-beta_rad).sin() * omega / range;

        let range_prime = EARTH_RADIUS_KM * orbit_r * cos_tm * beta_rad.sin() / range;
        let d_dbeta = scale
            * cos_tm
            * omega
            * (-beta_rad.cos() / range - (-beta_rad).sin() * range_prime / (range * range));

        (doppler, d_dbeta * beta_rate)
    }
}

impl OrbitModel for MovingOrbit {
    fn orbit_type(&self) -> OrbitType {
        self.orbit_type
    }

    fn altitude_km(&self) -> f64 {
        self.altitude_km
    }

    fn min_elevation_deg(&self) -> f64 {
        self.min_elevation_deg
    }

    fn geometry_at(&self, input: GeometryInput, carrier_hz: f64) -> Result<SatelliteState> {
        validate_frequency(carrier_hz)?;
        match input {
            GeometryInput::Elevation(el) => {
                let elevation = self.check_visible(el)?;
                // Overhead pass, approaching branch
                let theta = central_angle_rad(elevation, self.altitude_km);
                let doppler = self.doppler(
                    0.0,
                    -theta,
                    carrier_hz,
                    orbital_rate_rad_s(self.altitude_km),
                );
                Ok(snapshot(
                    self.orbit_type,
                    self.altitude_km,
                    elevation,
                    doppler,
                    None,
                ))
            }
            GeometryInput::Time {
                elapsed_s, pass, ..
            } => {
                let track = PassTrack::new(&pass, self.altitude_km, self.min_elevation_deg)?;
                let beta = track.beta_at(elapsed_s);
                let elevation = self.check_visible(track.elevation_at(elapsed_s))?;
                let doppler = self.doppler(
                    track.theta_min_rad,
                    beta,
                    carrier_hz,
                    track.sweep_rate_rad_s(),
                );
                Ok(snapshot(
                    self.orbit_type,
                    self.altitude_km,
                    elevation,
                    doppler,
                    Some(elapsed_s),
                ))
            }
        }
    }
}

// ============================================================================
// HAPS
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HapsOrbit {
    pub altitude_km: f64,
    pub min_elevation_deg: f64,
    /// Peak radial station-keeping velocity
    pub drift_velocity_m_s: f64,
    pub drift_period_s: f64,
}

impl HapsOrbit {
    pub const DEFAULT_DRIFT_VELOCITY_M_S: f64 = 0.75;
    pub const DEFAULT_DRIFT_PERIOD_S: f64 = 600.0;

    fn drift_doppler(&self, elapsed_s: f64, carrier_hz: f64) -> (f64, f64) {
        let peak = carrier_hz * (self.drift_velocity_m_s / 1000.0) / SPEED_OF_LIGHT_KM_S;
        let w = 2.0 * PI / self.drift_period_s;
        (peak * (w * elapsed_s).sin(), peak * w * (w * elapsed_s).cos())
    }
}

impl OrbitModel for HapsOrbit {
    fn orbit_type(&self) -> OrbitType {
        OrbitType::Haps
    }

    fn altitude_km(&self) -> f64 {
        self.altitude_km
    }

    fn min_elevation_deg(&self) -> f64 {
        self.min_elevation_deg
    }

    fn geometry_at(&self, input: GeometryInput, carrier_hz: f64) -> Result<SatelliteState> {
        validate_frequency(carrier_hz)?;
        match input {
            GeometryInput::Elevation(el) => {
                let elevation = self.check_visible(el)?;
                Ok(snapshot(
                    OrbitType::Haps,
                    self.altitude_km,
                    elevation,
                    (0.0, 0.0),
                    None,
                ))
            }
            GeometryInput::Time {
                elapsed_s,
                pointing_deg,
                ..
            } => {
                let elevation = self.check_visible(pointing_deg)?;
                Ok(snapshot(
                    OrbitType::Haps,
                    self.altitude_km,
                    elevation,
                    self.drift_doppler(elapsed_s, carrier_hz),
                    Some(elapsed_s),
                ))
            }
        }
    }
}

// ============================================================================
// Tagged variant
// ============================================================================

/// Closed set of orbit models
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Orbit {
    Geo(GeoOrbit),
    Moving(MovingOrbit),
    Haps(HapsOrbit),
}

impl Orbit {
    pub fn new(orbit_type: OrbitType, altitude_km: f64, min_elevation_deg: f64) -> Result<Self> {
        validate_altitude(altitude_km)?;
        validate_elevation(min_elevation_deg)?;
        if min_elevation_deg >= 90.0 {
            return Err(GeometryError::InvalidElevation(min_elevation_deg));
        }

        Ok(match orbit_type {
            OrbitType::Geo => Self::Geo(GeoOrbit {
                altitude_km,
                min_elevation_deg,
            }),
            OrbitType::Leo | OrbitType::Meo => Self::Moving(MovingOrbit {
                orbit_type,
                altitude_km,
                min_elevation_deg,
            }),
            OrbitType::Haps => Self::Haps(HapsOrbit {
                altitude_km,
                min_elevation_deg,
                drift_velocity_m_s: HapsOrbit::DEFAULT_DRIFT_VELOCITY_M_S,
                drift_period_s: HapsOrbit::DEFAULT_DRIFT_PERIOD_S,
            }),
        })
    }

    /// Orbit with the type's default altitude and visibility threshold
    pub fn default_for(orbit_type: OrbitType) -> Self {
        let altitude_km = orbit_type.default_altitude_km();
        match orbit_type {
            OrbitType::Geo => Self::Geo(GeoOrbit {
                altitude_km,
                min_elevation_deg: DEFAULT_MIN_ELEVATION_DEG,
            }),
            OrbitType::Leo | OrbitType::Meo => Self::Moving(MovingOrbit {
                orbit_type,
                altitude_km,
                min_elevation_deg: DEFAULT_MIN_ELEVATION_DEG,
            }),
            OrbitType::Haps => Self::Haps(HapsOrbit {
                altitude_km,
                min_elevation_deg: DEFAULT_MIN_ELEVATION_DEG,
                drift_velocity_m_s: HapsOrbit::DEFAULT_DRIFT_VELOCITY_M_S,
                drift_period_s: HapsOrbit::DEFAULT_DRIFT_PERIOD_S,
            }),
        }
    }

    fn model(&self) -> &dyn OrbitModel {
        match self {
            Self::Geo(o) => o,
            Self::Moving(o) => o,
            Self::Haps(o) => o,
        }
    }
}

impl OrbitModel for Orbit {
    fn orbit_type(&self) -> OrbitType {
        self.model().orbit_type()
    }

    fn altitude_km(&self) -> f64 {
        self.model().altitude_km()
    }

    fn min_elevation_deg(&self) -> f64 {
        self.model().min_elevation_deg()
    }

    fn geometry_at(&self, input: GeometryInput, carrier_hz: f64) -> Result<SatelliteState> {
        self.model().geometry_at(input, carrier_hz)
    }
}
