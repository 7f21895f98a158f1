//! Pass Profile
//!
//! Time-scaled overhead pass for moving platforms. The along-track angle
//! sweeps linearly from `-beta_max` to `+beta_max` over the pass duration;
//! the cross-track offset is fixed by the peak elevation.

use crate::{
    central_angle_rad, elevation_from_central_angle, validate_altitude, GeometryError, Result,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configurable pass shaping
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PassProfile {
    pub duration_s: f64,
    /// Elevation at culmination
    pub peak_elevation_deg: f64,
    /// Step cadence for dynamic simulation
    pub update_interval_ms: u64,
}

impl Default for PassProfile {
    fn default() -> Self {
        Self {
            duration_s: 600.0,
            peak_elevation_deg: 90.0,
            update_interval_ms: 100,
        }
    }
}

impl PassProfile {
    pub fn with_duration(duration_s: f64) -> Self {
        Self {
            duration_s,
            ..Default::default()
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_s.max(0.0))
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.duration_s.is_finite() || self.duration_s <= 0.0 {
            return Err(GeometryError::InvalidPass(format!(
                "duration must be positive, got {} s",
                self.duration_s
            )));
        }
        if !self.peak_elevation_deg.is_finite()
            || self.peak_elevation_deg <= 0.0
            || self.peak_elevation_deg > 90.0
        {
            return Err(GeometryError::InvalidPass(format!(
                "peak elevation must be in (0, 90], got {}",
                self.peak_elevation_deg
            )));
        }
        if self.update_interval_ms == 0 {
            return Err(GeometryError::InvalidPass(
                "update interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_complete(&self, elapsed_s: f64) -> bool {
        elapsed_s >= self.duration_s
    }
}

/// Pass resolved against a concrete altitude and visibility threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassTrack {
    pub altitude_km: f64,
    pub duration_s: f64,
    /// Cross-track central angle at culmination (radians)
    pub theta_min_rad: f64,
    /// Along-track half-angle of the visible arc (radians)
    pub beta_max_rad: f64,
}

impl PassTrack {
    pub fn new(pass: &PassProfile, altitude_km: f64, min_elevation_deg: f64) -> Result<Self> {
        pass.validate()?;
        validate_altitude(altitude_km)?;
        if pass.peak_elevation_deg < min_elevation_deg {
            return Err(GeometryError::InvalidPass(format!(
                "peak elevation {}° below visibility threshold {}°",
                pass.peak_elevation_deg, min_elevation_deg
            )));
        }

        let theta_min = central_angle_rad(pass.peak_elevation_deg, altitude_km);
        let theta_edge = central_angle_rad(min_elevation_deg, altitude_km);
        let beta_max = (theta_edge.cos() / theta_min.cos()).clamp(-1.0, 1.0).acos();

        Ok(Self {
            altitude_km,
            duration_s: pass.duration_s,
            theta_min_rad: theta_min,
            beta_max_rad: beta_max,
        })
    }

    /// Along-track angle; negative before culmination
    pub fn beta_at(&self, elapsed_s: f64) -> f64 {
        let fraction = (elapsed_s / self.duration_s).clamp(0.0, 1.0);
        self.beta_max_rad * (2.0 * fraction - 1.0)
    }

    /// Along-track sweep rate of the time-scaled pass (rad/s)
    pub fn sweep_rate_rad_s(&self) -> f64 {
        2.0 * self.beta_max_rad / self.duration_s
    }

    pub fn central_angle_at(&self, beta_rad: f64) -> f64 {
        (self.theta_min_rad.cos() * beta_rad.cos())
            .clamp(-1.0, 1.0)
            .acos()
    }

    pub fn elevation_at(&self, elapsed_s: f64) -> f64 {
        let theta = self.central_angle_at(self.beta_at(elapsed_s));
        elevation_from_central_angle(theta, self.altitude_km)
    }
}
