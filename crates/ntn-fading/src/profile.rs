//! Tap-delay profiles

use crate::{FadingError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One multipath component
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Tap {
    pub delay_ns: f64,
    /// Power relative to the strongest path
    pub power_db: f64,
}

impl Tap {
    pub const fn new(delay_ns: f64, power_db: f64) -> Self {
        Self { delay_ns, power_db }
    }

    pub fn linear_power(&self) -> f64 {
        10f64.powf(self.power_db / 10.0)
    }
}

/// Named set of built-in profiles
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FadingProfile {
    #[default]
    Los,
    TdlA,
    TdlB,
    TdlC,
    TdlD,
}

// Linear relative powers
const LOS_TAPS: &[(f64, f64)] = &[(0.0, 1.0)];
const TDL_A_TAPS: &[(f64, f64)] = &[(0.0, 0.8), (50.0, 0.15), (120.0, 0.05)];
const TDL_B_TAPS: &[(f64, f64)] = &[
    (0.0, 0.7),
    (30.0, 0.2),
    (80.0, 0.07),
    (150.0, 0.02),
    (300.0, 0.01),
];
const TDL_C_TAPS: &[(f64, f64)] = &[
    (0.0, 0.6),
    (20.0, 0.25),
    (50.0, 0.1),
    (100.0, 0.03),
    (200.0, 0.015),
    (400.0, 0.004),
    (600.0, 0.001),
];
const TDL_D_TAPS: &[(f64, f64)] = &[(0.0, 0.75), (40.0, 0.18), (100.0, 0.05), (250.0, 0.02)];

impl FadingProfile {
    pub const ALL: [FadingProfile; 5] = [
        Self::Los,
        Self::TdlA,
        Self::TdlB,
        Self::TdlC,
        Self::TdlD,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Los => "los",
            Self::TdlA => "tdl-a",
            Self::TdlB => "tdl-b",
            Self::TdlC => "tdl-c",
            Self::TdlD => "tdl-d",
        }
    }

    fn table(&self) -> &'static [(f64, f64)] {
        match self {
            Self::Los => LOS_TAPS,
            Self::TdlA => TDL_A_TAPS,
            Self::TdlB => TDL_B_TAPS,
            Self::TdlC => TDL_C_TAPS,
            Self::TdlD => TDL_D_TAPS,
        }
    }

    pub fn taps(&self) -> TapDelayProfile {
        TapDelayProfile {
            name: self.as_str().to_string(),
            taps: self
                .table()
                .iter()
                .map(|&(delay_ns, power)| Tap::new(delay_ns, 10.0 * power.log10()))
                .collect(),
            excess_loss_db: 0.0,
        }
    }
}

impl fmt::Display for FadingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FadingProfile {
    type Err = FadingError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase().replace('_', "-");
        match key.as_str() {
            "los" | "awgn" | "none" => Ok(Self::Los),
            "tdl-a" => Ok(Self::TdlA),
            "tdl-b" => Ok(Self::TdlB),
            "tdl-c" => Ok(Self::TdlC),
            "tdl-d" | "tdl-e" => Ok(Self::TdlD),
            _ => Err(FadingError::InvalidProfile(s.to_string())),
        }
    }
}

/// Concrete tap table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TapDelayProfile {
    pub name: String,
    pub taps: Vec<Tap>,
    /// Loss applied on top of the unity-gain normalisation
    #[serde(default)]
    pub excess_loss_db: f64,
}

impl TapDelayProfile {
    pub fn custom(name: impl Into<String>, taps: Vec<Tap>) -> Result<Self> {
        let profile = Self {
            name: name.into(),
            taps,
            excess_loss_db: 0.0,
        };
        profile.validate()?;
        Ok(profile)
    }

    pub fn with_excess_loss_db(mut self, loss_db: f64) -> Self {
        self.excess_loss_db = loss_db;
        self
    }

    pub fn lookup(name: &str) -> Result<Self> {
        Ok(name.parse::<FadingProfile>()?.taps())
    }

    pub fn validate(&self) -> Result<()> {
        if self.taps.is_empty() {
            return Err(FadingError::EmptyProfile(self.name.clone()));
        }
        for tap in &self.taps {
            if !tap.delay_ns.is_finite() || tap.delay_ns < 0.0 {
                return Err(FadingError::InvalidTap {
                    profile: self.name.clone(),
                    reason: format!("delay {} ns", tap.delay_ns),
                });
            }
            if !tap.power_db.is_finite() {
                return Err(FadingError::InvalidTap {
                    profile: self.name.clone(),
                    reason: format!("power {} dB", tap.power_db),
                });
            }
        }
        if !self.excess_loss_db.is_finite() || self.excess_loss_db < 0.0 {
            return Err(FadingError::InvalidTap {
                profile: self.name.clone(),
                reason: format!("excess loss {} dB", self.excess_loss_db),
            });
        }
        Ok(())
    }

    pub fn tap_count(&self) -> usize {
        self.taps.len()
    }

    /// Largest tap delay
    pub fn delay_spread_ns(&self) -> f64 {
        self.taps.iter().map(|t| t.delay_ns).fold(0.0, f64::max)
    }

    /// Amplitude weights, tap powers normalised to unity and scaled by the excess loss
    pub fn amplitudes(&self) -> Vec<f64> {
        let total: f64 = self.taps.iter().map(Tap::linear_power).sum();
        let excess = 10f64.powf(-self.excess_loss_db / 20.0);
        self.taps
            .iter()
            .map(|t| (t.linear_power() / total).sqrt() * excess)
            .collect()
    }

    /// Pass-through profile
    pub fn is_identity(&self) -> bool {
        self.taps.len() == 1 && self.taps[0].delay_ns == 0.0 && self.excess_loss_db == 0.0
    }
}

impl From<FadingProfile> for TapDelayProfile {
    fn from(profile: FadingProfile) -> Self {
        profile.taps()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tap_counts() {
        let counts: Vec<usize> = FadingProfile::ALL.iter().map(|p| p.taps().tap_count()).collect();
        assert_eq!(counts, vec![1, 3, 5, 7, 4]);
    }

    #[test]
    fn test_amplitudes_unity_power() {
        for profile in FadingProfile::ALL {
            let power: f64 = profile.taps().amplitudes().iter().map(|a| a * a).sum();
            assert_relative_eq!(power, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_excess_loss() {
        let profile = FadingProfile::TdlB.taps().with_excess_loss_db(6.0);
        let power: f64 = profile.amplitudes().iter().map(|a| a * a).sum();
        assert_relative_eq!(10.0 * power.log10(), -6.0, epsilon = 1e-9);
        assert!(!profile.is_identity());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("TDL-A".parse::<FadingProfile>().unwrap(), FadingProfile::TdlA);
        assert_eq!("tdl_c".parse::<FadingProfile>().unwrap(), FadingProfile::TdlC);
        assert_eq!("tdl-e".parse::<FadingProfile>().unwrap(), FadingProfile::TdlD);
        assert_eq!("awgn".parse::<FadingProfile>().unwrap(), FadingProfile::Los);
        assert_eq!(
            "rayleigh".parse::<FadingProfile>(),
            Err(FadingError::InvalidProfile("rayleigh".to_string()))
        );
    }

    #[test]
    fn test_custom_validation() {
        assert!(matches!(
            TapDelayProfile::custom("empty", vec![]),
            Err(FadingError::EmptyProfile(_))
        ));
        assert!(matches!(
            TapDelayProfile::custom("neg", vec![Tap::new(-1.0, 0.0)]),
            Err(FadingError::InvalidTap { .. })
        ));
        let ok = TapDelayProfile::custom("two-ray", vec![Tap::new(0.0, 0.0), Tap::new(500.0, -6.0)])
            .unwrap();
        assert_relative_eq!(ok.delay_spread_ns(), 500.0);
    }

    #[test]
    fn test_profile_serde() {
        let json = serde_json::to_string(&FadingProfile::TdlC).unwrap();
        assert_eq!(json, "\"tdl-c\"");
    }
}
