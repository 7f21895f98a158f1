//! Scenario file format

use anyhow::{bail, ensure, Context, Result};
use ntn_emulator::{ChannelOptions, DeviceClass, DeviceSettings, LinkBudgetRequest};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub channels: Vec<ChannelSpec>,
    #[serde(default)]
    pub device: Option<DeviceSpec>,
    /// Evaluated against every visible channel
    #[serde(default)]
    pub link_budget: Option<LinkBudgetRequest>,
    #[serde(default)]
    pub stimulus: Stimulus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub label: String,
    #[serde(flatten)]
    pub options: ChannelOptions,
    /// Sweep a pass of this length after the static checks
    #[serde(default)]
    pub pass_seconds: Option<f64>,
    #[serde(default = "default_sample_interval")]
    pub sample_interval_s: f64,
}

fn default_sample_interval() -> f64 {
    10.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSpec {
    pub class: DeviceClass,
    #[serde(default)]
    pub settings: DeviceSettings,
    #[serde(default)]
    pub calibrate: bool,
    /// Label of the channel to receive through
    #[serde(default)]
    pub attach: Option<String>,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Stimulus {
    pub tone_hz: f64,
    pub duration_s: f64,
    pub amplitude: f64,
    /// Use a multicarrier block instead of a tone
    pub subcarriers: Option<usize>,
    pub seed: u64,
}

impl Default for Stimulus {
    fn default() -> Self {
        Self {
            tone_hz: 100e3,
            duration_s: 1e-3,
            amplitude: 0.5,
            subcarriers: None,
            seed: 1,
        }
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        let scenario: Scenario = serde_json::from_str(&text)
            .with_context(|| format!("parsing scenario {}", path.display()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.channels.is_empty(), "scenario {} has no channels", self.name);

        let mut labels = HashSet::new();
        for spec in &self.channels {
            if !labels.insert(spec.label.as_str()) {
                bail!("duplicate channel label {}", spec.label);
            }
            ensure!(
                spec.options.orbit_type.is_some(),
                "channel {} needs an orbit_type",
                spec.label
            );
            ensure!(
                spec.sample_interval_s.is_finite() && spec.sample_interval_s > 0.0,
                "channel {}: sample_interval_s must be positive",
                spec.label
            );
            if let Some(seconds) = spec.pass_seconds {
                ensure!(
                    seconds.is_finite() && seconds > 0.0,
                    "channel {}: pass_seconds must be positive",
                    spec.label
                );
            }
        }

        if let Some(label) = self.device.as_ref().and_then(|d| d.attach.as_deref()) {
            ensure!(labels.contains(label), "device attaches to unknown channel {}", label);
        }
        Ok(())
    }

    /// Replace every channel's pass length
    pub fn override_pass_seconds(&mut self, seconds: f64) {
        for spec in &mut self.channels {
            spec.pass_seconds = Some(seconds);
        }
    }
}
