//! Scenario execution
//!
//! Channels are created first, checked statically, then optionally swept
//! through a pass. Stepped mode evaluates the pass at each sample instant
//! without waiting; realtime mode lets the emulator's own pass task run and
//! samples it on the wall clock.

use crate::scenario::{ChannelSpec, DeviceSpec, Scenario, Stimulus};
use anyhow::{Context, Result};
use ntn_emulator::{
    CalibrationReport, ChannelId, ChannelSnapshot, DeviceInfo, EmulatorContext, EmulatorError,
    LinkBudget, PassProfile,
};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rf_frontend::{signal, DeviceProfile};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    Stepped,
    Realtime,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassSample {
    pub elapsed_s: f64,
    pub elevation_deg: f64,
    pub visible: bool,
    pub delay_ms: Option<f64>,
    pub doppler_hz: Option<f64>,
    pub path_loss_db: Option<f64>,
}

impl From<&ChannelSnapshot> for PassSample {
    fn from(s: &ChannelSnapshot) -> Self {
        Self {
            elapsed_s: s.elapsed_s.unwrap_or(0.0),
            elevation_deg: s.elevation_deg,
            visible: s.visible,
            delay_ms: s.delay_ms(),
            doppler_hz: s.doppler_hz,
            path_loss_db: s.path_loss_db,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub label: String,
    pub initial: ChannelSnapshot,
    pub link_budget: Option<LinkBudget>,
    pub output_power_dbfs: Option<f64>,
    pub pass: Vec<PassSample>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceReport {
    pub info: DeviceInfo,
    pub calibration: Vec<CalibrationReport>,
    pub rx_power_dbfs: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub channels: Vec<ChannelReport>,
    pub device: Option<DeviceReport>,
}

pub fn stimulus(spec: &Stimulus, sample_rate_hz: f64) -> Result<Vec<Complex64>> {
    let samples = match spec.subcarriers {
        Some(n) => {
            let len = (spec.duration_s * sample_rate_hz).round() as usize;
            let mut rng = StdRng::seed_from_u64(spec.seed);
            signal::multicarrier_block(n, len, &mut rng)?
        }
        None => signal::test_tone(spec.tone_hz, spec.duration_s, spec.amplitude, sample_rate_hz)?,
    };
    Ok(samples)
}

pub async fn run(
    ctx: &EmulatorContext,
    scenario: &Scenario,
    mode: PassMode,
) -> Result<ScenarioReport> {
    info!(scenario = %scenario.name, channels = scenario.channels.len(), "running scenario");

    let mut ids = HashMap::new();
    let mut channels = Vec::with_capacity(scenario.channels.len());
    for spec in &scenario.channels {
        let id = ctx
            .create_channel_from_options(&spec.options)
            .with_context(|| format!("creating channel {}", spec.label))?;
        ids.insert(spec.label.clone(), id);
        channels.push(run_channel(ctx, scenario, spec, id, mode).await?);
    }

    let device = match &scenario.device {
        Some(spec) => Some(run_device(ctx, scenario, spec, &ids)?),
        None => None,
    };

    Ok(ScenarioReport {
        name: scenario.name.clone(),
        channels,
        device,
    })
}

async fn run_channel(
    ctx: &EmulatorContext,
    scenario: &Scenario,
    spec: &ChannelSpec,
    id: ChannelId,
    mode: PassMode,
) -> Result<ChannelReport> {
    let initial = ctx.get_channel_state(id)?;

    let link_budget = match &scenario.link_budget {
        Some(request) => match ctx.get_link_budget(id, request) {
            Ok(budget) => Some(budget),
            Err(EmulatorError::NotVisible { .. }) => {
                warn!(channel = %spec.label, "not visible, skipping link budget");
                None
            }
            Err(err) => return Err(err.into()),
        },
        None => None,
    };

    let config = ctx.channel(id)?.configuration();
    let input = stimulus(&scenario.stimulus, config.sample_rate_hz)?;
    let output_power_dbfs = match ctx.apply_channel(id, &input) {
        Ok(out) => Some(signal::power_dbfs(&out.samples)),
        Err(EmulatorError::NotVisible { .. }) => None,
        Err(err) => return Err(err.into()),
    };

    let pass = match spec.pass_seconds {
        Some(duration_s) => {
            let profile = PassProfile {
                duration_s,
                ..config.pass
            };
            sweep(ctx, id, profile, spec.sample_interval_s, mode).await?
        }
        None => Vec::new(),
    };

    info!(
        channel = %spec.label,
        orbit_type = %initial.orbit_type,
        delay_ms = ?initial.delay_ms(),
        path_loss_db = ?initial.path_loss_db,
        margin_db = ?link_budget.map(|b| b.margin_db),
        pass_samples = pass.len(),
        "channel done"
    );

    Ok(ChannelReport {
        label: spec.label.clone(),
        initial,
        link_budget,
        output_power_dbfs,
        pass,
    })
}

async fn sweep(
    ctx: &EmulatorContext,
    id: ChannelId,
    pass: PassProfile,
    interval_s: f64,
    mode: PassMode,
) -> Result<Vec<PassSample>> {
    let steps = (pass.duration_s / interval_s).ceil() as usize;
    let mut samples = Vec::with_capacity(steps + 1);

    match mode {
        PassMode::Stepped => {
            let channel = ctx.channel(id)?;
            for k in 0..=steps {
                let t = (k as f64 * interval_s).min(pass.duration_s);
                samples.push(PassSample::from(&channel.advance(&pass, t)?));
            }
        }
        PassMode::Realtime => {
            ctx.start_pass(id, pass)?;
            let interval = Duration::from_secs_f64(interval_s);
            for _ in 0..steps {
                samples.push(PassSample::from(&ctx.get_channel_state(id)?));
                tokio::time::sleep(interval).await;
            }
            // Let the final step land
            tokio::time::sleep(pass.update_interval()).await;
            samples.push(PassSample::from(&ctx.get_channel_state(id)?));
            ctx.stop_dynamic_simulation(id)?;
        }
    }
    Ok(samples)
}

fn run_device(
    ctx: &EmulatorContext,
    scenario: &Scenario,
    spec: &DeviceSpec,
    ids: &HashMap<String, ChannelId>,
) -> Result<DeviceReport> {
    let id = ctx.create_device_with_profile(DeviceProfile::new(spec.class), spec.seed);
    let info = ctx.configure(id, &spec.settings)?;

    let mut calibration = Vec::new();
    if spec.calibrate {
        for result in [ctx.calibrate_dc_offset(id), ctx.calibrate_iq_imbalance(id)] {
            match result {
                Ok(report) => calibration.push(report),
                Err(err @ EmulatorError::InsufficientSignal { .. }) => {
                    warn!(device_id = %id, error = %err, "calibration skipped")
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    let rx_power_dbfs = match spec.attach.as_ref().and_then(|label| ids.get(label)) {
        Some(&channel_id) => {
            ctx.attach_channel(id, channel_id)?;
            let input = stimulus(&scenario.stimulus, info.sample_rate_hz)?;
            ctx.transmit(id, &input)?;
            match ctx.receive(id, input.len()) {
                Ok(rx) => Some(signal::power_dbfs(&rx.samples)),
                Err(EmulatorError::NotVisible { .. }) => None,
                Err(err) => return Err(err.into()),
            }
        }
        None => None,
    };

    Ok(DeviceReport {
        info: ctx.device_info(id)?,
        calibration,
        rx_power_dbfs,
    })
}
