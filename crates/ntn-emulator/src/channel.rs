//! Link State Controller
//!
//! One [`ChannelInstance`] owns the configuration, current geometry and link
//! mode of an emulated channel behind a single lock. Every geometry, loss and
//! fading computation for the instance runs while holding that lock.
//!
//! ## Modes
//!
//! | Mode | Geometry changes when |
//! |------|-----------------------|
//! | Static | a setter is called |
//! | Dynamic | the pass task steps, on a fixed cadence |
//!
//! Each pass carries a generation number. A step only lands if the instance
//! is still Dynamic with the same generation, so nothing is applied after a
//! stop or a restart.

use crate::config::{validate_rain_rate, ChannelConfiguration};
use crate::error::{EmulatorError, Result};
use crate::ids::ChannelId;
use chrono::{DateTime, Utc};
use ntn_fading::FadingEngine;
use ntn_geometry::timing::TimingAdvance;
use ntn_geometry::{
    validate_elevation, GeometryError, GeometryInput, Orbit, OrbitModel, OrbitType, PassProfile,
    SatelliteState,
};
use ntn_propagation::{LinkBudget, LinkBudgetRequest, LossBreakdown, LossModel};
use num_complex::Complex64;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rf_frontend::signal;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// How the geometry of a channel is currently driven
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LinkMode {
    Static,
    Dynamic { generation: u64, pass: PassProfile },
}

impl LinkMode {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic { .. })
    }
}

/// Result of asking for a dynamic simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicStart {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    Continue,
    Finished,
    Cancelled,
}

/// Samples after the channel, plus what a fixed-length buffer cannot carry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelOutput {
    pub samples: Vec<Complex64>,
    /// One-way propagation delay, reported rather than inserted
    pub delay_s: f64,
    /// Shift actually applied (zero when Doppler is disabled)
    pub doppler_hz: f64,
    pub path_loss_db: f64,
}

/// Externally visible channel state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub id: ChannelId,
    pub orbit_type: OrbitType,
    pub visible: bool,
    pub elevation_deg: f64,
    pub min_elevation_deg: f64,
    pub slant_range_km: Option<f64>,
    pub delay_s: Option<f64>,
    pub doppler_hz: Option<f64>,
    pub doppler_rate_hz_s: Option<f64>,
    pub path_loss_db: Option<f64>,
    pub loss: Option<LossBreakdown>,
    pub timing: Option<TimingAdvance>,
    pub frequency_hz: f64,
    pub rain_rate_mm_hr: f64,
    pub fading_profile: String,
    pub mode: LinkMode,
    /// Seconds into the pass for time-stepped geometry
    pub elapsed_s: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl ChannelSnapshot {
    pub fn delay_ms(&self) -> Option<f64> {
        self.delay_s.map(|d| d * 1e3)
    }

    pub fn is_dynamic(&self) -> bool {
        self.mode.is_dynamic()
    }
}

/// Geometry and loss evaluated but not yet committed
struct Evaluation {
    elevation_deg: f64,
    geometry: Option<SatelliteState>,
    loss: Option<LossBreakdown>,
    elapsed_s: Option<f64>,
}

struct LinkState {
    config: ChannelConfiguration,
    orbit: Orbit,
    elevation_deg: f64,
    /// `None` while the platform is below the visibility threshold
    geometry: Option<SatelliteState>,
    loss: Option<LossBreakdown>,
    elapsed_s: Option<f64>,
    mode: LinkMode,
    generation: u64,
    fading: FadingEngine,
    noise_rng: StdRng,
    updated_at: DateTime<Utc>,
}

impl LinkState {
    fn evaluate(&self, input: GeometryInput) -> Result<Evaluation> {
        let elapsed_s = match input {
            GeometryInput::Time { elapsed_s, .. } => Some(elapsed_s),
            GeometryInput::Elevation(_) => None,
        };
        match self.orbit.geometry_at(input, self.config.frequency_hz) {
            Ok(geometry) => {
                let loss = LossModel::new(self.config.loss).evaluate(
                    geometry.slant_range_km,
                    self.config.frequency_hz,
                    geometry.elevation_deg,
                )?;
                Ok(Evaluation {
                    elevation_deg: geometry.elevation_deg,
                    geometry: Some(geometry),
                    loss: Some(loss),
                    elapsed_s,
                })
            }
            Err(GeometryError::NotVisible { elevation_deg, .. }) => Ok(Evaluation {
                elevation_deg,
                geometry: None,
                loss: None,
                elapsed_s,
            }),
            Err(err) => Err(err.into()),
        }
    }

    fn commit(&mut self, eval: Evaluation) {
        self.elevation_deg = eval.elevation_deg;
        self.geometry = eval.geometry;
        self.loss = eval.loss;
        self.elapsed_s = eval.elapsed_s;
        self.updated_at = Utc::now();
    }

    fn pass_input(&self, pass: PassProfile, elapsed_s: f64) -> GeometryInput {
        GeometryInput::Time {
            elapsed_s,
            pass,
            pointing_deg: self.config.elevation_deg,
        }
    }

    fn not_visible(&self) -> EmulatorError {
        EmulatorError::NotVisible {
            elevation_deg: self.elevation_deg,
            min_elevation_deg: self.config.min_elevation_deg,
        }
    }

    fn snapshot(&self, id: ChannelId) -> ChannelSnapshot {
        ChannelSnapshot {
            id,
            orbit_type: self.config.orbit_type,
            visible: self.geometry.is_some(),
            elevation_deg: self.elevation_deg,
            min_elevation_deg: self.config.min_elevation_deg,
            slant_range_km: self.geometry.map(|g| g.slant_range_km),
            delay_s: self.geometry.map(|g| g.delay_s),
            doppler_hz: self.geometry.map(|g| g.doppler_hz),
            doppler_rate_hz_s: self.geometry.map(|g| g.doppler_rate_hz_s),
            path_loss_db: self.loss.map(|l| l.total_db()),
            loss: self.loss,
            timing: self.geometry.map(|g| TimingAdvance::from_delay(g.delay_s)),
            frequency_hz: self.config.frequency_hz,
            rain_rate_mm_hr: self.config.rain_rate_mm_hr(),
            fading_profile: self.config.fading_profile.name.clone(),
            mode: self.mode,
            elapsed_s: self.elapsed_s,
            updated_at: self.updated_at,
        }
    }
}

/// One emulated link
pub struct ChannelInstance {
    id: ChannelId,
    created_at: DateTime<Utc>,
    state: Mutex<LinkState>,
}

impl std::fmt::Debug for ChannelInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelInstance")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl ChannelInstance {
    pub fn new(config: ChannelConfiguration) -> Result<Self> {
        let orbit = Orbit::new(
            config.orbit_type,
            config.altitude_km,
            config.min_elevation_deg,
        )?;
        let (fading, noise_rng) = match config.fading_seed {
            Some(seed) => (
                FadingEngine::seeded(seed),
                StdRng::seed_from_u64(seed.wrapping_add(1)),
            ),
            None => (FadingEngine::new(), StdRng::from_entropy()),
        };

        let now = Utc::now();
        let mut state = LinkState {
            elevation_deg: config.elevation_deg,
            config,
            orbit,
            geometry: None,
            loss: None,
            elapsed_s: None,
            mode: LinkMode::Static,
            generation: 0,
            fading,
            noise_rng,
            updated_at: now,
        };
        let initial = state.evaluate(GeometryInput::Elevation(state.config.elevation_deg))?;
        state.commit(initial);

        Ok(Self {
            id: ChannelId::new(),
            created_at: now,
            state: Mutex::new(state),
        })
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn orbit_type(&self) -> OrbitType {
        self.state.lock().config.orbit_type
    }

    pub fn configuration(&self) -> ChannelConfiguration {
        self.state.lock().config.clone()
    }

    pub fn mode(&self) -> LinkMode {
        self.state.lock().mode
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        self.state.lock().snapshot(self.id)
    }

    /// Command a fixed elevation. Ends any running pass.
    pub fn set_elevation(&self, elevation_deg: f64) -> Result<ChannelSnapshot> {
        validate_elevation(elevation_deg)?;
        let mut state = self.state.lock();
        let eval = state.evaluate(GeometryInput::Elevation(elevation_deg))?;

        if state.mode.is_dynamic() {
            info!(channel_id = %self.id, "elevation set, ending dynamic simulation");
            state.mode = LinkMode::Static;
        }
        state.config.elevation_deg = elevation_deg;
        state.commit(eval);
        info!(
            channel_id = %self.id,
            elevation_deg,
            visible = state.geometry.is_some(),
            path_loss_db = ?state.loss.map(|l| l.total_db()),
            "elevation updated"
        );
        Ok(state.snapshot(self.id))
    }

    pub fn set_rain_rate(&self, rain_rate_mm_hr: f64) -> Result<ChannelSnapshot> {
        validate_rain_rate(rain_rate_mm_hr)?;
        let mut state = self.state.lock();

        let mut loss_config = state.config.loss;
        loss_config.rain_rate_mm_hr = rain_rate_mm_hr;
        let loss = match state.geometry {
            Some(g) => Some(LossModel::new(loss_config).evaluate(
                g.slant_range_km,
                state.config.frequency_hz,
                g.elevation_deg,
            )?),
            None => None,
        };

        state.config.loss = loss_config;
        state.loss = loss;
        state.updated_at = Utc::now();
        info!(
            channel_id = %self.id,
            rain_rate_mm_hr,
            path_loss_db = ?loss.map(|l| l.total_db()),
            "rain rate updated"
        );
        Ok(state.snapshot(self.id))
    }

    /// Evaluate the pass at `elapsed_s` and make it the current geometry.
    /// Independent of any background task.
    pub fn advance(&self, pass: &PassProfile, elapsed_s: f64) -> Result<ChannelSnapshot> {
        pass.validate()?;
        if !elapsed_s.is_finite() || elapsed_s < 0.0 {
            return Err(EmulatorError::InvalidConfiguration(format!(
                "elapsed time must be non-negative, got {}",
                elapsed_s
            )));
        }
        let mut state = self.state.lock();
        let input = state.pass_input(*pass, elapsed_s.min(pass.duration_s));
        let eval = state.evaluate(input)?;
        state.commit(eval);
        Ok(state.snapshot(self.id))
    }

    /// Apply loss, fading, Doppler and optional noise to a buffer sampled
    /// at the channel's configured rate
    pub fn apply(&self, samples: &[Complex64]) -> Result<ChannelOutput> {
        let fs = self.state.lock().config.sample_rate_hz;
        self.apply_at(samples, fs)
    }

    /// Same as [`apply`](Self::apply) for a buffer sampled at `sample_rate_hz`.
    /// Doppler rotation and tap delays follow the buffer's rate.
    pub fn apply_at(&self, samples: &[Complex64], sample_rate_hz: f64) -> Result<ChannelOutput> {
        if !sample_rate_hz.is_finite() || sample_rate_hz <= 0.0 {
            return Err(EmulatorError::InvalidConfiguration(format!(
                "sample rate must be positive, got {}",
                sample_rate_hz
            )));
        }
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let (geometry, loss) = match (state.geometry, state.loss) {
            (Some(g), Some(l)) => (g, l),
            _ => return Err(state.not_visible()),
        };
        let fs = sample_rate_hz;

        let mut out = signal::scale(samples, loss.amplitude_scale());
        if state.config.fading_enabled {
            out = state.fading.apply(&state.config.fading_profile, &out, fs)?;
        }

        let doppler_hz = if state.config.doppler_enabled {
            geometry.doppler_hz
        } else {
            0.0
        };
        if doppler_hz != 0.0 {
            rotate(&mut out, doppler_hz, fs);
        }

        if let Some(snr_db) = state.config.awgn_snr_db {
            add_awgn(&mut out, snr_db, &mut state.noise_rng);
        }

        debug!(
            channel_id = %self.id,
            samples = out.len(),
            path_loss_db = loss.total_db(),
            doppler_hz,
            "channel applied"
        );

        Ok(ChannelOutput {
            samples: out,
            delay_s: geometry.delay_s,
            doppler_hz,
            path_loss_db: loss.total_db(),
        })
    }

    pub fn link_budget(&self, request: &LinkBudgetRequest) -> Result<LinkBudget> {
        let state = self.state.lock();
        let loss = state.loss.ok_or_else(|| state.not_visible())?;
        Ok(LinkBudget::compute(
            request,
            &loss,
            state.config.bandwidth_hz,
        )?)
    }

    /// Switch to Dynamic and evaluate t = 0. `None` when a pass is already running.
    fn begin_pass(&self, pass: PassProfile) -> Result<Option<u64>> {
        pass.validate()?;
        let mut state = self.state.lock();
        if state.mode.is_dynamic() {
            return Ok(None);
        }

        let eval = state.evaluate(state.pass_input(pass, 0.0))?;
        state.generation += 1;
        let generation = state.generation;
        state.commit(eval);
        state.mode = LinkMode::Dynamic { generation, pass };
        Ok(Some(generation))
    }

    /// Start stepping the pass on a Tokio task
    pub fn start_dynamic(self: &Arc<Self>, pass: PassProfile) -> Result<DynamicStart> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            EmulatorError::InvalidConfiguration(
                "dynamic simulation requires a Tokio runtime".to_string(),
            )
        })?;

        let generation = match self.begin_pass(pass)? {
            Some(generation) => generation,
            None => return Ok(DynamicStart::AlreadyRunning),
        };
        let started = Instant::now();
        info!(
            channel_id = %self.id,
            duration_s = pass.duration_s,
            update_interval_ms = pass.update_interval_ms,
            "dynamic simulation started"
        );

        handle.spawn(run_pass(Arc::clone(self), generation, started));
        Ok(DynamicStart::Started)
    }

    /// Return to Static. Returns whether a pass was running.
    pub fn stop_dynamic(&self) -> bool {
        let mut state = self.state.lock();
        if !state.mode.is_dynamic() {
            return false;
        }
        state.mode = LinkMode::Static;
        info!(
            channel_id = %self.id,
            elevation_deg = state.elevation_deg,
            "dynamic simulation stopped"
        );
        true
    }

    pub(crate) fn step(&self, generation: u64, elapsed_s: f64) -> StepOutcome {
        let mut state = self.state.lock();
        let pass = match state.mode {
            LinkMode::Dynamic {
                generation: current,
                pass,
            } if current == generation => pass,
            _ => return StepOutcome::Cancelled,
        };

        let elapsed_s = elapsed_s.min(pass.duration_s);
        match state.evaluate(state.pass_input(pass, elapsed_s)) {
            Ok(eval) => state.commit(eval),
            Err(err) => {
                warn!(channel_id = %self.id, error = %err, "pass step failed");
                state.mode = LinkMode::Static;
                return StepOutcome::Finished;
            }
        }
        debug!(
            channel_id = %self.id,
            elapsed_s,
            elevation_deg = state.elevation_deg,
            doppler_hz = ?state.geometry.map(|g| g.doppler_hz),
            "pass step"
        );

        if pass.is_complete(elapsed_s) {
            state.mode = LinkMode::Static;
            StepOutcome::Finished
        } else {
            StepOutcome::Continue
        }
    }
}

async fn run_pass(channel: Arc<ChannelInstance>, generation: u64, started: Instant) {
    let period = match channel.mode() {
        LinkMode::Dynamic { pass, .. } => pass.update_interval(),
        LinkMode::Static => return,
    };
    let mut ticker = interval_at(started + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let elapsed_s = started.elapsed().as_secs_f64();
        match channel.step(generation, elapsed_s) {
            StepOutcome::Continue => {}
            StepOutcome::Finished => {
                info!(channel_id = %channel.id(), elapsed_s, "dynamic simulation finished");
                break;
            }
            StepOutcome::Cancelled => {
                debug!(channel_id = %channel.id(), generation, "pass task cancelled");
                break;
            }
        }
    }
}

fn rotate(samples: &mut [Complex64], frequency_hz: f64, sample_rate_hz: f64) {
    let w = 2.0 * PI * frequency_hz / sample_rate_hz;
    for (n, s) in samples.iter_mut().enumerate() {
        *s *= Complex64::from_polar(1.0, w * n as f64);
    }
}

/// White Gaussian noise at `snr_db` below the buffer's own power
fn add_awgn(samples: &mut [Complex64], snr_db: f64, rng: &mut StdRng) {
    let power = signal::mean_power(samples);
    if power <= 0.0 {
        return;
    }
    let std = (power / 10f64.powf(snr_db / 10.0) / 2.0).sqrt();
    for s in samples.iter_mut() {
        let re: f64 = rng.sample(StandardNormal);
        let im: f64 = rng.sample(StandardNormal);
        *s += Complex64::new(re, im) * std;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelOptions;
    use approx::assert_relative_eq;

    fn channel(orbit_type: OrbitType, options: ChannelOptions) -> ChannelInstance {
        ChannelInstance::new(options.seed(7).resolve(orbit_type).unwrap()).unwrap()
    }

    fn plain(orbit_type: OrbitType) -> ChannelOptions {
        ChannelOptions {
            fading_enabled: Some(false),
            doppler_enabled: Some(false),
            ..ChannelOptions::for_orbit(orbit_type)
        }
    }

    fn ones(n: usize) -> Vec<Complex64> {
        vec![Complex64::new(1.0, 0.0); n]
    }

    #[test]
    fn test_geo_state() {
        let ch = channel(OrbitType::Geo, ChannelOptions::default());
        let snap = ch.snapshot();
        assert!(snap.visible);
        assert_eq!(snap.doppler_hz, Some(0.0));
        assert!((snap.delay_ms().unwrap() - 125.0).abs() < 1.0);
        assert!(!snap.is_dynamic());
        assert!(snap.timing.unwrap().k_offset_slots >= 150);
    }

    #[test]
    fn test_below_threshold_not_visible() {
        let ch = channel(OrbitType::Leo, ChannelOptions::default());
        let snap = ch.set_elevation(5.0).unwrap();
        assert!(!snap.visible);
        assert_eq!(snap.elevation_deg, 5.0);
        assert!(snap.delay_s.is_none());
        assert!(snap.path_loss_db.is_none());

        assert!(matches!(
            ch.apply(&ones(16)),
            Err(EmulatorError::NotVisible { .. })
        ));
        assert!(matches!(
            ch.link_budget(&LinkBudgetRequest::default()),
            Err(EmulatorError::NotVisible { .. })
        ));

        assert!(ch.set_elevation(45.0).unwrap().visible);
    }

    #[test]
    fn test_invalid_elevation_leaves_state() {
        let ch = channel(OrbitType::Geo, ChannelOptions::default());
        let before = ch.snapshot();
        for bad in [f64::NAN, 91.0, -120.0] {
            let err = ch.set_elevation(bad).unwrap_err();
            assert!(err.is_configuration_error());
        }
        let after = ch.snapshot();
        assert_eq!(before.elevation_deg, after.elevation_deg);
        assert_eq!(before.path_loss_db, after.path_loss_db);
    }

    #[test]
    fn test_rain_rate_raises_loss() {
        let ch = channel(OrbitType::Geo, ChannelOptions::default());
        let dry = ch.snapshot().path_loss_db.unwrap();
        let wet = ch.set_rain_rate(25.0).unwrap().path_loss_db.unwrap();
        assert!(wet > dry);
        assert_eq!(ch.snapshot().rain_rate_mm_hr, 25.0);

        assert!(ch.set_rain_rate(-1.0).is_err());
        assert_eq!(ch.snapshot().rain_rate_mm_hr, 25.0);
    }

    #[test]
    fn test_apply_scales_by_loss() {
        let ch = channel(OrbitType::Haps, plain(OrbitType::Haps));
        let out = ch.apply(&ones(256)).unwrap();
        assert_eq!(out.samples.len(), 256);
        assert_eq!(out.doppler_hz, 0.0);
        let gain_db = 10.0 * signal::mean_power(&out.samples).log10();
        assert_relative_eq!(gain_db, -out.path_loss_db, epsilon = 1e-9);
        assert!(out.delay_s > 0.0);
    }

    #[test]
    fn test_doppler_rotation() {
        let options = ChannelOptions {
            doppler_enabled: Some(true),
            ..plain(OrbitType::Leo)
        };
        let ch = channel(OrbitType::Leo, options);
        let out = ch.apply(&ones(64)).unwrap();
        assert!(out.doppler_hz > 0.0);

        let step = (out.samples[1] * out.samples[0].conj()).arg();
        let expected = 2.0 * PI * out.doppler_hz / 30.72e6;
        assert_relative_eq!(step, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_apply_at_follows_buffer_rate() {
        let options = ChannelOptions {
            doppler_enabled: Some(true),
            ..plain(OrbitType::Leo)
        };
        let ch = channel(OrbitType::Leo, options);
        let out = ch.apply_at(&ones(64), 10e6).unwrap();

        let step = (out.samples[1] * out.samples[0].conj()).arg();
        let expected = 2.0 * PI * out.doppler_hz / 10e6;
        assert_relative_eq!(step, expected, epsilon = 1e-9);

        for bad in [0.0, -1.0, f64::NAN] {
            assert!(ch.apply_at(&ones(8), bad).unwrap_err().is_configuration_error());
        }
    }

    #[test]
    fn test_awgn_sets_snr() {
        let options = ChannelOptions {
            awgn_snr_db: Some(10.0),
            ..plain(OrbitType::Haps)
        };
        let ch = channel(OrbitType::Haps, options);
        let clean_power = 10f64.powf(-ch.snapshot().path_loss_db.unwrap() / 10.0);
        let out = ch.apply(&ones(20_000)).unwrap();
        let noise: Vec<Complex64> = out
            .samples
            .iter()
            .map(|s| s - Complex64::new(clean_power.sqrt(), 0.0))
            .collect();
        let snr = 10.0 * (clean_power / signal::mean_power(&noise)).log10();
        assert!((snr - 10.0).abs() < 0.3, "snr {}", snr);
    }

    #[test]
    fn test_seeded_fading_reproducible() {
        let a = channel(OrbitType::Geo, ChannelOptions::default());
        let b = channel(OrbitType::Geo, ChannelOptions::default());
        let input = signal::test_tone(50e3, 1e-4, 0.5, 30.72e6).unwrap();
        assert_eq!(a.apply(&input).unwrap(), b.apply(&input).unwrap());
    }

    #[test]
    fn test_manual_advance() {
        let ch = channel(OrbitType::Leo, ChannelOptions::default());
        let pass = PassProfile::with_duration(60.0);

        let rise = ch.advance(&pass, 0.0).unwrap();
        let peak = ch.advance(&pass, 30.0).unwrap();
        let set = ch.advance(&pass, 90.0).unwrap();

        assert_relative_eq!(rise.elevation_deg, 10.0, epsilon = 1e-6);
        assert_relative_eq!(peak.elevation_deg, 90.0, epsilon = 1e-6);
        assert_relative_eq!(set.elevation_deg, 10.0, epsilon = 1e-6);
        assert!(rise.doppler_hz.unwrap() > 0.0);
        assert!(set.doppler_hz.unwrap() < 0.0);
        assert_eq!(set.elapsed_s, Some(60.0));
        assert!(!set.is_dynamic());
    }

    #[test]
    fn test_step_requires_matching_generation() {
        let ch = channel(OrbitType::Leo, ChannelOptions::default());
        let generation = ch
            .begin_pass(PassProfile::with_duration(10.0))
            .unwrap()
            .unwrap();
        assert!(ch.mode().is_dynamic());
        assert_eq!(ch.begin_pass(PassProfile::with_duration(10.0)).unwrap(), None);

        assert_eq!(ch.step(generation + 1, 1.0), StepOutcome::Cancelled);
        assert_eq!(ch.step(generation, 5.0), StepOutcome::Continue);
        assert_eq!(ch.step(generation, 10.0), StepOutcome::Finished);
        assert_eq!(ch.mode(), LinkMode::Static);
        assert_eq!(ch.step(generation, 10.5), StepOutcome::Cancelled);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let ch = channel(OrbitType::Leo, ChannelOptions::default());
        let generation = ch
            .begin_pass(PassProfile::with_duration(10.0))
            .unwrap()
            .unwrap();
        assert!(ch.stop_dynamic());
        assert!(!ch.stop_dynamic());
        assert_eq!(ch.step(generation, 2.0), StepOutcome::Cancelled);
    }

    #[test]
    fn test_set_elevation_ends_pass() {
        let ch = channel(OrbitType::Leo, ChannelOptions::default());
        let generation = ch
            .begin_pass(PassProfile::with_duration(10.0))
            .unwrap()
            .unwrap();
        ch.set_elevation(50.0).unwrap();
        assert_eq!(ch.mode(), LinkMode::Static);
        assert_eq!(ch.step(generation, 2.0), StepOutcome::Cancelled);
        assert_relative_eq!(ch.snapshot().elevation_deg, 50.0);
    }

    #[test]
    fn test_start_without_runtime() {
        let ch = Arc::new(channel(OrbitType::Leo, ChannelOptions::default()));
        let err = ch.start_dynamic(PassProfile::with_duration(60.0)).unwrap_err();
        assert!(matches!(err, EmulatorError::InvalidConfiguration(_)));
        assert_eq!(ch.mode(), LinkMode::Static);
    }

    #[test]
    fn test_pass_peak_below_threshold_rejected() {
        let ch = channel(OrbitType::Leo, ChannelOptions::default());
        let pass = PassProfile {
            peak_elevation_deg: 5.0,
            ..PassProfile::with_duration(60.0)
        };
        assert!(ch.begin_pass(pass).unwrap_err().is_configuration_error());
        assert_eq!(ch.mode(), LinkMode::Static);
    }
}
