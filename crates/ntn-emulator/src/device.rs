//! Simulated transceiver
//!
//! Wraps a [`DeviceProfile`] and its impairment chains behind the control
//! surface of a physical SDR: tune, set gain, transmit into a loopback
//! record, receive through an optional attached channel, and run the two
//! calibration routines against an internal reference tone.

use crate::channel::ChannelInstance;
use crate::error::{EmulatorError, Result};
use crate::ids::{ChannelId, DeviceId};
use chrono::{DateTime, Utc};
use num_complex::Complex64;
use parking_lot::Mutex;
use rf_frontend::calibration::{estimate_dc_offset, estimate_iq_imbalance, phase_jitter_rms};
use rf_frontend::{
    signal, CalibrationKind, CalibrationReport, CalibrationState, DeviceCapabilities, DeviceClass,
    DeviceProfile, DeviceSettings, ImpairmentSimulator,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Reference tone injected on the RX path during calibration
pub const REFERENCE_TONE_HZ: f64 = 100e3;
pub const REFERENCE_TONE_AMPLITUDE: f64 = 0.7;
pub const REFERENCE_TONE_DURATION_S: f64 = 1e-3;

/// Oldest samples are dropped past this many
pub const MAX_LOOPBACK_SAMPLES: usize = 1 << 22;

/// Read-only view of a device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub class: DeviceClass,
    pub center_frequency_hz: f64,
    pub sample_rate_hz: f64,
    pub bandwidth_hz: f64,
    pub tx_gain_db: f64,
    pub rx_gain_db: f64,
    pub capabilities: DeviceCapabilities,
    pub calibration: CalibrationState,
    pub attached_channel: Option<ChannelId>,
    pub buffered_samples: usize,
    pub created_at: DateTime<Utc>,
}

/// Samples handed back by `receive`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RxBuffer {
    pub samples: Vec<Complex64>,
    /// Channel that shaped the samples, if any
    pub channel_id: Option<ChannelId>,
    pub delay_s: Option<f64>,
    pub doppler_hz: Option<f64>,
    pub path_loss_db: Option<f64>,
}

struct DeviceState {
    profile: DeviceProfile,
    simulator: ImpairmentSimulator,
    loopback: VecDeque<Complex64>,
    attached_channel: Option<ChannelId>,
}

impl DeviceState {
    /// Reference tone as it reaches the ADC: RX gain, then RX impairments
    fn capture_reference(&mut self) -> Result<Vec<Complex64>> {
        let fs = self.profile.sample_rate_hz;
        let tone = signal::test_tone(
            REFERENCE_TONE_HZ,
            REFERENCE_TONE_DURATION_S,
            REFERENCE_TONE_AMPLITUDE,
            fs,
        )?;
        let scaled = signal::scale(&tone, self.profile.rx_gain_scale());
        Ok(self.simulator.capture(&scaled, fs))
    }

    /// Copy of the next `num_samples` recorded samples, zero-filled when short
    fn peek(&self, num_samples: usize) -> Vec<Complex64> {
        let mut samples: Vec<Complex64> =
            self.loopback.iter().take(num_samples).copied().collect();
        samples.resize(num_samples, Complex64::new(0.0, 0.0));
        samples
    }

    fn consume(&mut self, num_samples: usize) {
        let available = num_samples.min(self.loopback.len());
        self.loopback.drain(..available);
    }
}

pub struct SimulatedDevice {
    id: DeviceId,
    created_at: DateTime<Utc>,
    state: Mutex<DeviceState>,
}

impl std::fmt::Debug for SimulatedDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedDevice")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl SimulatedDevice {
    pub fn new(class: DeviceClass) -> Self {
        Self::with_profile(DeviceProfile::new(class), None)
    }

    /// Custom profile; `seed` makes the phase-noise walk reproducible
    pub fn with_profile(profile: DeviceProfile, seed: Option<u64>) -> Self {
        let simulator = match seed {
            Some(seed) => {
                ImpairmentSimulator::seeded(profile.tx_impairments, profile.rx_impairments, seed)
            }
            None => ImpairmentSimulator::new(profile.tx_impairments, profile.rx_impairments),
        };
        Self {
            id: DeviceId::new(),
            created_at: Utc::now(),
            state: Mutex::new(DeviceState {
                profile,
                simulator,
                loopback: VecDeque::new(),
                attached_channel: None,
            }),
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn class(&self) -> DeviceClass {
        self.state.lock().profile.class
    }

    pub fn profile(&self) -> DeviceProfile {
        self.state.lock().profile.clone()
    }

    pub fn info(&self) -> DeviceInfo {
        let state = self.state.lock();
        let p = &state.profile;
        DeviceInfo {
            id: self.id,
            class: p.class,
            center_frequency_hz: p.center_frequency_hz,
            sample_rate_hz: p.sample_rate_hz,
            bandwidth_hz: p.bandwidth_hz,
            tx_gain_db: p.tx_gain_db,
            rx_gain_db: p.rx_gain_db,
            capabilities: p.capabilities(),
            calibration: p.calibration,
            attached_channel: state.attached_channel,
            buffered_samples: state.loopback.len(),
            created_at: self.created_at,
        }
    }

    pub fn configure(&self, settings: &DeviceSettings) -> Result<DeviceInfo> {
        {
            let mut state = self.state.lock();
            if let Err(err) = state.profile.configure(settings) {
                warn!(device_id = %self.id, error = %err, "configuration rejected");
                return Err(err.into());
            }
            info!(
                device_id = %self.id,
                center_frequency_hz = state.profile.center_frequency_hz,
                tx_gain_db = state.profile.tx_gain_db,
                rx_gain_db = state.profile.rx_gain_db,
                "device configured"
            );
        }
        Ok(self.info())
    }

    /// Route received samples through `channel`. Returns the previous attachment.
    pub fn attach(&self, channel: ChannelId) -> Option<ChannelId> {
        self.state.lock().attached_channel.replace(channel)
    }

    pub fn detach(&self) -> Option<ChannelId> {
        self.state.lock().attached_channel.take()
    }

    pub fn attached_channel(&self) -> Option<ChannelId> {
        self.state.lock().attached_channel
    }

    /// Apply TX gain and impairments and record the result. Returns the buffered total.
    pub fn transmit(&self, samples: &[Complex64]) -> usize {
        let mut state = self.state.lock();
        let fs = state.profile.sample_rate_hz;
        let scaled = signal::scale(samples, state.profile.tx_gain_scale());
        let impaired = state.simulator.transmit(&scaled, fs);
        state.loopback.extend(impaired);

        let overflow = state.loopback.len().saturating_sub(MAX_LOOPBACK_SAMPLES);
        if overflow > 0 {
            state.loopback.drain(..overflow);
            warn!(device_id = %self.id, dropped = overflow, "loopback buffer full");
        }
        debug!(
            device_id = %self.id,
            samples = samples.len(),
            buffered = state.loopback.len(),
            "transmit"
        );
        state.loopback.len()
    }

    /// Pull `num_samples` from the loopback record, zero-filled when short.
    ///
    /// With `channel` the samples pass through it, then RX gain, RX
    /// impairments and the stored calibration correction. Without one the
    /// recorded samples are returned as they are.
    pub fn receive(
        &self,
        num_samples: usize,
        channel: Option<&ChannelInstance>,
    ) -> Result<RxBuffer> {
        let mut state = self.state.lock();
        let raw = state.peek(num_samples);

        let channel = match channel {
            Some(channel) => channel,
            None => {
                state.consume(num_samples);
                return Ok(RxBuffer {
                    samples: raw,
                    channel_id: None,
                    delay_s: None,
                    doppler_hz: None,
                    path_loss_db: None,
                })
            }
        };

        // The recorded samples stay buffered unless the channel accepts them
        let fs = state.profile.sample_rate_hz;
        let output = channel.apply_at(&raw, fs)?;
        state.consume(num_samples);
        let calibration = state.profile.calibration;
        let scaled = signal::scale(&output.samples, state.profile.rx_gain_scale());
        let samples = state.simulator.receive(&scaled, fs, &calibration);

        Ok(RxBuffer {
            samples,
            channel_id: Some(channel.id()),
            delay_s: Some(output.delay_s),
            doppler_hz: Some(output.doppler_hz),
            path_loss_db: Some(output.path_loss_db),
        })
    }

    /// Estimate and store the RX DC offset
    pub fn calibrate_dc_offset(&self) -> Result<CalibrationReport> {
        let mut state = self.state.lock();
        let capture = state.capture_reference()?;
        let power_dbfs = signal::power_dbfs(&capture);

        let dc = match estimate_dc_offset(&capture) {
            Ok(dc) => dc,
            Err(err) => {
                warn!(device_id = %self.id, power_dbfs, error = %err, "DC calibration failed");
                return Err(err.into());
            }
        };

        let now = Utc::now();
        state.profile.calibration.dc_offset = dc;
        state.profile.calibration.dc_calibrated_at = Some(now);

        let residual = residual_dc(&mut state)?;
        info!(
            device_id = %self.id,
            dc_i = dc.re,
            dc_q = dc.im,
            residual,
            "DC offset calibrated"
        );

        Ok(CalibrationReport {
            kind: CalibrationKind::DcOffset,
            capture_power_dbfs: power_dbfs,
            dc_offset_i: dc.re,
            dc_offset_q: dc.im,
            residual_dc: residual,
            iq_gain: None,
            iq_phase_deg: None,
            image_rejection_before_db: None,
            image_rejection_after_db: None,
            timestamp: now,
        })
    }

    /// Estimate and store the RX IQ imbalance. Also refreshes the DC estimate.
    pub fn calibrate_iq_imbalance(&self) -> Result<CalibrationReport> {
        let mut state = self.state.lock();
        let capture = state.capture_reference()?;
        let power_dbfs = signal::power_dbfs(&capture);
        let fs = state.profile.sample_rate_hz;

        let estimated = estimate_dc_offset(&capture).and_then(|dc| {
            estimate_iq_imbalance(&capture, REFERENCE_TONE_HZ, fs).map(|iq| (dc, iq))
        });
        let (dc, iq) = match estimated {
            Ok(pair) => pair,
            Err(err) => {
                warn!(device_id = %self.id, power_dbfs, error = %err, "IQ calibration failed");
                return Err(err.into());
            }
        };

        let now = Utc::now();
        let calibration = &mut state.profile.calibration;
        calibration.dc_offset = dc;
        calibration.dc_calibrated_at = Some(now);
        calibration.iq_correction = iq.correction;
        calibration.iq_gain_estimate = Some(iq.gain);
        calibration.iq_phase_deg_estimate = Some(iq.phase_deg);
        calibration.image_rejection_db = Some(iq.image_rejection_after_db);
        calibration.iq_calibrated_at = Some(now);
        let corrected = calibration.correct(&capture);
        calibration.phase_jitter_rms_rad = phase_jitter_rms(&corrected);

        let residual = residual_dc(&mut state)?;
        info!(
            device_id = %self.id,
            gain = iq.gain,
            phase_deg = iq.phase_deg,
            irr_before_db = iq.image_rejection_before_db,
            irr_after_db = iq.image_rejection_after_db,
            "IQ imbalance calibrated"
        );

        Ok(CalibrationReport {
            kind: CalibrationKind::IqImbalance,
            capture_power_dbfs: power_dbfs,
            dc_offset_i: dc.re,
            dc_offset_q: dc.im,
            residual_dc: residual,
            iq_gain: Some(iq.gain),
            iq_phase_deg: Some(iq.phase_deg),
            image_rejection_before_db: Some(iq.image_rejection_before_db),
            image_rejection_after_db: Some(iq.image_rejection_after_db),
            timestamp: now,
        })
    }
}

/// Mean bias of a fresh corrected capture
fn residual_dc(state: &mut DeviceState) -> Result<f64> {
    let capture = state.capture_reference()?;
    let corrected = state.profile.calibration.correct(&capture);
    Ok(signal::mean(&corrected).norm())
}
