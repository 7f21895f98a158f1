//! Emulator Context
//!
//! Registry of live channel instances and simulated devices. The host
//! creates one context and passes it by reference; handles are `Arc`s cloned
//! out of the maps, so a concurrent delete never frees an instance that an
//! operation is still using.

use crate::channel::{ChannelInstance, ChannelOutput, ChannelSnapshot, DynamicStart};
use crate::config::ChannelOptions;
use crate::device::{DeviceInfo, RxBuffer, SimulatedDevice};
use crate::error::{EmulatorError, Result};
use crate::ids::{ChannelId, DeviceId};
use ntn_geometry::{OrbitType, PassProfile};
use ntn_propagation::{LinkBudget, LinkBudgetRequest};
use num_complex::Complex64;
use parking_lot::RwLock;
use rf_frontend::{CalibrationReport, DeviceClass, DeviceProfile, DeviceSettings};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Default)]
pub struct EmulatorContext {
    channels: RwLock<HashMap<ChannelId, Arc<ChannelInstance>>>,
    devices: RwLock<HashMap<DeviceId, Arc<SimulatedDevice>>>,
}

impl EmulatorContext {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Channels
    // ========================================================================

    pub fn create_channel(
        &self,
        orbit_type: OrbitType,
        options: &ChannelOptions,
    ) -> Result<ChannelId> {
        let config = options.resolve(orbit_type)?;
        let channel = ChannelInstance::new(config)?;
        let id = channel.id();
        let snapshot = channel.snapshot();

        self.channels.write().insert(id, Arc::new(channel));
        info!(
            channel_id = %id,
            orbit_type = %orbit_type,
            elevation_deg = snapshot.elevation_deg,
            visible = snapshot.visible,
            fading_profile = %snapshot.fading_profile,
            "channel created"
        );
        Ok(id)
    }

    /// Orbit type taken from the options themselves
    pub fn create_channel_from_options(&self, options: &ChannelOptions) -> Result<ChannelId> {
        let orbit_type = options.parsed_orbit_type()?.ok_or_else(|| {
            EmulatorError::InvalidConfiguration("orbit_type is required".to_string())
        })?;
        self.create_channel(orbit_type, options)
    }

    pub fn channel(&self, id: ChannelId) -> Result<Arc<ChannelInstance>> {
        self.channels
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| EmulatorError::channel_not_found(id))
    }

    pub fn get_channel_state(&self, id: ChannelId) -> Result<ChannelSnapshot> {
        Ok(self.channel(id)?.snapshot())
    }

    pub fn set_elevation(&self, id: ChannelId, elevation_deg: f64) -> Result<ChannelSnapshot> {
        self.channel(id)?.set_elevation(elevation_deg)
    }

    pub fn set_rain_rate(&self, id: ChannelId, rain_rate_mm_hr: f64) -> Result<ChannelSnapshot> {
        self.channel(id)?.set_rain_rate(rain_rate_mm_hr)
    }

    pub fn apply_channel(&self, id: ChannelId, samples: &[Complex64]) -> Result<ChannelOutput> {
        self.channel(id)?.apply(samples)
    }

    /// Sweep a pass of `duration` using the channel's configured pass shaping
    pub fn start_dynamic_simulation(
        &self,
        id: ChannelId,
        duration: Duration,
    ) -> Result<DynamicStart> {
        let channel = self.channel(id)?;
        let pass = PassProfile {
            duration_s: duration.as_secs_f64(),
            ..channel.configuration().pass
        };
        channel.start_dynamic(pass)
    }

    pub fn start_pass(&self, id: ChannelId, pass: PassProfile) -> Result<DynamicStart> {
        self.channel(id)?.start_dynamic(pass)
    }

    /// Returns whether a pass was running
    pub fn stop_dynamic_simulation(&self, id: ChannelId) -> Result<bool> {
        Ok(self.channel(id)?.stop_dynamic())
    }

    pub fn get_link_budget(
        &self,
        id: ChannelId,
        request: &LinkBudgetRequest,
    ) -> Result<LinkBudget> {
        self.channel(id)?.link_budget(request)
    }

    pub fn delete_channel(&self, id: ChannelId) -> Result<()> {
        let channel = self
            .channels
            .write()
            .remove(&id)
            .ok_or_else(|| EmulatorError::channel_not_found(id))?;
        channel.stop_dynamic();
        info!(channel_id = %id, "channel deleted");
        Ok(())
    }

    pub fn list_channels(&self) -> Vec<ChannelSnapshot> {
        let channels: Vec<Arc<ChannelInstance>> = self.channels.read().values().cloned().collect();
        let mut snapshots: Vec<ChannelSnapshot> = channels.iter().map(|c| c.snapshot()).collect();
        snapshots.sort_by_key(|s| s.id);
        snapshots
    }

    // ========================================================================
    // Devices
    // ========================================================================

    pub fn create_device(&self, class: DeviceClass) -> DeviceId {
        self.insert_device(SimulatedDevice::new(class))
    }

    pub fn create_device_with_profile(
        &self,
        profile: DeviceProfile,
        seed: Option<u64>,
    ) -> DeviceId {
        self.insert_device(SimulatedDevice::with_profile(profile, seed))
    }

    fn insert_device(&self, device: SimulatedDevice) -> DeviceId {
        let id = device.id();
        let class = device.class();
        self.devices.write().insert(id, Arc::new(device));
        info!(device_id = %id, class = %class, "device created");
        id
    }

    pub fn device(&self, id: DeviceId) -> Result<Arc<SimulatedDevice>> {
        self.devices
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| EmulatorError::device_not_found(id))
    }

    pub fn configure(&self, id: DeviceId, settings: &DeviceSettings) -> Result<DeviceInfo> {
        self.device(id)?.configure(settings)
    }

    pub fn attach_channel(&self, device_id: DeviceId, channel_id: ChannelId) -> Result<()> {
        let device = self.device(device_id)?;
        self.channel(channel_id)?;
        device.attach(channel_id);
        info!(device_id = %device_id, channel_id = %channel_id, "channel attached");
        Ok(())
    }

    /// Returns the channel that was attached, if any
    pub fn detach_channel(&self, device_id: DeviceId) -> Result<Option<ChannelId>> {
        Ok(self.device(device_id)?.detach())
    }

    pub fn transmit(&self, id: DeviceId, samples: &[Complex64]) -> Result<usize> {
        Ok(self.device(id)?.transmit(samples))
    }

    /// An attached channel that has since been deleted yields `NotFound`
    pub fn receive(&self, id: DeviceId, num_samples: usize) -> Result<RxBuffer> {
        let device = self.device(id)?;
        let channel = device
            .attached_channel()
            .map(|channel_id| self.channel(channel_id))
            .transpose()?;
        device.receive(num_samples, channel.as_deref())
    }

    pub fn calibrate_dc_offset(&self, id: DeviceId) -> Result<CalibrationReport> {
        self.device(id)?.calibrate_dc_offset()
    }

    pub fn calibrate_iq_imbalance(&self, id: DeviceId) -> Result<CalibrationReport> {
        self.device(id)?.calibrate_iq_imbalance()
    }

    pub fn device_info(&self, id: DeviceId) -> Result<DeviceInfo> {
        Ok(self.device(id)?.info())
    }

    pub fn delete_device(&self, id: DeviceId) -> Result<()> {
        self.devices
            .write()
            .remove(&id)
            .ok_or_else(|| EmulatorError::device_not_found(id))?;
        info!(device_id = %id, "device deleted");
        Ok(())
    }

    pub fn list_devices(&self) -> Vec<DeviceInfo> {
        let devices: Vec<Arc<SimulatedDevice>> = self.devices.read().values().cloned().collect();
        let mut infos: Vec<DeviceInfo> = devices.iter().map(|d| d.info()).collect();
        infos.sort_by_key(|d| d.id);
        infos
    }
}
