//! End-to-end scenarios through the emulator context

use ntn_emulator::{
    ChannelOptions, DeviceClass, DeviceSettings, DynamicStart, EmulatorContext, EmulatorError,
    LinkBudgetRequest, LinkMode, LinkStatus, OrbitType,
};
use num_complex::Complex64;
use rf_frontend::signal;
use std::time::Duration;

fn tone() -> Vec<Complex64> {
    signal::test_tone(250e3, 1e-4, 0.5, 30.72e6).unwrap()
}

#[test]
fn geo_link_characteristics() {
    let ctx = EmulatorContext::new();
    let id = ctx
        .create_channel(OrbitType::Geo, &ChannelOptions::default())
        .unwrap();
    let state = ctx.get_channel_state(id).unwrap();

    let delay_ms = state.delay_ms().unwrap();
    assert!((delay_ms - 125.0).abs() < 1.0, "delay {} ms", delay_ms);
    let loss = state.path_loss_db.unwrap();
    assert!((187.0..193.0).contains(&loss), "loss {} dB", loss);
    assert_eq!(state.doppler_hz, Some(0.0));

    let out = ctx.apply_channel(id, &tone()).unwrap();
    assert_eq!(out.samples.len(), tone().len());
    assert_eq!(out.path_loss_db, loss);
}

#[test]
fn haps_link_characteristics() {
    let ctx = EmulatorContext::new();
    let id = ctx
        .create_channel(OrbitType::Haps, &ChannelOptions::default())
        .unwrap();
    let state = ctx.get_channel_state(id).unwrap();

    let delay_us = state.delay_s.unwrap() * 1e6;
    assert!((100.0..170.0).contains(&delay_us), "delay {} us", delay_us);
    let loss = state.path_loss_db.unwrap();
    assert!((125.0..135.0).contains(&loss), "loss {} dB", loss);
    assert_eq!(state.doppler_hz, Some(0.0));
}

#[test]
fn geo_budget_fails_at_terminal_power() {
    let ctx = EmulatorContext::new();
    let id = ctx
        .create_channel(OrbitType::Geo, &ChannelOptions::default())
        .unwrap();
    let budget = ctx
        .get_link_budget(id, &LinkBudgetRequest::new(33.0, 3.0, 20.0, 10.0))
        .unwrap();
    assert!(budget.margin_db < 0.0);
    assert_eq!(budget.status, LinkStatus::Fail);
    assert!((budget.noise_floor_dbm + 94.2).abs() < 0.1);
    assert_eq!(budget.eirp_dbm, 36.0);

    let boosted = ctx
        .get_link_budget(id, &LinkBudgetRequest::new(80.0, 30.0, 40.0, 10.0))
        .unwrap();
    assert_eq!(boosted.status, LinkStatus::Pass);
}

#[test]
fn below_threshold_blocks_traffic() {
    let ctx = EmulatorContext::new();
    let id = ctx
        .create_channel(OrbitType::Leo, &ChannelOptions::default())
        .unwrap();

    let state = ctx.set_elevation(id, 4.0).unwrap();
    assert!(!state.visible);
    assert!(matches!(
        ctx.apply_channel(id, &tone()),
        Err(EmulatorError::NotVisible { .. })
    ));
    assert!(matches!(
        ctx.get_link_budget(id, &LinkBudgetRequest::default()),
        Err(EmulatorError::NotVisible { .. })
    ));
}

#[test]
fn deleted_channel_is_gone() {
    let ctx = EmulatorContext::new();
    let id = ctx
        .create_channel(OrbitType::Leo, &ChannelOptions::default())
        .unwrap();
    ctx.delete_channel(id).unwrap();

    let err = ctx.get_channel_state(id).unwrap_err();
    assert!(matches!(err, EmulatorError::NotFound { .. }));
    assert!(ctx.set_elevation(id, 45.0).is_err());
    assert!(ctx.list_channels().is_empty());
}

#[tokio::test(start_paused = true)]
async fn leo_pass_sweeps_elevation_and_doppler() {
    let ctx = EmulatorContext::new();
    let id = ctx
        .create_channel(OrbitType::Leo, &ChannelOptions::default())
        .unwrap();

    let started = ctx
        .start_dynamic_simulation(id, Duration::from_secs(60))
        .unwrap();
    assert_eq!(started, DynamicStart::Started);

    let rise = ctx.get_channel_state(id).unwrap();
    assert!(rise.is_dynamic());
    assert!((rise.elevation_deg - 10.0).abs() < 1e-6);
    assert!(rise.doppler_hz.unwrap() > 0.0);

    tokio::time::sleep(Duration::from_secs(30)).await;
    let peak = ctx.get_channel_state(id).unwrap();
    assert!(peak.elevation_deg > 80.0, "peak {}", peak.elevation_deg);
    assert!(peak.doppler_hz.unwrap().abs() < rise.doppler_hz.unwrap());

    tokio::time::sleep(Duration::from_millis(30_500)).await;
    let set = ctx.get_channel_state(id).unwrap();
    assert_eq!(set.mode, LinkMode::Static);
    assert_eq!(set.elapsed_s, Some(60.0));
    assert!(set.elevation_deg < peak.elevation_deg);
    assert!(set.doppler_hz.unwrap() < 0.0);
    assert!(set.slant_range_km.unwrap() > peak.slant_range_km.unwrap());
}

#[tokio::test(start_paused = true)]
async fn haps_pass_holds_pointing() {
    let ctx = EmulatorContext::new();
    let id = ctx
        .create_channel(OrbitType::Haps, &ChannelOptions::default().elevation_deg(70.0))
        .unwrap();
    ctx.start_dynamic_simulation(id, Duration::from_secs(600))
        .unwrap();

    tokio::time::sleep(Duration::from_secs(150)).await;
    let state = ctx.get_channel_state(id).unwrap();
    assert!((state.elevation_deg - 70.0).abs() < 1e-9);
    assert!(state.doppler_hz.unwrap() > 0.0);
    assert!(ctx.stop_dynamic_simulation(id).unwrap());
}

#[test]
fn dc_calibration_nulls_bias() {
    let ctx = EmulatorContext::new();
    let dev = ctx.create_device(DeviceClass::X310);
    let report = ctx.calibrate_dc_offset(dev).unwrap();
    assert!(report.residual_dc < 5e-3, "residual {}", report.residual_dc);
    assert!(ctx.device_info(dev).unwrap().calibration.is_dc_calibrated());
}

#[test]
fn iq_calibration_improves_image_rejection() {
    let ctx = EmulatorContext::new();
    let dev = ctx.create_device(DeviceClass::B210);
    let report = ctx.calibrate_iq_imbalance(dev).unwrap();
    assert!(report.image_rejection_after_db.unwrap() > report.image_rejection_before_db.unwrap());
    assert!(report.iq_gain.unwrap() > 1.0);
}

#[test]
fn weak_capture_leaves_calibration_untouched() {
    let ctx = EmulatorContext::new();
    let dev = ctx.create_device(DeviceClass::B210);
    ctx.configure(dev, &DeviceSettings::default().rx_gain(0.0))
        .unwrap();
    let before = ctx.device_info(dev).unwrap().calibration;

    let err = ctx.calibrate_dc_offset(dev).unwrap_err();
    assert!(matches!(err, EmulatorError::InsufficientSignal { .. }));
    assert_eq!(ctx.device_info(dev).unwrap().calibration, before);
}

#[test]
fn out_of_range_configuration_is_rejected() {
    let ctx = EmulatorContext::new();
    let dev = ctx.create_device(DeviceClass::X310);
    let before = ctx.device_info(dev).unwrap();

    let err = ctx
        .configure(dev, &DeviceSettings::default().rx_gain(10.0).tx_gain(45.0))
        .unwrap_err();
    assert!(matches!(
        err,
        EmulatorError::OutOfRange {
            parameter: "tx_gain_db",
            ..
        }
    ));
    assert_eq!(ctx.device_info(dev).unwrap(), before);
}

#[test]
fn loopback_through_leo_channel() {
    let ctx = EmulatorContext::new();
    let ch = ctx
        .create_channel(OrbitType::Leo, &ChannelOptions::default().seed(11))
        .unwrap();
    let dev = ctx.create_device(DeviceClass::X310);
    ctx.attach_channel(dev, ch).unwrap();

    let stimulus = tone();
    ctx.transmit(dev, &stimulus).unwrap();
    let rx = ctx.receive(dev, stimulus.len()).unwrap();

    assert_eq!(rx.samples.len(), stimulus.len());
    assert_eq!(rx.channel_id, Some(ch));
    assert!(rx.doppler_hz.unwrap() > 0.0);
    assert!(rx.path_loss_db.unwrap() > 150.0);
}

#[test]
fn receive_below_threshold_keeps_recorded_samples() {
    let ctx = EmulatorContext::new();
    let ch = ctx
        .create_channel(OrbitType::Leo, &ChannelOptions::default())
        .unwrap();
    let dev = ctx.create_device(DeviceClass::X310);
    ctx.attach_channel(dev, ch).unwrap();

    let stimulus = signal::test_tone(250e3, 1e-4, 0.5, 30.72e6).unwrap();
    ctx.transmit(dev, &stimulus).unwrap();
    let before = ctx.device_info(dev).unwrap().buffered_samples;
    assert_eq!(before, stimulus.len());

    ctx.set_elevation(ch, 4.0).unwrap();
    let err = ctx.receive(dev, 1000).unwrap_err();
    assert!(matches!(err, EmulatorError::NotVisible { .. }));
    assert_eq!(ctx.device_info(dev).unwrap().buffered_samples, before);
}
