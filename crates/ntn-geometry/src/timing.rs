//! NR NTN timing helpers: round-trip time, common timing advance and
//! HARQ K_offset derived from the one-way feeder/service delay.

use serde::{Deserialize, Serialize};

/// NR basic time unit Ts = 1 / (15 kHz * 2048)
pub const NR_TS_S: f64 = 1.0 / (15_000.0 * 2048.0);

/// K_offset bounds for GEO (slots)
pub const GEO_K_OFFSET_MIN: u32 = 150;
pub const GEO_K_OFFSET_MAX: u32 = 239;

/// Slot duration for 15 kHz subcarrier spacing
pub const SLOT_DURATION_MS: f64 = 1.0;

pub fn round_trip_s(one_way_delay_s: f64) -> f64 {
    2.0 * one_way_delay_s
}

/// Common timing advance in Ts units
pub fn common_timing_advance_ts(one_way_delay_s: f64) -> u64 {
    (round_trip_s(one_way_delay_s) / NR_TS_S).floor().max(0.0) as u64
}

/// HARQ K_offset in slots, clamped to the GEO range
pub fn geo_k_offset_slots(rtt_s: f64) -> u32 {
    let slots = (rtt_s * 1000.0 / SLOT_DURATION_MS).ceil().max(0.0) as u32;
    slots.clamp(GEO_K_OFFSET_MIN, GEO_K_OFFSET_MAX)
}

/// Timing summary for a given one-way delay
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TimingAdvance {
    pub rtt_ms: f64,
    pub common_ta_ts: u64,
    pub k_offset_slots: u32,
}

impl TimingAdvance {
    pub fn from_delay(one_way_delay_s: f64) -> Self {
        let rtt = round_trip_s(one_way_delay_s);
        Self {
            rtt_ms: rtt * 1e3,
            common_ta_ts: common_timing_advance_ts(one_way_delay_s),
            k_offset_slots: geo_k_offset_slots(rtt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{propagation_delay_s, slant_range_km};

    #[test]
    fn test_geo_timing() {
        let delay = propagation_delay_s(slant_range_km(45.0, 35_786.0));
        let ta = TimingAdvance::from_delay(delay);

        assert!((ta.rtt_ms - 249.6).abs() < 2.0, "rtt {}", ta.rtt_ms);
        // ~250 ms RTT exceeds the GEO ceiling
        assert_eq!(ta.k_offset_slots, GEO_K_OFFSET_MAX);
        assert!(ta.common_ta_ts > 7_000_000);
    }

    #[test]
    fn test_k_offset_floor() {
        assert_eq!(geo_k_offset_slots(0.010), GEO_K_OFFSET_MIN);
        assert_eq!(geo_k_offset_slots(0.2001), 201);
    }
}
