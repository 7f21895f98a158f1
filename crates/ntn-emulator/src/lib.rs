//! NTN Channel & Front-End Emulator
//!
//! Ties geometry, propagation loss, multipath fading and RF front-end
//! impairments into live channel instances and simulated transceivers,
//! addressed through an [`EmulatorContext`].
//!
//! ## Signal path
//!
//! ```text
//! transmit -> TX gain -> TX impairments -> loopback record
//!          -> channel (loss, fading, Doppler, AWGN)
//!          -> RX gain -> RX impairments -> calibration correction -> receive
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use ntn_emulator::{ChannelOptions, EmulatorContext, OrbitType};
//!
//! let ctx = EmulatorContext::new();
//! let id = ctx.create_channel(OrbitType::Geo, &ChannelOptions::default())?;
//! let state = ctx.get_channel_state(id)?;
//! println!("delay {:?} ms", state.delay_ms());
//! # Ok::<(), ntn_emulator::EmulatorError>(())
//! ```

pub mod channel;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod ids;

pub use channel::{ChannelInstance, ChannelOutput, ChannelSnapshot, DynamicStart, LinkMode};
pub use config::{ChannelConfiguration, ChannelOptions};
pub use context::EmulatorContext;
pub use device::{DeviceInfo, RxBuffer, SimulatedDevice};
pub use error::{EmulatorError, Result};
pub use ids::{ChannelId, DeviceId};

pub use ntn_geometry::{OrbitType, PassProfile};
pub use ntn_propagation::{LinkBudget, LinkBudgetRequest, LinkStatus};
pub use rf_frontend::{CalibrationReport, DeviceClass, DeviceSettings, IqSample};
