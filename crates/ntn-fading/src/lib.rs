//! Multipath Fading
//!
//! Tapped-delay-line channel responses applied to complex baseband buffers.
//!
//! | Profile | Taps | Use case |
//! |---------|------|----------|
//! | `los` / `awgn` | 1 | line of sight, identity |
//! | `tdl-a` | 3 | sparse multipath |
//! | `tdl-b` | 5 | moderate multipath |
//! | `tdl-c` | 7 | severe, dense multipath |
//! | `tdl-d` / `tdl-e` | 4 | time-varying multipath |
//!
//! Tap delays and powers are illustrative and can be replaced with
//! [`TapDelayProfile::custom`].

use thiserror::Error;

pub mod engine;
pub mod profile;

pub use engine::{FadingEngine, ResolvedTap};
pub use profile::{FadingProfile, Tap, TapDelayProfile};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FadingError {
    #[error("Unknown fading profile: {0}")]
    InvalidProfile(String),
    #[error("Profile {0} has no taps")]
    EmptyProfile(String),
    #[error("Invalid tap in {profile}: {reason}")]
    InvalidTap { profile: String, reason: String },
    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(f64),
}

pub type Result<T> = std::result::Result<T, FadingError>;
