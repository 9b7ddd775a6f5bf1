//! Network state monitor core.
//!
//! Converts platform-delivered notifications — Internet reachability and
//! wireless link quality, arriving on threads the OS owns — into an ordered
//! event stream consumed on one dedicated thread, where the host's callbacks
//! run. The three pieces:
//!
//! - [`connectivity`]: reachability subscriber with initial-state snapshot
//!   and mandatory de-duplication.
//! - [`wireless`]: link-quality subscriber running the weak/strong
//!   hysteresis state machine.
//! - [`NetworkMonitor`]: lifecycle manager owning the platform context, all
//!   registration handles, the consumer thread, and the quality probe, with
//!   reverse-order idempotent teardown.

pub mod connectivity;
mod lifecycle;
mod logging;
pub mod wireless;

pub use lifecycle::{
    ConnectivityCallback, NetworkMonitor, ProbeFactory, QualityCallback, SignalCallback,
    StartReport, SubscriberStatus,
};
pub use logging::{LogCallback, LogChannel, LogLevel};
pub use wireless::{to_rssi, SignalState, SignalWatch};

use linkwatch_platform::PlatformError;

/// A specific subscriber failed to register. Fatal to that subscriber only;
/// the other one continues independently. No automatic retry.
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    /// The hysteresis band is empty, inverted, or outside the 0..=100
    /// quality scale; configuration error.
    #[error(
        "invalid signal thresholds: drop={threshold_drop} recover={threshold_recover} \
         (need drop < recover and recover <= 100)"
    )]
    InvalidThresholds {
        threshold_drop: u8,
        threshold_recover: u8,
    },

    /// The platform rejected the registration.
    #[error("platform subscription failed: {0}")]
    Platform(#[from] PlatformError),
}

/// `start()` failed as a whole. The process keeps running, just without
/// monitoring.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// The one-time platform runtime context failed to initialize.
    #[error("platform initialization failed: {0}")]
    Platform(#[from] PlatformError),

    /// `start()` was called while the monitor is already running.
    #[error("monitor already started")]
    AlreadyStarted,
}
