//! Shared event contracts for the network monitor.
//!
//! This crate defines the formal contracts (DTOs) that flow from the
//! platform subscribers through the dispatcher to the host integration
//! layer. Using shared types keeps producers and the single consumer in
//! agreement without runtime deserialization surprises.

mod connectivity;
mod quality;

pub use connectivity::ConnectivityFlags;
pub use quality::QualitySample;

use serde::{Deserialize, Serialize};

/// Event delivered to the single consumer of the dispatcher.
///
/// Producers: connectivity subscriber, wireless subscriber, quality probe
/// Consumers: the monitor's consumer thread (host callback relay)
///
/// Immutable once constructed; each event is consumed exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// Internet reachability flipped (already de-duplicated by the producer).
    ConnectivityChanged {
        /// Simplified reachability derived from the platform flag set.
        has_internet: bool,
    },
    /// The wireless hysteresis state machine crossed a threshold.
    SignalChanged {
        /// True when the signal just entered the weak state.
        became_weak: bool,
        /// Link quality 0..=100 that triggered the transition.
        quality: u8,
        /// Approximate signal strength derived from `quality`.
        rssi_dbm: i32,
    },
    /// Periodic quality-probe sample, relayed opaquely to the host.
    Quality(QualitySample),
}
