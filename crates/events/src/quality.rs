//! Quality-probe sample contract.

use serde::{Deserialize, Serialize};

/// One round of active network-quality measurements.
///
/// Producers: quality probe (on its own cadence)
/// Consumers: host quality callback, via the dispatcher
///
/// The core relays these opaquely; none of the fields influence the
/// connectivity or wireless state machines. Fields are `Option` because a
/// round can partially fail (e.g. RTT measured but no retransmission
/// counters available on this platform).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySample {
    /// Mean round-trip time over the probe burst, in milliseconds.
    pub latency_avg_ms: Option<u32>,
    /// Fastest round-trip in the burst.
    pub latency_min_ms: Option<u32>,
    /// Slowest round-trip in the burst.
    pub latency_max_ms: Option<u32>,
    /// Mean delta between adjacent round-trips.
    pub jitter_ms: Option<u32>,
    /// Share of probes that got no reply, 0.0..=100.0.
    pub packet_loss_percent: Option<f32>,
    /// Retransmitted share of sent TCP segments, 0.0..=100.0.
    pub tcp_retransmit_percent: Option<f32>,
    /// Raw segment counters backing the retransmission rate.
    pub tcp_segments_sent: Option<u64>,
    pub tcp_segments_retransmitted: Option<u64>,
}

impl QualitySample {
    /// Sample representing a round where every probe timed out.
    pub fn total_loss() -> Self {
        Self {
            latency_avg_ms: Some(0),
            latency_min_ms: Some(0),
            latency_max_ms: Some(0),
            jitter_ms: Some(0),
            packet_loss_percent: Some(100.0),
            tcp_retransmit_percent: None,
            tcp_segments_sent: None,
            tcp_segments_retransmitted: None,
        }
    }
}
