//! Per-round statistics: latency spread, jitter, loss, retransmission.

use std::time::Duration;

use linkwatch_events::QualitySample;

use crate::{Prober, RetransmitCounters};

/// Latency statistics for one probe round.
#[derive(Debug, Clone, PartialEq)]
pub struct RttStats {
    pub avg_ms: u32,
    pub min_ms: u32,
    pub max_ms: u32,
    pub jitter_ms: u32,
    pub loss_percent: f32,
}

impl RttStats {
    /// Compute the round statistics from successful round-trips.
    ///
    /// `attempted` is the full burst size; the difference against
    /// `rtts_ms.len()` is what counts as loss. An empty `rtts_ms` (every
    /// probe timed out) yields zeroed latencies and 100% loss rather than
    /// an error, matching how a dead link should read.
    pub fn from_rtts(rtts_ms: &[u32], attempted: usize) -> Self {
        if rtts_ms.is_empty() || attempted == 0 {
            return Self {
                avg_ms: 0,
                min_ms: 0,
                max_ms: 0,
                jitter_ms: 0,
                loss_percent: 100.0,
            };
        }

        let min_ms = *rtts_ms.iter().min().expect("non-empty rtts");
        let max_ms = *rtts_ms.iter().max().expect("non-empty rtts");
        let sum: u64 = rtts_ms.iter().map(|&r| u64::from(r)).sum();
        let avg_ms = (sum / rtts_ms.len() as u64) as u32;
        let lost = attempted - rtts_ms.len().min(attempted);
        let loss_percent = (lost as f32 / attempted as f32) * 100.0;

        Self {
            avg_ms,
            min_ms,
            max_ms,
            jitter_ms: jitter_ms(rtts_ms),
            loss_percent,
        }
    }
}

/// Mean absolute delta between adjacent round-trips.
fn jitter_ms(rtts_ms: &[u32]) -> u32 {
    if rtts_ms.len() < 2 {
        return 0;
    }
    let sum: u64 = rtts_ms
        .windows(2)
        .map(|pair| u64::from(pair[0].abs_diff(pair[1])))
        .sum();
    (sum / (rtts_ms.len() as u64 - 1)) as u32
}

/// Run one full probe round and assemble the sample.
pub fn probe_round(
    prober: &mut dyn Prober,
    counters: &mut dyn RetransmitCounters,
    probe_count: usize,
    timeout: Duration,
) -> QualitySample {
    let mut rtts_ms = Vec::with_capacity(probe_count);
    for _ in 0..probe_count {
        match prober.probe(timeout) {
            Ok(rtt) => rtts_ms.push(rtt.as_millis().min(u128::from(u32::MAX)) as u32),
            Err(e) => tracing::debug!(error = %e, "probe attempt failed"),
        }
    }

    let rtt = RttStats::from_rtts(&rtts_ms, probe_count);
    let tcp = counters.counters().map(|(sent, retransmitted)| {
        let total = sent + retransmitted;
        let percent = if total == 0 {
            0.0
        } else {
            (retransmitted as f32 / total as f32) * 100.0
        };
        (percent, sent, retransmitted)
    });

    QualitySample {
        latency_avg_ms: Some(rtt.avg_ms),
        latency_min_ms: Some(rtt.min_ms),
        latency_max_ms: Some(rtt.max_ms),
        jitter_ms: Some(rtt.jitter_ms),
        packet_loss_percent: Some(rtt.loss_percent),
        tcp_retransmit_percent: tcp.map(|t| t.0),
        tcp_segments_sent: tcp.map(|t| t.1),
        tcp_segments_retransmitted: tcp.map(|t| t.2),
    }
}
