//! Active network-quality probing.
//!
//! Runs on its own cadence, independent of the notification-driven monitor
//! core: each round measures round-trip times against a fixed target,
//! derives loss and jitter, reads TCP retransmission counters where the
//! platform provides them, and posts the resulting [`QualitySample`] into
//! the dispatcher as an opaque event.

mod runner;
mod stats;

pub use runner::ProbeRunner;
pub use stats::{probe_round, RttStats};

use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Default number of round-trips per probe round.
pub const DEFAULT_PROBE_COUNT: usize = 4;

/// Default per-probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default pause between probe rounds.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The probe got no reply within its timeout.
    #[error("probe timed out")]
    TimedOut,

    /// The probe transport failed outright.
    #[error("probe transport error: {0}")]
    Transport(String),
}

/// One round-trip measurement. Implementations are free to use whatever
/// transport the platform offers (ICMP echo, TCP connect, ...).
pub trait Prober: Send {
    fn probe(&mut self, timeout: Duration) -> Result<Duration, ProbeError>;
}

/// Portable prober that times a TCP connect handshake to the target.
///
/// Not as clean as an ICMP echo (it includes connection setup on the far
/// end) but requires no privileges and works everywhere.
pub struct TcpProber {
    target: SocketAddr,
}

impl TcpProber {
    pub fn new(target: SocketAddr) -> Self {
        Self { target }
    }
}

impl Prober for TcpProber {
    fn probe(&mut self, timeout: Duration) -> Result<Duration, ProbeError> {
        let start = Instant::now();
        match std::net::TcpStream::connect_timeout(&self.target, timeout) {
            Ok(stream) => {
                let rtt = start.elapsed();
                drop(stream);
                Ok(rtt)
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Err(ProbeError::TimedOut),
            Err(e) => Err(ProbeError::Transport(e.to_string())),
        }
    }
}

/// Provider of cumulative TCP segment counters `(sent, retransmitted)`.
/// Returns `None` where the platform exposes no such statistics; the
/// retransmission fields of the sample stay empty in that case.
pub trait RetransmitCounters: Send {
    fn counters(&mut self) -> Option<(u64, u64)>;
}

/// Counter provider for platforms without TCP statistics.
pub struct NoRetransmitCounters;

impl RetransmitCounters for NoRetransmitCounters {
    fn counters(&mut self) -> Option<(u64, u64)> {
        None
    }
}

/// Probe cadence and burst configuration.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Round-trips per round.
    pub probe_count: usize,
    /// Per-probe timeout.
    pub timeout: Duration,
    /// Pause between rounds.
    pub interval: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            probe_count: DEFAULT_PROBE_COUNT,
            timeout: DEFAULT_PROBE_TIMEOUT,
            interval: DEFAULT_PROBE_INTERVAL,
        }
    }
}
