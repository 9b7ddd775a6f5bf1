//! Background probe thread with explicit start/stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use linkwatch_bus::DispatchSender;
use linkwatch_events::MonitorEvent;

use crate::stats::probe_round;
use crate::{ProbeConfig, Prober, RetransmitCounters};

/// Granularity at which the sleeping probe thread re-checks the stop flag.
const STOP_POLL: Duration = Duration::from_millis(100);

/// Owns the probe thread. One round per `config.interval`; each sample is
/// posted to the dispatcher as [`MonitorEvent::Quality`].
pub struct ProbeRunner {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ProbeRunner {
    /// Spawn the probe thread. It probes immediately, then once per interval.
    pub fn start(
        config: ProbeConfig,
        mut prober: Box<dyn Prober>,
        mut counters: Box<dyn RetransmitCounters>,
        sender: DispatchSender,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = std::thread::Builder::new()
            .name("linkwatch-probe".into())
            .spawn(move || {
                tracing::debug!(
                    probe_count = config.probe_count,
                    interval_secs = config.interval.as_secs(),
                    "quality probe started"
                );
                while flag.load(Ordering::SeqCst) {
                    let round_start = Instant::now();
                    let sample = probe_round(
                        prober.as_mut(),
                        counters.as_mut(),
                        config.probe_count,
                        config.timeout,
                    );
                    tracing::debug!(?sample, "quality round complete");
                    sender.post(MonitorEvent::Quality(sample));

                    // Sleep out the rest of the interval, staying responsive
                    // to stop().
                    while flag.load(Ordering::SeqCst)
                        && round_start.elapsed() < config.interval
                    {
                        let remaining = config.interval - round_start.elapsed();
                        std::thread::sleep(remaining.min(STOP_POLL));
                    }
                }
                tracing::debug!("quality probe stopped");
            })
            .expect("failed to spawn probe thread");

        Self {
            running,
            handle: Some(handle),
        }
    }

    /// Stop the probe thread and wait for it to exit. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for ProbeRunner {
    fn drop(&mut self) {
        self.stop();
    }
}
