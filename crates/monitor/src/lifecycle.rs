//! Lifecycle manager: platform context, registrations, consumer thread.
//!
//! Owns everything with a teardown obligation — the platform handles, both
//! subscription guards, the probe thread and the consumer thread — and
//! releases them in strict reverse order of acquisition. `stop()` is
//! idempotent, safe after a partial `start()`, and never fails outwardly;
//! `Drop` runs it as the process-exit safety hook so no platform
//! registration can outlive the monitor.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use linkwatch_bus::{DispatchReceiver, DispatchSender, EventDispatcher};
use linkwatch_events::{MonitorEvent, QualitySample};
use linkwatch_platform::{Platform, PlatformHandles, Subscription};
use linkwatch_probe::{ProbeConfig, ProbeRunner, Prober, RetransmitCounters};

use crate::wireless::{DEFAULT_THRESHOLD_DROP, DEFAULT_THRESHOLD_RECOVER};
use crate::{connectivity, LogCallback, LogChannel, SignalWatch, StartError, SubscriptionError};

const COMPONENT: &str = "monitor";

/// Host callback for reachability changes.
pub type ConnectivityCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Host callback for hysteresis transitions: `(became_weak, quality, rssi_dbm)`.
pub type SignalCallback = Arc<dyn Fn(bool, u8, i32) + Send + Sync>;

/// Host callback for opaque quality-probe samples.
pub type QualityCallback = Arc<dyn Fn(&QualitySample) + Send + Sync>;

/// Builds the probe transport for each monitoring session.
pub type ProbeFactory =
    Box<dyn Fn() -> (Box<dyn Prober>, Box<dyn RetransmitCounters>) + Send + Sync>;

/// Outcome of one subscriber's registration attempt during `start()`.
#[derive(Debug)]
pub enum SubscriberStatus {
    Active,
    /// Registration failed; logged, no retry. The other subscriber is
    /// unaffected.
    Failed(SubscriptionError),
}

impl SubscriberStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, SubscriberStatus::Active)
    }
}

/// What `start()` actually brought up. `start()` succeeds as long as the
/// platform context did; individual subscriber failures are reported here.
#[derive(Debug)]
pub struct StartReport {
    pub connectivity: SubscriberStatus,
    pub wireless: SubscriberStatus,
}

impl StartReport {
    pub fn all_active(&self) -> bool {
        self.connectivity.is_active() && self.wireless.is_active()
    }
}

/// Process-wide handle bundle: the platform sources plus the live
/// registration guards. Created in `start()`, destroyed in `stop()`; passed
/// by reference to whatever needs it, never a hidden global.
struct MonitorContext {
    handles: PlatformHandles,
    connectivity_sub: Option<Subscription>,
    wireless_sub: Option<Subscription>,
}

#[derive(Default)]
struct CallbackRegistry {
    connectivity: Mutex<Option<ConnectivityCallback>>,
    signal: Mutex<Option<SignalCallback>>,
    quality: Mutex<Option<QualityCallback>>,
}

/// Everything alive between `start()` and `stop()`.
struct Running {
    context: MonitorContext,
    sender: DispatchSender,
    consumer: Option<JoinHandle<()>>,
    probe: Option<ProbeRunner>,
    // Kept for state introspection; its mutable state is shared with the
    // wireless callback closure.
    signal: Option<SignalWatch>,
}

/// The monitor facade exposed to the host integration layer.
pub struct NetworkMonitor {
    platform: Arc<dyn Platform>,
    callbacks: Arc<CallbackRegistry>,
    log: LogChannel,
    threshold_drop: u8,
    threshold_recover: u8,
    probe: Option<(ProbeConfig, ProbeFactory)>,
    running: Option<Running>,
}

impl NetworkMonitor {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self {
            platform,
            callbacks: Arc::new(CallbackRegistry::default()),
            log: LogChannel::new(),
            threshold_drop: DEFAULT_THRESHOLD_DROP,
            threshold_recover: DEFAULT_THRESHOLD_RECOVER,
            probe: None,
            running: None,
        }
    }

    /// Register the host's reachability callback.
    pub fn on_connectivity(&self, callback: ConnectivityCallback) {
        *self
            .callbacks
            .connectivity
            .lock()
            .expect("callback mutex poisoned") = Some(callback);
    }

    /// Register the host's signal callback and the hysteresis thresholds it
    /// wants. Thresholds are validated at `start()`; an empty or inverted
    /// band fails the wireless subscriber only.
    pub fn on_signal(
        &mut self,
        callback: SignalCallback,
        threshold_drop: u8,
        threshold_recover: u8,
    ) {
        *self
            .callbacks
            .signal
            .lock()
            .expect("callback mutex poisoned") = Some(callback);
        self.threshold_drop = threshold_drop;
        self.threshold_recover = threshold_recover;
    }

    /// Register the host's quality callback. Samples are relayed opaquely;
    /// the monitor never interprets their fields.
    pub fn on_quality(&self, callback: QualityCallback) {
        *self
            .callbacks
            .quality
            .lock()
            .expect("callback mutex poisoned") = Some(callback);
    }

    /// Register the host's plain-text log sink.
    pub fn on_log(&self, callback: LogCallback) {
        self.log.set_sink(callback);
    }

    /// Enable the quality probe for subsequent sessions.
    pub fn set_probe(&mut self, config: ProbeConfig, factory: ProbeFactory) {
        self.probe = Some((config, factory));
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Snapshot of the wireless hysteresis state, if that subscriber is up.
    pub fn signal_state(&self) -> Option<crate::SignalState> {
        self.running
            .as_ref()
            .and_then(|running| running.signal.as_ref())
            .map(SignalWatch::state)
    }

    /// Bring monitoring up.
    ///
    /// Creates the platform context (fatal on failure), spawns the consumer
    /// thread, then registers the connectivity and wireless subscribers in
    /// that order. Each registration failure is independent and non-fatal:
    /// `start()` still succeeds and the [`StartReport`] says which
    /// subscriber is down.
    pub fn start(&mut self) -> Result<StartReport, StartError> {
        if self.running.is_some() {
            self.log
                .warn(COMPONENT, format_args!("start called while running"));
            return Err(StartError::AlreadyStarted);
        }

        let handles = self.platform.init()?;
        self.log.info(COMPONENT, format_args!("platform context up"));

        let mut dispatcher = EventDispatcher::new();
        let sender = dispatcher.sender();
        let receiver = dispatcher
            .take_receiver()
            .expect("fresh dispatcher always has a receiver");
        let consumer = spawn_consumer(receiver, Arc::clone(&self.callbacks), self.log.clone());

        let mut context = MonitorContext {
            handles,
            connectivity_sub: None,
            wireless_sub: None,
        };

        let connectivity_status = match connectivity::register(
            context.handles.connectivity.as_ref(),
            sender.clone(),
            self.log.clone(),
        ) {
            Ok(sub) => {
                context.connectivity_sub = Some(sub);
                SubscriberStatus::Active
            }
            Err(e) => {
                self.log.error(
                    COMPONENT,
                    format_args!("connectivity subscriber failed: {e}"),
                );
                SubscriberStatus::Failed(e)
            }
        };

        let mut signal = None;
        let wireless_status = match SignalWatch::initialize(
            context.handles.wireless.as_ref(),
            self.threshold_drop,
            self.threshold_recover,
            &self.log,
        )
        .and_then(|watch| {
            let sub = watch.register(
                context.handles.wireless.as_ref(),
                sender.clone(),
                self.log.clone(),
            )?;
            Ok((watch, sub))
        }) {
            Ok((watch, sub)) => {
                context.wireless_sub = Some(sub);
                signal = Some(watch);
                SubscriberStatus::Active
            }
            Err(e) => {
                self.log
                    .error(COMPONENT, format_args!("wireless subscriber failed: {e}"));
                SubscriberStatus::Failed(e)
            }
        };

        let probe = self.probe.as_ref().map(|(config, factory)| {
            let (prober, counters) = factory();
            ProbeRunner::start(config.clone(), prober, counters, sender.clone())
        });

        let report = StartReport {
            connectivity: connectivity_status,
            wireless: wireless_status,
        };
        self.log.info(
            COMPONENT,
            format_args!(
                "started (connectivity={}, wireless={})",
                report.connectivity.is_active(),
                report.wireless.is_active()
            ),
        );

        self.running = Some(Running {
            context,
            sender,
            consumer: Some(consumer),
            probe,
            signal,
        });
        Ok(report)
    }

    /// Tear monitoring down, strict reverse of acquisition: probe, wireless
    /// registration, connectivity registration, dispatcher, consumer thread,
    /// platform context. Safe to call repeatedly, before `start()`, or after
    /// a partial `start()` — only what was actually acquired is released.
    /// Never fails; internal errors are logged and teardown proceeds.
    pub fn stop(&mut self) {
        let Some(mut running) = self.running.take() else {
            tracing::debug!("stop: monitor not running");
            return;
        };
        self.log.info(COMPONENT, format_args!("stopping"));

        if let Some(mut probe) = running.probe.take() {
            probe.stop();
        }

        // Unregister before releasing anything the callbacks depend on;
        // after cancel returns, the platform no longer invokes them.
        if let Some(mut sub) = running.context.wireless_sub.take() {
            sub.cancel();
        }
        if let Some(mut sub) = running.context.connectivity_sub.take() {
            sub.cancel();
        }

        running.sender.shutdown();
        if let Some(consumer) = running.consumer.take() {
            if consumer.join().is_err() {
                tracing::error!("consumer thread panicked during shutdown");
            }
        }

        // Dropping the context releases the subscriber state and the
        // platform handles last.
        drop(running);
        self.log.info(COMPONENT, format_args!("stopped"));
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The single consumption point: drains the dispatcher and runs host
/// callbacks. Host-facing side effects happen here and nowhere else.
fn spawn_consumer(
    mut receiver: DispatchReceiver,
    callbacks: Arc<CallbackRegistry>,
    log: LogChannel,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("linkwatch-consumer".into())
        .spawn(move || {
            while let Some(event) = receiver.recv() {
                match event {
                    MonitorEvent::ConnectivityChanged { has_internet } => {
                        let callback = callbacks
                            .connectivity
                            .lock()
                            .expect("callback mutex poisoned")
                            .clone();
                        if let Some(callback) = callback {
                            run_host_callback("connectivity", || callback(has_internet));
                        }
                    }
                    MonitorEvent::SignalChanged {
                        became_weak,
                        quality,
                        rssi_dbm,
                    } => {
                        let callback = callbacks
                            .signal
                            .lock()
                            .expect("callback mutex poisoned")
                            .clone();
                        if let Some(callback) = callback {
                            run_host_callback("signal", || {
                                callback(became_weak, quality, rssi_dbm)
                            });
                        }
                    }
                    MonitorEvent::Quality(sample) => {
                        let callback = callbacks
                            .quality
                            .lock()
                            .expect("callback mutex poisoned")
                            .clone();
                        if let Some(callback) = callback {
                            run_host_callback("quality", || callback(&sample));
                        }
                    }
                }
            }
            log.info(COMPONENT, format_args!("consumer thread exiting"));
        })
        .expect("failed to spawn consumer thread")
}

/// A fault in a host callback must not take down the consumer thread.
fn run_host_callback(name: &str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::error!(callback = name, "host callback panicked; suppressed");
    }
}
