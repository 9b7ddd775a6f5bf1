//! Wireless link-quality subscriber with hysteresis.
//!
//! Quality near a single boundary value would flap a naive threshold on
//! every sample. The state machine instead uses two thresholds: quality must
//! fall to `threshold_drop` to enter the weak state and climb to
//! `threshold_recover` to leave it. The band between them is a dead zone —
//! samples there update the last-known quality and emit nothing. That dead
//! zone is the anti-flapping mechanism and is never narrowed.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use linkwatch_bus::DispatchSender;
use linkwatch_events::MonitorEvent;
use linkwatch_platform::{
    LinkEvent, NotificationClass, Subscription, WirelessNotification, WirelessSource,
};

use crate::{LogChannel, SubscriptionError};

const COMPONENT: &str = "wlan";

/// Default hysteresis thresholds when the host configures none.
pub const DEFAULT_THRESHOLD_DROP: u8 = 30;
pub const DEFAULT_THRESHOLD_RECOVER: u8 = 40;

/// Approximate a dBm signal strength from a 0..=100 quality score.
///
/// This is a linear mapping, not a calibrated radio measurement; treat the
/// result as an estimate for display and heuristics only.
pub fn to_rssi(quality: u8) -> i32 {
    match quality {
        0 => -100,
        q if q >= 100 => -50,
        q => i32::from(q) / 2 - 100,
    }
}

/// Hysteresis state. Exclusively owned by the wireless subscriber; written
/// only on its callback path (plus once at baseline time).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalState {
    pub threshold_drop: u8,
    pub threshold_recover: u8,
    pub is_weak: bool,
    pub last_quality: u8,
}

impl SignalState {
    /// Apply one quality sample. Returns the transition to emit, if any.
    fn apply(&mut self, quality: u8) -> Option<bool> {
        let transition = if !self.is_weak && quality <= self.threshold_drop {
            self.is_weak = true;
            Some(true)
        } else if self.is_weak && quality >= self.threshold_recover {
            self.is_weak = false;
            Some(false)
        } else {
            None
        };
        self.last_quality = quality;
        transition
    }
}

/// Wireless signal subscriber.
///
/// Operates on exactly one interface — whichever the platform enumerates
/// first at subscribe time. Multi-interface behavior is undefined; this is
/// a known limitation.
pub struct SignalWatch {
    state: Arc<Mutex<SignalState>>,
}

impl SignalWatch {
    /// Validate the hysteresis band and establish the silent baseline.
    ///
    /// Queries the current quality once and sets
    /// `is_weak = quality <= threshold_drop` without emitting an event —
    /// baseline establishment is silent by design. A failed query is
    /// transient: logged, baseline assumed strong, corrected by the first
    /// notification.
    pub fn initialize(
        source: &dyn WirelessSource,
        threshold_drop: u8,
        threshold_recover: u8,
        log: &LogChannel,
    ) -> Result<Self, SubscriptionError> {
        // Quality is 0..=100; a recover threshold above the scale can never
        // be reached, leaving the machine stuck weak.
        if threshold_recover <= threshold_drop || threshold_recover > 100 {
            return Err(SubscriptionError::InvalidThresholds {
                threshold_drop,
                threshold_recover,
            });
        }

        let baseline = match source.query_quality() {
            Ok(quality) => quality,
            Err(e) => {
                log.warn(
                    COMPONENT,
                    format_args!("initial quality query failed: {e}"),
                );
                // Unknown baseline reads as strong; the first weak sample
                // then emits the drop transition.
                threshold_recover
            }
        };

        let state = SignalState {
            threshold_drop,
            threshold_recover,
            is_weak: baseline <= threshold_drop,
            last_quality: baseline,
        };
        log.info(
            COMPONENT,
            format_args!(
                "baseline quality={} weak={} (drop<={}, recover>={})",
                state.last_quality, state.is_weak, threshold_drop, threshold_recover
            ),
        );

        Ok(Self {
            state: Arc::new(Mutex::new(state)),
        })
    }

    /// Subscribe to wireless notifications, filtered to the media-specific
    /// class; auto-config, scan-complete and other chatter is ignored.
    pub fn register(
        &self,
        source: &dyn WirelessSource,
        sender: DispatchSender,
        log: LogChannel,
    ) -> Result<Subscription, SubscriptionError> {
        let state = Arc::clone(&self.state);
        let observer = Arc::new(move |notification: WirelessNotification| {
            let result = catch_unwind(AssertUnwindSafe(|| {
                handle_notification(notification, &state, &sender, &log);
            }));
            if result.is_err() {
                tracing::error!("wireless callback panicked; suppressed at boundary");
            }
        });

        Ok(source.subscribe(observer)?)
    }

    /// Snapshot of the current hysteresis state.
    pub fn state(&self) -> SignalState {
        self.state.lock().expect("signal state mutex poisoned").clone()
    }
}

fn handle_notification(
    notification: WirelessNotification,
    state: &Mutex<SignalState>,
    sender: &DispatchSender,
    log: &LogChannel,
) {
    if notification.class != NotificationClass::MediaSpecific {
        return;
    }

    match notification.event {
        LinkEvent::Disconnected => {
            let mut state = state.lock().expect("signal state mutex poisoned");
            state.last_quality = 0;
            state.is_weak = false;
            drop(state);
            log.info(COMPONENT, format_args!("link down, signal baseline reset"));
        }
        LinkEvent::Quality(quality) => {
            let transition = state
                .lock()
                .expect("signal state mutex poisoned")
                .apply(quality);

            if let Some(became_weak) = transition {
                if became_weak {
                    log.info(
                        COMPONENT,
                        format_args!("signal dropped into weak band, quality={quality}"),
                    );
                } else {
                    log.info(
                        COMPONENT,
                        format_args!("signal recovered, quality={quality}"),
                    );
                }
                sender.post(MonitorEvent::SignalChanged {
                    became_weak,
                    quality,
                    rssi_dbm: to_rssi(quality),
                });
            }
        }
    }
}
