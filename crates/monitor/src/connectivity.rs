//! Internet-reachability subscriber.
//!
//! The platform only notifies on change, so registration takes one
//! synchronous snapshot and emits it as the initial event — otherwise the
//! consumer would sit in an "unknown" window until the network next moved.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use linkwatch_bus::DispatchSender;
use linkwatch_events::{ConnectivityFlags, MonitorEvent};
use linkwatch_platform::{ConnectivitySource, Subscription};

use crate::{LogChannel, SubscriptionError};

const COMPONENT: &str = "network";

/// Subscribe to connectivity changes and seed the initial state.
///
/// The callback derives `has_internet` from the flag set and posts a
/// [`MonitorEvent::ConnectivityChanged`] only when the derived value actually
/// changed — the platform is free to deliver repeated identical
/// notifications and those must not flood the stream.
///
/// If the initial query fails, the failure is transient: it is logged, the
/// last-known state stays unknown, and registration still succeeds; the
/// first notification then always emits.
pub fn register(
    source: &dyn ConnectivitySource,
    sender: DispatchSender,
    log: LogChannel,
) -> Result<Subscription, SubscriptionError> {
    // Written only from the platform callback (and once below at snapshot
    // time, before any notification can race it meaningfully — the de-dup
    // compare-and-set is inside one lock either way).
    let last_emitted: Arc<Mutex<Option<bool>>> = Arc::new(Mutex::new(None));

    let observer = {
        let last_emitted = Arc::clone(&last_emitted);
        let sender = sender.clone();
        let log = log.clone();
        Arc::new(move |flags: ConnectivityFlags| {
            // Nothing may unwind across the platform-owned callback thread.
            let result = catch_unwind(AssertUnwindSafe(|| {
                handle_notification(flags, &last_emitted, &sender, &log);
            }));
            if result.is_err() {
                tracing::error!("connectivity callback panicked; suppressed at boundary");
            }
        })
    };

    let subscription = source.subscribe(observer)?;

    match source.query() {
        Ok(flags) => {
            let has_internet = flags.has_internet();
            // A notification landing in the subscribe-to-query window has
            // already emitted this value; the snapshot must not repeat it.
            let mut last = last_emitted.lock().expect("connectivity state mutex poisoned");
            if *last != Some(has_internet) {
                *last = Some(has_internet);
                drop(last);
                log.info(
                    COMPONENT,
                    format_args!("registered, initial state: has_internet={has_internet}"),
                );
                sender.post(MonitorEvent::ConnectivityChanged { has_internet });
            }
        }
        Err(e) => {
            // Transient: state stays unknown, registration stands.
            log.warn(
                COMPONENT,
                format_args!("initial connectivity query failed: {e}"),
            );
        }
    }

    Ok(subscription)
}

fn handle_notification(
    flags: ConnectivityFlags,
    last_emitted: &Mutex<Option<bool>>,
    sender: &DispatchSender,
    log: &LogChannel,
) {
    let has_internet = flags.has_internet();
    tracing::debug!(?flags, has_internet, "connectivity notification");

    let mut last = last_emitted.lock().expect("connectivity state mutex poisoned");
    if *last == Some(has_internet) {
        return;
    }
    *last = Some(has_internet);
    drop(last);

    if has_internet {
        log.info(COMPONENT, format_args!("internet reachable"));
    } else {
        log.info(COMPONENT, format_args!("internet unreachable"));
    }
    sender.post(MonitorEvent::ConnectivityChanged { has_internet });
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkwatch_bus::EventDispatcher;
    use linkwatch_platform::SimulatedPlatform;

    fn drain(dispatcher: &mut EventDispatcher) -> Vec<MonitorEvent> {
        let mut receiver = dispatcher.take_receiver().unwrap();
        let mut events = Vec::new();
        while let Some(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_register_emits_initial_snapshot() {
        let platform = SimulatedPlatform::new();
        platform.seed(ConnectivityFlags::ipv4_internet(), 80);
        let mut dispatcher = EventDispatcher::new();

        let _sub = register(&platform, dispatcher.sender(), LogChannel::new()).unwrap();

        assert_eq!(
            drain(&mut dispatcher),
            vec![MonitorEvent::ConnectivityChanged { has_internet: true }]
        );
    }

    #[test]
    fn test_duplicate_notifications_are_deduplicated() {
        let platform = SimulatedPlatform::new();
        platform.seed(ConnectivityFlags::ipv4_internet(), 80);
        let mut dispatcher = EventDispatcher::new();
        let _sub = register(&platform, dispatcher.sender(), LogChannel::new()).unwrap();

        // Same derived value through different flag sets: no new events.
        platform.set_connectivity(ConnectivityFlags::ipv4_internet());
        platform.set_connectivity(ConnectivityFlags::ipv6_internet());
        // A real change, then a repeat of it.
        platform.set_connectivity(ConnectivityFlags::DISCONNECTED);
        platform.set_connectivity(ConnectivityFlags::DISCONNECTED);

        assert_eq!(
            drain(&mut dispatcher),
            vec![
                MonitorEvent::ConnectivityChanged { has_internet: true },
                MonitorEvent::ConnectivityChanged {
                    has_internet: false
                },
            ]
        );
    }

    #[test]
    fn test_disconnect_transition_emits_exactly_once() {
        let platform = SimulatedPlatform::new();
        platform.seed(ConnectivityFlags::ipv4_internet(), 80);
        let mut dispatcher = EventDispatcher::new();
        let _sub = register(&platform, dispatcher.sender(), LogChannel::new()).unwrap();

        platform.set_connectivity(ConnectivityFlags::DISCONNECTED);
        platform.set_connectivity(ConnectivityFlags::local_only());
        platform.set_connectivity(ConnectivityFlags::DISCONNECTED);

        let events = drain(&mut dispatcher);
        // Initial true, then one false for the transition; local_only does
        // not change the derived value so the second DISCONNECTED is a
        // repeat, not a new transition.
        assert_eq!(
            events,
            vec![
                MonitorEvent::ConnectivityChanged { has_internet: true },
                MonitorEvent::ConnectivityChanged {
                    has_internet: false
                },
            ]
        );
    }

    #[test]
    fn test_query_failure_is_transient_and_first_notification_emits() {
        let platform = SimulatedPlatform::new();
        platform.fail_queries(true);
        let mut dispatcher = EventDispatcher::new();

        let sub = register(&platform, dispatcher.sender(), LogChannel::new());
        assert!(sub.is_ok(), "query failure must not block registration");

        // No initial event; state is unknown, so the first notification
        // always emits, even for "no internet".
        platform.fail_queries(false);
        platform.set_connectivity(ConnectivityFlags::local_only());

        assert_eq!(
            drain(&mut dispatcher),
            vec![MonitorEvent::ConnectivityChanged {
                has_internet: false
            }]
        );
    }

    /// Source where a notification fires between subscribe and the snapshot
    /// query, the narrow window the platform is free to race into.
    struct NotifyDuringQuery {
        inner: SimulatedPlatform,
    }

    impl ConnectivitySource for NotifyDuringQuery {
        fn subscribe(
            &self,
            observer: linkwatch_platform::ConnectivityObserver,
        ) -> Result<Subscription, linkwatch_platform::PlatformError> {
            ConnectivitySource::subscribe(&self.inner, observer)
        }

        fn query(&self) -> Result<ConnectivityFlags, linkwatch_platform::PlatformError> {
            self.inner.set_connectivity(ConnectivityFlags::ipv4_internet());
            ConnectivitySource::query(&self.inner)
        }
    }

    #[test]
    fn test_notification_in_snapshot_window_does_not_duplicate() {
        let source = NotifyDuringQuery {
            inner: SimulatedPlatform::new(),
        };
        let mut dispatcher = EventDispatcher::new();

        let _sub = register(&source, dispatcher.sender(), LogChannel::new()).unwrap();

        // The racing notification already emitted `true`; the snapshot sees
        // the same value and stays quiet.
        assert_eq!(
            drain(&mut dispatcher),
            vec![MonitorEvent::ConnectivityChanged { has_internet: true }]
        );
    }

    #[test]
    fn test_subscribe_failure_surfaces_as_subscription_error() {
        let platform = SimulatedPlatform::new();
        platform.fail_connectivity_subscribe(true);
        let dispatcher = EventDispatcher::new();

        let result = register(&platform, dispatcher.sender(), LogChannel::new());
        assert!(matches!(result, Err(SubscriptionError::Platform(_))));
    }

    #[test]
    fn test_cancelled_subscription_stops_events() {
        let platform = SimulatedPlatform::new();
        platform.seed(ConnectivityFlags::ipv4_internet(), 80);
        let mut dispatcher = EventDispatcher::new();
        let mut sub = register(&platform, dispatcher.sender(), LogChannel::new()).unwrap();

        sub.cancel();
        platform.set_connectivity(ConnectivityFlags::DISCONNECTED);

        // Only the initial snapshot made it through.
        assert_eq!(
            drain(&mut dispatcher),
            vec![MonitorEvent::ConnectivityChanged { has_internet: true }]
        );
        assert_eq!(platform.connectivity_subscriber_count(), 0);
    }
}
