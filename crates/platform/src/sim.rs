//! In-memory platform for tests and headless runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use linkwatch_events::ConnectivityFlags;

use crate::{
    ConnectivityObserver, ConnectivitySource, LinkEvent, NotificationClass, Platform,
    PlatformError, PlatformHandles, Subscription, WirelessNotification, WirelessObserver,
    WirelessSource,
};

#[derive(Default)]
struct SimState {
    connectivity: ConnectivityFlags,
    quality: u8,
    connectivity_observers: HashMap<u64, ConnectivityObserver>,
    wireless_observers: HashMap<u64, WirelessObserver>,
}

/// Simulated notification platform.
///
/// Observers are registered in a table behind one mutex, and notification
/// delivery iterates the table while holding that mutex. Unsubscribe locks
/// the same mutex to remove the entry, so — like the real platform's
/// unregister/flush semantics — once `cancel` returns, no delivery is in
/// flight and none will start.
///
/// Tests drive it by calling [`set_connectivity`](Self::set_connectivity) /
/// [`send_quality`](Self::send_quality) from whatever threads they like,
/// standing in for the platform's own callback threads.
#[derive(Clone, Default)]
pub struct SimulatedPlatform {
    state: Arc<Mutex<SimState>>,
    next_id: Arc<AtomicU64>,
    fail_init: Arc<AtomicBool>,
    fail_connectivity_subscribe: Arc<AtomicBool>,
    fail_wireless_subscribe: Arc<AtomicBool>,
    fail_queries: Arc<AtomicBool>,
    no_wireless_interface: Arc<AtomicBool>,
}

impl SimulatedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed state without notifying anyone (what a query would observe).
    pub fn seed(&self, flags: ConnectivityFlags, quality: u8) {
        let mut state = self.state.lock().expect("sim state mutex poisoned");
        state.connectivity = flags;
        state.quality = quality;
    }

    /// Update connectivity and notify registered observers, as the platform
    /// does on change. Runs on the caller's thread.
    pub fn set_connectivity(&self, flags: ConnectivityFlags) {
        let state = &mut *self.state.lock().expect("sim state mutex poisoned");
        state.connectivity = flags;
        for observer in state.connectivity_observers.values() {
            observer(flags);
        }
    }

    /// Deliver a wireless notification of an arbitrary class.
    pub fn notify_wireless(&self, notification: WirelessNotification) {
        let state = &*self.state.lock().expect("sim state mutex poisoned");
        for observer in state.wireless_observers.values() {
            observer(notification);
        }
    }

    /// Update quality and deliver a media-specific quality notification.
    pub fn send_quality(&self, quality: u8) {
        let state = &mut *self.state.lock().expect("sim state mutex poisoned");
        state.quality = quality;
        let notification = WirelessNotification {
            class: NotificationClass::MediaSpecific,
            event: LinkEvent::Quality(quality),
        };
        for observer in state.wireless_observers.values() {
            observer(notification);
        }
    }

    /// Deliver a media-specific disconnect notification.
    pub fn send_disconnect(&self) {
        self.notify_wireless(WirelessNotification {
            class: NotificationClass::MediaSpecific,
            event: LinkEvent::Disconnected,
        });
    }

    pub fn connectivity_subscriber_count(&self) -> usize {
        self.state
            .lock()
            .expect("sim state mutex poisoned")
            .connectivity_observers
            .len()
    }

    pub fn wireless_subscriber_count(&self) -> usize {
        self.state
            .lock()
            .expect("sim state mutex poisoned")
            .wireless_observers
            .len()
    }

    // Failure injection for lifecycle tests.

    pub fn fail_init(&self, fail: bool) {
        self.fail_init.store(fail, Ordering::SeqCst);
    }

    pub fn fail_connectivity_subscribe(&self, fail: bool) {
        self.fail_connectivity_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn fail_wireless_subscribe(&self, fail: bool) {
        self.fail_wireless_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub fn no_wireless_interface(&self, missing: bool) {
        self.no_wireless_interface.store(missing, Ordering::SeqCst);
    }
}

impl ConnectivitySource for SimulatedPlatform {
    fn subscribe(&self, observer: ConnectivityObserver) -> Result<Subscription, PlatformError> {
        if self.fail_connectivity_subscribe.load(Ordering::SeqCst) {
            return Err(PlatformError::SubscribeFailed(
                "simulated connectivity subscribe failure".into(),
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .expect("sim state mutex poisoned")
            .connectivity_observers
            .insert(id, observer);

        let state = Arc::clone(&self.state);
        Ok(Subscription::new(move || {
            state
                .lock()
                .expect("sim state mutex poisoned")
                .connectivity_observers
                .remove(&id);
            tracing::debug!(id, "simulated connectivity subscription cancelled");
        }))
    }

    fn query(&self) -> Result<ConnectivityFlags, PlatformError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(PlatformError::QueryFailed(
                "simulated query failure".into(),
            ));
        }
        Ok(self.state.lock().expect("sim state mutex poisoned").connectivity)
    }
}

impl WirelessSource for SimulatedPlatform {
    fn subscribe(&self, observer: WirelessObserver) -> Result<Subscription, PlatformError> {
        if self.fail_wireless_subscribe.load(Ordering::SeqCst) {
            return Err(PlatformError::SubscribeFailed(
                "simulated wireless subscribe failure".into(),
            ));
        }
        if self.no_wireless_interface.load(Ordering::SeqCst) {
            return Err(PlatformError::NoInterface);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .expect("sim state mutex poisoned")
            .wireless_observers
            .insert(id, observer);

        let state = Arc::clone(&self.state);
        Ok(Subscription::new(move || {
            state
                .lock()
                .expect("sim state mutex poisoned")
                .wireless_observers
                .remove(&id);
            tracing::debug!(id, "simulated wireless subscription cancelled");
        }))
    }

    fn query_quality(&self) -> Result<u8, PlatformError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(PlatformError::QueryFailed(
                "simulated query failure".into(),
            ));
        }
        if self.no_wireless_interface.load(Ordering::SeqCst) {
            return Err(PlatformError::NoInterface);
        }
        Ok(self.state.lock().expect("sim state mutex poisoned").quality)
    }
}

impl Platform for SimulatedPlatform {
    fn init(&self) -> Result<PlatformHandles, PlatformError> {
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(PlatformError::InitFailed(
                "simulated runtime init failure".into(),
            ));
        }
        Ok(PlatformHandles {
            connectivity: Arc::new(self.clone()),
            wireless: Arc::new(self.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_subscribe_notify_unsubscribe() {
        let platform = SimulatedPlatform::new();
        let hits = Arc::new(AtomicU32::new(0));

        let counter = hits.clone();
        let mut sub = ConnectivitySource::subscribe(
            &platform,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();
        assert_eq!(platform.connectivity_subscriber_count(), 1);

        platform.set_connectivity(ConnectivityFlags::ipv4_internet());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        sub.cancel();
        assert_eq!(platform.connectivity_subscriber_count(), 0);
        platform.set_connectivity(ConnectivityFlags::DISCONNECTED);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_query_reflects_seeded_state() {
        let platform = SimulatedPlatform::new();
        platform.seed(ConnectivityFlags::ipv6_internet(), 72);

        assert!(ConnectivitySource::query(&platform).unwrap().has_internet());
        assert_eq!(platform.query_quality().unwrap(), 72);
    }

    #[test]
    fn test_failure_injection() {
        let platform = SimulatedPlatform::new();
        platform.fail_queries(true);
        assert!(matches!(
            ConnectivitySource::query(&platform),
            Err(PlatformError::QueryFailed(_))
        ));

        platform.no_wireless_interface(true);
        platform.fail_queries(false);
        assert!(matches!(
            platform.query_quality(),
            Err(PlatformError::NoInterface)
        ));
        assert!(matches!(
            WirelessSource::subscribe(&platform, Arc::new(|_| {})),
            Err(PlatformError::NoInterface)
        ));
    }

    #[test]
    fn test_dropping_guard_unregisters() {
        let platform = SimulatedPlatform::new();
        {
            let _sub = WirelessSource::subscribe(&platform, Arc::new(|_| {})).unwrap();
            assert_eq!(platform.wireless_subscriber_count(), 1);
        }
        assert_eq!(platform.wireless_subscriber_count(), 0);
    }
}
