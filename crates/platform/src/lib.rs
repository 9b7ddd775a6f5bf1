//! Platform boundary for the network monitor.
//!
//! The OS delivers connectivity and wireless notifications by invoking
//! registered callbacks on threads it owns. This crate pins that boundary
//! down to two traits — subscribe plus a one-shot state query each — and an
//! opaque cancel-once [`Subscription`] guard, so the core never touches a
//! raw platform handle. [`SimulatedPlatform`] is the in-memory
//! implementation used by tests and headless runs.

mod sim;
mod subscription;

pub use sim::SimulatedPlatform;
pub use subscription::Subscription;

use std::sync::Arc;

use linkwatch_events::ConnectivityFlags;

/// Errors crossing the platform boundary.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// The one-time runtime context failed to come up.
    #[error("platform runtime initialization failed: {0}")]
    InitFailed(String),

    /// A subscribe call was rejected.
    #[error("subscription rejected: {0}")]
    SubscribeFailed(String),

    /// No wireless interface was enumerated at subscribe time.
    #[error("no wireless interface available")]
    NoInterface,

    /// A one-shot state query failed; state stays unknown.
    #[error("state query failed: {0}")]
    QueryFailed(String),
}

/// Callback invoked by the platform on connectivity change. Runs on a
/// platform-owned thread; must be short and non-blocking.
pub type ConnectivityObserver = Arc<dyn Fn(ConnectivityFlags) + Send + Sync>;

/// Callback invoked by the platform on wireless notifications.
pub type WirelessObserver = Arc<dyn Fn(WirelessNotification) + Send + Sync>;

/// Source class a wireless notification originated from. Subscribers filter
/// on this; only [`NotificationClass::MediaSpecific`] carries link-quality
/// information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationClass {
    /// Media-specific module: connect/disconnect/quality changes.
    MediaSpecific,
    /// Auto-configuration service chatter.
    AutoConfig,
    /// Scan-complete announcements.
    ScanComplete,
}

/// Link change carried by a wireless notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Link is up with the given quality (0..=100). Covers both connect
    /// and quality-change notifications.
    Quality(u8),
    /// Link went down.
    Disconnected,
}

/// A wireless notification as delivered to an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WirelessNotification {
    pub class: NotificationClass,
    pub event: LinkEvent,
}

/// Connectivity-change notification source.
pub trait ConnectivitySource: Send + Sync {
    /// Register for change notifications. Notifications fire on change only;
    /// pair with [`query`](Self::query) for the initial state.
    ///
    /// Dropping (or cancelling) the returned [`Subscription`] unregisters
    /// the observer; after cancel returns the platform guarantees the
    /// observer is no longer being invoked.
    fn subscribe(&self, observer: ConnectivityObserver) -> Result<Subscription, PlatformError>;

    /// One-shot query of the current flag set.
    fn query(&self) -> Result<ConnectivityFlags, PlatformError>;
}

/// Wireless link-quality notification source.
///
/// Operates on exactly one interface — the first the platform enumerates at
/// subscribe time. Multi-interface behavior is undefined; this is a known
/// limitation, not silently generalized.
pub trait WirelessSource: Send + Sync {
    /// Register for wireless notifications of every class; observers filter
    /// by [`NotificationClass`] themselves.
    fn subscribe(&self, observer: WirelessObserver) -> Result<Subscription, PlatformError>;

    /// One-shot query of the current link quality (0..=100) on the first
    /// enumerated interface.
    fn query_quality(&self) -> Result<u8, PlatformError>;
}

/// Notification sources handed out by a successful platform init.
#[derive(Clone)]
pub struct PlatformHandles {
    pub connectivity: Arc<dyn ConnectivitySource>,
    pub wireless: Arc<dyn WirelessSource>,
}

/// Process-wide platform entry point.
pub trait Platform: Send + Sync {
    /// One-time runtime initialization, safe to call once per session.
    /// Hands back the notification sources on success.
    fn init(&self) -> Result<PlatformHandles, PlatformError>;
}
