//! Cancel-once guard for a platform registration.

/// Opaque token returned by a platform subscribe call.
///
/// Owns whatever undoes the registration (an unadvise cookie, a notification
/// deregistration, a handle close) as a closure that runs exactly once —
/// either on an explicit [`cancel`](Self::cancel) or on drop. The guard is
/// the single owner of the registration; it is never copied, and cancelling
/// twice is a no-op rather than an error.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap the unregister action for a live registration.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription that never registered anything; cancelling it does
    /// nothing. Lets callers treat "registration failed" uniformly.
    pub fn empty() -> Self {
        Self { cancel: None }
    }

    /// Unregister now. Idempotent; safe on an [`empty`](Self::empty) guard.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Whether the registration is still live.
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
