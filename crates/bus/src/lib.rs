//! Event dispatcher bridging platform callback threads to one consumer.
//!
//! Platform notification callbacks run on threads the OS owns and schedules;
//! they must never block and must never re-enter host code. The dispatcher
//! gives them a non-blocking `post` and gives the single consumer thread a
//! blocking `recv`, with an explicit shutdown signal that unblocks the
//! consumer without tearing the channel out from under in-flight producers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use linkwatch_events::MonitorEvent;

/// Wire format on the internal channel. The shutdown sentinel travels the
/// same queue as events so everything posted before shutdown is still
/// delivered, in order, before the consumer unblocks for the last time.
enum Envelope {
    Event(MonitorEvent),
    Shutdown,
}

/// Producer half of the dispatcher. Cheap to clone into platform callbacks.
#[derive(Clone)]
pub struct DispatchSender {
    tx: Sender<Envelope>,
    closed: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl DispatchSender {
    /// Post an event from any thread. Never blocks the caller.
    ///
    /// Returns true if the event was enqueued. After `shutdown` the event is
    /// dropped and counted; a warning is logged but no error is raised, so a
    /// stale platform callback can never fault the process.
    pub fn post(&self, event: MonitorEvent) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            // Rate-limit: a stale callback can fire repeatedly during teardown
            if dropped % 16 == 1 {
                tracing::warn!(dropped, "dispatcher shut down, dropping event");
            }
            return false;
        }

        match self.tx.send(Envelope::Event(event)) {
            Ok(()) => true,
            Err(_) => {
                // Receiver gone without shutdown(): treat like post-shutdown.
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped % 16 == 1 {
                    tracing::warn!(dropped, "dispatcher receiver gone, dropping event");
                }
                false
            }
        }
    }

    /// Signal shutdown. Unblocks a waiting `recv` after all previously
    /// posted events have been consumed. Idempotent.
    pub fn shutdown(&self) {
        let already = self.closed.swap(true, Ordering::SeqCst);
        if already {
            return;
        }
        tracing::debug!("dispatcher shutting down");
        let _ = self.tx.send(Envelope::Shutdown);
    }

    /// Whether `shutdown` has been signalled.
    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of events dropped after shutdown: posted late, or enqueued
    /// behind the sentinel by a post that raced `shutdown`.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer half of the dispatcher. Exactly one consumption point.
pub struct DispatchReceiver {
    rx: Receiver<Envelope>,
    dropped: Arc<AtomicU64>,
    finished: bool,
}

impl DispatchReceiver {
    /// Block until the next event is available.
    ///
    /// Returns `None` once the shutdown sentinel has been consumed (and on
    /// every call after that). Events posted before shutdown are all
    /// delivered first, in per-producer order.
    pub fn recv(&mut self) -> Option<MonitorEvent> {
        if self.finished {
            return None;
        }
        match self.rx.recv() {
            Ok(Envelope::Event(event)) => Some(event),
            Ok(Envelope::Shutdown) => {
                self.finished = true;
                self.drain_stranded();
                None
            }
            Err(_) => {
                self.finished = true;
                None
            }
        }
    }

    /// Non-blocking variant; `None` means "nothing queued right now" until
    /// shutdown has been observed, after which it always means "done".
    pub fn try_recv(&mut self) -> Option<MonitorEvent> {
        if self.finished {
            return None;
        }
        match self.rx.try_recv() {
            Ok(Envelope::Event(event)) => Some(event),
            Ok(Envelope::Shutdown) => {
                self.finished = true;
                self.drain_stranded();
                None
            }
            Err(crossbeam_channel::TryRecvError::Empty) => None,
            Err(crossbeam_channel::TryRecvError::Disconnected) => {
                self.finished = true;
                None
            }
        }
    }

    /// Whether the shutdown sentinel has been consumed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// A post that passes the closed-flag check while `shutdown` enqueues
    /// the sentinel can land its event behind it. Those events were reported
    /// as enqueued, so count them as dropped rather than losing them
    /// silently.
    fn drain_stranded(&mut self) {
        let mut stranded = 0u64;
        while let Ok(envelope) = self.rx.try_recv() {
            if matches!(envelope, Envelope::Event(_)) {
                stranded += 1;
            }
        }
        if stranded > 0 {
            self.dropped.fetch_add(stranded, Ordering::Relaxed);
            tracing::warn!(stranded, "events enqueued during shutdown were dropped");
        }
    }
}

/// The dispatcher itself: hands out clonable senders and the take-once
/// receiver.
pub struct EventDispatcher {
    sender: DispatchSender,
    receiver: Option<DispatchReceiver>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        // Unbounded: `post` must never block a platform thread, and the
        // contract is no-loss while running. Event rates here are a handful
        // per state change, not a firehose.
        let (tx, rx) = crossbeam_channel::unbounded();
        let dropped = Arc::new(AtomicU64::new(0));
        Self {
            sender: DispatchSender {
                tx,
                closed: Arc::new(AtomicBool::new(false)),
                dropped: Arc::clone(&dropped),
            },
            receiver: Some(DispatchReceiver {
                rx,
                dropped,
                finished: false,
            }),
        }
    }

    /// Get a clone of the producer half.
    pub fn sender(&self) -> DispatchSender {
        self.sender.clone()
    }

    /// Take the consumer half (can only be called once).
    pub fn take_receiver(&mut self) -> Option<DispatchReceiver> {
        self.receiver.take()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connectivity(has_internet: bool) -> MonitorEvent {
        MonitorEvent::ConnectivityChanged { has_internet }
    }

    #[test]
    fn test_post_then_recv_in_order() {
        let mut dispatcher = EventDispatcher::new();
        let sender = dispatcher.sender();
        let mut receiver = dispatcher.take_receiver().unwrap();

        assert!(sender.post(connectivity(true)));
        assert!(sender.post(connectivity(false)));

        assert_eq!(receiver.recv(), Some(connectivity(true)));
        assert_eq!(receiver.recv(), Some(connectivity(false)));
    }

    #[test]
    fn test_receiver_taken_once() {
        let mut dispatcher = EventDispatcher::new();
        assert!(dispatcher.take_receiver().is_some());
        assert!(dispatcher.take_receiver().is_none());
    }

    #[test]
    fn test_shutdown_unblocks_after_queued_events() {
        let mut dispatcher = EventDispatcher::new();
        let sender = dispatcher.sender();
        let mut receiver = dispatcher.take_receiver().unwrap();

        sender.post(connectivity(true));
        sender.shutdown();

        // Queued event still delivered before the sentinel.
        assert_eq!(receiver.recv(), Some(connectivity(true)));
        assert_eq!(receiver.recv(), None);
        assert!(receiver.is_finished());
        // Every later recv stays unblocked.
        assert_eq!(receiver.recv(), None);
    }

    #[test]
    fn test_post_after_shutdown_is_dropped_and_counted() {
        let mut dispatcher = EventDispatcher::new();
        let sender = dispatcher.sender();
        let mut receiver = dispatcher.take_receiver().unwrap();

        sender.shutdown();
        assert!(!sender.post(connectivity(true)));
        assert!(!sender.post(connectivity(false)));
        assert_eq!(sender.dropped_events(), 2);

        assert_eq!(receiver.recv(), None);
    }

    #[test]
    fn test_event_enqueued_behind_sentinel_is_counted_dropped() {
        let mut dispatcher = EventDispatcher::new();
        let sender = dispatcher.sender();
        let mut receiver = dispatcher.take_receiver().unwrap();

        // Reproduce the interleaving where a post wins the closed-flag check
        // but loses the enqueue race against the sentinel.
        sender.tx.send(Envelope::Event(connectivity(true))).unwrap();
        sender.tx.send(Envelope::Shutdown).unwrap();
        sender.tx.send(Envelope::Event(connectivity(false))).unwrap();

        assert_eq!(receiver.recv(), Some(connectivity(true)));
        assert_eq!(receiver.recv(), None);
        assert!(receiver.is_finished());
        // The stranded event is neither delivered nor silently lost.
        assert_eq!(sender.dropped_events(), 1);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut dispatcher = EventDispatcher::new();
        let sender = dispatcher.sender();
        let mut receiver = dispatcher.take_receiver().unwrap();

        sender.shutdown();
        sender.shutdown();
        assert_eq!(receiver.recv(), None);
    }

    #[test]
    fn test_shutdown_unblocks_waiting_receiver() {
        let mut dispatcher = EventDispatcher::new();
        let sender = dispatcher.sender();
        let mut receiver = dispatcher.take_receiver().unwrap();

        let blocker = std::thread::spawn(move || receiver.recv());
        std::thread::sleep(std::time::Duration::from_millis(50));
        sender.shutdown();
        assert_eq!(blocker.join().unwrap(), None);
    }

    #[test]
    fn test_concurrent_producers_no_loss_no_duplication() {
        const PRODUCERS: usize = 8;
        const EVENTS_PER_PRODUCER: u8 = 50;

        let mut dispatcher = EventDispatcher::new();
        let mut receiver = dispatcher.take_receiver().unwrap();

        let handles: Vec<_> = (0..PRODUCERS)
            .map(|producer| {
                let sender = dispatcher.sender();
                std::thread::spawn(move || {
                    for i in 0..EVENTS_PER_PRODUCER {
                        // Distinct (producer, i) payload via the quality field.
                        sender.post(MonitorEvent::SignalChanged {
                            became_weak: producer % 2 == 0,
                            quality: i,
                            rssi_dbm: producer as i32,
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        dispatcher.sender().shutdown();

        let mut seen = std::collections::HashSet::new();
        let mut per_producer_last: Vec<Option<u8>> = vec![None; PRODUCERS];
        while let Some(event) = receiver.recv() {
            let MonitorEvent::SignalChanged {
                quality, rssi_dbm, ..
            } = event
            else {
                panic!("unexpected event variant");
            };
            assert!(
                seen.insert((rssi_dbm, quality)),
                "duplicate event ({rssi_dbm}, {quality})"
            );
            // Per-producer FIFO.
            let last = &mut per_producer_last[rssi_dbm as usize];
            if let Some(prev) = *last {
                assert!(quality > prev, "producer {rssi_dbm} out of order");
            }
            *last = Some(quality);
        }
        assert_eq!(seen.len(), PRODUCERS * EVENTS_PER_PRODUCER as usize);
    }
}
