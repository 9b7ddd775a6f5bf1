//! Host-facing log channel.
//!
//! The host consumes logs as plain text lines, not a structured protocol:
//! leveled, timestamped, tagged by component (`"[network] ..."`). Lines are
//! produced from platform callback threads, which must never run host code,
//! so delivery is decoupled: producers enqueue the formatted line on a
//! non-blocking channel and a relay thread invokes the sink. Internally every
//! line is also mirrored to `tracing` so headless runs and tests get
//! structured logs without registering a sink.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::Local;
use crossbeam_channel::Sender;

/// Text sink registered by the host. Invoked from the relay thread, never
/// from a platform callback thread.
pub type LogCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn tag(self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Cloneable handle to the (optional) host log sink.
#[derive(Clone)]
pub struct LogChannel {
    tx: Sender<String>,
    sink: Arc<Mutex<Option<LogCallback>>>,
}

impl LogChannel {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded::<String>();
        let sink: Arc<Mutex<Option<LogCallback>>> = Arc::new(Mutex::new(None));

        // The relay thread is the only place the host sink runs; producers
        // just enqueue. It exits once the last handle (and with it the
        // sender) is gone.
        let relay_sink = Arc::clone(&sink);
        std::thread::Builder::new()
            .name("linkwatch-log".into())
            .spawn(move || {
                while let Ok(line) = rx.recv() {
                    let sink = relay_sink.lock().expect("log sink mutex poisoned").clone();
                    if let Some(sink) = sink {
                        sink(&line);
                    }
                }
            })
            .expect("failed to spawn log relay thread");

        Self { tx, sink }
    }

    /// Register the host's text callback. Replaces any previous sink.
    pub fn set_sink(&self, callback: LogCallback) {
        *self.sink.lock().expect("log sink mutex poisoned") = Some(callback);
    }

    pub fn info(&self, component: &str, message: fmt::Arguments<'_>) {
        self.emit(LogLevel::Info, component, message);
    }

    pub fn warn(&self, component: &str, message: fmt::Arguments<'_>) {
        self.emit(LogLevel::Warn, component, message);
    }

    pub fn error(&self, component: &str, message: fmt::Arguments<'_>) {
        self.emit(LogLevel::Error, component, message);
    }

    fn emit(&self, level: LogLevel, component: &str, message: fmt::Arguments<'_>) {
        match level {
            LogLevel::Info => tracing::info!(component, "{message}"),
            LogLevel::Warn => tracing::warn!(component, "{message}"),
            LogLevel::Error => tracing::error!(component, "{message}"),
        }

        if self.sink.lock().expect("log sink mutex poisoned").is_none() {
            return;
        }
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let line = format!("[{}] {} [{}] {}", level.tag(), timestamp, component, message);
        // Unbounded channel: never blocks the producer. If the relay is
        // already gone the line is simply lost.
        let _ = self.tx.send(line);
    }
}

impl Default for LogChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LogChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let has_sink = self
            .sink
            .lock()
            .map(|sink| sink.is_some())
            .unwrap_or(false);
        f.debug_struct("LogChannel").field("has_sink", &has_sink).finish()
    }
}
