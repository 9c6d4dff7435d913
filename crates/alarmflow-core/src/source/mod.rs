// ── Alarm sources ──
//
// An alarm source owns one ingestion channel and runs on its own
// thread. It reports parsed alarms through an `AlarmSink` and stops when
// its cancellation token fires.

mod archive;
mod fax;

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub use archive::{archive_file_name, move_file, move_with_retry, unique_archive_path, unique_path};
pub use fax::FaxAlarmSource;

use crate::config::DEFAULT_POLL_INTERVAL;
use crate::error::CoreError;
use crate::model::{AlarmEvent, ContextParameters, Operation};
use crate::registry::Services;

/// Upper bound on how long a cancellable sleep ignores its token.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// One ingestion channel.
pub trait AlarmSource: Send {
    fn name(&self) -> &str;

    /// Prepare the source. An error keeps this source from starting.
    fn initialize(&mut self, services: &Services) -> Result<(), CoreError>;

    /// One scan of the channel. Raised alarms go to `sink`.
    fn poll_once(&mut self, sink: &AlarmSink, cancel: &CancellationToken) -> Result<(), CoreError>;

    fn poll_interval(&self) -> Duration {
        DEFAULT_POLL_INTERVAL
    }

    /// Poll until `cancel` fires. Errors of a single pass are logged and
    /// the loop carries on.
    fn run(&mut self, sink: &AlarmSink, cancel: &CancellationToken) -> Result<(), CoreError> {
        while !cancel.is_cancelled() {
            if let Err(e) = self.poll_once(sink, cancel) {
                warn!(source = sink.source(), error = %e, "polling pass failed");
            }
            if !sleep_cancellable(self.poll_interval(), cancel) {
                break;
            }
        }
        Ok(())
    }

    fn dispose(&mut self) {}
}

// ── AlarmSink ───────────────────────────────────────────────────────

/// Sending half of the NewAlarm channel, stamped with the source alias.
#[derive(Debug, Clone)]
pub struct AlarmSink {
    source: String,
    tx: mpsc::UnboundedSender<AlarmEvent>,
}

impl AlarmSink {
    pub fn new(source: impl Into<String>, tx: mpsc::UnboundedSender<AlarmEvent>) -> Self {
        Self {
            source: source.into(),
            tx,
        }
    }

    /// A new sink and the receiver its events arrive on.
    pub fn channel(source: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<AlarmEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(source, tx), rx)
    }

    /// The same channel, stamped with another alias.
    pub fn for_source(&self, source: impl Into<String>) -> Self {
        Self::new(source, self.tx.clone())
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Raise a NewAlarm event. Returns `false` once the engine stopped listening.
    pub fn raise(&self, operation: Operation, parameters: ContextParameters) -> bool {
        self.send(AlarmEvent {
            source: self.source.clone(),
            operation: Some(operation),
            parameters,
        })
    }

    /// Forward a pre-built event unchanged.
    pub fn send(&self, event: AlarmEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Sleep for `duration` in short slices.
///
/// Returns `false` if `cancel` fired before the time was up.
pub fn sleep_cancellable(duration: Duration, cancel: &CancellationToken) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return true;
        }
        std::thread::sleep(left.min(SLEEP_SLICE));
    }
}
