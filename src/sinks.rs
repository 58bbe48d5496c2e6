//! Capability interfaces the scheduler reports through: a small set of
//! traits where components expose operations, not events, so callers
//! implement only the subset they care about and the scheduler never needs
//! to know who, if anyone, is listening.

use tokio::sync::mpsc;

use crate::filter::UrlRecord;
use crate::scheduler::Stats;

/// Periodic progress updates.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, stats: &Stats);
}

/// Accepted, filtered URLs, with their originating dork.
pub trait ResultSink: Send + Sync {
    fn on_result(&self, dork: &str, record: &UrlRecord);
}

/// Non-fatal errors surfaced during a run (parse errors, transport failures).
pub trait ErrorSink: Send + Sync {
    fn on_error(&self, message: &str);
}

/// No-op sinks for tests and embedders that don't need observability.
pub struct NullProgressSink;
impl ProgressSink for NullProgressSink {
    fn on_progress(&self, _stats: &Stats) {}
}

pub struct NullResultSink;
impl ResultSink for NullResultSink {
    fn on_result(&self, _dork: &str, _record: &UrlRecord) {}
}

pub struct NullErrorSink;
impl ErrorSink for NullErrorSink {
    fn on_error(&self, _message: &str) {}
}

/// Forwards accepted results over a bounded channel. A full or closed channel
/// is treated as "no one is listening" rather than a fatal error — the
/// scheduler doesn't depend on the sink draining.
#[derive(Clone)]
pub struct ChannelResultSink {
    tx: mpsc::Sender<(String, UrlRecord)>,
}

impl ChannelResultSink {
    pub fn new(tx: mpsc::Sender<(String, UrlRecord)>) -> Self {
        Self { tx }
    }
}

impl ResultSink for ChannelResultSink {
    fn on_result(&self, dork: &str, record: &UrlRecord) {
        let _ = self.tx.try_send((dork.to_string(), record.clone()));
    }
}

/// Prints a one-line stats summary per tick; used by the headless binary for
/// progress output when there's no interactive display attached.
pub struct StdoutProgressSink;

impl ProgressSink for StdoutProgressSink {
    fn on_progress(&self, stats: &Stats) {
        println!(
            "[{}] completed={} failed={} pending={} running={} unique_urls={} rate={:.1}% concurrency={} eta={}",
            stats.state_label(),
            stats.completed_dorks,
            stats.failed_dorks,
            stats.pending_dorks,
            stats.running_tasks,
            stats.unique_urls,
            stats.success_rate * 100.0,
            stats.current_concurrency,
            stats.eta,
        );
    }
}
