//! Channel-backed notifier
//!
//! [`ChannelNotifier`] implements [`INotifier`] over an unbounded mpsc
//! channel. Every line is also written to the tracing log, which is the
//! durable record; the channel feeds whatever front-end is attached (the
//! daemon prints to stdout). A dropped receiver is not an error.

use tokio::sync::mpsc;
use tracing::{error, info};

use dirmirror_core::ports::{INotifier, Severity, StatusLine};

/// Tracing target of status lines, for front-ends that print them already.
pub const STATUS_TARGET: &str = "dirmirror::status";

/// Publishes status lines to a channel and to the log
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<StatusLine>,
}

impl ChannelNotifier {
    /// Creates a notifier and the receiver its lines arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusLine>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl INotifier for ChannelNotifier {
    fn emit(&self, line: StatusLine) {
        match line.severity {
            Severity::Info => info!(target: STATUS_TARGET, "{}", line.message),
            Severity::Error => error!(target: STATUS_TARGET, "{}", line.message),
        }
        // at-most-once: nobody listening is fine
        let _ = self.tx.send(line);
    }
}
