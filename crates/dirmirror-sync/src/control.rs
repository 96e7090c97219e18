//! Control Bus: asynchronous signals into the engine
//!
//! Three level-triggered flags (credential changed, poll interval changed,
//! watched folder changed) live in a `tokio::sync::watch` channel; shutdown
//! is a [`CancellationToken`]. Collaborators raise signals from any task,
//! the engine clears them when it acts on them, and every blocking wait in
//! the engine goes through [`ControlBus::wait`] so it can be cut short.
//!
//! ```text
//! config watcher ─┐
//! signal handler ─┼─→ ControlBus ──→ SyncEngine (wait / take)
//! front-end      ─┘
//! ```

use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A named Control Bus signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    CredentialChanged,
    PollIntervalChanged,
    WatchedFolderChanged,
    ShutdownRequested,
}

/// Current state of the change flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Flags {
    credential_changed: bool,
    poll_interval_changed: bool,
    watched_folder_changed: bool,
}

impl Flags {
    fn get(&self, signal: Signal) -> bool {
        match signal {
            Signal::CredentialChanged => self.credential_changed,
            Signal::PollIntervalChanged => self.poll_interval_changed,
            Signal::WatchedFolderChanged => self.watched_folder_changed,
            Signal::ShutdownRequested => false,
        }
    }

    fn set(&mut self, signal: Signal, value: bool) -> bool {
        let slot = match signal {
            Signal::CredentialChanged => &mut self.credential_changed,
            Signal::PollIntervalChanged => &mut self.poll_interval_changed,
            Signal::WatchedFolderChanged => &mut self.watched_folder_changed,
            Signal::ShutdownRequested => return false,
        };
        let previous = *slot;
        *slot = value;
        previous != value
    }
}

/// Why an interruptible wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The full duration passed
    Elapsed,
    /// Shutdown was requested
    Shutdown,
    /// One of the requested signals is raised (it is not cleared)
    Signal(Signal),
}

/// Shared set of control signals
#[derive(Debug)]
pub struct ControlBus {
    flags: watch::Sender<Flags>,
    shutdown: CancellationToken,
}

impl ControlBus {
    pub fn new() -> Self {
        let (flags, _) = watch::channel(Flags::default());
        Self {
            flags,
            shutdown: CancellationToken::new(),
        }
    }

    /// Raises a signal. Raising `ShutdownRequested` cancels all waits.
    pub fn raise(&self, signal: Signal) {
        debug!(?signal, "Control signal raised");
        if signal == Signal::ShutdownRequested {
            self.shutdown.cancel();
            return;
        }
        self.flags.send_if_modified(|flags| flags.set(signal, true));
    }

    /// Clears a signal and reports whether it was raised.
    ///
    /// Shutdown cannot be cleared; `take(ShutdownRequested)` only reports it.
    pub fn take(&self, signal: Signal) -> bool {
        if signal == Signal::ShutdownRequested {
            return self.shutdown.is_cancelled();
        }
        let mut was_set = false;
        self.flags.send_if_modified(|flags| {
            was_set = flags.get(signal);
            flags.set(signal, false)
        });
        was_set
    }

    pub fn is_set(&self, signal: Signal) -> bool {
        match signal {
            Signal::ShutdownRequested => self.shutdown.is_cancelled(),
            other => self.flags.borrow().get(other),
        }
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Token cancelled when shutdown is requested.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Waits up to `timeout`, returning early on shutdown or when any of
    /// `wake_on` is raised.
    ///
    /// A signal that is already raised ends the wait immediately. Signals
    /// not listed in `wake_on` stay raised and do not interrupt.
    pub async fn wait(&self, timeout: Duration, wake_on: &[Signal]) -> Wake {
        let mut rx = self.flags.subscribe();
        let raised = |flags: &Flags| wake_on.iter().copied().find(|s| flags.get(*s));

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Wake::Shutdown,
            res = rx.wait_for(|flags| raised(flags).is_some()) => match res {
                Ok(flags) => match raised(&*flags) {
                    Some(signal) => Wake::Signal(signal),
                    None => Wake::Elapsed,
                },
                // Sender lives in self; unreachable while borrowed.
                Err(_) => Wake::Elapsed,
            },
            _ = tokio::time::sleep(timeout) => Wake::Elapsed,
        }
    }
}

impl Default for ControlBus {
    fn default() -> Self {
        Self::new()
    }
}
