//! Shared test doubles for reconciler and engine tests
//!
//! `MockRemote` answers from per-file scripts and records every call;
//! `RecordingNotifier` keeps status lines; `MutableConfig` lets a test edit
//! the configuration while the engine runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use dirmirror_core::config::{ConfigSnapshot, ConfigSource};
use dirmirror_core::domain::{LocalSnapshot, Manifest, RemoteError, RemoteOutcome, RemoteTarget};
use dirmirror_core::ports::{INotifier, IRemoteStorage, Severity, StatusLine};

pub type Reply = Result<RemoteOutcome, RemoteError>;

// ============================================================================
// MockRemote
// ============================================================================

/// A remote call as seen by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    EnsureFolder { token: String, folder: String },
    Upload { name: String, overwrite: bool },
    Delete { name: String },
    Probe { token: String },
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(self, Call::Upload { .. } | Call::Delete { .. })
    }
}

/// Scripted remote storage.
///
/// Unscripted calls succeed: uploads return `Created`/`Overwritten`,
/// deletes `Deleted`, folders `Created`, probes `AlreadyExists`.
/// `accepted_token` makes probes and uploads return `Unauthorized` for any
/// other credential.
#[derive(Default)]
pub struct MockRemote {
    calls: Mutex<Vec<Call>>,
    uploads: Mutex<HashMap<String, Vec<Reply>>>,
    deletes: Mutex<HashMap<String, Vec<Reply>>>,
    probe: Mutex<Option<Reply>>,
    folder: Mutex<Option<Reply>>,
    accepted_token: Mutex<Option<String>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for the next upload of `name`; the last queued reply
    /// repeats.
    pub fn script_upload(&self, name: &str, reply: Reply) {
        self.uploads
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .push(reply);
    }

    pub fn script_delete(&self, name: &str, reply: Reply) {
        self.deletes
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .push(reply);
    }

    pub fn set_probe(&self, reply: Reply) {
        *self.probe.lock().unwrap() = Some(reply);
    }

    pub fn set_folder(&self, reply: Reply) {
        *self.folder.lock().unwrap() = Some(reply);
    }

    pub fn accept_only(&self, token: &str) {
        *self.accepted_token.lock().unwrap() = Some(token.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn probe_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Probe { .. }))
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn rejects(&self, target: &RemoteTarget) -> bool {
        match self.accepted_token.lock().unwrap().as_deref() {
            Some(token) => target.credential() != token,
            None => false,
        }
    }

    fn next_reply(scripts: &Mutex<HashMap<String, Vec<Reply>>>, name: &str) -> Option<Reply> {
        let mut scripts = scripts.lock().unwrap();
        let queue = scripts.get_mut(name)?;
        if queue.len() > 1 {
            Some(queue.remove(0))
        } else {
            queue.first().cloned()
        }
    }
}

#[async_trait]
impl IRemoteStorage for MockRemote {
    async fn ensure_folder(&self, target: &RemoteTarget) -> Reply {
        self.record(Call::EnsureFolder {
            token: target.credential().to_string(),
            folder: target.folder().to_string(),
        });
        if self.rejects(target) {
            return Ok(RemoteOutcome::Unauthorized);
        }
        self.folder
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(Ok(RemoteOutcome::Created))
    }

    async fn upload(
        &self,
        target: &RemoteTarget,
        _local_path: &Path,
        file_name: &str,
        overwrite: bool,
    ) -> Reply {
        self.record(Call::Upload {
            name: file_name.to_string(),
            overwrite,
        });
        if self.rejects(target) {
            return Ok(RemoteOutcome::Unauthorized);
        }
        Self::next_reply(&self.uploads, file_name).unwrap_or(Ok(if overwrite {
            RemoteOutcome::Overwritten
        } else {
            RemoteOutcome::Created
        }))
    }

    async fn delete(&self, target: &RemoteTarget, file_name: &str) -> Reply {
        self.record(Call::Delete {
            name: file_name.to_string(),
        });
        if self.rejects(target) {
            return Ok(RemoteOutcome::Unauthorized);
        }
        Self::next_reply(&self.deletes, file_name).unwrap_or(Ok(RemoteOutcome::Deleted))
    }

    async fn probe(&self, target: &RemoteTarget) -> Reply {
        self.record(Call::Probe {
            token: target.credential().to_string(),
        });
        if self.rejects(target) {
            return Ok(RemoteOutcome::Unauthorized);
        }
        self.probe
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(Ok(RemoteOutcome::AlreadyExists))
    }
}

// ============================================================================
// RecordingNotifier
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    lines: Mutex<Vec<StatusLine>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .map(|l| l.message.clone())
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.severity == Severity::Error)
            .map(|l| l.message.clone())
            .collect()
    }

    pub fn count(&self, message: &str) -> usize {
        self.messages().iter().filter(|m| *m == message).count()
    }

    pub fn has(&self, message: &str) -> bool {
        self.count(message) > 0
    }

    pub fn has_containing(&self, fragment: &str) -> bool {
        self.messages().iter().any(|m| m.contains(fragment))
    }
}

impl INotifier for RecordingNotifier {
    fn emit(&self, line: StatusLine) {
        self.lines.lock().unwrap().push(line);
    }
}

// ============================================================================
// MutableConfig
// ============================================================================

pub struct MutableConfig {
    snapshot: Mutex<ConfigSnapshot>,
}

impl MutableConfig {
    pub fn new(snapshot: ConfigSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }

    pub fn set_credential(&self, credential: &str) {
        self.snapshot.lock().unwrap().credential = credential.to_string();
    }

    pub fn set_local_dir(&self, dir: &Path) {
        self.snapshot.lock().unwrap().local_dir = dir.to_path_buf();
    }

    pub fn set_poll_interval(&self, seconds: f64) {
        self.snapshot.lock().unwrap().poll_interval = seconds;
    }
}

impl ConfigSource for MutableConfig {
    fn snapshot(&self) -> anyhow::Result<ConfigSnapshot> {
        Ok(self.snapshot.lock().unwrap().clone())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub const TOKEN: &str = "valid-token";

/// Workspace with a watched directory and a manifest path outside it.
pub struct Fixture {
    pub root: tempfile::TempDir,
    pub local_dir: PathBuf,
    pub manifest_path: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let local_dir = root.path().join("Photos");
        std::fs::create_dir(&local_dir).unwrap();
        let manifest_path = root.path().join("state").join("manifest.json");
        Self {
            root,
            local_dir,
            manifest_path,
        }
    }

    /// Writes `size` bytes to `name` in the watched directory.
    pub fn write(&self, name: &str, size: usize) {
        std::fs::write(self.local_dir.join(name), vec![b'x'; size]).unwrap();
    }

    pub fn remove(&self, name: &str) {
        std::fs::remove_file(self.local_dir.join(name)).unwrap();
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            credential: TOKEN.to_string(),
            local_dir: self.local_dir.clone(),
            manifest_path: self.manifest_path.clone(),
            poll_interval: 0.1,
        }
    }

    pub fn manifest(&self) -> Option<Manifest> {
        let text = std::fs::read_to_string(&self.manifest_path).ok()?;
        serde_json::from_str(&text).ok()
    }
}

pub fn index(entries: &[(&str, u64)]) -> LocalSnapshot {
    entries.iter().map(|(n, s)| (*n, *s)).collect()
}

pub fn target() -> RemoteTarget {
    RemoteTarget::new(TOKEN, "Photos")
}

/// Polls `cond` every 20ms for up to five seconds.
pub async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..250 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
