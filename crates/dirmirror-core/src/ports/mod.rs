//! Port definitions (hexagonal architecture interfaces)
//!
//! ## Ports Overview
//!
//! - [`IRemoteStorage`] - Remote folder operations (ensure folder, upload,
//!   delete, authorization probe)
//! - [`INotifier`] - Outbound channel of timestamped status lines

pub mod notification;
pub mod remote_storage;

pub use notification::{INotifier, Severity, StatusLine};
pub use remote_storage::IRemoteStorage;
