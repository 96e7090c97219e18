//! Domain entities and business logic
//!
//! - [`FileIndex`] - name to size mapping used for both the manifest and the
//!   local snapshot
//! - [`Diff`] - three-way partition between a manifest and a snapshot
//! - [`RemoteOutcome`] / [`RemoteError`] - classified results of remote calls
//! - [`RemoteTarget`] - credential and folder a remote call applies to

pub mod errors;
pub mod file_index;
pub mod outcome;
pub mod target;

pub use errors::{DomainError, RemoteError};
pub use file_index::{Diff, FileIndex, LocalSnapshot, Manifest};
pub use outcome::RemoteOutcome;
pub use target::RemoteTarget;
