//! Integration tests for dirmirror-sync
//!
//! Drives the reconciler and the control loop against scripted in-memory
//! remote storage, a recording notifier and an editable configuration.

mod common;
