//! dirmirror Core - Domain types and port definitions
//!
//! This crate contains the hexagonal core of the one-way directory mirror:
//! - **Configuration** - YAML config file, validation, and the immutable
//!   [`config::ConfigSnapshot`] the engine works from
//! - **Domain types** - [`domain::FileIndex`] (manifest and local snapshot),
//!   [`domain::Diff`], [`domain::RemoteOutcome`], [`domain::RemoteTarget`]
//! - **Port definitions** - Traits for adapters: `IRemoteStorage`, `INotifier`
//!
//! # Architecture
//!
//! The domain module is pure data and logic with no I/O. Ports define the
//! trait interfaces that the remote and sync crates implement or consume.

pub mod config;
pub mod domain;
pub mod ports;
