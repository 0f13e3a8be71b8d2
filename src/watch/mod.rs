// src/watch/mod.rs

//! Manifest watching (`--watch`).
//!
//! Wires a `notify` watcher on the manifest's directory, re-validates the
//! manifest on change, and hands valid new versions to the runtime as
//! `RuntimeEvent::ManifestChanged`. Content fingerprints (`blake3`) filter out
//! saves that did not change anything.

pub mod event_handler;
pub mod hash;
pub mod watcher;

pub use event_handler::ManifestReloader;
pub use hash::Fingerprint;
pub use watcher::{spawn_manifest_watcher, WatcherHandle};
