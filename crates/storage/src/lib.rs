//! Snapshot persistence for EVTrack.
//!
//! This crate owns the boundary between serialized project snapshots and
//! the in-memory engine types: a JSON file store keyed by project name
//! and base date, and the conversion that hands the engine fully-formed,
//! plot-map-complete projects.

#![warn(missing_docs)]

pub mod snapshot;
pub mod store;

pub use snapshot::ProjectSnapshot;
pub use store::{Result, SnapshotStore, StorageError};
