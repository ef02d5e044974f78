//! Port contracts for board persistence.
//!
//! Ports define infrastructure-agnostic interfaces used by board services.

pub mod repository;
mod snapshot;

pub use repository::{BoardRepository, BoardRepositoryError, BoardRepositoryResult};
pub use snapshot::{BoardSnapshot, SnapshotChanges};
