//! # governance-storage
//!
//! Persistence contract for signed governance records:
//! - scorecards, with a per-agent latest pointer and global history
//! - trust lineage records, indexed by id, source, target and (source, target) pair
//!
//! Two backends ship with the crate: [`InMemoryTrustStorage`] for tests and
//! single-process deployments, and [`FileTrustStorage`] for a JSON-on-disk
//! layout. Both are selected through [`StorageConfig`].

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod config;
mod error;
pub mod file;
pub mod memory;
#[cfg(test)]
mod testing;
mod traits;

pub use config::StorageConfig;
pub use error::{StorageError, StorageResult};
pub use file::FileTrustStorage;
pub use memory::InMemoryTrustStorage;
pub use traits::{LineageStore, ScorecardStore, TrustStorage};
