//! Custom Resource Definitions admitted by this webhook.
//!
//! - Live databases: `DocumentDB`, `RelationalDB`, `KeyValueDB`, `CacheDB`, `SearchDB`
//! - `BackupArtifact`: snapshots taken from a live database
//! - `DormantRecord`: the paused remains of a deleted database

mod backup_artifact;
mod common;
mod databases;
mod dormant_record;

pub use backup_artifact::*;
pub use common::*;
pub use databases::*;
pub use dormant_record::*;
