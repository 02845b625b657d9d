//! Validation policies for kubedb.com admission requests.
//!
//! Policies are organized by concern:
//! - `immutability`: pure diff of old and new object, UPDATE only
//! - `database`: semantic checks for the live database kinds
//! - `backup`: snapshot storage shape, shared by BackupArtifact and backup schedules
//! - `dormant_record`: origin consistency of a DormantRecord
//! - `monitor`, `storage`: sub-spec checks used by `database`
//! - `pause_guard`: DELETE protection of live databases
//!
//! Every check returns the first failure it finds.

pub mod backup;
pub mod database;
pub mod dormant_record;
pub mod immutability;
pub mod monitor;
pub mod pause_guard;
pub mod storage;

use crate::error::{Error, Result};
use crate::store::{ObjectFamily, ObjectStore, StoreError};

/// Context for validation
pub struct ValidationContext<'a> {
    /// Store the object's references are resolved against
    pub store: &'a dyn ObjectStore,
    /// The namespace of the resource
    pub namespace: &'a str,
    /// The name of the resource
    pub name: &'a str,
}

impl<'a> ValidationContext<'a> {
    pub fn new(store: &'a dyn ObjectStore, namespace: &'a str, name: &'a str) -> Self {
        Self {
            store,
            namespace,
            name,
        }
    }

    /// Require a Secret named `secret_name` in the resource's namespace.
    pub async fn require_secret(&self, field: &str, secret_name: &str) -> Result<()> {
        if secret_name.is_empty() {
            return Err(Error::semantic(format!("{} is missing a secret name", field)));
        }
        self.require(ObjectFamily::Secret, field, secret_name).await
    }

    /// Require a StorageClass named `class_name`.
    pub async fn require_storage_class(&self, class_name: &str) -> Result<()> {
        self.require(
            ObjectFamily::StorageClass,
            "spec.storage.storageClassName",
            class_name,
        )
        .await
    }

    async fn require(&self, family: ObjectFamily, field: &str, name: &str) -> Result<()> {
        match self.store.get(family, self.namespace, name).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(not_found(family, field, name)),
            Err(e) if e.is_not_found() => Err(not_found(family, field, name)),
            Err(e) => Err(Error::Store(e)),
        }
    }
}

fn not_found(family: ObjectFamily, field: &str, name: &str) -> Error {
    Error::semantic(format!(
        "{} \"{}\" referenced by {} not found",
        family, name, field
    ))
}

/// Map a store error raised inside a semantic rule.
///
/// "Not found" means the object references something that does not exist.
pub(crate) fn rule_store_error(err: StoreError) -> Error {
    if err.is_not_found() {
        Error::semantic(err.to_string())
    } else {
        Error::Store(err)
    }
}
