//! Access to the cluster's object store.
//!
//! The admission engine reads and patches objects through the [`ObjectStore`]
//! trait so that the same decision logic runs against the Kubernetes API in
//! production ([`KubeStore`]) and against an in-memory map in tests
//! ([`MemoryStore`]). Objects cross the seam untyped, as `DynamicObject`s;
//! [`get_typed`] and [`list_typed`] decode them into the CRD types.

mod kube_store;
mod memory;

pub use kube_store::KubeStore;
pub use memory::MemoryStore;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::core::DynamicObject;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::crd::{DatabaseKind, ResourceKind};

/// Label selector as an exact-match set.
pub type LabelSelector = BTreeMap<String, String>;

/// The object families the engine reads or mutates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectFamily {
    Database(DatabaseKind),
    DormantRecord,
    BackupArtifact,
    PersistentVolumeClaim,
    Secret,
    /// Cluster-scoped; the namespace argument is ignored.
    StorageClass,
}

impl ObjectFamily {
    pub fn is_cluster_scoped(&self) -> bool {
        matches!(self, ObjectFamily::StorageClass)
    }
}

impl From<ResourceKind> for ObjectFamily {
    fn from(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Database(kind) => ObjectFamily::Database(kind),
            ResourceKind::BackupArtifact => ObjectFamily::BackupArtifact,
            ResourceKind::DormantRecord => ObjectFamily::DormantRecord,
        }
    }
}

impl fmt::Display for ObjectFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectFamily::Database(kind) => f.write_str(kind.as_str()),
            ObjectFamily::DormantRecord => f.write_str("DormantRecord"),
            ObjectFamily::BackupArtifact => f.write_str("BackupArtifact"),
            ObjectFamily::PersistentVolumeClaim => f.write_str("PersistentVolumeClaim"),
            ObjectFamily::Secret => f.write_str("Secret"),
            ObjectFamily::StorageClass => f.write_str("StorageClass"),
        }
    }
}

/// Errors returned by an [`ObjectStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Stored object did not decode into the expected type
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The object changed since it was read
    #[error("{family} {namespace}/{name} was modified concurrently")]
    Conflict {
        family: ObjectFamily,
        namespace: String,
        name: String,
    },

    /// Failure reported by a non-Kubernetes backend
    #[error("Store error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Check if this error indicates a not-found condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Kube(kube::Error::Api(e)) if e.code == 404)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Generic CRUD surface of the external object store.
///
/// `get` maps "not found" to `Ok(None)`. Mutations are expressed as patches
/// of `metadata.ownerReferences`, never as full-object replacement.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(
        &self,
        family: ObjectFamily,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, StoreError>;

    async fn list(
        &self,
        family: ObjectFamily,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<DynamicObject>, StoreError>;

    /// Replace `metadata.ownerReferences` of one object.
    ///
    /// With `resource_version` set, the patch only applies if the object is
    /// still at that version and fails with [`StoreError::Conflict`] otherwise.
    async fn patch_owner_references(
        &self,
        family: ObjectFamily,
        namespace: &str,
        name: &str,
        resource_version: Option<&str>,
        owner_references: &[OwnerReference],
    ) -> Result<(), StoreError>;
}

/// Decode an untyped object into `K`.
pub fn decode<K: DeserializeOwned>(object: DynamicObject) -> Result<K, StoreError> {
    let value = serde_json::to_value(object)?;
    Ok(serde_json::from_value(value)?)
}

/// Get one object and decode it.
pub async fn get_typed<K: DeserializeOwned>(
    store: &dyn ObjectStore,
    family: ObjectFamily,
    namespace: &str,
    name: &str,
) -> Result<Option<K>, StoreError> {
    store
        .get(family, namespace, name)
        .await?
        .map(decode)
        .transpose()
}

/// List objects matching `selector` and decode each of them.
pub async fn list_typed<K: DeserializeOwned>(
    store: &dyn ObjectStore,
    family: ObjectFamily,
    namespace: &str,
    selector: &LabelSelector,
) -> Result<Vec<K>, StoreError> {
    store
        .list(family, namespace, selector)
        .await?
        .into_iter()
        .map(decode)
        .collect()
}

/// Render a selector in the `k=v,k=v` form the API server accepts.
pub fn selector_string(selector: &LabelSelector) -> String {
    selector
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Whether `labels` satisfy every pair in `selector`.
pub fn selector_matches(selector: &LabelSelector, labels: Option<&BTreeMap<String, String>>) -> bool {
    selector.iter().all(|(key, value)| {
        labels
            .and_then(|labels| labels.get(key))
            .is_some_and(|v| v == value)
    })
}
