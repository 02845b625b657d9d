//! BackupArtifact Custom Resource Definition.
//!
//! A point-in-time backup of a live database. The operator labels every
//! artifact with `kubedb.com/name` and `kubedb.com/kind` so it can be found
//! again when the database goes dormant.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::SnapshotStorageSpec;

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha1",
    kind = "BackupArtifact",
    plural = "backupartifacts",
    status = "BackupArtifactStatus",
    namespaced,
    printcolumn = r#"{"name":"Database", "type":"string", "jsonPath":".spec.databaseName"}"#,
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BackupArtifactSpec {
    /// Name of the database this artifact was taken from.
    pub database_name: String,
    #[serde(flatten)]
    pub storage: SnapshotStorageSpec,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum BackupPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupArtifactStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<BackupPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
