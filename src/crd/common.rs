//! Types shared by every kubedb.com resource kind.

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group of every resource this webhook admits.
pub const API_GROUP: &str = "kubedb.com";
/// API version of every resource this webhook admits.
pub const API_VERSION: &str = "v1alpha1";
/// `apiVersion` string written into owner references.
pub const GROUP_VERSION: &str = "kubedb.com/v1alpha1";

/// Label carrying the name of the database a dependent belongs to.
pub const LABEL_DATABASE_NAME: &str = "kubedb.com/name";
/// Label carrying the kind of the database a dependent belongs to.
pub const LABEL_DATABASE_KIND: &str = "kubedb.com/kind";

/// The live database kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DatabaseKind {
    DocumentDB,
    RelationalDB,
    KeyValueDB,
    CacheDB,
    SearchDB,
}

impl DatabaseKind {
    pub const ALL: [DatabaseKind; 5] = [
        DatabaseKind::DocumentDB,
        DatabaseKind::RelationalDB,
        DatabaseKind::KeyValueDB,
        DatabaseKind::CacheDB,
        DatabaseKind::SearchDB,
    ];

    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseKind::DocumentDB => "DocumentDB",
            DatabaseKind::RelationalDB => "RelationalDB",
            DatabaseKind::KeyValueDB => "KeyValueDB",
            DatabaseKind::CacheDB => "CacheDB",
            DatabaseKind::SearchDB => "SearchDB",
        }
    }

    pub fn from_kind(kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == kind)
    }

    /// Versions this release knows how to run.
    pub fn allowed_versions(&self) -> &'static [&'static str] {
        match self {
            DatabaseKind::DocumentDB => &["3.4", "3.6"],
            DatabaseKind::RelationalDB => &["5.7", "8.0", "9.6", "9.6.7", "10.2"],
            DatabaseKind::KeyValueDB => &["4", "4.0", "4.0.6"],
            DatabaseKind::CacheDB => &["1.5", "1.5.4"],
            DatabaseKind::SearchDB => &["5.6", "5.6.4", "6.2", "6.2.4"],
        }
    }

    /// Whether the operator provisions a credential Secret for this kind.
    /// Cache and key-value stores run without authentication.
    pub fn has_credential_secret(&self) -> bool {
        !matches!(self, DatabaseKind::CacheDB | DatabaseKind::KeyValueDB)
    }

    /// Whether more than one replica is supported.
    pub fn supports_replication(&self) -> bool {
        matches!(
            self,
            DatabaseKind::RelationalDB | DatabaseKind::CacheDB | DatabaseKind::SearchDB
        )
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every kind this webhook recognizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Database(DatabaseKind),
    BackupArtifact,
    DormantRecord,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Database(kind) => kind.as_str(),
            ResourceKind::BackupArtifact => "BackupArtifact",
            ResourceKind::DormantRecord => "DormantRecord",
        }
    }

    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "BackupArtifact" => Some(ResourceKind::BackupArtifact),
            "DormantRecord" => Some(ResourceKind::DormantRecord),
            other => DatabaseKind::from_kind(other).map(ResourceKind::Database),
        }
    }

    /// Whether the trusted operator skips the immutable-field check on
    /// updates of this kind. DormantRecord origins stay frozen for everyone.
    pub fn operator_bypasses_immutability(&self) -> bool {
        !matches!(self, ResourceKind::DormantRecord)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a Secret in the resource's namespace.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    pub secret_name: String,
}

/// Persistent storage request for a database.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_modes: Vec<String>,
    #[serde(default)]
    pub resources: StorageResources,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageResources {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: BTreeMap<String, String>,
}

/// Initialization source for a new database.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_source: Option<SnapshotSource>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSource {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Where snapshots are written. Exactly one backend must be set.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStorageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_secret_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<BucketSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcs: Option<BucketSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<ContainerSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swift: Option<ContainerSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalSpec>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BucketSpec {
    pub bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub container: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocalSpec {
    pub mount_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
}

/// Periodic backups taken by the operator.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupScheduleSpec {
    pub cron_expression: String,
    #[serde(flatten)]
    pub storage: SnapshotStorageSpec,
}

/// Monitoring agent configuration.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSpec {
    pub agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prometheus: Option<PrometheusSpec>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
}

/// Phase reported by the operator for live databases.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum DatabasePhase {
    #[default]
    Creating,
    Initializing,
    Running,
    Failed,
}

/// Status shared by the live database kinds. Written by the operator only.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<DatabasePhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
