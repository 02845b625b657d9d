//! Live database resource definitions.
//!
//! Each kind is its own CRD in the `kubedb.com` group. They share most of
//! their spec shape, which the [`DatabaseSpec`] trait exposes so that the
//! admission policies can be written once.
//!
//! Example:
//! ```yaml
//! apiVersion: kubedb.com/v1alpha1
//! kind: DocumentDB
//! metadata:
//!   name: foo
//! spec:
//!   version: "3.6"
//!   replicas: 1
//!   databaseSecret:
//!     secretName: foo-auth
//!   storage:
//!     storageClassName: standard
//!     resources:
//!       requests:
//!         storage: 1Gi
//! ```

use std::collections::BTreeMap;

use k8s_openapi::NamespaceResourceScope;
use kube::{CustomResource, Resource};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::common::{
    BackupScheduleSpec, DatabaseKind, DatabaseStatus, InitSpec, MonitorSpec, SecretRef,
    StorageSpec,
};
use super::dormant_record::OriginSpec;

/// Read access to the spec fields every live database kind carries.
pub trait DatabaseSpec: Clone + PartialEq + Serialize {
    fn version(&self) -> &str;
    fn replicas(&self) -> Option<i32>;
    fn monitor(&self) -> Option<&MonitorSpec>;
    fn do_not_pause(&self) -> bool;

    fn storage(&self) -> Option<&StorageSpec> {
        None
    }

    fn database_secret(&self) -> Option<&SecretRef> {
        None
    }

    fn backup_schedule(&self) -> Option<&BackupScheduleSpec> {
        None
    }

    /// Secrets other than the credential secret that must exist, keyed by
    /// the field that references them.
    fn auxiliary_secrets(&self) -> Vec<(&'static str, &SecretRef)> {
        Vec::new()
    }

    /// The spec with the fields that may differ from a dormant origin cleared:
    /// `doNotPause`, `monitor`, `backupSchedule` and `databaseSecret`.
    fn comparable(&self) -> Self;
}

/// A live database custom resource.
pub trait LiveDatabase:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + std::fmt::Debug
    + DeserializeOwned
    + Serialize
    + Send
    + Sync
    + 'static
{
    const KIND: DatabaseKind;
    type Spec: DatabaseSpec;

    fn db_spec(&self) -> &Self::Spec;

    /// The frozen copy of this kind's spec inside a dormant origin, if the
    /// origin is of this kind.
    fn origin_spec(origin: &OriginSpec) -> Option<&Self::Spec>;
}

/// DocumentDB: a single-node document store.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha1",
    kind = "DocumentDB",
    plural = "documentdbs",
    status = "DatabaseStatus",
    namespaced,
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDBSpec {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_secret: Option<SecretRef>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<InitSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_schedule: Option<BackupScheduleSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor: Option<MonitorSpec>,
    #[serde(default)]
    pub do_not_pause: bool,
}

/// RelationalDB: a SQL database with optional streaming replication.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha1",
    kind = "RelationalDB",
    plural = "relationaldbs",
    status = "DatabaseStatus",
    namespaced,
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RelationalDBSpec {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// `Warm` or `Hot`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standby_mode: Option<String>,
    /// `synchronous` or `asynchronous`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archiver: Option<ArchiverSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_secret: Option<SecretRef>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<InitSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_schedule: Option<BackupScheduleSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor: Option<MonitorSpec>,
    #[serde(default)]
    pub do_not_pause: bool,
}

/// Continuous WAL archiving target.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArchiverSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<super::common::SnapshotStorageSpec>,
}

/// KeyValueDB: an in-memory key-value store.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha1",
    kind = "KeyValueDB",
    plural = "keyvaluedbs",
    status = "DatabaseStatus",
    namespaced,
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct KeyValueDBSpec {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor: Option<MonitorSpec>,
    #[serde(default)]
    pub do_not_pause: bool,
}

/// CacheDB: a volatile cache with no persistent state.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha1",
    kind = "CacheDB",
    plural = "cachedbs",
    status = "DatabaseStatus",
    namespaced,
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CacheDBSpec {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor: Option<MonitorSpec>,
    #[serde(default)]
    pub do_not_pause: bool,
}

/// SearchDB: a search cluster with dedicated node groups.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha1",
    kind = "SearchDB",
    plural = "searchdbs",
    status = "DatabaseStatus",
    namespaced,
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SearchDBSpec {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology: Option<SearchTopology>,
    #[serde(default, rename = "enableSSL")]
    pub enable_ssl: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_secret: Option<SecretRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_secret: Option<SecretRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<InitSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_schedule: Option<BackupScheduleSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor: Option<MonitorSpec>,
    #[serde(default)]
    pub do_not_pause: bool,
}

/// Dedicated node groups of a search cluster.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchTopology {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<SearchNodeGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SearchNodeGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<SearchNodeGroup>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchNodeGroup {
    /// Name prefix of the group's pods.
    #[serde(default)]
    pub prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,
}

impl DatabaseSpec for DocumentDBSpec {
    fn version(&self) -> &str {
        &self.version
    }
    fn replicas(&self) -> Option<i32> {
        self.replicas
    }
    fn monitor(&self) -> Option<&MonitorSpec> {
        self.monitor.as_ref()
    }
    fn do_not_pause(&self) -> bool {
        self.do_not_pause
    }
    fn storage(&self) -> Option<&StorageSpec> {
        self.storage.as_ref()
    }
    fn database_secret(&self) -> Option<&SecretRef> {
        self.database_secret.as_ref()
    }
    fn backup_schedule(&self) -> Option<&BackupScheduleSpec> {
        self.backup_schedule.as_ref()
    }
    fn comparable(&self) -> Self {
        Self {
            do_not_pause: false,
            monitor: None,
            backup_schedule: None,
            database_secret: None,
            ..self.clone()
        }
    }
}

impl DatabaseSpec for RelationalDBSpec {
    fn version(&self) -> &str {
        &self.version
    }
    fn replicas(&self) -> Option<i32> {
        self.replicas
    }
    fn monitor(&self) -> Option<&MonitorSpec> {
        self.monitor.as_ref()
    }
    fn do_not_pause(&self) -> bool {
        self.do_not_pause
    }
    fn storage(&self) -> Option<&StorageSpec> {
        self.storage.as_ref()
    }
    fn database_secret(&self) -> Option<&SecretRef> {
        self.database_secret.as_ref()
    }
    fn backup_schedule(&self) -> Option<&BackupScheduleSpec> {
        self.backup_schedule.as_ref()
    }
    fn comparable(&self) -> Self {
        Self {
            do_not_pause: false,
            monitor: None,
            backup_schedule: None,
            database_secret: None,
            ..self.clone()
        }
    }
}

impl DatabaseSpec for KeyValueDBSpec {
    fn version(&self) -> &str {
        &self.version
    }
    fn replicas(&self) -> Option<i32> {
        self.replicas
    }
    fn monitor(&self) -> Option<&MonitorSpec> {
        self.monitor.as_ref()
    }
    fn do_not_pause(&self) -> bool {
        self.do_not_pause
    }
    fn storage(&self) -> Option<&StorageSpec> {
        self.storage.as_ref()
    }
    fn comparable(&self) -> Self {
        Self {
            do_not_pause: false,
            monitor: None,
            ..self.clone()
        }
    }
}

impl DatabaseSpec for CacheDBSpec {
    fn version(&self) -> &str {
        &self.version
    }
    fn replicas(&self) -> Option<i32> {
        self.replicas
    }
    fn monitor(&self) -> Option<&MonitorSpec> {
        self.monitor.as_ref()
    }
    fn do_not_pause(&self) -> bool {
        self.do_not_pause
    }
    fn comparable(&self) -> Self {
        Self {
            do_not_pause: false,
            monitor: None,
            ..self.clone()
        }
    }
}

impl DatabaseSpec for SearchDBSpec {
    fn version(&self) -> &str {
        &self.version
    }
    fn replicas(&self) -> Option<i32> {
        self.replicas
    }
    fn monitor(&self) -> Option<&MonitorSpec> {
        self.monitor.as_ref()
    }
    fn do_not_pause(&self) -> bool {
        self.do_not_pause
    }
    fn storage(&self) -> Option<&StorageSpec> {
        self.storage.as_ref()
    }
    fn database_secret(&self) -> Option<&SecretRef> {
        self.database_secret.as_ref()
    }
    fn backup_schedule(&self) -> Option<&BackupScheduleSpec> {
        self.backup_schedule.as_ref()
    }
    fn auxiliary_secrets(&self) -> Vec<(&'static str, &SecretRef)> {
        match (&self.certificate_secret, self.enable_ssl) {
            (Some(secret), true) => vec![("spec.certificateSecret", secret)],
            _ => Vec::new(),
        }
    }
    fn comparable(&self) -> Self {
        Self {
            do_not_pause: false,
            monitor: None,
            backup_schedule: None,
            database_secret: None,
            ..self.clone()
        }
    }
}

impl LiveDatabase for DocumentDB {
    const KIND: DatabaseKind = DatabaseKind::DocumentDB;
    type Spec = DocumentDBSpec;

    fn db_spec(&self) -> &Self::Spec {
        &self.spec
    }
    fn origin_spec(origin: &OriginSpec) -> Option<&Self::Spec> {
        origin.document_db.as_ref()
    }
}

impl LiveDatabase for RelationalDB {
    const KIND: DatabaseKind = DatabaseKind::RelationalDB;
    type Spec = RelationalDBSpec;

    fn db_spec(&self) -> &Self::Spec {
        &self.spec
    }
    fn origin_spec(origin: &OriginSpec) -> Option<&Self::Spec> {
        origin.relational_db.as_ref()
    }
}

impl LiveDatabase for KeyValueDB {
    const KIND: DatabaseKind = DatabaseKind::KeyValueDB;
    type Spec = KeyValueDBSpec;

    fn db_spec(&self) -> &Self::Spec {
        &self.spec
    }
    fn origin_spec(origin: &OriginSpec) -> Option<&Self::Spec> {
        origin.key_value_db.as_ref()
    }
}

impl LiveDatabase for CacheDB {
    const KIND: DatabaseKind = DatabaseKind::CacheDB;
    type Spec = CacheDBSpec;

    fn db_spec(&self) -> &Self::Spec {
        &self.spec
    }
    fn origin_spec(origin: &OriginSpec) -> Option<&Self::Spec> {
        origin.cache_db.as_ref()
    }
}

impl LiveDatabase for SearchDB {
    const KIND: DatabaseKind = DatabaseKind::SearchDB;
    type Spec = SearchDBSpec;

    fn db_spec(&self) -> &Self::Spec {
        &self.spec
    }
    fn origin_spec(origin: &OriginSpec) -> Option<&Self::Spec> {
        origin.search_db.as_ref()
    }
}
