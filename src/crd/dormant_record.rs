//! DormantRecord Custom Resource Definition.
//!
//! A DormantRecord is what remains of a live database after the operator
//! pauses it: a frozen copy of the original spec plus the switches that
//! decide whether the database's dependents are kept (`wipeOut: false`) or
//! garbage-collected with the record (`wipeOut: true`).
//!
//! Example:
//! ```yaml
//! apiVersion: kubedb.com/v1alpha1
//! kind: DormantRecord
//! metadata:
//!   name: foo
//!   labels:
//!     kubedb.com/kind: DocumentDB
//! spec:
//!   wipeOut: false
//!   origin:
//!     metadata:
//!       name: foo
//!     spec:
//!       documentDB:
//!         version: "3.6"
//!         databaseSecret:
//!           secretName: foo-auth
//! ```

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{DatabaseKind, SecretRef};
use super::databases::{
    CacheDBSpec, DatabaseSpec, DocumentDBSpec, KeyValueDBSpec, RelationalDBSpec, SearchDBSpec,
};

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha1",
    kind = "DormantRecord",
    plural = "dormantrecords",
    shortname = "drmn",
    status = "DormantRecordStatus",
    namespaced,
    printcolumn = r#"{"name":"WipeOut", "type":"boolean", "jsonPath":".spec.wipeOut"}"#,
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DormantRecordSpec {
    /// Frozen copy of the database as it was when it went dormant.
    pub origin: Origin,
    /// Garbage-collect every dependent together with this record.
    #[serde(default)]
    pub wipe_out: bool,
    /// Recreate the original database from the origin.
    #[serde(default)]
    pub resume: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Origin {
    #[serde(default)]
    pub metadata: OriginMeta,
    #[serde(default)]
    pub spec: OriginSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OriginMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// The original spec. Exactly one field is expected to be set.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OriginSpec {
    #[serde(default, rename = "documentDB", skip_serializing_if = "Option::is_none")]
    pub document_db: Option<DocumentDBSpec>,
    #[serde(default, rename = "relationalDB", skip_serializing_if = "Option::is_none")]
    pub relational_db: Option<RelationalDBSpec>,
    #[serde(default, rename = "keyValueDB", skip_serializing_if = "Option::is_none")]
    pub key_value_db: Option<KeyValueDBSpec>,
    #[serde(default, rename = "cacheDB", skip_serializing_if = "Option::is_none")]
    pub cache_db: Option<CacheDBSpec>,
    #[serde(default, rename = "searchDB", skip_serializing_if = "Option::is_none")]
    pub search_db: Option<SearchDBSpec>,
}

impl OriginSpec {
    /// Every kind the origin carries a spec for.
    pub fn kinds(&self) -> Vec<DatabaseKind> {
        let mut kinds = Vec::new();
        if self.document_db.is_some() {
            kinds.push(DatabaseKind::DocumentDB);
        }
        if self.relational_db.is_some() {
            kinds.push(DatabaseKind::RelationalDB);
        }
        if self.key_value_db.is_some() {
            kinds.push(DatabaseKind::KeyValueDB);
        }
        if self.cache_db.is_some() {
            kinds.push(DatabaseKind::CacheDB);
        }
        if self.search_db.is_some() {
            kinds.push(DatabaseKind::SearchDB);
        }
        kinds
    }

    /// The origin's kind, when exactly one is set.
    pub fn kind(&self) -> Option<DatabaseKind> {
        match self.kinds().as_slice() {
            [kind] => Some(*kind),
            _ => None,
        }
    }

    /// Credential secret the original database used.
    ///
    /// Kinds without credential secrets always yield `None`.
    pub fn database_secret(&self) -> Option<&SecretRef> {
        match self.kind()? {
            DatabaseKind::DocumentDB => self.document_db.as_ref()?.database_secret(),
            DatabaseKind::RelationalDB => self.relational_db.as_ref()?.database_secret(),
            DatabaseKind::SearchDB => self.search_db.as_ref()?.database_secret(),
            DatabaseKind::KeyValueDB | DatabaseKind::CacheDB => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum DormantPhase {
    Paused,
    WipedOut,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DormantRecordStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<DormantPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DormantRecord {
    pub fn origin_kind(&self) -> Option<DatabaseKind> {
        self.spec.origin.spec.kind()
    }

    pub fn is_wiped_out(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.phase)
            .is_some_and(|phase| phase == DormantPhase::WipedOut)
    }
}
