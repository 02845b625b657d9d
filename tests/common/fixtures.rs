//! Test fixtures and builders for kubedb.com admission tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::authentication::v1::UserInfo;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret};
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use serde_json::{Value, json};

use db_admission::crd::{
    BackupArtifact, BackupArtifactSpec, DatabaseKind, DormantPhase, DormantRecord,
    DormantRecordStatus, GROUP_VERSION, LABEL_DATABASE_KIND, LABEL_DATABASE_NAME, LocalSpec,
    SnapshotStorageSpec,
};
use db_admission::store::ObjectFamily;
use db_admission::webhooks::Operation;
use db_admission::{AdmissionInput, Engine, MemoryStore, OperatorIdentity};

/// Namespace every fixture lives in unless stated otherwise.
pub const NAMESPACE: &str = "default";
/// StorageClass seeded by [`seeded_store`].
pub const STORAGE_CLASS: &str = "standard";

/// The operator identity the engines under test trust.
pub fn operator() -> OperatorIdentity {
    OperatorIdentity::new("kube-system", "kubedb-operator")
}

pub fn operator_user() -> UserInfo {
    UserInfo {
        username: Some(operator().username()),
        ..Default::default()
    }
}

pub fn end_user() -> UserInfo {
    UserInfo {
        username: Some("minikube-user".to_string()),
        ..Default::default()
    }
}

/// Field of a DormantRecord origin holding the spec of `kind`.
pub fn origin_field(kind: DatabaseKind) -> &'static str {
    match kind {
        DatabaseKind::DocumentDB => "documentDB",
        DatabaseKind::RelationalDB => "relationalDB",
        DatabaseKind::KeyValueDB => "keyValueDB",
        DatabaseKind::CacheDB => "cacheDB",
        DatabaseKind::SearchDB => "searchDB",
    }
}

/// Name of the credential secret [`database`] references.
pub fn auth_secret_name(name: &str) -> String {
    format!("{}-auth", name)
}

/// A live database of `kind` that passes every semantic rule against a
/// store prepared with [`seed_database`].
pub fn database(kind: DatabaseKind, name: &str) -> Value {
    let mut spec = json!({
        "version": kind.allowed_versions()[0],
        "replicas": 1,
    });
    if kind != DatabaseKind::CacheDB {
        spec["storage"] = json!({
            "storageClassName": STORAGE_CLASS,
            "accessModes": ["ReadWriteOnce"],
            "resources": {"requests": {"storage": "1Gi"}}
        });
    }
    if kind.has_credential_secret() {
        spec["databaseSecret"] = json!({"secretName": auth_secret_name(name)});
    }
    json!({
        "apiVersion": GROUP_VERSION,
        "kind": kind.as_str(),
        "metadata": {"name": name, "namespace": NAMESPACE},
        "spec": spec,
    })
}

/// Builder for DormantRecord fixtures.
///
/// # Example
/// ```
/// let record = DormantRecordBuilder::new("foo", DatabaseKind::DocumentDB)
///     .wipe_out(true)
///     .secret("shared-auth")
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct DormantRecordBuilder {
    name: String,
    namespace: String,
    kind: DatabaseKind,
    wipe_out: bool,
    secret: Option<String>,
    uid: Option<String>,
    phase: Option<DormantPhase>,
}

impl DormantRecordBuilder {
    pub fn new(name: impl Into<String>, kind: DatabaseKind) -> Self {
        let name = name.into();
        Self {
            uid: Some(format!("uid-{}", name)),
            name,
            namespace: NAMESPACE.to_string(),
            kind,
            wipe_out: false,
            secret: None,
            phase: Some(DormantPhase::Paused),
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn wipe_out(mut self, wipe_out: bool) -> Self {
        self.wipe_out = wipe_out;
        self
    }

    /// Reference `secret` instead of the default `<name>-auth`.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn without_uid(mut self) -> Self {
        self.uid = None;
        self
    }

    pub fn phase(mut self, phase: DormantPhase) -> Self {
        self.phase = Some(phase);
        self
    }

    /// The record as the JSON payload an admission request carries.
    pub fn build_value(&self) -> Value {
        let mut origin = database(self.kind, &self.name)["spec"].clone();
        if let (Some(secret), true) = (&self.secret, self.kind.has_credential_secret()) {
            origin["databaseSecret"] = json!({"secretName": secret});
        }

        let mut metadata = json!({"name": self.name, "namespace": self.namespace});
        metadata["labels"][LABEL_DATABASE_KIND] = json!(self.kind.as_str());
        if let Some(uid) = &self.uid {
            metadata["uid"] = json!(uid);
        }

        let mut record = json!({
            "apiVersion": GROUP_VERSION,
            "kind": "DormantRecord",
            "metadata": metadata,
            "spec": {
                "wipeOut": self.wipe_out,
                "origin": {
                    "metadata": {"name": self.name, "namespace": self.namespace},
                },
            },
        });
        record["spec"]["origin"]["spec"][origin_field(self.kind)] = origin;
        if let Some(phase) = self.phase {
            record["status"] = serde_json::to_value(DormantRecordStatus {
                phase: Some(phase),
                reason: None,
            })
            .unwrap();
        }
        record
    }

    pub fn build(&self) -> DormantRecord {
        serde_json::from_value(self.build_value()).unwrap()
    }
}

fn labelled_meta(name: &str, labels: &[(&str, &str)]) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(NAMESPACE.to_string()),
        labels: Some(
            labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        ),
        ..Default::default()
    }
}

/// A credential secret, labelled as operator-created for `kind` if given.
pub fn secret(name: &str, kind: Option<DatabaseKind>) -> Secret {
    let labels: Vec<(&str, &str)> = kind
        .map(|k| vec![(LABEL_DATABASE_KIND, k.as_str())])
        .unwrap_or_default();
    Secret {
        metadata: labelled_meta(name, &labels),
        ..Default::default()
    }
}

/// A dependent PVC of database `db` of `kind`.
pub fn pvc(name: &str, db: &str, kind: DatabaseKind) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: labelled_meta(
            name,
            &[(LABEL_DATABASE_NAME, db), (LABEL_DATABASE_KIND, kind.as_str())],
        ),
        ..Default::default()
    }
}

/// A dependent backup of database `db` of `kind`, stored on a local volume.
pub fn backup_artifact(name: &str, db: &str, kind: DatabaseKind) -> BackupArtifact {
    let mut artifact = BackupArtifact::new(
        name,
        BackupArtifactSpec {
            database_name: db.to_string(),
            storage: SnapshotStorageSpec {
                local: Some(LocalSpec {
                    mount_path: "/var/backups".to_string(),
                    sub_path: None,
                }),
                ..Default::default()
            },
        },
    );
    artifact.metadata = labelled_meta(
        name,
        &[(LABEL_DATABASE_NAME, db), (LABEL_DATABASE_KIND, kind.as_str())],
    );
    artifact
}

pub fn storage_class(name: &str) -> StorageClass {
    StorageClass {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        provisioner: "kubernetes.io/no-provisioner".to_string(),
        ..Default::default()
    }
}

/// Owner references naming the DormantRecord `record`.
pub fn refs_to(refs: &[OwnerReference], record: &str) -> usize {
    refs.iter()
        .filter(|r| r.kind == "DormantRecord" && r.name == record)
        .count()
}

/// An empty store holding only the default StorageClass.
pub async fn seeded_store() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    store
        .insert(ObjectFamily::StorageClass, &storage_class(STORAGE_CLASS))
        .await
        .unwrap();
    Arc::new(store)
}

/// Store `object` as the live database it describes, together with the
/// credential secret it references.
pub async fn seed_database(store: &MemoryStore, kind: DatabaseKind, object: &Value) {
    store
        .insert(ObjectFamily::Database(kind), object)
        .await
        .unwrap();
    if let Some(secret_name) = object["spec"]["databaseSecret"]["secretName"].as_str() {
        store
            .insert(ObjectFamily::Secret, &secret(secret_name, Some(kind)))
            .await
            .unwrap();
    }
}

pub async fn seed_record(store: &MemoryStore, record: &DormantRecord) {
    store
        .insert(ObjectFamily::DormantRecord, record)
        .await
        .unwrap();
}

/// An initialized engine over `store`.
pub async fn engine(store: Arc<MemoryStore>) -> Engine {
    let engine = Engine::new(operator());
    engine.initialize(store).await;
    engine
}

/// Admission input for `operation` on `kind/name` in [`NAMESPACE`].
pub fn request(operation: Operation, kind: &str, name: &str, user: UserInfo) -> AdmissionInput {
    AdmissionInput {
        uid: format!("{}-{}", kind.to_lowercase(), name),
        operation,
        group: "kubedb.com".to_string(),
        kind: kind.to_string(),
        namespace: NAMESPACE.to_string(),
        name: name.to_string(),
        sub_resource: None,
        user,
        object: None,
        old_object: None,
        dry_run: false,
    }
}

fn kind_and_name(object: &Value) -> (String, String) {
    (
        object["kind"].as_str().unwrap().to_string(),
        object["metadata"]["name"].as_str().unwrap().to_string(),
    )
}

pub fn create(object: Value, user: UserInfo) -> AdmissionInput {
    let (kind, name) = kind_and_name(&object);
    AdmissionInput {
        object: Some(object),
        ..request(Operation::Create, &kind, &name, user)
    }
}

pub fn update(old: Value, new: Value, user: UserInfo) -> AdmissionInput {
    let (kind, name) = kind_and_name(&new);
    AdmissionInput {
        object: Some(new),
        old_object: Some(old),
        ..request(Operation::Update, &kind, &name, user)
    }
}

pub fn delete(kind: &str, name: &str, user: UserInfo) -> AdmissionInput {
    request(Operation::Delete, kind, name, user)
}
