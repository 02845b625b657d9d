//! Admission decision engine.
//!
//! One [`Engine`] serves every request. Its only shared state is the store
//! handle, set once by [`Engine::initialize`] and read by every request for
//! the duration of its handling.
//!
//! Per request:
//! 1. Anything other than CREATE, UPDATE or DELETE of a kubedb.com kind, or
//!    any sub-resource request, passes through.
//! 2. Without a store handle the request fails as uninitialized.
//! 3. DELETE looks at the stored object; CREATE and UPDATE decode the payload.
//! 4. UPDATE runs the immutable-field check, unless the operator is the
//!    caller and the kind allows it to bypass.
//! 5. The kind's semantic checks run; DormantRecords then move ownership of
//!    their dependents.

use std::sync::Arc;
use std::time::Instant;

use k8s_openapi::api::authentication::v1::UserInfo;
use kube::ResourceExt;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, Operation};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::decision::AdmissionDecision;
use super::identity::OperatorIdentity;
use super::policies::{
    ValidationContext, backup, database, dormant_record, immutability, pause_guard,
};
use crate::crd::{
    API_GROUP, BackupArtifact, CacheDB, DatabaseKind, DocumentDB, DormantRecord, KeyValueDB,
    LiveDatabase, RelationalDB, ResourceKind, SearchDB,
};
use crate::error::{Error, Result};
use crate::health::{HealthState, Metrics};
use crate::ownership;
use crate::store::{ObjectFamily, ObjectStore, get_typed};

/// The parts of an admission request the engine looks at.
#[derive(Clone, Debug)]
pub struct AdmissionInput {
    pub uid: String,
    pub operation: Operation,
    pub group: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub sub_resource: Option<String>,
    pub user: UserInfo,
    pub object: Option<Value>,
    pub old_object: Option<Value>,
    pub dry_run: bool,
}

impl AdmissionInput {
    /// The kind this request is subject to, or `None` for pass-through.
    pub fn target_kind(&self) -> Option<ResourceKind> {
        if !matches!(
            self.operation,
            Operation::Create | Operation::Update | Operation::Delete
        ) {
            return None;
        }
        if self.sub_resource.as_deref().is_some_and(|s| !s.is_empty()) {
            return None;
        }
        if self.group != API_GROUP {
            return None;
        }
        ResourceKind::from_kind(&self.kind)
    }
}

impl TryFrom<&AdmissionRequest<DynamicObject>> for AdmissionInput {
    type Error = serde_json::Error;

    fn try_from(req: &AdmissionRequest<DynamicObject>) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            uid: req.uid.clone(),
            operation: req.operation.clone(),
            group: req.kind.group.clone(),
            kind: req.kind.kind.clone(),
            namespace: req.namespace.clone().unwrap_or_default(),
            name: req.name.clone(),
            sub_resource: req.sub_resource.clone(),
            user: req.user_info.clone(),
            object: req.object.as_ref().map(serde_json::to_value).transpose()?,
            old_object: req.old_object.as_ref().map(serde_json::to_value).transpose()?,
            dry_run: req.dry_run,
        })
    }
}

/// Admission decision engine
pub struct Engine {
    operator: OperatorIdentity,
    store: RwLock<Option<Arc<dyn ObjectStore>>>,
    health: Option<Arc<HealthState>>,
}

impl Engine {
    /// Create an engine that trusts `operator`. It denies every request
    /// until [`Engine::initialize`] is called.
    pub fn new(operator: OperatorIdentity) -> Self {
        Self {
            operator,
            store: RwLock::new(None),
            health: None,
        }
    }

    /// Report readiness and record metrics through `health`.
    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.health = Some(health);
        self
    }

    /// Install the store handle. May be called again to replace it.
    pub async fn initialize(&self, store: Arc<dyn ObjectStore>) {
        *self.store.write().await = Some(store);
        if let Some(health) = &self.health {
            health.set_ready(true).await;
        }
        info!(
            operator = %self.operator.username(),
            "Admission engine initialized"
        );
    }

    pub async fn is_initialized(&self) -> bool {
        self.store.read().await.is_some()
    }

    fn metrics(&self) -> Option<&Metrics> {
        self.health.as_deref().map(|health| &health.metrics)
    }

    /// Decide one admission request.
    pub async fn admit(&self, input: &AdmissionInput) -> AdmissionDecision {
        let Some(kind) = input.target_kind() else {
            debug!(uid = %input.uid, kind = %input.kind, "Request not subject to admission, allowing");
            return AdmissionDecision::allowed();
        };

        let started = Instant::now();
        let decision = match self.review(kind, input).await {
            Ok(()) => {
                info!(
                    uid = %input.uid,
                    %kind,
                    operation = ?input.operation,
                    namespace = %input.namespace,
                    name = %input.name,
                    "Admission request allowed"
                );
                AdmissionDecision::allowed()
            }
            Err(e) => {
                warn!(
                    uid = %input.uid,
                    %kind,
                    operation = ?input.operation,
                    namespace = %input.namespace,
                    name = %input.name,
                    code = e.code(),
                    retryable = e.is_retryable(),
                    error = %e,
                    "Admission request denied"
                );
                AdmissionDecision::from(&e)
            }
        };

        if let Some(metrics) = self.metrics() {
            metrics.record_request(
                kind.as_str(),
                operation_name(&input.operation),
                decision.outcome(),
                started.elapsed().as_secs_f64(),
            );
        }
        decision
    }

    async fn review(&self, kind: ResourceKind, input: &AdmissionInput) -> Result<()> {
        let guard = self.store.read().await;
        let store = guard.as_deref().ok_or(Error::Uninitialized)?;
        let trusted = self.operator.is_trusted(&input.user);
        debug!(uid = %input.uid, trusted, "Classified caller");

        let ctx = ValidationContext::new(store, &input.namespace, &input.name);
        match kind {
            ResourceKind::Database(DatabaseKind::DocumentDB) => {
                self.review_database::<DocumentDB>(&ctx, input, trusted).await
            }
            ResourceKind::Database(DatabaseKind::RelationalDB) => {
                self.review_database::<RelationalDB>(&ctx, input, trusted)
                    .await
            }
            ResourceKind::Database(DatabaseKind::KeyValueDB) => {
                self.review_database::<KeyValueDB>(&ctx, input, trusted).await
            }
            ResourceKind::Database(DatabaseKind::CacheDB) => {
                self.review_database::<CacheDB>(&ctx, input, trusted).await
            }
            ResourceKind::Database(DatabaseKind::SearchDB) => {
                self.review_database::<SearchDB>(&ctx, input, trusted).await
            }
            ResourceKind::BackupArtifact => self.review_backup_artifact(&ctx, input, trusted).await,
            ResourceKind::DormantRecord => self.review_dormant_record(&ctx, input, trusted).await,
        }
    }

    async fn review_database<D: LiveDatabase>(
        &self,
        ctx: &ValidationContext<'_>,
        input: &AdmissionInput,
        trusted: bool,
    ) -> Result<()> {
        let kind = ResourceKind::Database(D::KIND);
        if input.operation == Operation::Delete {
            // The DELETE payload carries no object.
            let stored: Option<D> = get_typed(ctx.store, kind.into(), ctx.namespace, ctx.name).await?;
            return match stored {
                Some(db) => pause_guard::validate(&db),
                None => Ok(()),
            };
        }

        let db: D = decode(kind, input.object.as_ref())?;
        check_update::<D>(kind, input, trusted)?;
        database::validate(ctx, &db).await
    }

    async fn review_backup_artifact(
        &self,
        ctx: &ValidationContext<'_>,
        input: &AdmissionInput,
        trusted: bool,
    ) -> Result<()> {
        let kind = ResourceKind::BackupArtifact;
        if input.operation == Operation::Delete {
            return Ok(());
        }

        let artifact: BackupArtifact = decode(kind, input.object.as_ref())?;
        check_update::<BackupArtifact>(kind, input, trusted)?;
        backup::validate_artifact(ctx, &artifact).await
    }

    async fn review_dormant_record(
        &self,
        ctx: &ValidationContext<'_>,
        input: &AdmissionInput,
        trusted: bool,
    ) -> Result<()> {
        let kind = ResourceKind::DormantRecord;
        let record: DormantRecord = match input.operation {
            Operation::Delete => {
                let stored: Option<DormantRecord> =
                    get_typed(ctx.store, ObjectFamily::DormantRecord, ctx.namespace, ctx.name)
                        .await?;
                let Some(record) = stored else {
                    return Ok(());
                };
                if !trusted && !record.is_wiped_out() {
                    return Err(Error::unauthorized(format!(
                        "DormantRecord \"{}\" is not wiped out yet, only the operator may delete it",
                        ctx.name
                    )));
                }
                record
            }
            Operation::Create => {
                if !trusted {
                    return Err(Error::unauthorized(
                        "DormantRecord can only be created by the operator",
                    ));
                }
                let record = decode(kind, input.object.as_ref())?;
                dormant_record::validate(&record)?;
                record
            }
            _ => {
                let record = decode(kind, input.object.as_ref())?;
                check_update::<DormantRecord>(kind, input, trusted)?;
                dormant_record::validate(&record)?;
                record
            }
        };

        let record = with_request_identity(record, input);
        let report = ownership::transition(ctx.store, &record, input.dry_run).await?;
        if let Some(metrics) = self.metrics() {
            metrics.record_transition(report.direction.as_str());
        }
        Ok(())
    }
}

/// Fill in namespace and name from the request when the payload omits them.
fn with_request_identity(mut record: DormantRecord, input: &AdmissionInput) -> DormantRecord {
    if record.namespace().is_none() && !input.namespace.is_empty() {
        record.metadata.namespace = Some(input.namespace.clone());
    }
    if record.metadata.name.is_none() && !input.name.is_empty() {
        record.metadata.name = Some(input.name.clone());
    }
    record
}

/// Decode an admission payload into `K`.
fn decode<K: DeserializeOwned>(kind: ResourceKind, object: Option<&Value>) -> Result<K> {
    let object = object.ok_or_else(|| Error::Decode {
        kind: kind.to_string(),
        source: serde::de::Error::custom("request carries no object"),
    })?;
    serde_json::from_value(object.clone()).map_err(|source| Error::Decode {
        kind: kind.to_string(),
        source,
    })
}

/// Run the immutable-field check for UPDATE requests.
///
/// The old object must decode as `K` just like the new one.
fn check_update<K: DeserializeOwned>(
    kind: ResourceKind,
    input: &AdmissionInput,
    trusted: bool,
) -> Result<()> {
    if input.operation != Operation::Update {
        return Ok(());
    }
    let old = input.old_object.as_ref().ok_or_else(|| Error::Decode {
        kind: kind.to_string(),
        source: serde::de::Error::custom("update carries no old object"),
    })?;
    decode::<K>(kind, Some(old))?;
    let new = input.object.as_ref().unwrap_or(&Value::Null);

    if trusted && kind.operator_bypasses_immutability() {
        debug!(%kind, "Operator update, skipping immutable-field check");
        return Ok(());
    }
    immutability::validate_update(old, new, kind)?;
    Ok(())
}

fn operation_name(operation: &Operation) -> &'static str {
    match operation {
        Operation::Create => "CREATE",
        Operation::Update => "UPDATE",
        Operation::Delete => "DELETE",
        Operation::Connect => "CONNECT",
    }
}
