//! Semantic validation of the live database kinds.
//!
//! Written once against [`LiveDatabase`]; the kind-specific differences
//! (allowed versions, replication support, which secrets are referenced)
//! come from [`DatabaseKind`] and the [`DatabaseSpec`] accessors.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{ValidationContext, backup, monitor, rule_store_error, storage};
use crate::crd::{DatabaseKind, DatabaseSpec, DormantRecord, LiveDatabase};
use crate::error::{Error, Result};
use crate::store::{ObjectFamily, get_typed};

/// Validate a live database on CREATE and UPDATE
pub async fn validate<D: LiveDatabase>(ctx: &ValidationContext<'_>, db: &D) -> Result<()> {
    let spec = db.db_spec();

    validate_version(D::KIND, spec.version())?;
    validate_replicas(D::KIND, spec.replicas())?;

    if let Some(storage) = spec.storage() {
        storage::validate(ctx, storage).await?;
    }

    if let Some(secret) = spec.database_secret() {
        ctx.require_secret("spec.databaseSecret", &secret.secret_name)
            .await?;
    }

    for (field, secret) in spec.auxiliary_secrets() {
        ctx.require_secret(field, &secret.secret_name).await?;
    }

    if let Some(schedule) = spec.backup_schedule() {
        backup::validate_schedule(ctx, schedule).await?;
    }

    if let Some(monitor) = spec.monitor() {
        monitor::validate(monitor)?;
    }

    match_dormant_record(ctx, db).await
}

/// Check `spec.version` against the kind's allow-list
pub fn validate_version(kind: DatabaseKind, version: &str) -> Result<()> {
    if version.is_empty() {
        return Err(Error::semantic(format!("{} spec.version is required", kind)));
    }
    if !kind.allowed_versions().iter().any(|v| *v == version) {
        return Err(Error::semantic(format!(
            "{} version \"{}\" is not supported, supported versions: {}",
            kind,
            version,
            kind.allowed_versions().join(", ")
        )));
    }
    Ok(())
}

/// Check `spec.replicas`
pub fn validate_replicas(kind: DatabaseKind, replicas: Option<i32>) -> Result<()> {
    let Some(replicas) = replicas else {
        return Ok(());
    };
    if kind.supports_replication() {
        if replicas < 1 {
            return Err(Error::semantic(format!(
                "spec.replicas must be at least 1 (got {})",
                replicas
            )));
        }
    } else if replicas != 1 {
        return Err(Error::semantic(format!(
            "spec.replicas \"{}\" invalid. {} supports exactly one replica",
            replicas, kind
        )));
    }
    Ok(())
}

/// A database may reuse the name of a DormantRecord only to resume it: same
/// kind, and the same spec apart from the fields a resume may change.
async fn match_dormant_record<D: LiveDatabase>(ctx: &ValidationContext<'_>, db: &D) -> Result<()> {
    let record: Option<DormantRecord> =
        get_typed(ctx.store, ObjectFamily::DormantRecord, ctx.namespace, ctx.name)
            .await
            .map_err(rule_store_error)?;
    let Some(record) = record else {
        return Ok(());
    };

    let origin = match D::origin_spec(&record.spec.origin.spec) {
        Some(origin) if record.origin_kind() == Some(D::KIND) => origin,
        _ => {
            return Err(Error::semantic(format!(
                "invalid {}: \"{}\". Exists DormantRecord \"{}\" of different kind",
                D::KIND,
                ctx.name,
                ctx.name
            )));
        }
    };

    let live = db.db_spec().comparable();
    let frozen = origin.comparable();
    if live != frozen {
        let fields = differing_fields(&frozen, &live);
        debug!(kind = %D::KIND, name = ctx.name, ?fields, "Spec differs from dormant origin");
        return Err(Error::semantic(format!(
            "{} spec mismatches with origin spec of DormantRecord \"{}\", differing fields: {}",
            D::KIND,
            ctx.name,
            fields.join(", ")
        )));
    }
    Ok(())
}

/// Top-level spec fields that differ between two specs.
fn differing_fields<S: Serialize>(a: &S, b: &S) -> Vec<String> {
    let (Ok(Value::Object(a)), Ok(Value::Object(b))) =
        (serde_json::to_value(a), serde_json::to_value(b))
    else {
        return Vec::new();
    };
    let mut keys: Vec<&String> = a.keys().chain(b.keys()).collect();
    keys.sort();
    keys.dedup();
    keys.into_iter()
        .filter(|key| a.get(*key) != b.get(*key))
        .map(|key| format!("spec.{}", key))
        .collect()
}
