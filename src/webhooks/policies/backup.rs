//! Snapshot storage and backup schedule validation.
//!
//! The same storage rules apply to a BackupArtifact's backend and to the
//! backend of a live database's `spec.backupSchedule`.

use super::ValidationContext;
use crate::crd::{BackupArtifact, BackupScheduleSpec, SnapshotStorageSpec};
use crate::error::{Error, Result};

/// Validate a BackupArtifact
pub async fn validate_artifact(ctx: &ValidationContext<'_>, artifact: &BackupArtifact) -> Result<()> {
    if artifact.spec.database_name.trim().is_empty() {
        return Err(Error::semantic("spec.databaseName is required"));
    }
    validate_storage(ctx, "spec", &artifact.spec.storage).await
}

/// Validate `spec.backupSchedule` of a live database
pub async fn validate_schedule(
    ctx: &ValidationContext<'_>,
    schedule: &BackupScheduleSpec,
) -> Result<()> {
    validate_cron(&schedule.cron_expression)?;
    validate_storage(ctx, "spec.backupSchedule", &schedule.storage).await
}

/// Check the shape of a cron expression: five or six fields, or a
/// `@`-descriptor such as `@every 6h` or `@daily`.
pub fn validate_cron(expression: &str) -> Result<()> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Err(Error::semantic("spec.backupSchedule.cronExpression is required"));
    }
    if let Some(descriptor) = expression.strip_prefix('@') {
        return match descriptor.split_whitespace().next() {
            Some("yearly" | "annually" | "monthly" | "weekly" | "daily" | "midnight" | "hourly") => {
                Ok(())
            }
            Some("every") if descriptor.split_whitespace().count() == 2 => Ok(()),
            _ => Err(Error::semantic(format!(
                "spec.backupSchedule.cronExpression \"{}\" is not a valid descriptor",
                expression
            ))),
        };
    }
    match expression.split_whitespace().count() {
        5 | 6 => Ok(()),
        n => Err(Error::semantic(format!(
            "spec.backupSchedule.cronExpression \"{}\" has {} fields, expected 5 or 6",
            expression, n
        ))),
    }
}

/// Validate a snapshot storage backend. `prefix` names the object the
/// backend fields live under, for error messages.
pub async fn validate_storage(
    ctx: &ValidationContext<'_>,
    prefix: &str,
    storage: &SnapshotStorageSpec,
) -> Result<()> {
    let mut backends = Vec::new();
    if let Some(s3) = &storage.s3 {
        backends.push(("s3", s3.bucket.as_str()));
    }
    if let Some(gcs) = &storage.gcs {
        backends.push(("gcs", gcs.bucket.as_str()));
    }
    if let Some(azure) = &storage.azure {
        backends.push(("azure", azure.container.as_str()));
    }
    if let Some(swift) = &storage.swift {
        backends.push(("swift", swift.container.as_str()));
    }
    if let Some(local) = &storage.local {
        backends.push(("local", local.mount_path.as_str()));
    }

    let (backend, location) = match backends.as_slice() {
        [single] => *single,
        [] => {
            return Err(Error::semantic(format!(
                "{} has no storage backend, set one of s3, gcs, azure, swift or local",
                prefix
            )));
        }
        many => {
            let names: Vec<&str> = many.iter().map(|(name, _)| *name).collect();
            return Err(Error::semantic(format!(
                "{} sets multiple storage backends: {}",
                prefix,
                names.join(", ")
            )));
        }
    };

    if location.trim().is_empty() {
        let field = match backend {
            "s3" | "gcs" => "bucket",
            "local" => "mountPath",
            _ => "container",
        };
        return Err(Error::semantic(format!(
            "{}.{}.{} is required",
            prefix, backend, field
        )));
    }

    if backend == "local" {
        return Ok(());
    }

    let secret = storage
        .storage_secret_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            Error::semantic(format!(
                "{}.storageSecretName is required for {} backend",
                prefix, backend
            ))
        })?;
    ctx.require_secret(&format!("{}.storageSecretName", prefix), secret)
        .await
}
