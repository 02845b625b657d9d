//! Credential secret handling during ownership transitions.
//!
//! A database's credential Secret can be shared: users may point several
//! databases at the same Secret. The DormantRecord's owner reference on it is
//! only touched when the operator created the Secret for this kind (it carries
//! the `kubedb.com/kind` label) and no other live database or DormantRecord of
//! the kind references it.

use kube::ResourceExt;
use kube::core::DynamicObject;
use tracing::{debug, info};

use super::owner_refs::{dormant_owner_reference, ensure_owner_reference, remove_owner_reference};
use super::{Direction, SecretOutcome};
use crate::crd::{DatabaseKind, DormantRecord, LABEL_DATABASE_KIND};
use crate::error::Result;
use crate::store::{LabelSelector, ObjectFamily, ObjectStore, list_typed};

/// Apply `direction` to the origin's credential Secret.
pub(super) async fn transition_secret(
    store: &dyn ObjectStore,
    record: &DormantRecord,
    kind: DatabaseKind,
    namespace: &str,
    direction: Direction,
    dry_run: bool,
) -> Result<SecretOutcome> {
    if !kind.has_credential_secret() {
        return Ok(SecretOutcome::NotApplicable);
    }
    let Some(secret_name) = record
        .spec
        .origin
        .spec
        .database_secret()
        .map(|s| s.secret_name.clone())
        .filter(|name| !name.is_empty())
    else {
        return Ok(SecretOutcome::NotReferenced);
    };

    let Some(secret) = store
        .get(ObjectFamily::Secret, namespace, &secret_name)
        .await?
    else {
        debug!(secret = %secret_name, "Credential secret already gone");
        return Ok(SecretOutcome::Missing);
    };

    if secret.labels().get(LABEL_DATABASE_KIND).map(String::as_str) != Some(kind.as_str()) {
        debug!(secret = %secret_name, "Secret was not created by the operator, leaving it alone");
        return Ok(SecretOutcome::NotOperatorOwned);
    }

    if let Some(user) = find_other_user(store, record, kind, namespace, &secret_name).await? {
        info!(secret = %secret_name, used_by = %user, "Secret still in use, keeping owner references");
        return Ok(SecretOutcome::InUse { by: user });
    }

    let current = secret.owner_references();
    let updated = match direction {
        Direction::Attach => ensure_owner_reference(current, &dormant_owner_reference(record)?),
        Direction::Detach => remove_owner_reference(current, "DormantRecord", &record.name_any()),
    };
    let Some(updated) = updated else {
        return Ok(SecretOutcome::Unchanged);
    };

    if !dry_run {
        store
            .patch_owner_references(
                ObjectFamily::Secret,
                namespace,
                &secret_name,
                secret.resource_version().as_deref(),
                &updated,
            )
            .await?;
    }
    Ok(SecretOutcome::Patched)
}

/// Another live database or DormantRecord of `kind` in `namespace` that
/// references `secret_name`, described as `Kind/name`.
pub async fn find_other_user(
    store: &dyn ObjectStore,
    record: &DormantRecord,
    kind: DatabaseKind,
    namespace: &str,
    secret_name: &str,
) -> Result<Option<String>> {
    let live = store
        .list(ObjectFamily::Database(kind), namespace, &LabelSelector::new())
        .await?;
    if let Some(db) = live
        .iter()
        .find(|db| live_secret_name(db) == Some(secret_name))
    {
        return Ok(Some(format!("{}/{}", kind, db.name_any())));
    }

    let own_name = record.name_any();
    let records: Vec<DormantRecord> = list_typed(
        store,
        ObjectFamily::DormantRecord,
        namespace,
        &LabelSelector::new(),
    )
    .await?;
    Ok(records
        .iter()
        .filter(|other| other.name_any() != own_name)
        .filter(|other| other.origin_kind() == Some(kind))
        .find(|other| {
            other
                .spec
                .origin
                .spec
                .database_secret()
                .is_some_and(|s| s.secret_name == secret_name)
        })
        .map(|other| format!("DormantRecord/{}", other.name_any())))
}

fn live_secret_name(db: &DynamicObject) -> Option<&str> {
    db.data
        .pointer("/spec/databaseSecret/secretName")
        .and_then(|v| v.as_str())
}
