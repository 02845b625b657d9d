//! Dormant ownership transitions.
//!
//! When a DormantRecord is admitted, its `wipeOut` switch decides who owns
//! the dependents the database left behind:
//!
//! - `wipeOut: true` (attach): every BackupArtifact and PersistentVolumeClaim
//!   labelled with the record's name and origin kind gets an owner reference
//!   to the record, so deleting the record garbage-collects them.
//! - `wipeOut: false` (detach): that owner reference is removed again, so the
//!   dependents survive the record.
//!
//! The credential Secret follows the same direction, subject to the rules in
//! [`secrets`]. Every step is an idempotent upsert or removal; a failing step
//! aborts the transition without rolling back earlier patches.

pub mod owner_refs;
pub mod secrets;

use std::fmt;

use kube::ResourceExt;
use tracing::{debug, info, instrument};

use crate::crd::{DormantRecord, LABEL_DATABASE_KIND, LABEL_DATABASE_NAME};
use crate::error::{Error, Result};
use crate::store::{LabelSelector, ObjectFamily, ObjectStore};
use owner_refs::{dormant_owner_reference, ensure_owner_reference, remove_owner_reference};

/// Which way ownership moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Dependents become owned by the record.
    Attach,
    /// Dependents stop being owned by the record.
    Detach,
}

impl Direction {
    pub fn for_record(record: &DormantRecord) -> Self {
        if record.spec.wipe_out {
            Direction::Attach
        } else {
            Direction::Detach
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Attach => "attach",
            Direction::Detach => "detach",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the credential Secret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SecretOutcome {
    /// The origin kind has no credential secret.
    NotApplicable,
    /// The origin does not reference a secret.
    NotReferenced,
    /// The referenced secret does not exist.
    Missing,
    /// The secret lacks the operator's kind label.
    NotOperatorOwned,
    /// Another resource still references the secret.
    InUse { by: String },
    /// Owner references already in the desired state.
    Unchanged,
    /// Owner references were patched (or would be, on dry run).
    Patched,
}

/// Result of one transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionReport {
    pub direction: Direction,
    /// `Kind/name` of every dependent whose owner references changed.
    pub patched: Vec<String>,
    /// Number of dependents already in the desired state.
    pub unchanged: usize,
    pub secret: SecretOutcome,
    pub dry_run: bool,
}

/// Label selector matching the dependents of `record`.
pub fn dependent_selector(name: &str, kind: &str) -> LabelSelector {
    [
        (LABEL_DATABASE_NAME.to_string(), name.to_string()),
        (LABEL_DATABASE_KIND.to_string(), kind.to_string()),
    ]
    .into()
}

/// Move ownership of `record`'s dependents according to its `wipeOut` flag.
///
/// On dry run every read happens but no patch is sent.
#[instrument(skip(store, record), fields(name = %record.name_any(), wipe_out = record.spec.wipe_out))]
pub async fn transition(
    store: &dyn ObjectStore,
    record: &DormantRecord,
    dry_run: bool,
) -> Result<TransitionReport> {
    let direction = Direction::for_record(record);
    let name = record.name_any();
    let namespace = record
        .namespace()
        .ok_or_else(|| Error::internal(format!("DormantRecord \"{}\" has no namespace", name)))?;
    let kind = record.origin_kind().ok_or_else(|| {
        Error::semantic(format!(
            "DormantRecord \"{}\" origin does not name exactly one database kind",
            name
        ))
    })?;

    let owner = match direction {
        Direction::Attach => Some(dormant_owner_reference(record)?),
        Direction::Detach => None,
    };
    let selector = dependent_selector(&name, kind.as_str());

    let mut patched = Vec::new();
    let mut unchanged = 0;
    for family in [ObjectFamily::BackupArtifact, ObjectFamily::PersistentVolumeClaim] {
        let dependents = store.list(family, &namespace, &selector).await?;
        debug!(%family, count = dependents.len(), "Listed dependents");

        for dependent in dependents {
            let current = dependent.owner_references();
            let updated = match &owner {
                Some(owner) => ensure_owner_reference(current, owner),
                None => remove_owner_reference(current, "DormantRecord", &name),
            };
            let dependent_name = dependent.name_any();
            let Some(updated) = updated else {
                unchanged += 1;
                continue;
            };
            if !dry_run {
                store
                    .patch_owner_references(
                        family,
                        &namespace,
                        &dependent_name,
                        dependent.resource_version().as_deref(),
                        &updated,
                    )
                    .await?;
            }
            patched.push(format!("{}/{}", family, dependent_name));
        }
    }

    let secret =
        secrets::transition_secret(store, record, kind, &namespace, direction, dry_run).await?;

    info!(
        %direction,
        %kind,
        patched = patched.len(),
        unchanged,
        secret = ?secret,
        dry_run,
        "Ownership transition complete"
    );

    Ok(TransitionReport {
        direction,
        patched,
        unchanged,
        secret,
        dry_run,
    })
}
