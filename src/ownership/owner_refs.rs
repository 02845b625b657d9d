//! Owner-reference set operations.
//!
//! Owner references are treated as a set keyed by `(kind, name)`: upserting
//! an existing owner replaces it in place, removing an absent owner is a
//! no-op. Both return `None` when the set would not change, so callers can
//! skip the patch.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::ResourceExt;

use crate::crd::{DormantRecord, GROUP_VERSION};
use crate::error::{Error, Result};

/// Owner reference pointing at a DormantRecord.
///
/// Blocks deletion of the owner until dependents are collected, but never
/// claims to be the controller.
pub fn dormant_owner_reference(record: &DormantRecord) -> Result<OwnerReference> {
    let uid = record
        .uid()
        .ok_or_else(|| Error::internal(format!("DormantRecord \"{}\" has no uid", record.name_any())))?;
    Ok(OwnerReference {
        api_version: GROUP_VERSION.to_string(),
        kind: "DormantRecord".to_string(),
        name: record.name_any(),
        uid,
        block_owner_deletion: Some(true),
        controller: None,
    })
}

fn same_owner(a: &OwnerReference, kind: &str, name: &str) -> bool {
    a.kind == kind && a.name == name
}

/// Add or replace `owner` in `current`.
pub fn ensure_owner_reference(
    current: &[OwnerReference],
    owner: &OwnerReference,
) -> Option<Vec<OwnerReference>> {
    match current
        .iter()
        .position(|r| same_owner(r, &owner.kind, &owner.name))
    {
        Some(i) if current.get(i) == Some(owner) => None,
        Some(i) => {
            let mut updated = current.to_vec();
            if let Some(slot) = updated.get_mut(i) {
                *slot = owner.clone();
            }
            Some(updated)
        }
        None => {
            let mut updated = current.to_vec();
            updated.push(owner.clone());
            Some(updated)
        }
    }
}

/// Drop every reference to `(kind, name)` from `current`.
pub fn remove_owner_reference(
    current: &[OwnerReference],
    kind: &str,
    name: &str,
) -> Option<Vec<OwnerReference>> {
    if !current.iter().any(|r| same_owner(r, kind, name)) {
        return None;
    }
    Some(
        current
            .iter()
            .filter(|r| !same_owner(r, kind, name))
            .cloned()
            .collect(),
    )
}
