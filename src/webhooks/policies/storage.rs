//! Persistent storage request validation.

use super::ValidationContext;
use crate::crd::StorageSpec;
use crate::error::{Error, Result};

/// Validate `spec.storage`: an existing storage class and a storage request.
pub async fn validate(ctx: &ValidationContext<'_>, storage: &StorageSpec) -> Result<()> {
    let class_name = storage
        .storage_class_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::semantic("spec.storage.storageClassName is required"))?;

    ctx.require_storage_class(class_name).await?;

    match storage.resources.requests.get("storage") {
        Some(quantity) if !quantity.trim().is_empty() => Ok(()),
        _ => Err(Error::semantic(
            "spec.storage.resources.requests.storage is required",
        )),
    }
}
