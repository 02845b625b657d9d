//! DELETE protection for live databases.
//!
//! Deleting a live database pauses it into a DormantRecord. A database
//! flagged `spec.doNotPause` refuses that, for every caller including the
//! operator.

use kube::ResourceExt;

use crate::crd::{DatabaseSpec, LiveDatabase};
use crate::error::{Error, Result};

/// Refuse deletion of `db` while `spec.doNotPause` is set.
pub fn validate<D: LiveDatabase>(db: &D) -> Result<()> {
    if db.db_spec().do_not_pause() {
        return Err(Error::semantic(format!(
            "{} \"{}\" can't be paused. To continue delete, unset spec.doNotPause and retry",
            D::KIND,
            db.name_any()
        )));
    }
    Ok(())
}
