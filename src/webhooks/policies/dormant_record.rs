//! DormantRecord origin validation.

use kube::ResourceExt;

use crate::crd::{DormantRecord, LABEL_DATABASE_KIND};
use crate::error::{Error, Result};

/// Validate that a DormantRecord's origin is self-consistent
pub fn validate(record: &DormantRecord) -> Result<()> {
    let kinds = record.spec.origin.spec.kinds();
    let kind = match kinds.as_slice() {
        [kind] => *kind,
        [] => {
            return Err(Error::semantic(
                "spec.origin.spec must set exactly one database kind, found none",
            ));
        }
        many => {
            let names: Vec<&str> = many.iter().map(|k| k.as_str()).collect();
            return Err(Error::semantic(format!(
                "spec.origin.spec must set exactly one database kind, found {}",
                names.join(", ")
            )));
        }
    };

    let name = record.name_any();
    if let Some(origin_name) = record.spec.origin.metadata.name.as_deref() {
        if origin_name != name {
            return Err(Error::semantic(format!(
                "spec.origin.metadata.name \"{}\" does not match DormantRecord name \"{}\"",
                origin_name, name
            )));
        }
    }

    if let Some(label) = record.labels().get(LABEL_DATABASE_KIND) {
        if label != kind.as_str() {
            return Err(Error::semantic(format!(
                "label {}={} does not match origin kind {}",
                LABEL_DATABASE_KIND, label, kind
            )));
        }
    }

    Ok(())
}
