//! Immutability validation policy.
//!
//! Enforced on UPDATE operations only.
//!
//! Compares the old and new object as plain JSON trees, restricted to a
//! static table of forbidden paths. A `*` segment matches every key of a
//! mapping or every index of a sequence at that position.
//!
//! At a guarded path, an absent value and a zero value (`null`, `false`, `0`,
//! `""`, `[]` or `{}`) are the same thing. Below that path the comparison is
//! exact: a mapping key present on one side only, or a value of another type,
//! is a change.

use serde_json::Value;
use thiserror::Error;

use crate::crd::{DatabaseKind, ResourceKind};

/// Paths no caller may change on any kind.
pub const UNIVERSAL_PATHS: &[&str] = &[
    "apiVersion",
    "kind",
    "metadata.name",
    "metadata.namespace",
    "status",
];

/// Per-kind forbidden paths.
#[derive(Clone, Copy, Debug)]
pub struct ImmutabilityRule {
    /// Frozen after creation.
    pub paths: &'static [&'static str],
    /// Subset of `paths` that may still be filled in while unset.
    pub set_once: &'static [&'static str],
}

/// Forbidden spec paths for `kind`, in addition to [`UNIVERSAL_PATHS`].
pub fn rule_for(kind: ResourceKind) -> ImmutabilityRule {
    let paths: &'static [&'static str] = match kind {
        ResourceKind::Database(DatabaseKind::SearchDB) => &[
            "spec.version",
            "spec.topology.*.prefix",
            "spec.enableSSL",
            "spec.certificateSecret",
            "spec.databaseSecret",
            "spec.storage",
            "spec.nodeSelector",
            "spec.init",
        ],
        ResourceKind::Database(DatabaseKind::RelationalDB) => &[
            "spec.version",
            "spec.standbyMode",
            "spec.streamingMode",
            "spec.archiver",
            "spec.databaseSecret",
            "spec.storage",
            "spec.nodeSelector",
            "spec.init",
        ],
        ResourceKind::Database(DatabaseKind::DocumentDB) => &[
            "spec.version",
            "spec.storage",
            "spec.databaseSecret",
            "spec.nodeSelector",
            "spec.init",
        ],
        ResourceKind::Database(DatabaseKind::KeyValueDB) => {
            &["spec.version", "spec.storage", "spec.nodeSelector"]
        }
        ResourceKind::Database(DatabaseKind::CacheDB) => &["spec.version", "spec.nodeSelector"],
        ResourceKind::BackupArtifact => &["spec.databaseName"],
        ResourceKind::DormantRecord => &["spec.origin"],
    };
    let set_once: &'static [&'static str] = match kind {
        ResourceKind::Database(DatabaseKind::DocumentDB) => &["spec.databaseSecret"],
        _ => &[],
    };
    ImmutabilityRule { paths, set_once }
}

/// One or more forbidden paths differ between the old and new object.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error(
    "{} fields cannot be changed: {}. Immutable fields: {}",
    .kind,
    .paths.join(", "),
    guarded_paths(.kind)
)]
pub struct ImmutableFieldViolation {
    pub kind: ResourceKind,
    /// Concrete paths that changed, wildcards expanded.
    pub paths: Vec<String>,
}

/// Every guarded pattern of `kind`, comma separated.
fn guarded_paths(kind: &ResourceKind) -> String {
    UNIVERSAL_PATHS
        .iter()
        .chain(rule_for(*kind).paths)
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check that no forbidden path differs between `old` and `new`.
///
/// Reports every changed path, not only the first.
pub fn validate_update(
    old: &Value,
    new: &Value,
    kind: ResourceKind,
) -> Result<(), ImmutableFieldViolation> {
    let rule = rule_for(kind);
    let mut changed = Vec::new();

    for pattern in UNIVERSAL_PATHS.iter().chain(rule.paths) {
        if rule.set_once.contains(pattern) && lookup(old, pattern).is_none_or(is_zero) {
            continue;
        }
        let segments: Vec<&str> = pattern.split('.').collect();
        let mut path = Vec::new();
        collect_changes(Some(old), Some(new), &segments, &mut path, &mut changed);
    }

    let mut paths: Vec<String> = Vec::with_capacity(changed.len());
    for path in changed {
        if !paths.contains(&path) {
            paths.push(path);
        }
    }

    if paths.is_empty() {
        Ok(())
    } else {
        Err(ImmutableFieldViolation { kind, paths })
    }
}

/// Value at a dotted path without wildcards.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, segment| child(current, segment))
}

fn collect_changes(
    old: Option<&Value>,
    new: Option<&Value>,
    segments: &[&str],
    path: &mut Vec<String>,
    out: &mut Vec<String>,
) {
    let Some((segment, rest)) = segments.split_first() else {
        if !equivalent(old, new) {
            out.push(path.join("."));
        }
        return;
    };

    if *segment == "*" {
        let mut keys = child_keys(old);
        for key in child_keys(new) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        for key in keys {
            path.push(key.clone());
            collect_changes(
                old.and_then(|v| child(v, &key)),
                new.and_then(|v| child(v, &key)),
                rest,
                path,
                out,
            );
            path.pop();
        }
    } else {
        path.push(segment.to_string());
        collect_changes(
            old.and_then(|v| child(v, segment)),
            new.and_then(|v| child(v, segment)),
            rest,
            path,
            out,
        );
        path.pop();
    }
}

fn child<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_keys(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        Some(Value::Array(items)) => (0..items.len()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}

/// Equality at a guarded path, where absent and zero-valued coincide.
fn equivalent(old: Option<&Value>, new: Option<&Value>) -> bool {
    match (old, new) {
        (None, None) => true,
        (None, Some(v)) | (Some(v), None) => is_zero(v),
        (Some(a), Some(b)) => a == b,
    }
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
