//! In-memory [`ObjectStore`].
//!
//! Behaves like a fake clientset: objects are seeded up front, reads see the
//! latest writes, and owner-reference patches are applied in place. Failures
//! can be injected per family to exercise error paths.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::core::DynamicObject;
use serde::Serialize;
use tokio::sync::RwLock;

use super::{LabelSelector, ObjectFamily, ObjectStore, StoreError, selector_matches};

type Key = (ObjectFamily, String, String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum FailOn {
    Get,
    List,
    Patch,
}

/// Object store held entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<Key, DynamicObject>>,
    failures: RwLock<BTreeSet<(ObjectFamily, FailOn)>>,
    patches: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(family: ObjectFamily, namespace: &str, name: &str) -> Key {
        let namespace = if family.is_cluster_scoped() {
            String::new()
        } else {
            namespace.to_string()
        };
        (family, namespace, name.to_string())
    }

    /// Seed an object. Namespace and name are taken from its metadata.
    pub async fn insert<K: Serialize>(
        &self,
        family: ObjectFamily,
        object: &K,
    ) -> Result<(), StoreError> {
        let object: DynamicObject = serde_json::from_value(serde_json::to_value(object)?)?;
        let name = object
            .metadata
            .name
            .clone()
            .ok_or_else(|| StoreError::Backend("object has no name".to_string()))?;
        let namespace = object.metadata.namespace.clone().unwrap_or_default();
        self.objects
            .write()
            .await
            .insert(Self::key(family, &namespace, &name), object);
        Ok(())
    }

    /// Current owner references of an object, if it exists.
    pub async fn owner_references(
        &self,
        family: ObjectFamily,
        namespace: &str,
        name: &str,
    ) -> Option<Vec<OwnerReference>> {
        self.objects
            .read()
            .await
            .get(&Self::key(family, namespace, name))
            .map(|o| o.metadata.owner_references.clone().unwrap_or_default())
    }

    /// Number of patches applied so far.
    pub fn patch_count(&self) -> usize {
        self.patches.load(Ordering::SeqCst)
    }

    pub async fn fail_gets(&self, family: ObjectFamily) {
        self.failures.write().await.insert((family, FailOn::Get));
    }

    pub async fn fail_lists(&self, family: ObjectFamily) {
        self.failures.write().await.insert((family, FailOn::List));
    }

    pub async fn fail_patches(&self, family: ObjectFamily) {
        self.failures.write().await.insert((family, FailOn::Patch));
    }

    async fn check(&self, family: ObjectFamily, op: FailOn) -> Result<(), StoreError> {
        if self.failures.read().await.contains(&(family, op)) {
            return Err(StoreError::Backend(format!(
                "injected {:?} failure for {}",
                op, family
            )));
        }
        Ok(())
    }
}

fn next_resource_version(current: Option<&str>) -> String {
    let current = current.and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
    (current + 1).to_string()
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(
        &self,
        family: ObjectFamily,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, StoreError> {
        self.check(family, FailOn::Get).await?;
        Ok(self
            .objects
            .read()
            .await
            .get(&Self::key(family, namespace, name))
            .cloned())
    }

    async fn list(
        &self,
        family: ObjectFamily,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        self.check(family, FailOn::List).await?;
        let scope = Self::key(family, namespace, "").1;
        Ok(self
            .objects
            .read()
            .await
            .iter()
            .filter(|((f, ns, _), _)| *f == family && *ns == scope)
            .filter(|(_, o)| selector_matches(selector, o.metadata.labels.as_ref()))
            .map(|(_, o)| o.clone())
            .collect())
    }

    async fn patch_owner_references(
        &self,
        family: ObjectFamily,
        namespace: &str,
        name: &str,
        resource_version: Option<&str>,
        owner_references: &[OwnerReference],
    ) -> Result<(), StoreError> {
        self.check(family, FailOn::Patch).await?;
        let mut objects = self.objects.write().await;
        let object = objects
            .get_mut(&Self::key(family, namespace, name))
            .ok_or_else(|| {
                StoreError::Backend(format!("{} {}/{} not found", family, namespace, name))
            })?;
        let stale = resource_version
            .is_some_and(|expected| object.metadata.resource_version.as_deref() != Some(expected));
        if stale {
            return Err(StoreError::Conflict {
                family,
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }
        object.metadata.owner_references = Some(owner_references.to_vec());
        object.metadata.resource_version = Some(next_resource_version(
            object.metadata.resource_version.as_deref(),
        ));
        self.patches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
