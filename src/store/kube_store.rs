//! [`ObjectStore`] backed by the Kubernetes API.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret};
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{ApiResource, ListParams, Patch, PatchParams};
use kube::core::DynamicObject;
use kube::{Api, Client};
use tracing::{debug, instrument};

use super::{LabelSelector, ObjectFamily, ObjectStore, StoreError, selector_string};
use crate::crd::{
    BackupArtifact, CacheDB, DatabaseKind, DocumentDB, DormantRecord, KeyValueDB, RelationalDB,
    SearchDB,
};

/// Field manager recorded on owner-reference patches.
pub const FIELD_MANAGER: &str = "db-admission";

/// Kubernetes-backed object store.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, family: ObjectFamily, namespace: &str) -> Api<DynamicObject> {
        let resource = api_resource(family);
        if family.is_cluster_scoped() {
            Api::all_with(self.client.clone(), &resource)
        } else {
            Api::namespaced_with(self.client.clone(), namespace, &resource)
        }
    }
}

fn api_resource(family: ObjectFamily) -> ApiResource {
    match family {
        ObjectFamily::Database(DatabaseKind::DocumentDB) => ApiResource::erase::<DocumentDB>(&()),
        ObjectFamily::Database(DatabaseKind::RelationalDB) => {
            ApiResource::erase::<RelationalDB>(&())
        }
        ObjectFamily::Database(DatabaseKind::KeyValueDB) => ApiResource::erase::<KeyValueDB>(&()),
        ObjectFamily::Database(DatabaseKind::CacheDB) => ApiResource::erase::<CacheDB>(&()),
        ObjectFamily::Database(DatabaseKind::SearchDB) => ApiResource::erase::<SearchDB>(&()),
        ObjectFamily::DormantRecord => ApiResource::erase::<DormantRecord>(&()),
        ObjectFamily::BackupArtifact => ApiResource::erase::<BackupArtifact>(&()),
        ObjectFamily::PersistentVolumeClaim => ApiResource::erase::<PersistentVolumeClaim>(&()),
        ObjectFamily::Secret => ApiResource::erase::<Secret>(&()),
        ObjectFamily::StorageClass => ApiResource::erase::<StorageClass>(&()),
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    #[instrument(skip(self), fields(family = %family))]
    async fn get(
        &self,
        family: ObjectFamily,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, StoreError> {
        Ok(self.api(family, namespace).get_opt(name).await?)
    }

    #[instrument(skip(self), fields(family = %family))]
    async fn list(
        &self,
        family: ObjectFamily,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let mut params = ListParams::default();
        if !selector.is_empty() {
            params = params.labels(&selector_string(selector));
        }
        let list = self.api(family, namespace).list(&params).await?;
        debug!(count = list.items.len(), "Listed objects");
        Ok(list.items)
    }

    #[instrument(skip(self, owner_references), fields(family = %family, count = owner_references.len()))]
    async fn patch_owner_references(
        &self,
        family: ObjectFamily,
        namespace: &str,
        name: &str,
        resource_version: Option<&str>,
        owner_references: &[OwnerReference],
    ) -> Result<(), StoreError> {
        let patch = owner_references_patch(resource_version, owner_references);
        self.api(family, namespace)
            .patch(
                name,
                &PatchParams {
                    field_manager: Some(FIELD_MANAGER.to_string()),
                    ..Default::default()
                },
                &Patch::Merge(&patch),
            )
            .await
            .map_err(|e| match e {
                kube::Error::Api(ae) if ae.code == 409 => StoreError::Conflict {
                    family,
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                },
                other => StoreError::Kube(other),
            })?;
        Ok(())
    }
}

/// Merge patch replacing the owner references. A `resourceVersion` in a
/// merge patch makes the API server reject it with 409 on a stale read.
fn owner_references_patch(
    resource_version: Option<&str>,
    owner_references: &[OwnerReference],
) -> serde_json::Value {
    let mut metadata = serde_json::json!({ "ownerReferences": owner_references });
    if let Some(version) = resource_version {
        metadata["resourceVersion"] = serde_json::Value::from(version);
    }
    serde_json::json!({ "metadata": metadata })
}
