//! Dormant ownership transitions, driven through DormantRecord updates.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use serde_json::json;

use db_admission::MemoryStore;
use db_admission::crd::{DatabaseKind, GROUP_VERSION};
use db_admission::ownership::{self, Direction, SecretOutcome};
use db_admission::store::ObjectFamily;

use crate::common::*;

const PVCS: [&str; 2] = ["data-foo-0", "data-foo-1"];
const ARTIFACT: &str = "foo-snapshot";

/// Dependents of DocumentDB `foo`, plus look-alikes that belong elsewhere.
async fn seed_dependents(store: &MemoryStore) {
    for name in PVCS {
        store
            .insert(
                ObjectFamily::PersistentVolumeClaim,
                &pvc(name, "foo", DatabaseKind::DocumentDB),
            )
            .await
            .unwrap();
    }
    store
        .insert(
            ObjectFamily::BackupArtifact,
            &backup_artifact(ARTIFACT, "foo", DatabaseKind::DocumentDB),
        )
        .await
        .unwrap();
    store
        .insert(
            ObjectFamily::PersistentVolumeClaim,
            &pvc("data-bar-0", "bar", DatabaseKind::DocumentDB),
        )
        .await
        .unwrap();
    store
        .insert(
            ObjectFamily::PersistentVolumeClaim,
            &pvc("data-foo-cache", "foo", DatabaseKind::CacheDB),
        )
        .await
        .unwrap();
}

async fn seed_operator_secret(store: &MemoryStore, name: &str, owners: &[&str]) {
    let mut secret = secret(name, Some(DatabaseKind::DocumentDB));
    secret.metadata.owner_references = Some(owners.iter().map(|o| owner_ref(o)).collect());
    store.insert(ObjectFamily::Secret, &secret).await.unwrap();
}

fn owner_ref(record: &str) -> OwnerReference {
    OwnerReference {
        api_version: GROUP_VERSION.to_string(),
        kind: "DormantRecord".to_string(),
        name: record.to_string(),
        uid: format!("uid-{}", record),
        block_owner_deletion: Some(true),
        ..Default::default()
    }
}

async fn refs(store: &MemoryStore, family: ObjectFamily, name: &str) -> Vec<OwnerReference> {
    store
        .owner_references(family, NAMESPACE, name)
        .await
        .unwrap_or_else(|| panic!("{} {} not seeded", family, name))
}

/// Flip `wipeOut` on a stored record through the engine, as the operator.
async fn flip(store: std::sync::Arc<MemoryStore>, builder: &DormantRecordBuilder, wipe_out: bool) {
    let old = builder.clone().wipe_out(!wipe_out).build_value();
    let new = builder.clone().wipe_out(wipe_out).build_value();
    let decision = engine(store)
        .await
        .admit(&update(old, new, operator_user()))
        .await;
    assert!(decision.allowed, "transition denied: {:?}", decision.message);
}

#[tokio::test]
async fn test_attach_owns_matching_dependents_and_is_idempotent() {
    let store = seeded_store().await;
    seed_dependents(&store).await;
    seed_operator_secret(&store, "foo-auth", &[]).await;
    let builder = DormantRecordBuilder::new("foo", DatabaseKind::DocumentDB);
    seed_record(&store, &builder.build()).await;

    flip(store.clone(), &builder, true).await;

    for name in PVCS {
        let owners = refs(&store, ObjectFamily::PersistentVolumeClaim, name).await;
        assert_eq!(owners, vec![owner_ref("foo")], "{}", name);
        assert_eq!(owners[0].controller, None);
    }
    assert_eq!(
        refs(&store, ObjectFamily::BackupArtifact, ARTIFACT).await,
        vec![owner_ref("foo")]
    );
    assert_eq!(
        refs(&store, ObjectFamily::Secret, "foo-auth").await,
        vec![owner_ref("foo")]
    );
    for name in ["data-bar-0", "data-foo-cache"] {
        assert!(refs(&store, ObjectFamily::PersistentVolumeClaim, name)
            .await
            .is_empty());
    }
    assert_eq!(store.patch_count(), 4);

    flip(store.clone(), &builder, true).await;
    assert_eq!(store.patch_count(), 4);
    for name in PVCS {
        assert_eq!(
            refs_to(&refs(&store, ObjectFamily::PersistentVolumeClaim, name).await, "foo"),
            1
        );
    }
}

#[tokio::test]
async fn test_detach_releases_dependents() {
    let store = seeded_store().await;
    seed_dependents(&store).await;
    seed_operator_secret(&store, "foo-auth", &[]).await;
    let builder = DormantRecordBuilder::new("foo", DatabaseKind::DocumentDB);
    seed_record(&store, &builder.build()).await;

    flip(store.clone(), &builder, true).await;
    flip(store.clone(), &builder, false).await;

    for name in PVCS {
        assert!(refs(&store, ObjectFamily::PersistentVolumeClaim, name)
            .await
            .is_empty());
    }
    assert!(refs(&store, ObjectFamily::BackupArtifact, ARTIFACT)
        .await
        .is_empty());
    assert!(refs(&store, ObjectFamily::Secret, "foo-auth").await.is_empty());
}

#[tokio::test]
async fn test_detach_removes_record_from_its_own_secret() {
    let store = seeded_store().await;
    let mut secret = secret("foo-auth", Some(DatabaseKind::DocumentDB));
    secret.metadata.owner_references = Some(vec![
        OwnerReference {
            api_version: "apps/v1".to_string(),
            kind: "Deployment".to_string(),
            name: "keep".to_string(),
            uid: "uid-keep".to_string(),
            ..Default::default()
        },
        owner_ref("foo"),
    ]);
    store.insert(ObjectFamily::Secret, &secret).await.unwrap();
    let builder = DormantRecordBuilder::new("foo", DatabaseKind::DocumentDB).wipe_out(true);
    seed_record(&store, &builder.build()).await;

    flip(store.clone(), &builder, false).await;

    let owners = refs(&store, ObjectFamily::Secret, "foo-auth").await;
    assert_eq!(refs_to(&owners, "foo"), 0);
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].name, "keep");
}

#[tokio::test]
async fn test_shared_secret_survives_detach_while_referenced() {
    let store = seeded_store().await;
    seed_operator_secret(&store, "shared-auth", &["foo"]).await;
    let foo = DormantRecordBuilder::new("foo", DatabaseKind::DocumentDB)
        .secret("shared-auth")
        .wipe_out(true);
    seed_record(&store, &foo.build()).await;
    seed_record(
        &store,
        &DormantRecordBuilder::new("bar", DatabaseKind::DocumentDB)
            .secret("shared-auth")
            .build(),
    )
    .await;

    flip(store.clone(), &foo, false).await;
    assert_eq!(
        refs_to(&refs(&store, ObjectFamily::Secret, "shared-auth").await, "foo"),
        1
    );

    // bar moves to its own secret, nothing references shared-auth any more
    seed_record(
        &store,
        &DormantRecordBuilder::new("bar", DatabaseKind::DocumentDB)
            .secret("bar-auth")
            .build(),
    )
    .await;

    flip(store.clone(), &foo, false).await;
    assert_eq!(
        refs_to(&refs(&store, ObjectFamily::Secret, "shared-auth").await, "foo"),
        0
    );
}

#[tokio::test]
async fn test_live_database_pins_shared_secret() {
    let store = seeded_store().await;
    seed_operator_secret(&store, "shared-auth", &[]).await;
    let mut live = database(DatabaseKind::DocumentDB, "baz");
    live["spec"]["databaseSecret"] = json!({"secretName": "shared-auth"});
    store
        .insert(ObjectFamily::Database(DatabaseKind::DocumentDB), &live)
        .await
        .unwrap();
    let record = DormantRecordBuilder::new("foo", DatabaseKind::DocumentDB)
        .secret("shared-auth")
        .wipe_out(true)
        .build();

    let report = ownership::transition(&*store, &record, false)
        .await
        .unwrap();
    assert_eq!(report.direction, Direction::Attach);
    assert_eq!(
        report.secret,
        SecretOutcome::InUse {
            by: "DocumentDB/baz".to_string()
        }
    );
    assert!(refs(&store, ObjectFamily::Secret, "shared-auth").await.is_empty());
}

#[tokio::test]
async fn test_siblings_elsewhere_do_not_pin_secret() {
    let store = seeded_store().await;
    seed_operator_secret(&store, "shared-auth", &["foo"]).await;
    // Same secret name, but a different kind in the same namespace
    seed_record(
        &store,
        &DormantRecordBuilder::new("qux", DatabaseKind::RelationalDB)
            .secret("shared-auth")
            .build(),
    )
    .await;
    // Same kind, different namespace
    store
        .insert(
            ObjectFamily::DormantRecord,
            &DormantRecordBuilder::new("bar", DatabaseKind::DocumentDB)
                .namespace("other")
                .secret("shared-auth")
                .build(),
        )
        .await
        .unwrap();
    let record = DormantRecordBuilder::new("foo", DatabaseKind::DocumentDB)
        .secret("shared-auth")
        .build();

    let report = ownership::transition(&*store, &record, false)
        .await
        .unwrap();
    assert_eq!(report.direction, Direction::Detach);
    assert_eq!(report.secret, SecretOutcome::Patched);
    assert!(refs(&store, ObjectFamily::Secret, "shared-auth").await.is_empty());
}

#[tokio::test]
async fn test_user_created_secret_is_left_alone() {
    let store = seeded_store().await;
    seed_dependents(&store).await;
    store
        .insert(ObjectFamily::Secret, &secret("foo-auth", None))
        .await
        .unwrap();
    let record = DormantRecordBuilder::new("foo", DatabaseKind::DocumentDB)
        .wipe_out(true)
        .build();

    let report = ownership::transition(&*store, &record, false)
        .await
        .unwrap();
    assert_eq!(report.secret, SecretOutcome::NotOperatorOwned);
    assert_eq!(report.patched.len(), 3);
    assert!(report
        .patched
        .contains(&"PersistentVolumeClaim/data-foo-0".to_string()));
    assert!(report
        .patched
        .contains(&format!("BackupArtifact/{}", ARTIFACT)));
    assert!(refs(&store, ObjectFamily::Secret, "foo-auth").await.is_empty());
}

#[tokio::test]
async fn test_repeat_transition_reports_unchanged() {
    let store = seeded_store().await;
    seed_dependents(&store).await;
    seed_operator_secret(&store, "foo-auth", &[]).await;
    let record = DormantRecordBuilder::new("foo", DatabaseKind::DocumentDB)
        .wipe_out(true)
        .build();

    let first = ownership::transition(&*store, &record, false)
        .await
        .unwrap();
    assert_eq!(first.patched.len(), 3);
    assert_eq!(first.secret, SecretOutcome::Patched);

    let second = ownership::transition(&*store, &record, false)
        .await
        .unwrap();
    assert!(second.patched.is_empty());
    assert_eq!(second.unchanged, 3);
    assert_eq!(second.secret, SecretOutcome::Unchanged);
}

#[tokio::test]
async fn test_dry_run_patches_nothing() {
    let store = seeded_store().await;
    seed_dependents(&store).await;
    seed_operator_secret(&store, "foo-auth", &[]).await;
    let builder = DormantRecordBuilder::new("foo", DatabaseKind::DocumentDB);
    seed_record(&store, &builder.build()).await;

    let mut input = update(
        builder.clone().build_value(),
        builder.clone().wipe_out(true).build_value(),
        operator_user(),
    );
    input.dry_run = true;
    let decision = engine(store.clone()).await.admit(&input).await;

    assert!(decision.allowed, "{:?}", decision.message);
    assert_eq!(store.patch_count(), 0);
    for name in PVCS {
        assert!(refs(&store, ObjectFamily::PersistentVolumeClaim, name)
            .await
            .is_empty());
    }
}

#[tokio::test]
async fn test_failed_step_aborts_without_rollback() {
    let store = seeded_store().await;
    seed_dependents(&store).await;
    seed_operator_secret(&store, "foo-auth", &[]).await;
    store.fail_lists(ObjectFamily::PersistentVolumeClaim).await;
    let builder = DormantRecordBuilder::new("foo", DatabaseKind::DocumentDB);
    seed_record(&store, &builder.build()).await;

    let input = update(
        builder.clone().build_value(),
        builder.clone().wipe_out(true).build_value(),
        operator_user(),
    );
    let decision = engine(store.clone()).await.admit(&input).await;

    assert!(!decision.allowed);
    assert_eq!(decision.code, 500);
    // Artifacts are handled first and keep their new owner
    assert_eq!(
        refs(&store, ObjectFamily::BackupArtifact, ARTIFACT).await,
        vec![owner_ref("foo")]
    );
    assert!(refs(&store, ObjectFamily::Secret, "foo-auth").await.is_empty());
}

#[tokio::test]
async fn test_attach_without_uid_is_internal_error() {
    let store = seeded_store().await;
    let builder = DormantRecordBuilder::new("foo", DatabaseKind::CacheDB).without_uid();

    let input = update(
        builder.clone().build_value(),
        builder.clone().wipe_out(true).build_value(),
        end_user(),
    );
    let decision = engine(store).await.admit(&input).await;
    assert_eq!(decision.code, 500);
}
