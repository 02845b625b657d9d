// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Unit tests for db-admission.
//!
//! These tests run without a Kubernetes cluster and test individual
//! components in isolation.

mod crd_tests {
    use db_admission::crd::{
        CacheDB, DatabaseKind, DatabaseSpec, DocumentDB, DormantPhase, DormantRecord, LiveDatabase,
        SearchDB,
    };
    use serde_json::json;

    #[test]
    fn test_document_db_decodes_wire_format() {
        let db: DocumentDB = serde_json::from_value(json!({
            "apiVersion": "kubedb.com/v1alpha1",
            "kind": "DocumentDB",
            "metadata": {"name": "foo", "namespace": "default"},
            "spec": {
                "version": "3.6",
                "databaseSecret": {"secretName": "foo-auth"},
                "storage": {
                    "storageClassName": "standard",
                    "resources": {"requests": {"storage": "1Gi"}}
                },
                "doNotPause": true
            }
        }))
        .unwrap();

        assert_eq!(db.db_spec().version(), "3.6");
        assert!(db.db_spec().do_not_pause());
        assert_eq!(
            db.db_spec().database_secret().unwrap().secret_name,
            "foo-auth"
        );
        assert_eq!(<DocumentDB as LiveDatabase>::KIND, DatabaseKind::DocumentDB);
    }

    #[test]
    fn test_search_db_certificate_secret_only_with_ssl() {
        let mut db: SearchDB = serde_json::from_value(json!({
            "apiVersion": "kubedb.com/v1alpha1",
            "kind": "SearchDB",
            "metadata": {"name": "es"},
            "spec": {
                "version": "6.2",
                "certificateSecret": {"secretName": "es-cert"}
            }
        }))
        .unwrap();
        assert!(db.db_spec().auxiliary_secrets().is_empty());

        db.spec.enable_ssl = true;
        let secrets = db.db_spec().auxiliary_secrets();
        assert_eq!(secrets.len(), 1);
        assert_eq!(secrets[0].0, "spec.certificateSecret");
        assert_eq!(secrets[0].1.secret_name, "es-cert");
    }

    #[test]
    fn test_comparable_ignores_resume_time_fields() {
        let db: CacheDB = serde_json::from_value(json!({
            "apiVersion": "kubedb.com/v1alpha1",
            "kind": "CacheDB",
            "metadata": {"name": "cache"},
            "spec": {
                "version": "1.5.4",
                "doNotPause": true,
                "monitor": {"agent": "prometheus.io/builtin"}
            }
        }))
        .unwrap();
        let plain: CacheDB = serde_json::from_value(json!({
            "apiVersion": "kubedb.com/v1alpha1",
            "kind": "CacheDB",
            "metadata": {"name": "cache"},
            "spec": {"version": "1.5.4"}
        }))
        .unwrap();

        assert_ne!(db.spec, plain.spec);
        assert_eq!(db.spec.comparable(), plain.spec.comparable());
    }

    #[test]
    fn test_dormant_record_origin() {
        let record: DormantRecord = serde_json::from_value(json!({
            "apiVersion": "kubedb.com/v1alpha1",
            "kind": "DormantRecord",
            "metadata": {"name": "foo", "namespace": "default"},
            "spec": {
                "wipeOut": true,
                "origin": {
                    "metadata": {"name": "foo"},
                    "spec": {"relationalDB": {
                        "version": "9.6",
                        "databaseSecret": {"secretName": "foo-auth"}
                    }}
                }
            },
            "status": {"phase": "WipedOut"}
        }))
        .unwrap();

        assert_eq!(record.origin_kind(), Some(DatabaseKind::RelationalDB));
        assert_eq!(
            record.spec.origin.spec.database_secret().unwrap().secret_name,
            "foo-auth"
        );
        assert!(record.is_wiped_out());
        assert_eq!(
            record.status.as_ref().unwrap().phase,
            Some(DormantPhase::WipedOut)
        );
    }

    #[test]
    fn test_secretless_origin_has_no_database_secret() {
        let record: DormantRecord = serde_json::from_value(json!({
            "apiVersion": "kubedb.com/v1alpha1",
            "kind": "DormantRecord",
            "metadata": {"name": "kv"},
            "spec": {"origin": {"spec": {"keyValueDB": {"version": "4.0"}}}}
        }))
        .unwrap();
        assert_eq!(record.origin_kind(), Some(DatabaseKind::KeyValueDB));
        assert!(record.spec.origin.spec.database_secret().is_none());
        assert!(!record.spec.wipe_out);
        assert!(!record.is_wiped_out());
    }
}

mod identity_tests {
    use db_admission::OperatorIdentity;
    use db_admission::webhooks::identity::split_service_account;
    use k8s_openapi::api::authentication::v1::UserInfo;

    fn user(name: &str) -> UserInfo {
        UserInfo {
            username: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_operator_trusted_end_user_not() {
        let operator = OperatorIdentity::new("kube-system", "kubedb-operator");
        assert!(operator.is_trusted(&user("system:serviceaccount:kube-system:kubedb-operator")));
        assert!(!operator.is_trusted(&user("minikube-user")));
        assert!(!operator.is_trusted(&UserInfo::default()));
    }

    #[test]
    fn test_split_service_account() {
        assert_eq!(
            split_service_account("system:serviceaccount:kube-system:kubedb-operator"),
            Some(("kube-system", "kubedb-operator"))
        );
        assert_eq!(split_service_account("system:serviceaccount:kube-system"), None);
        assert_eq!(split_service_account("system:serviceaccount::name"), None);
        assert_eq!(split_service_account("system:node:worker-1"), None);
    }
}

mod immutability_tests {
    use db_admission::crd::{DatabaseKind, ResourceKind};
    use db_admission::webhooks::policies::immutability::{UNIVERSAL_PATHS, validate_update};
    use serde_json::json;

    const SEARCH: ResourceKind = ResourceKind::Database(DatabaseKind::SearchDB);

    fn search_db(data_prefix: &str) -> serde_json::Value {
        json!({
            "apiVersion": "kubedb.com/v1alpha1",
            "kind": "SearchDB",
            "metadata": {"name": "es", "namespace": "default"},
            "spec": {
                "version": "6.2",
                "topology": {
                    "master": {"prefix": "master", "replicas": 1},
                    "data": {"prefix": data_prefix, "replicas": 2}
                }
            }
        })
    }

    #[test]
    fn test_wildcard_path_reports_concrete_key() {
        let err = validate_update(&search_db("data"), &search_db("hot"), SEARCH).unwrap_err();
        assert_eq!(err.paths, vec!["spec.topology.data.prefix"]);
    }

    #[test]
    fn test_wildcard_siblings_may_change() {
        let old = search_db("data");
        let mut new = old.clone();
        new["spec"]["topology"]["data"]["replicas"] = json!(5);
        assert!(validate_update(&old, &new, SEARCH).is_ok());
    }

    #[test]
    fn test_added_topology_group_is_a_change() {
        let old = search_db("data");
        let mut new = old.clone();
        new["spec"]["topology"]["client"] = json!({"prefix": "client"});
        let err = validate_update(&old, &new, SEARCH).unwrap_err();
        assert_eq!(err.paths, vec!["spec.topology.client.prefix"]);
    }

    #[test]
    fn test_absent_and_zero_are_equivalent() {
        let old = search_db("data");
        let mut new = old.clone();
        new["spec"]["enableSSL"] = json!(false);
        new["spec"]["nodeSelector"] = json!({});
        new["spec"]["init"] = json!(null);
        new["status"] = json!(null);
        assert!(validate_update(&old, &new, SEARCH).is_ok());
    }

    #[test]
    fn test_document_db_secret_is_set_once() {
        let kind = ResourceKind::Database(DatabaseKind::DocumentDB);
        let unset = json!({"kind": "DocumentDB", "spec": {"version": "3.6"}});
        let mut set = unset.clone();
        set["spec"]["databaseSecret"] = json!({"secretName": "foo-auth"});
        let mut changed = unset.clone();
        changed["spec"]["databaseSecret"] = json!({"secretName": "other-auth"});

        assert!(validate_update(&unset, &set, kind).is_ok());
        let err = validate_update(&set, &changed, kind).unwrap_err();
        assert_eq!(err.paths, vec!["spec.databaseSecret"]);
    }

    #[test]
    fn test_relational_db_secret_is_frozen() {
        let kind = ResourceKind::Database(DatabaseKind::RelationalDB);
        let unset = json!({"kind": "RelationalDB", "spec": {"version": "9.6"}});
        let mut set = unset.clone();
        set["spec"]["databaseSecret"] = json!({"secretName": "foo-auth"});
        assert!(validate_update(&unset, &set, kind).is_err());
    }

    #[test]
    fn test_message_lists_changed_and_frozen_paths() {
        let kind = ResourceKind::BackupArtifact;
        let old = json!({"kind": "BackupArtifact", "spec": {"databaseName": "foo"}});
        let new = json!({"kind": "BackupArtifact", "spec": {"databaseName": "bar"}});
        let message = validate_update(&old, &new, kind).unwrap_err().to_string();

        assert!(message.starts_with("BackupArtifact fields cannot be changed: spec.databaseName."));
        for path in UNIVERSAL_PATHS {
            assert!(message.contains(path), "{}", path);
        }
    }
}

mod decision_tests {
    use db_admission::AdmissionDecision;
    use db_admission::Error;

    #[test]
    fn test_error_mapping() {
        let cases = [
            (Error::Uninitialized, 500, "InternalError", "error"),
            (Error::semantic("bad spec"), 403, "Forbidden", "denied"),
            (Error::unauthorized("operator only"), 403, "Forbidden", "denied"),
            (Error::internal("no uid"), 500, "InternalError", "error"),
        ];
        for (err, code, reason, outcome) in cases {
            let decision = AdmissionDecision::from(&err);
            assert!(!decision.allowed);
            assert_eq!(decision.code, code);
            assert_eq!(decision.reason.as_deref(), Some(reason));
            assert_eq!(decision.message, Some(err.to_string()));
            assert_eq!(decision.outcome(), outcome);
        }
    }

    #[test]
    fn test_decode_error_is_bad_request() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::Decode {
            kind: "CacheDB".to_string(),
            source,
        };
        assert_eq!(err.code(), 400);
        assert_eq!(AdmissionDecision::from(err).reason.as_deref(), Some("BadRequest"));
    }

    #[test]
    fn test_allowed() {
        let decision = AdmissionDecision::allowed();
        assert!(decision.allowed);
        assert_eq!(decision.outcome(), "allowed");
    }
}

mod policy_tests {
    use db_admission::crd::DatabaseKind;
    use db_admission::webhooks::policies::backup::validate_cron;
    use db_admission::webhooks::policies::database::{validate_replicas, validate_version};

    #[test]
    fn test_versions() {
        assert!(validate_version(DatabaseKind::RelationalDB, "10.2").is_ok());
        assert!(validate_version(DatabaseKind::RelationalDB, "11").is_err());
        assert!(validate_version(DatabaseKind::SearchDB, "").is_err());
    }

    #[test]
    fn test_replicas() {
        assert!(validate_replicas(DatabaseKind::RelationalDB, Some(3)).is_ok());
        assert!(validate_replicas(DatabaseKind::RelationalDB, Some(0)).is_err());
        assert!(validate_replicas(DatabaseKind::DocumentDB, Some(2)).is_err());
        assert!(validate_replicas(DatabaseKind::DocumentDB, None).is_ok());
    }

    #[test]
    fn test_cron_expressions() {
        for expr in ["*/5 * * * *", "0 0 3 * * *", "@daily", "@every 6h"] {
            assert!(validate_cron(expr).is_ok(), "{}", expr);
        }
        for expr in ["", "* * *", "@fortnightly", "@every"] {
            assert!(validate_cron(expr).is_err(), "{}", expr);
        }
    }
}
