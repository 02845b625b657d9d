//! db-admission library crate
//!
//! Validating admission webhook for the kubedb.com database kinds: per-kind
//! validation, an identity gate for operator-only transitions, immutable-field
//! enforcement on updates, and ownership transfer of a dormant database's
//! dependents.

pub mod config;
pub mod crd;
pub mod error;
pub mod health;
pub mod ownership;
pub mod store;
pub mod webhooks;

pub use config::{AdmissionConfig, ConfigError};
pub use error::{Error, Result};
pub use health::HealthState;
pub use store::{KubeStore, MemoryStore, ObjectStore};
pub use webhooks::{
    AdmissionDecision, AdmissionInput, Engine, OperatorIdentity, WEBHOOK_CERT_PATH,
    WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookError, run_webhook_server,
};
