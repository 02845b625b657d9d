//! Validating admission webhook for kubedb.com resources.
//!
//! - `identity`: is the caller the operator?
//! - `policies`: immutable fields and per-kind semantic checks
//! - `engine`: per-request dispatch and ownership side effects
//! - `server`: the HTTPS endpoint in front of the engine

pub mod decision;
pub mod engine;
pub mod identity;
pub mod policies;
mod server;

pub use decision::AdmissionDecision;
pub use engine::{AdmissionInput, Engine};
pub use identity::OperatorIdentity;
pub use policies::ValidationContext;
pub use server::{
    WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookError, create_webhook_router,
    into_review, run_webhook_server,
};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
