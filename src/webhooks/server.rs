//! Admission webhook server.
//!
//! Provides the HTTP endpoint the API server calls for every kubedb.com
//! resource the ValidatingWebhookConfiguration routes here.
//!
//! To enable the webhook:
//! 1. Deploy cert-manager for TLS certificates
//! 2. Create a ValidatingWebhookConfiguration pointing at `/validate`
//! 3. Mount the TLS certificate secret to the pod at /etc/webhook/certs/

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use axum_server::tls_rustls::RustlsConfig;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use tracing::{debug, error, info};

use super::decision::AdmissionDecision;
use super::engine::{AdmissionInput, Engine};

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;

/// Create a denial response with reason embedded in message.
/// kube-rs deny() only sets status.message, so we format as "[reason] message"
fn deny_with_reason(
    request: &AdmissionRequest<DynamicObject>,
    code: u16,
    message: &str,
    reason: &str,
) -> AdmissionReview<DynamicObject> {
    let full_message = format!("[{}] {}", reason, message);
    let mut response = AdmissionResponse::from(request).deny(full_message);
    response.result.code = code;
    response.into_review()
}

/// Turn an engine decision into the review sent back to the API server.
pub fn into_review(
    request: &AdmissionRequest<DynamicObject>,
    decision: &AdmissionDecision,
) -> AdmissionReview<DynamicObject> {
    if decision.allowed {
        return AdmissionResponse::from(request).into_review();
    }
    deny_with_reason(
        request,
        decision.code,
        decision.message.as_deref().unwrap_or("Validation failed"),
        decision.reason.as_deref().unwrap_or("Forbidden"),
    )
}

/// Create the webhook router
pub fn create_webhook_router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/validate", post(validate))
        .with_state(engine)
}

/// Admission webhook handler
async fn validate(
    State(engine): State<Arc<Engine>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> impl IntoResponse {
    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to extract admission request");
            return (
                StatusCode::BAD_REQUEST,
                Json(
                    AdmissionResponse::invalid(format!("Invalid AdmissionReview: {}", e))
                        .into_review(),
                ),
            );
        }
    };

    debug!(
        uid = %request.uid,
        kind = %request.kind.kind,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = %request.name,
        "Processing admission request"
    );

    let decision = match AdmissionInput::try_from(&request) {
        Ok(input) => engine.admit(&input).await,
        Err(e) => {
            error!(uid = %request.uid, error = %e, "Failed to read admission payload");
            AdmissionDecision::denied(400, "BadRequest", &e.to_string())
        }
    };

    (StatusCode::OK, Json(into_review(&request, &decision)))
}

/// Errors that can occur when running the webhook server
#[derive(Debug)]
pub enum WebhookError {
    /// TLS configuration error
    TlsConfig(String),
    /// Server error
    Server(String),
}

impl std::fmt::Display for WebhookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookError::TlsConfig(msg) => write!(f, "TLS configuration error: {}", msg),
            WebhookError::Server(msg) => write!(f, "Webhook server error: {}", msg),
        }
    }
}

impl std::error::Error for WebhookError {}

/// Run the webhook server with TLS
///
/// Binds to `0.0.0.0:port` and serves the /validate endpoint.
///
/// # Arguments
/// * `engine` - Initialized admission engine
/// * `port` - Port to listen on
/// * `cert_path` - Path to TLS certificate file (PEM format)
/// * `key_path` - Path to TLS private key file (PEM format)
pub async fn run_webhook_server(
    engine: Arc<Engine>,
    port: u16,
    cert_path: &str,
    key_path: &str,
) -> Result<(), WebhookError> {
    let app = create_webhook_router(engine);

    let config = RustlsConfig::from_pem_file(PathBuf::from(cert_path), PathBuf::from(key_path))
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "Webhook server listening with TLS");

    axum_server::bind_rustls(addr, config)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}
