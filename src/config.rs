//! Startup configuration read from the environment.
//!
//! | Variable              | Default                          |
//! |-----------------------|----------------------------------|
//! | `SERVICE_ACCOUNT_NAME`| required                         |
//! | `KUBE_NAMESPACE`      | `POD_NAMESPACE`, then the mounted service-account namespace, then `default` |
//! | `WEBHOOK_PORT`        | 9443                             |
//! | `HEALTH_PORT`         | 8080                             |
//! | `WEBHOOK_CERT_PATH`   | `/etc/webhook/certs/tls.crt`     |
//! | `WEBHOOK_KEY_PATH`    | `/etc/webhook/certs/tls.key`     |

use std::path::Path;

use thiserror::Error;
use tracing::warn;

use crate::health::HEALTH_PORT;
use crate::webhooks::{OperatorIdentity, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT};

/// Name of the operator's service account.
pub const ENV_SERVICE_ACCOUNT_NAME: &str = "SERVICE_ACCOUNT_NAME";
pub const ENV_KUBE_NAMESPACE: &str = "KUBE_NAMESPACE";
pub const ENV_POD_NAMESPACE: &str = "POD_NAMESPACE";
pub const ENV_WEBHOOK_PORT: &str = "WEBHOOK_PORT";
pub const ENV_HEALTH_PORT: &str = "HEALTH_PORT";
pub const ENV_WEBHOOK_CERT_PATH: &str = "WEBHOOK_CERT_PATH";
pub const ENV_WEBHOOK_KEY_PATH: &str = "WEBHOOK_KEY_PATH";

/// Namespace file mounted into every pod with a service account token.
pub const SERVICE_ACCOUNT_NAMESPACE_FILE: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Errors raised while reading configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Admission server configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmissionConfig {
    /// The trusted operator identity
    pub operator: OperatorIdentity,
    pub webhook_port: u16,
    pub health_port: u16,
    pub cert_path: String,
    pub key_path: String,
}

impl AdmissionConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(
            |name| std::env::var(name).ok(),
            || std::fs::read_to_string(Path::new(SERVICE_ACCOUNT_NAMESPACE_FILE)).ok(),
        )
    }

    /// Read configuration through `lookup`, falling back to
    /// `mounted_namespace` when no namespace variable is set.
    pub fn from_lookup<F, N>(lookup: F, mounted_namespace: N) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
        N: FnOnce() -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let service_account =
            get(ENV_SERVICE_ACCOUNT_NAME).ok_or(ConfigError::Missing(ENV_SERVICE_ACCOUNT_NAME))?;

        let namespace = match get(ENV_KUBE_NAMESPACE).or_else(|| get(ENV_POD_NAMESPACE)) {
            Some(ns) => ns,
            None => match mounted_namespace()
                .map(|ns| ns.trim().to_string())
                .filter(|ns| !ns.is_empty())
            {
                Some(ns) => ns,
                None => {
                    warn!("Operator namespace not configured, using 'default'");
                    "default".to_string()
                }
            },
        };

        Ok(Self {
            operator: OperatorIdentity::new(namespace, service_account),
            webhook_port: parse_port(ENV_WEBHOOK_PORT, get(ENV_WEBHOOK_PORT), WEBHOOK_PORT)?,
            health_port: parse_port(ENV_HEALTH_PORT, get(ENV_HEALTH_PORT), HEALTH_PORT)?,
            cert_path: get(ENV_WEBHOOK_CERT_PATH).unwrap_or_else(|| WEBHOOK_CERT_PATH.to_string()),
            key_path: get(ENV_WEBHOOK_KEY_PATH).unwrap_or_else(|| WEBHOOK_KEY_PATH.to_string()),
        })
    }

    /// Whether both TLS files are present.
    pub fn tls_files_present(&self) -> bool {
        Path::new(&self.cert_path).exists() && Path::new(&self.key_path).exists()
    }
}

fn parse_port(name: &'static str, value: Option<String>, default: u16) -> Result<u16, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.parse::<u16>() {
        Ok(0) => Err(ConfigError::Invalid {
            name,
            value,
            reason: "port must be non-zero".to_string(),
        }),
        Ok(port) => Ok(port),
        Err(e) => Err(ConfigError::Invalid {
            name,
            value,
            reason: e.to_string(),
        }),
    }
}
