//! Classification of the caller behind an admission request.
//!
//! Only one identity is trusted: the operator's service account. Kubernetes
//! authenticates service accounts as `system:serviceaccount:<ns>:<name>`.

use k8s_openapi::api::authentication::v1::UserInfo;

const SERVICE_ACCOUNT_PREFIX: &str = "system:serviceaccount:";

/// The service account the operator runs as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorIdentity {
    pub namespace: String,
    pub service_account: String,
}

impl OperatorIdentity {
    pub fn new(namespace: impl Into<String>, service_account: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            service_account: service_account.into(),
        }
    }

    /// Whether `user` is this operator. Malformed usernames are untrusted.
    pub fn is_trusted(&self, user: &UserInfo) -> bool {
        user.username
            .as_deref()
            .and_then(split_service_account)
            .is_some_and(|(ns, name)| ns == self.namespace && name == self.service_account)
    }

    /// The username Kubernetes assigns to this service account.
    pub fn username(&self) -> String {
        format!(
            "{}{}:{}",
            SERVICE_ACCOUNT_PREFIX, self.namespace, self.service_account
        )
    }
}

/// Split `system:serviceaccount:<ns>:<name>` into `(ns, name)`.
pub fn split_service_account(username: &str) -> Option<(&str, &str)> {
    let rest = username.strip_prefix(SERVICE_ACCOUNT_PREFIX)?;
    let (namespace, name) = rest.split_once(':')?;
    if namespace.is_empty() || name.is_empty() || name.contains(':') {
        return None;
    }
    Some((namespace, name))
}
