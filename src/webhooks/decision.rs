//! Outcome of one admission request.

use crate::error::Error;

/// Allow or deny, with the status the API server reports to the caller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmissionDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// HTTP-style status code (200 when allowed)
    pub code: u16,
    /// Machine-readable reason (if not allowed)
    pub reason: Option<String>,
    /// Detailed message (if not allowed)
    pub message: Option<String>,
}

impl AdmissionDecision {
    /// Create an allowed decision
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            code: 200,
            reason: None,
            message: None,
        }
    }

    /// Create a denied decision
    pub fn denied(code: u16, reason: &str, message: &str) -> Self {
        Self {
            allowed: false,
            code,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
        }
    }

    /// Outcome label used in logs and metrics
    pub fn outcome(&self) -> &'static str {
        match (self.allowed, self.code) {
            (true, _) => "allowed",
            (false, 500..) => "error",
            (false, _) => "denied",
        }
    }
}

impl From<&Error> for AdmissionDecision {
    fn from(err: &Error) -> Self {
        Self::denied(err.code(), err.reason(), &err.to_string())
    }
}

impl From<Error> for AdmissionDecision {
    fn from(err: Error) -> Self {
        Self::from(&err)
    }
}
