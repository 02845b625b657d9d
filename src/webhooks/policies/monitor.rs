//! Monitoring agent validation.

use crate::crd::MonitorSpec;
use crate::error::{Error, Result};

/// Prometheus operator `ServiceMonitor` based scraping.
pub const AGENT_COREOS_PROMETHEUS: &str = "coreos-prometheus-operator";
/// Scraping through the builtin Prometheus annotations.
pub const AGENT_PROMETHEUS_BUILTIN: &str = "prometheus.io/builtin";

/// Validate `spec.monitor`
pub fn validate(monitor: &MonitorSpec) -> Result<()> {
    match monitor.agent.as_str() {
        AGENT_COREOS_PROMETHEUS | AGENT_PROMETHEUS_BUILTIN => {}
        "" => return Err(Error::semantic("spec.monitor.agent is required")),
        other => {
            return Err(Error::semantic(format!(
                "spec.monitor.agent \"{}\" is not supported, use {} or {}",
                other, AGENT_COREOS_PROMETHEUS, AGENT_PROMETHEUS_BUILTIN
            )));
        }
    }

    match monitor.prometheus.as_ref().and_then(|p| p.port) {
        Some(port) if !(1..=65535).contains(&port) => Err(Error::semantic(format!(
            "spec.monitor.prometheus.port {} is out of range (1-65535)",
            port
        ))),
        _ => Ok(()),
    }
}
