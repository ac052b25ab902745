//! Aggregated health reporting.
//!
//! Produces a unified [`DaemonHealth`] report from each appliance
//! pipeline's `health_check()`. The overall daemon status is the worst
//! status among all appliances.
//!
//! # Aggregation Rule
//!
//! - All Healthy -> Healthy
//! - Any Degraded, none Unhealthy -> Degraded(reason)
//! - Any Unhealthy -> Unhealthy(reason)

use serde::Serialize;

use gatewatch_core::pipeline::HealthStatus;

/// Aggregated health report for the entire daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Overall daemon health status (worst of all appliances).
    pub status: HealthStatus,
    /// Daemon uptime in seconds since start.
    pub uptime_secs: u64,
    /// Per-appliance health reports.
    pub appliances: Vec<ApplianceHealth>,
}

/// Health status for a single appliance pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct ApplianceHealth {
    /// Appliance id (e.g., "fg60f-30th").
    pub id: String,
    /// Display name.
    pub name: String,
    /// UDP port the appliance sends to.
    pub port: u16,
    /// Current health status of the pipeline.
    pub status: HealthStatus,
}

/// Aggregate appliance health statuses into a single status.
///
/// Returns the worst status found: Unhealthy > Degraded > Healthy.
/// Reasons are prefixed with the appliance id and joined with `; `.
pub fn aggregate_status(appliances: &[ApplianceHealth]) -> HealthStatus {
    let mut worst = HealthStatus::Healthy;
    let mut reasons = Vec::new();

    for appliance in appliances {
        match &appliance.status {
            HealthStatus::Healthy => {}
            HealthStatus::Degraded(reason) => {
                reasons.push(format!("{}: {}", appliance.id, reason));
                if !worst.is_unhealthy() {
                    worst = HealthStatus::Degraded(String::new());
                }
            }
            HealthStatus::Unhealthy(reason) => {
                reasons.push(format!("{}: {}", appliance.id, reason));
                worst = HealthStatus::Unhealthy(String::new());
            }
        }
    }

    match worst {
        HealthStatus::Healthy => HealthStatus::Healthy,
        HealthStatus::Degraded(_) => HealthStatus::Degraded(reasons.join("; ")),
        HealthStatus::Unhealthy(_) => HealthStatus::Unhealthy(reasons.join("; ")),
    }
}
