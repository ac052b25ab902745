//! Appliance registry and initialization.
//!
//! Each `[[appliances]]` entry becomes an [`ApplianceHandle`] that owns
//! one [`FirewallPipeline`]. The [`ApplianceRegistry`] starts and stops
//! them independently: one appliance failing to bind never prevents the
//! others from running.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use gatewatch_core::config::{ApplianceConfig, GatewatchConfig};
use gatewatch_core::pipeline::Pipeline;
use gatewatch_log_pipeline::aggregator::LogAggregator;
use gatewatch_log_pipeline::{FirewallPipeline, FirewallPipelineBuilder, PipelineConfig};

use crate::health::ApplianceHealth;

/// A handle to one configured appliance.
pub struct ApplianceHandle {
    /// Appliance id from configuration.
    pub id: String,
    /// Display name.
    pub name: String,
    /// UDP port the appliance sends to.
    pub port: u16,
    /// The appliance's pipeline (collector, aggregator, broadcaster).
    pub pipeline: FirewallPipeline,
}

impl ApplianceHandle {
    /// Build the pipeline for one appliance entry.
    pub fn from_config(core: &GatewatchConfig, appliance: &ApplianceConfig) -> Result<Self> {
        let pipeline = FirewallPipelineBuilder::new()
            .config(PipelineConfig::for_appliance(core, appliance))
            .build()
            .map_err(|e| {
                anyhow::anyhow!("failed to build pipeline for '{}': {}", appliance.id, e)
            })?;

        Ok(Self {
            id: appliance.id.clone(),
            name: appliance.name.clone(),
            port: appliance.port,
            pipeline,
        })
    }

    /// Public summary of this appliance.
    pub fn info(&self) -> ApplianceInfo {
        ApplianceInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            port: self.port,
            running: self.pipeline.is_running(),
        }
    }
}

/// Appliance listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplianceInfo {
    /// Appliance id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// UDP port.
    pub port: u16,
    /// Whether the pipeline is currently receiving.
    pub running: bool,
}

/// Outcome of [`ApplianceRegistry::start_all`].
#[derive(Debug, Default)]
pub struct StartReport {
    /// Ids of appliances that started.
    pub started: Vec<String>,
    /// `(id, reason)` of appliances that failed to start.
    pub failed: Vec<(String, String)>,
}

/// Registry of all configured appliances, in configuration order.
#[derive(Default)]
pub struct ApplianceRegistry {
    appliances: Vec<ApplianceHandle>,
}

impl ApplianceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one handle per configured appliance.
    pub fn from_config(config: &GatewatchConfig) -> Result<Self> {
        let mut registry = Self::new();
        for appliance in &config.appliances {
            tracing::info!(
                firewall_id = %appliance.id,
                name = %appliance.name,
                port = appliance.port,
                "initializing appliance pipeline"
            );
            registry.register(ApplianceHandle::from_config(config, appliance)?);
        }
        Ok(registry)
    }

    /// Register an appliance.
    pub fn register(&mut self, handle: ApplianceHandle) {
        self.appliances.push(handle);
    }

    /// Start every appliance that is not already running.
    ///
    /// A failure is logged and recorded; the remaining appliances still start.
    pub async fn start_all(&mut self) -> StartReport {
        let mut report = StartReport::default();

        for handle in &mut self.appliances {
            if handle.pipeline.is_running() {
                continue;
            }

            match handle.pipeline.start().await {
                Ok(()) => {
                    tracing::info!(
                        firewall_id = %handle.id,
                        port = handle.port,
                        "appliance started"
                    );
                    report.started.push(handle.id.clone());
                }
                Err(e) => {
                    tracing::error!(
                        firewall_id = %handle.id,
                        port = handle.port,
                        error = %e,
                        "appliance failed to start"
                    );
                    report.failed.push((handle.id.clone(), e.to_string()));
                }
            }
        }

        report
    }

    /// Stop every running appliance.
    ///
    /// Logs errors but continues stopping the remaining appliances.
    pub async fn stop_all(&mut self) -> Result<()> {
        let mut errors = Vec::new();

        for handle in &mut self.appliances {
            if !handle.pipeline.is_running() {
                continue;
            }

            tracing::info!(firewall_id = %handle.id, "stopping appliance");
            if let Err(e) = handle.pipeline.stop().await {
                tracing::error!(firewall_id = %handle.id, error = %e, "failed to stop appliance");
                errors.push(format!("{}: {}", handle.id, e));
            }
        }

        if !errors.is_empty() {
            return Err(anyhow::anyhow!(
                "errors stopping appliances: {}",
                errors.join("; ")
            ));
        }

        Ok(())
    }

    /// Look up an appliance by id.
    pub fn get(&self, id: &str) -> Option<&ApplianceHandle> {
        self.appliances.iter().find(|h| h.id == id)
    }

    /// Summaries of all appliances in configuration order.
    pub fn infos(&self) -> Vec<ApplianceInfo> {
        self.appliances.iter().map(ApplianceHandle::info).collect()
    }

    /// Health status of every appliance.
    pub async fn health_statuses(&self) -> Vec<ApplianceHealth> {
        let mut statuses = Vec::with_capacity(self.appliances.len());
        for handle in &self.appliances {
            statuses.push(ApplianceHealth {
                id: handle.id.clone(),
                name: handle.name.clone(),
                port: handle.port,
                status: handle.pipeline.health_check().await,
            });
        }
        statuses
    }

    /// `(id, aggregator)` pairs for every appliance.
    pub fn aggregators(&self) -> Vec<(String, Arc<LogAggregator>)> {
        self.appliances
            .iter()
            .map(|h| (h.id.clone(), Arc::clone(h.pipeline.aggregator())))
            .collect()
    }

    /// Number of registered appliances.
    pub fn count(&self) -> usize {
        self.appliances.len()
    }

    /// Number of running appliances.
    pub fn running_count(&self) -> usize {
        self.appliances
            .iter()
            .filter(|h| h.pipeline.is_running())
            .count()
    }
}
