//! Appliance orchestration -- assembly and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `gatewatch-daemon`.
//! It validates configuration, builds one pipeline per configured
//! appliance, starts them independently, and runs until a shutdown signal.
//!
//! # Fault Isolation
//!
//! An appliance that fails to start (e.g. its port is taken) is reported
//! `Unhealthy` while the others keep running. Startup only fails when no
//! appliance could be started at all.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::broadcast;

use gatewatch_core::config::GatewatchConfig;
use gatewatch_core::error::{GatewatchError, PipelineError};
use gatewatch_core::metrics as m;
use gatewatch_log_pipeline::FirewallPipeline;
use gatewatch_log_pipeline::aggregator::LogAggregator;

use crate::appliances::{ApplianceInfo, ApplianceRegistry};
use crate::health::{DaemonHealth, aggregate_status};
use crate::metrics_server;

/// Interval between per-appliance stats summary log lines.
pub const STATS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Interval between uptime gauge updates.
const UPTIME_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: GatewatchConfig,
    /// All configured appliances, in configuration order.
    registry: ApplianceRegistry,
    /// Shutdown broadcast sender (signals all background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration from `config_path` and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated,
    /// or if any appliance pipeline cannot be built.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = GatewatchConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    pub fn build_from_config(config: GatewatchConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        // Install metrics recorder before any pipeline records metrics
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        let registry = ApplianceRegistry::from_config(&config)?;
        let (shutdown_tx, _) = broadcast::channel(16);

        tracing::info!(appliances = registry.count(), "orchestrator initialized");

        if config.metrics.enabled {
            record_build_info(registry.count());
        }

        Ok(Self {
            config,
            registry,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Start every appliance pipeline.
    ///
    /// Returns the number of appliances that started.
    ///
    /// # Errors
    ///
    /// Returns an error only if no appliance could be started.
    pub async fn start(&mut self) -> Result<usize> {
        tracing::info!("starting all appliances");
        let report = self.registry.start_all().await;

        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::DAEMON_APPLIANCES_RUNNING).set(self.registry.running_count() as f64);

        if report.started.is_empty() {
            let reasons: Vec<String> = report
                .failed
                .iter()
                .map(|(id, reason)| format!("{id}: {reason}"))
                .collect();
            return Err(anyhow::anyhow!(
                "no appliance could be started: {}",
                reasons.join("; ")
            ));
        }

        if !report.failed.is_empty() {
            tracing::warn!(
                started = report.started.len(),
                failed = report.failed.len(),
                "some appliances failed to start; continuing with the rest"
            );
        }

        Ok(report.started.len())
    }

    /// Start all appliances and run until a shutdown signal arrives.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Docker, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        let stats_task = spawn_stats_logger(
            self.registry.aggregators(),
            STATS_LOG_INTERVAL,
            self.shutdown_tx.subscribe(),
        );

        let uptime_task = if self.config.metrics.enabled {
            Some(spawn_uptime_updater(
                self.start_time,
                self.shutdown_tx.subscribe(),
            ))
        } else {
            None
        };

        tracing::info!("entering main event loop");
        let signal = wait_for_shutdown_signal().await?;
        tracing::info!(signal = signal, "shutdown signal received");

        tracing::info!("broadcasting shutdown signal to all tasks");
        let _ = self.shutdown_tx.send(());

        let _ = stats_task.await;
        if let Some(task) = uptime_task {
            let _ = task.await;
        }

        self.shutdown().await
    }

    /// Stop every running appliance.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("stopping all appliances");
        let result = self.registry.stop_all().await;
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::DAEMON_APPLIANCES_RUNNING).set(self.registry.running_count() as f64);
        result
    }

    /// Look up one appliance's pipeline by id.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ApplianceNotFound` for an unknown id.
    pub fn appliance(&self, id: &str) -> Result<&FirewallPipeline, GatewatchError> {
        self.registry
            .get(id)
            .map(|handle| &handle.pipeline)
            .ok_or_else(|| PipelineError::ApplianceNotFound(id.to_owned()).into())
    }

    /// List all configured appliances.
    pub fn appliances(&self) -> Vec<ApplianceInfo> {
        self.registry.infos()
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let appliances = self.registry.health_statuses().await;
        let status = aggregate_status(&appliances);
        let uptime_secs = self.start_time.elapsed().as_secs();

        DaemonHealth {
            status,
            uptime_secs,
            appliances,
        }
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &GatewatchConfig {
        &self.config
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Spawn a background task that periodically logs a stats summary
/// (total/allowed/blocked) for each appliance.
pub fn spawn_stats_logger(
    aggregators: Vec<(String, Arc<LogAggregator>)>,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    for (id, aggregator) in &aggregators {
                        let snapshot = aggregator.snapshot().await;
                        let buffered = aggregator.len().await;
                        tracing::info!(
                            firewall_id = %id,
                            total = snapshot.total_logs,
                            allowed = snapshot.allowed_count,
                            blocked = snapshot.blocked_count,
                            buffered,
                            "appliance stats"
                        );
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("stats logger shutting down");
                    break;
                }
            }
        }
    })
}

/// Record daemon-level metrics (build info, configured appliances).
fn record_build_info(appliance_count: usize) {
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    tracing::debug!(
        appliance_count = appliance_count,
        version = env!("CARGO_PKG_VERSION"),
        "daemon metrics recorded"
    );
}

/// Spawn a background task that periodically updates the uptime metric.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPTIME_UPDATE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let uptime_secs = start_time.elapsed().as_secs();
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
