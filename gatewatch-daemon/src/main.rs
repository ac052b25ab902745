use anyhow::Result;
use clap::Parser;

use gatewatch_core::config::GatewatchConfig;
use gatewatch_daemon::cli::DaemonCli;
use gatewatch_daemon::logging;
use gatewatch_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = GatewatchConfig::load(&cli.config).await.map_err(|e| {
        anyhow::anyhow!("failed to load config {}: {}", cli.config.display(), e)
    })?;

    // CLI 인자가 설정 파일과 환경변수보다 우선
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        println!(
            "configuration OK: {} ({} appliance(s))",
            cli.config.display(),
            config.appliances.len()
        );
        return Ok(());
    }

    logging::init_tracing(&config.general)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        appliances = config.appliances.len(),
        "gatewatch-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config)?;
    orchestrator.run().await?;

    tracing::info!("gatewatch-daemon shut down");
    Ok(())
}
