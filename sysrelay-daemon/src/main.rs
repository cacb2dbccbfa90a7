use anyhow::Result;
use clap::Parser;

use sysrelay_daemon::cli::DaemonCli;
use sysrelay_daemon::logging;
use sysrelay_daemon::orchestrator::{self, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // file -> environment -> CLI -> validate
    let mut config = orchestrator::load_config(&cli.config, cli.uses_default_config()).await?;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        println!("configuration is valid: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "sysrelay-daemon starting"
    );

    let orchestrator = Orchestrator::build_from_config(config).await?;
    orchestrator.run().await?;

    tracing::info!("sysrelay-daemon shut down");
    Ok(())
}
