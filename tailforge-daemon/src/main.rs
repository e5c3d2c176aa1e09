//! tailforge-daemon entrypoint.
//!
//! Parses CLI arguments, loads and validates configuration, initializes
//! logging, and runs the pipeline until a shutdown signal arrives.

use anyhow::Result;
use clap::Parser;

use tailforge_core::config::TailforgeConfig;

use tailforge_daemon::cli::DaemonCli;
use tailforge_daemon::logging;
use tailforge_daemon::runner::RunnerBuilder;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = TailforgeConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config from {}: {}", cli.config.display(), e))?;

    // CLI overrides take precedence over file and environment.
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    logging::init_tracing(&config.general)?;
    tailforge_core::metrics::describe_all();

    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!(
        tailforge_core::metrics::DAEMON_BUILD_INFO,
        "version" => env!("CARGO_PKG_VERSION")
    )
    .set(1.0);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "tailforge-daemon starting"
    );

    let runner = RunnerBuilder::new(config).build().await?;

    if cli.validate {
        // Resources loaded and manager assembled without fatal errors.
        runner.shutdown().await;
        println!("configuration OK");
        return Ok(());
    }

    runner.run().await
}
