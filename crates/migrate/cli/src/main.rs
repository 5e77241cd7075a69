mod cli;

use crate::cli::{
    Cli,
    Commands,
};
use clap::Parser;
use color_eyre::{
    Result,
    eyre::Report,
};
use migrate_core::config::MigrationConfig;
use serde_json::json;
use std::io::IsTerminal;
use tracing_subscriber::{
    EnvFilter,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Logs go to stderr so stdout stays clean for `--json` output.
fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"))
        .add_directive("alloy_rpc_client=warn".parse()?)
        .add_directive("alloy_transport=warn".parse()?);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(std::io::stderr().is_terminal())
                .with_writer(std::io::stderr),
        )
        .try_init()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::config::HookBuilder::default()
        .display_location_section(true)
        .display_env_section(false)
        .install()?;
    init_tracing()?;

    let cli = Cli::parse();

    let result = async {
        let config = MigrationConfig::load(&cli.args.config)?;
        match &cli.command {
            Commands::Run(run) => {
                run.run(&cli.args, &config).await?;
            }
            Commands::Plan(plan) => {
                plan.run(&cli.args, &config)?;
            }
            Commands::Manifest(manifest) => {
                manifest.run(&cli.args, &config)?;
            }
        }
        Ok::<_, Report>(())
    }
    .await;

    if let Err(err) = result {
        if cli.args.json_output() {
            eprintln!(
                "{}",
                json!({
                    "status": "error",
                    "error": {
                        "message": format!("{err:#}"),
                    }
                })
            );
            std::process::exit(1);
        } else {
            return Err(err);
        }
    }

    Ok(())
}
