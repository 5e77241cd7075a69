//! `migrate manifest`: shows what a network's manifest records.

use clap::Parser;
use colored::Colorize;
use serde_json::json;
use tracing::warn;

use migrate_common::args::CliArgs;

use crate::{
    config::MigrationConfig,
    error::MigrateError,
    manifest::DeploymentManifest,
};

#[derive(Debug, Parser)]
#[clap(name = "manifest", about = "Show the deployments recorded for a network.")]
pub struct ManifestArgs {
    /// Network whose manifest to show
    #[clap(long, short = 'n', env = "MIGRATE_NETWORK")]
    pub network: String,
}

impl ManifestArgs {
    pub fn run(
        &self,
        cli_args: &CliArgs,
        config: &MigrationConfig,
    ) -> Result<DeploymentManifest, MigrateError> {
        let path = DeploymentManifest::path_for(&config.manifest_dir, &self.network);
        let manifest = DeploymentManifest::load(&path)?
            .ok_or_else(|| MigrateError::NoManifest(self.network.clone()))?;

        if cli_args.json_output() {
            match serde_json::to_string_pretty(&json!({
                "status": "success",
                "manifest": manifest,
            })) {
                Ok(output) => println!("{output}"),
                Err(err) => warn!(%err, "failed to render JSON output"),
            }
            return Ok(manifest);
        }

        let title = format!("Network {} (chain {})", manifest.network, manifest.chain_id);
        println!("\n{}", title.bold().green());
        println!("{}", "=".repeat(title.len()).green());
        if manifest.contracts.is_empty() {
            println!("No deployments recorded.");
        }
        for (artifact, entry) in &manifest.contracts {
            println!("{}", artifact.as_str().bold());
            println!("  Address: {}", entry.address);
            println!("  Transaction: {}", entry.transaction_hash);
            if let Some(block) = entry.block_number {
                println!("  Block: {block}");
            }
            println!("  Deployed: {}", entry.deployed_at.to_rfc3339());
        }

        Ok(manifest)
    }
}
