//! `migrate run`: deploys the plan against a network.

use chrono::Utc;
use clap::{
    Parser,
    ValueHint,
};
use colored::Colorize;
use indicatif::ProgressBar;
use serde_json::json;
use std::sync::Arc;
use tracing::{
    info,
    warn,
};

use migrate_common::args::CliArgs;

use crate::{
    commands::{
        create_spinner,
        load_registry,
        select_directives,
    },
    artifacts::ArtifactRegistry,
    config::{
        MigrationConfig,
        NetworkConfig,
    },
    directive::{
        DeployedContract,
        DeploymentDirective,
    },
    error::MigrateError,
    manifest::DeploymentManifest,
    network::{
        RpcNetworkClient,
        SharedNetworkClient,
        SimulatedChain,
        simulated::DEFAULT_CHAIN_ID,
    },
    orchestrator::{
        Orchestrator,
        Progress,
        RunFailure,
        plan,
    },
};

const RUN_AFTER_HELP: &str = "Directives run in order; each one is submitted only after the previous deployment is confirmed.\n\
The first failure stops the run. Confirmed deployments are still written to the network's manifest.";

#[derive(Debug, Parser)]
#[clap(
    name = "run",
    about = "Deploy the migration plan to a network.",
    after_help = RUN_AFTER_HELP
)]
pub struct RunArgs {
    /// Network to deploy to, as named in the plan's `[networks]` table
    #[clap(
        long,
        short = 'n',
        env = "MIGRATE_NETWORK",
        required_unless_present = "dry_run"
    )]
    pub network: Option<String>,

    /// Override the network's RPC URL
    #[clap(long = "rpc-url", env = "MIGRATE_RPC_URL", value_hint = ValueHint::Url)]
    pub rpc_url: Option<String>,

    /// Deploy against an in-memory chain instead of a node
    #[clap(long)]
    pub dry_run: bool,

    /// Directives to deploy instead of the plan's list
    #[clap(
        long = "directive",
        short = 'd',
        value_name = "DIRECTIVE",
        help = "Deployment directive in the format 'Name(arg1,arg2)'; `@Name` passes the address of an earlier deployment. Repeat for several directives."
    )]
    pub directives: Vec<DeploymentDirective>,
}

impl RunArgs {
    pub async fn run(
        &self,
        cli_args: &CliArgs,
        config: &MigrationConfig,
    ) -> Result<Vec<DeployedContract>, MigrateError> {
        let directives = select_directives(&self.directives, config)?;
        let registry = Arc::new(load_registry(config)?);
        // Fail on planning errors before opening a connection.
        plan(&registry, &directives).map_err(|failure| {
            RunFailure {
                completed: vec![],
                failure,
            }
        })?;

        let network = match &self.network {
            Some(name) => Some((name.as_str(), config.network(name)?)),
            None => None,
        };

        let client: SharedNetworkClient = if self.dry_run {
            let chain = simulated_chain(network.map(|(_, network)| network));
            info!(sender = %chain.sender(), "dry run against a simulated chain");
            Arc::new(chain)
        } else {
            let (_, network) = network.ok_or(MigrateError::MissingNetwork)?;
            Arc::new(RpcNetworkClient::connect(&network.client_config(self.rpc_url.as_deref())).await?)
        };

        self.deploy(cli_args, config, &directives, registry, network, client)
            .await
    }

    async fn deploy(
        &self,
        cli_args: &CliArgs,
        config: &MigrationConfig,
        directives: &[DeploymentDirective],
        registry: Arc<ArtifactRegistry>,
        network: Option<(&str, &NetworkConfig)>,
        client: SharedNetworkClient,
    ) -> Result<Vec<DeployedContract>, MigrateError> {
        let chain_id = client.chain_id().await?;

        // A manifest that cannot be read must stop the run before anything is sent.
        let mut manifest = match network {
            Some((name, _)) if !self.dry_run => {
                let path = DeploymentManifest::path_for(&config.manifest_dir, name);
                let manifest = DeploymentManifest::load_or_default(&path, name, chain_id)?;
                Some((path, manifest))
            }
            _ => None,
        };

        let confirmation = network
            .map(|(_, network)| network.confirmation_policy())
            .unwrap_or_default();
        let orchestrator = Orchestrator::new(client, registry).with_confirmation(confirmation);
        let spinner = create_spinner(cli_args.json_output());
        let result = orchestrator
            .run_with_progress(directives, |progress| report(&spinner, progress))
            .await;

        let completed = match &result {
            Ok(completed) => completed.as_slice(),
            Err(failure) => failure.completed.as_slice(),
        };
        if let Some((path, manifest)) = manifest.as_mut() {
            if !completed.is_empty() {
                manifest.record(completed, Utc::now());
                match manifest.save(path) {
                    Ok(()) => info!(path = %path.display(), "manifest updated"),
                    Err(err) => {
                        warn!(%err, "failed to write manifest, confirmed deployments are only in the output");
                    }
                }
            }
        }

        match result {
            Ok(completed) => {
                spinner.finish_and_clear();
                self.display_success(cli_args.json_output(), chain_id, &completed);
                Ok(completed)
            }
            Err(failure) => {
                spinner.finish_with_message(format!(
                    "❌ Deployment of `{}` failed",
                    failure.failure.artifact
                ));
                if !cli_args.json_output() && !failure.completed.is_empty() {
                    println!("\n{}", "Confirmed before the failure:".bold().yellow());
                    for contract in &failure.completed {
                        println!("{contract}\n");
                    }
                }
                Err(failure.into())
            }
        }
    }

    fn display_success(&self, json_output: bool, chain_id: u64, completed: &[DeployedContract]) {
        if json_output {
            let output = json!({
                "status": "success",
                "network": self.network,
                "chain_id": chain_id,
                "dry_run": self.dry_run,
                "contracts": completed,
            });
            match serde_json::to_string_pretty(&output) {
                Ok(output) => println!("{output}"),
                Err(err) => warn!(%err, "failed to render JSON output"),
            }
            return;
        }

        let title = if self.dry_run {
            "Dry Run Deployments"
        } else {
            "Deployments"
        };
        println!("\n{}", title.bold().green());
        println!("{}", "=".repeat(title.len()).green());
        for contract in completed {
            println!("{contract}\n");
        }

        match (&self.network, self.dry_run) {
            (_, true) => {
                println!(
                    "{}",
                    "Nothing was sent to a network. Drop --dry-run to deploy.".dimmed()
                );
            }
            (Some(network), false) => {
                println!("Inspect recorded addresses with:");
                println!(
                    "  {} manifest --network {network}",
                    "migrate".cyan().bold()
                );
            }
            (None, false) => {}
        }
    }
}

/// In-memory chain standing in for `network`, with its chain id and sender.
fn simulated_chain(network: Option<&NetworkConfig>) -> SimulatedChain {
    let chain_id = network
        .and_then(|network| network.chain_id)
        .unwrap_or(DEFAULT_CHAIN_ID);
    let chain = SimulatedChain::new(chain_id);
    match network.and_then(|network| network.from) {
        Some(from) => chain.with_sender(from),
        None => chain,
    }
}

fn report(spinner: &ProgressBar, progress: Progress<'_>) {
    match progress {
        Progress::Submitting {
            index,
            total,
            artifact,
        } => {
            spinner.set_message(format!("[{}/{total}] Deploying {artifact}...", index + 1));
        }
        Progress::Submitted {
            artifact, tx_hash, ..
        } => {
            spinner.set_message(format!("Waiting for {artifact} ({tx_hash})..."));
        }
        Progress::Confirmed { contract, .. } => {
            spinner.println(format!(
                "{} {} at {}",
                "✔".green(),
                contract.artifact,
                contract.address
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        artifacts::tests::test_registry,
        error::ManifestError,
        network::{
            NetworkClient,
            simulated::DEFAULT_SENDER,
        },
    };
    use alloy::primitives::address;
    use std::fs;
    use tempfile::TempDir;

    fn development() -> NetworkConfig {
        NetworkConfig {
            rpc_url: "http://localhost:8545".to_string(),
            chain_id: Some(1337),
            from: None,
            confirmation_timeout_secs: Some(1),
            poll_interval_ms: Some(5),
        }
    }

    fn deploy_args() -> RunArgs {
        RunArgs {
            network: Some("development".to_string()),
            rpc_url: None,
            dry_run: false,
            directives: vec![],
        }
    }

    fn json_output() -> CliArgs {
        CliArgs {
            json: true,
            ..Default::default()
        }
    }

    fn directives(list: &[&str]) -> Vec<DeploymentDirective> {
        list.iter().map(|d| d.parse().unwrap()).collect()
    }

    #[test]
    fn network_is_required_unless_dry_run() {
        assert!(RunArgs::try_parse_from(["run"]).is_err());

        let args = RunArgs::try_parse_from(["run", "--dry-run"]).unwrap();
        assert!(args.dry_run);
        assert!(args.network.is_none());
    }

    #[test]
    fn parses_repeated_directives() {
        let args = RunArgs::try_parse_from([
            "run",
            "-n",
            "development",
            "-d",
            "User",
            "-d",
            "Garage(@User,10)",
        ])
        .unwrap();
        assert_eq!(args.network.as_deref(), Some("development"));
        assert_eq!(args.directives.len(), 2);
        assert_eq!(args.directives[1].to_string(), "Garage(@User,10)");
    }

    #[test]
    fn dry_run_uses_the_configured_network_identity() {
        let anonymous = simulated_chain(None);
        assert_eq!(anonymous.sender(), DEFAULT_SENDER);

        let deployer = address!("70997970c51812dc3a010c7d01b50e0d17dc79c8");
        let network = NetworkConfig {
            from: Some(deployer),
            ..development()
        };
        assert_eq!(simulated_chain(Some(&network)).sender(), deployer);
    }

    #[tokio::test]
    async fn dry_run_chain_id_follows_the_network() {
        let chain = simulated_chain(Some(&development()));
        assert_eq!(chain.chain_id().await.unwrap(), 1337);
        assert_eq!(
            simulated_chain(None).chain_id().await.unwrap(),
            DEFAULT_CHAIN_ID
        );
    }

    #[tokio::test]
    async fn malformed_manifest_stops_the_run_before_sending() {
        let dir = TempDir::new().unwrap();
        let config = MigrationConfig {
            manifest_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let path = DeploymentManifest::path_for(dir.path(), "development");
        fs::write(&path, "{ not a manifest").unwrap();
        let network = development();
        let chain = Arc::new(SimulatedChain::new(1337));

        let err = deploy_args()
            .deploy(
                &json_output(),
                &config,
                &directives(&["User", "Car"]),
                Arc::new(test_registry()),
                Some(("development", &network)),
                chain.clone(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MigrateError::Manifest(ManifestError::Json { .. })
        ));
        assert_eq!(chain.transaction_count(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not a manifest");
    }

    #[tokio::test]
    async fn failed_run_still_records_confirmed_deployments() {
        let dir = TempDir::new().unwrap();
        let config = MigrationConfig {
            manifest_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let registry = test_registry();
        let car = registry.get(&"Car".parse().unwrap()).unwrap();
        let chain = Arc::new(
            SimulatedChain::new(1337).reject_bytecode(car.bytecode.clone(), "out of gas"),
        );
        let network = development();

        let err = deploy_args()
            .deploy(
                &json_output(),
                &config,
                &directives(&["User", "Car"]),
                Arc::new(registry),
                Some(("development", &network)),
                chain,
            )
            .await
            .unwrap_err();

        let MigrateError::Run(failure) = err else {
            panic!("expected a run failure");
        };
        assert_eq!(failure.failure.index, 1);
        assert_eq!(failure.failure.artifact.as_str(), "Car");
        assert_eq!(failure.completed.len(), 1);

        let manifest = DeploymentManifest::load(&DeploymentManifest::path_for(
            dir.path(),
            "development",
        ))
        .unwrap()
        .unwrap();
        assert_eq!(manifest.chain_id, 1337);
        let user = manifest.get(&"User".parse().unwrap()).unwrap();
        assert_eq!(user.address, failure.completed[0].address);
        assert!(manifest.get(&"Car".parse().unwrap()).is_none());
    }

    #[tokio::test]
    async fn dry_run_leaves_the_manifest_alone() {
        let dir = TempDir::new().unwrap();
        let config = MigrationConfig {
            manifest_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let network = development();
        let args = RunArgs {
            dry_run: true,
            ..deploy_args()
        };

        let completed = args
            .deploy(
                &json_output(),
                &config,
                &directives(&["User", "Car"]),
                Arc::new(test_registry()),
                Some(("development", &network)),
                Arc::new(simulated_chain(Some(&network))),
            )
            .await
            .unwrap();

        assert_eq!(completed.len(), 2);
        assert!(!DeploymentManifest::path_for(dir.path(), "development").exists());
    }
}
