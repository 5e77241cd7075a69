use std::{
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use migrate_common::args::CliArgs;
use migrate_core::{
    ArtifactId,
    ArtifactRegistry,
    ConfirmationPolicy,
    DeployError,
    DeploymentDirective,
    MigrateError,
    Orchestrator,
    commands::RunArgs,
    config::MigrationConfig,
    network::SimulatedChain,
};

fn testdata() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

fn directives(specs: &[&str]) -> Vec<DeploymentDirective> {
    specs.iter().map(|spec| spec.parse().unwrap()).collect()
}

#[test]
fn loads_both_artifact_layouts() {
    let registry = ArtifactRegistry::load_dir(testdata().join("artifacts")).unwrap();
    let ids: Vec<_> = registry.ids().map(ArtifactId::as_str).collect();
    assert_eq!(ids, vec!["Car", "Garage", "IVehicle", "User"]);

    let car = registry.get(&ArtifactId::new("Car").unwrap()).unwrap();
    assert_eq!(car.constructor_signature(), "constructor(address)");
}

#[tokio::test]
async fn user_then_car_on_simulated_chain() {
    let registry = Arc::new(ArtifactRegistry::load_dir(testdata().join("artifacts")).unwrap());
    let chain = Arc::new(SimulatedChain::default());
    let orchestrator = Orchestrator::new(chain.clone(), registry).with_confirmation(
        ConfirmationPolicy {
            timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(10),
        },
    );

    let deployed = orchestrator
        .run(&directives(&["User", "Car(@User)"]))
        .await
        .unwrap();
    assert_eq!(deployed.len(), 2);
    assert_eq!(deployed[0].artifact.as_str(), "User");
    assert_eq!(deployed[1].artifact.as_str(), "Car");
    assert_eq!(deployed[0].address, chain.sender().create(0));
    assert_eq!(deployed[1].address, chain.sender().create(1));
    assert_eq!(deployed[1].block_number, Some(2));
}

#[tokio::test]
async fn interface_in_plan_fails_before_submission() {
    let registry = Arc::new(ArtifactRegistry::load_dir(testdata().join("artifacts")).unwrap());
    let chain = Arc::new(SimulatedChain::default());
    let orchestrator = Orchestrator::new(chain.clone(), registry);

    let failure = orchestrator
        .run(&directives(&["User", "IVehicle"]))
        .await
        .unwrap_err();
    assert_eq!(failure.failure.index, 1);
    assert!(matches!(failure.failure.error, DeployError::NotDeployable(_)));
    assert_eq!(chain.transaction_count(), 0);
}

#[tokio::test]
async fn dry_run_command_deploys_the_plan_file() {
    let config = MigrationConfig::from_file(testdata().join("migrations.toml")).unwrap();
    let args = RunArgs {
        network: Some("development".to_string()),
        rpc_url: None,
        dry_run: true,
        directives: vec![],
    };
    let cli_args = CliArgs {
        json: true,
        ..Default::default()
    };

    let deployed = args.run(&cli_args, &config).await.unwrap();
    let names: Vec<_> = deployed.iter().map(|c| c.artifact.as_str()).collect();
    assert_eq!(names, vec!["User", "Car"]);
    assert!(!config.manifest_dir.exists());
}

#[tokio::test]
async fn dry_run_reports_planning_failures() {
    let config = MigrationConfig::from_file(testdata().join("migrations.toml")).unwrap();
    let args = RunArgs {
        network: None,
        rpc_url: None,
        dry_run: true,
        directives: directives(&["User", "Garage(@User)"]),
    };

    let err = args.run(&CliArgs::default(), &config).await.unwrap_err();
    match err {
        MigrateError::Run(failure) => {
            assert!(failure.completed.is_empty());
            assert!(matches!(
                failure.failure.error,
                DeployError::InvalidConstructorArgs {
                    expected: 2,
                    provided: 1,
                    ..
                }
            ));
        }
        other => panic!("expected run failure, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_network_is_rejected() {
    let config = MigrationConfig::from_file(testdata().join("migrations.toml")).unwrap();
    let args = RunArgs {
        network: Some("mainnet".to_string()),
        rpc_url: None,
        dry_run: true,
        directives: vec![],
    };

    assert!(matches!(
        args.run(&CliArgs::default(), &config).await,
        Err(MigrateError::Config(_))
    ));
}
