use clap::Parser;
use migrate_common::args::CliArgs;
use migrate_core::commands::{
    ManifestArgs,
    PlanArgs,
    RunArgs,
};
use std::sync::OnceLock;

fn version_message() -> &'static str {
    static VERSION: OnceLock<String> = OnceLock::new();
    VERSION
        .get_or_init(|| {
            format!(
                "{}\nCommit: {}\nBuild Timestamp: {}",
                env!("CARGO_PKG_VERSION"),
                option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
                option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"),
            )
        })
        .as_str()
}

#[derive(Parser)]
#[command(
    name = "migrate",
    version = version_message(),
    long_version = version_message(),
    about = "Deploy compiled contracts to a network, in order, from a declarative plan"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    #[command(flatten)]
    pub args: CliArgs,
}

#[derive(clap::Subcommand)]
pub enum Commands {
    #[command(name = "run")]
    Run(RunArgs),
    #[command(name = "plan")]
    Plan(PlanArgs),
    #[command(name = "manifest")]
    Manifest(ManifestArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn parses_run_command_with_directives() {
        let cli = Cli::try_parse_from([
            "migrate",
            "--json",
            "run",
            "--network",
            "development",
            "-d",
            "User",
            "-d",
            "Car",
        ])
        .unwrap();
        assert!(cli.args.json_output());
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.network.as_deref(), Some("development"));
                assert!(!args.dry_run);
                let names: Vec<_> = args.directives.iter().map(ToString::to_string).collect();
                assert_eq!(names, vec!["User", "Car"]);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "migrate",
            "plan",
            "--config",
            "deploy/plan.toml",
            "--json",
        ])
        .unwrap();
        assert!(cli.args.json_output());
        assert_eq!(cli.args.config, Path::new("deploy/plan.toml"));
        assert!(matches!(cli.command, Commands::Plan(_)));
    }

    #[test]
    fn rejects_malformed_directive() {
        assert!(Cli::try_parse_from(["migrate", "run", "--dry-run", "-d", "Car(1"]).is_err());
    }

    #[test]
    fn parses_manifest_command() {
        let cli = Cli::try_parse_from(["migrate", "manifest", "-n", "sepolia"]).unwrap();
        match cli.command {
            Commands::Manifest(args) => assert_eq!(args.network, "sepolia"),
            _ => panic!("expected manifest command"),
        }
    }
}
