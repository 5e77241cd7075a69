//! `migrate plan`: resolves and type-checks the plan without a network.

use alloy_dyn_abi::DynSolValue;
use clap::Parser;
use colored::Colorize;
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use migrate_common::args::CliArgs;

use crate::{
    commands::{
        load_registry,
        select_directives,
    },
    config::MigrationConfig,
    directive::DeploymentDirective,
    error::MigrateError,
    orchestrator::{
        PlannedArgument,
        PlannedDeployment,
        RunFailure,
        plan,
    },
};

#[derive(Debug, Parser)]
#[clap(
    name = "plan",
    about = "Check the migration plan against the compiled artifacts without deploying."
)]
pub struct PlanArgs {
    /// Directives to check instead of the plan's list
    #[clap(long = "directive", short = 'd', value_name = "DIRECTIVE")]
    pub directives: Vec<DeploymentDirective>,
}

/// One resolved step, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub index: usize,
    pub artifact: String,
    pub constructor: String,
    pub arguments: Vec<String>,
}

impl From<&PlannedDeployment> for PlanStep {
    fn from(planned: &PlannedDeployment) -> Self {
        Self {
            index: planned.index,
            artifact: planned.id().to_string(),
            constructor: planned.artifact.constructor_signature(),
            arguments: planned.arguments.iter().map(render_argument).collect(),
        }
    }
}

fn render_argument(argument: &PlannedArgument) -> String {
    match argument {
        PlannedArgument::Deployed(id) => format!("address of {id}"),
        PlannedArgument::Value(DynSolValue::Address(address)) => address.to_string(),
        PlannedArgument::Value(DynSolValue::Uint(value, _)) => value.to_string(),
        PlannedArgument::Value(DynSolValue::Int(value, _)) => value.to_string(),
        PlannedArgument::Value(DynSolValue::Bool(value)) => value.to_string(),
        PlannedArgument::Value(DynSolValue::String(value)) => format!("{value:?}"),
        PlannedArgument::Value(value) => format!("{value:?}"),
    }
}

impl PlanArgs {
    pub fn run(
        &self,
        cli_args: &CliArgs,
        config: &MigrationConfig,
    ) -> Result<Vec<PlanStep>, MigrateError> {
        let directives = select_directives(&self.directives, config)?;
        let registry = load_registry(config)?;

        let steps: Vec<PlanStep> = plan(&registry, &directives)
            .map_err(|failure| {
                RunFailure {
                    completed: vec![],
                    failure,
                }
            })?
            .iter()
            .map(PlanStep::from)
            .collect();

        if cli_args.json_output() {
            let output = json!({
                "status": "success",
                "steps": steps,
            });
            match serde_json::to_string_pretty(&output) {
                Ok(output) => println!("{output}"),
                Err(err) => warn!(%err, "failed to render JSON output"),
            }
        } else {
            println!("\n{}", "Migration Plan".bold().green());
            println!("{}", "==============".green());
            for step in &steps {
                println!(
                    "{}. {} {}",
                    step.index + 1,
                    step.artifact.bold(),
                    step.constructor.dimmed()
                );
                for (position, argument) in step.arguments.iter().enumerate() {
                    println!("     [{position}] {argument}");
                }
            }
            println!(
                "\n{} directive(s) resolved against {} artifact(s).",
                steps.len(),
                registry.len()
            );
        }

        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::tests::test_registry;

    #[test]
    fn steps_describe_resolved_arguments() {
        let directives: Vec<DeploymentDirective> = ["User", "Garage(@User,42)"]
            .iter()
            .map(|d| d.parse().unwrap())
            .collect();
        let planned = plan(&test_registry(), &directives).unwrap();
        let steps: Vec<PlanStep> = planned.iter().map(PlanStep::from).collect();

        assert_eq!(
            steps[0],
            PlanStep {
                index: 0,
                artifact: "User".to_string(),
                constructor: "constructor()".to_string(),
                arguments: vec![],
            }
        );
        assert_eq!(steps[1].constructor, "constructor(address,uint256)");
        assert_eq!(steps[1].arguments, vec!["address of User", "42"]);
    }
}
