//! clap subcommands of the `migrate` binary.

use indicatif::{
    ProgressBar,
    ProgressStyle,
};
use std::time::Duration;

use crate::{
    artifacts::ArtifactRegistry,
    config::MigrationConfig,
    directive::DeploymentDirective,
    error::MigrateError,
};

pub mod manifest;
pub mod plan;
pub mod run;

pub use manifest::ManifestArgs;
pub use plan::PlanArgs;
pub use run::RunArgs;

/// Spinner for long running steps. Hidden when output is machine readable.
pub(crate) fn create_spinner(json_output: bool) -> ProgressBar {
    if json_output {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Directives given with `--directive` win over the plan file's list.
pub(crate) fn select_directives(
    overrides: &[DeploymentDirective],
    config: &MigrationConfig,
) -> Result<Vec<DeploymentDirective>, MigrateError> {
    let directives = if overrides.is_empty() {
        config.directives.clone()
    } else {
        overrides.to_vec()
    };

    if directives.is_empty() {
        return Err(MigrateError::EmptyPlan);
    }
    Ok(directives)
}

pub(crate) fn load_registry(config: &MigrationConfig) -> Result<ArtifactRegistry, MigrateError> {
    let registry = ArtifactRegistry::load_dir(&config.artifacts_dir)?;
    tracing::debug!(
        dir = %config.artifacts_dir.display(),
        artifacts = registry.len(),
        "artifact registry ready"
    );
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_directives_replace_plan() {
        let config: MigrationConfig = r#"
            [[deploy]]
            artifact = "User"

            [[deploy]]
            artifact = "Car"
        "#
        .parse()
        .unwrap();

        let from_plan = select_directives(&[], &config).unwrap();
        assert_eq!(from_plan.len(), 2);

        let overrides: Vec<DeploymentDirective> = vec!["Garage(@User,1)".parse().unwrap()];
        let selected = select_directives(&overrides, &config).unwrap();
        assert_eq!(selected, overrides);
    }

    #[test]
    fn nothing_to_deploy_is_an_error() {
        assert!(matches!(
            select_directives(&[], &MigrationConfig::default()),
            Err(MigrateError::EmptyPlan)
        ));
    }
}
