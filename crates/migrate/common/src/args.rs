use clap::{
    Parser,
    ValueHint,
};
use std::path::PathBuf;

/// Default location of the migration plan, relative to the working directory.
pub const DEFAULT_PLAN_FILE: &str = "migrations.toml";

#[derive(Debug, Parser, Clone)]
pub struct CliArgs {
    #[clap(short, long, global = true)]
    pub json: bool,
    /// Migration plan describing networks and deployment directives
    #[clap(
        long = "config",
        short = 'c',
        global = true,
        env = "MIGRATE_CONFIG",
        value_hint = ValueHint::FilePath,
        default_value = DEFAULT_PLAN_FILE
    )]
    pub config: PathBuf,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            json: false,
            config: PathBuf::from(DEFAULT_PLAN_FILE),
        }
    }
}

impl CliArgs {
    pub fn json_output(&self) -> bool {
        self.json
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn parses_json_flag() {
        let args = CliArgs::try_parse_from(["cli", "--json"]).expect("should parse");
        assert!(args.json_output());
    }

    #[test]
    fn config_defaults_to_plan_file() {
        let args = CliArgs::try_parse_from(["cli"]).expect("should parse");
        assert_eq!(args.config, Path::new(DEFAULT_PLAN_FILE));
    }

    #[test]
    fn config_can_be_overridden() {
        let args =
            CliArgs::try_parse_from(["cli", "--config", "/tmp/plan.toml"]).expect("should parse");
        assert_eq!(args.config, Path::new("/tmp/plan.toml"));
    }
}
