//! Migration plan file.
//!
//! ```toml
//! artifacts_dir = "build/contracts"
//! manifest_dir = "deployments"
//!
//! [networks.development]
//! rpc_url = "http://127.0.0.1:8545"
//!
//! [[deploy]]
//! artifact = "User"
//!
//! [[deploy]]
//! artifact = "Car"
//! ```

use alloy_primitives::Address;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::BTreeMap,
    fs,
    path::{
        Path,
        PathBuf,
    },
    str::FromStr,
    time::Duration,
};
use tracing::{
    debug,
    warn,
};

use crate::{
    directive::DeploymentDirective,
    error::ConfigError,
    network::RpcClientConfig,
    orchestrator::{
        ConfirmationPolicy,
        DEFAULT_CONFIRMATION_TIMEOUT,
        DEFAULT_POLL_INTERVAL,
    },
};

pub const DEFAULT_ARTIFACTS_DIR: &str = "build/contracts";
pub const DEFAULT_MANIFEST_DIR: &str = "deployments";

/// Settings for one target network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    pub rpc_url: String,
    /// Expected chain id; connecting to a node on another chain fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Deploying account, unlocked on the node. Defaults to `eth_accounts[0]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
}

impl NetworkConfig {
    pub fn confirmation_policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            timeout: self
                .confirmation_timeout_secs
                .map_or(DEFAULT_CONFIRMATION_TIMEOUT, Duration::from_secs),
            poll_interval: self
                .poll_interval_ms
                .map_or(DEFAULT_POLL_INTERVAL, Duration::from_millis),
        }
    }

    /// Client settings, with `rpc_url` replaced by `rpc_override` when given.
    pub fn client_config(&self, rpc_override: Option<&str>) -> RpcClientConfig {
        RpcClientConfig {
            rpc_url: rpc_override.unwrap_or(&self.rpc_url).to_string(),
            expected_chain_id: self.chain_id,
            from: self.from,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationConfig {
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    #[serde(default = "default_manifest_dir")]
    pub manifest_dir: PathBuf,
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Directives in deployment order.
    #[serde(rename = "deploy", default)]
    pub directives: Vec<DeploymentDirective>,
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ARTIFACTS_DIR)
}

fn default_manifest_dir() -> PathBuf {
    PathBuf::from(DEFAULT_MANIFEST_DIR)
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: default_artifacts_dir(),
            manifest_dir: default_manifest_dir(),
            networks: BTreeMap::new(),
            directives: vec![],
        }
    }
}

impl MigrationConfig {
    /// Reads a plan file. Relative directories in it are taken relative to
    /// the file's own directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| {
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Self = contents.parse()?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        debug!(
            path = %path.display(),
            networks = config.networks.len(),
            directives = config.directives.len(),
            "loaded migration plan"
        );
        Ok(config)
    }

    /// Like [`MigrationConfig::from_file`], but a missing file yields the
    /// defaults so directives can come from the command line alone.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "migration plan not found, using defaults");
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    pub fn network(&self, name: &str) -> Result<&NetworkConfig, ConfigError> {
        self.networks.get(name).ok_or_else(|| {
            ConfigError::UnknownNetwork {
                name: name.to_string(),
                known: if self.networks.is_empty() {
                    "none".to_string()
                } else {
                    self.networks.keys().cloned().collect::<Vec<_>>().join(", ")
                },
            }
        })
    }

    fn rebase(&mut self, base: &Path) {
        for dir in [&mut self.artifacts_dir, &mut self.manifest_dir] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }
}

impl FromStr for MigrationConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}
