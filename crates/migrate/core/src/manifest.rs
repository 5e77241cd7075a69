//! Per-network record of confirmed deployments.
//!
//! Stored as pretty JSON at `<manifest_dir>/<network>.json`. Each artifact maps
//! to its latest deployment; earlier instances are overwritten.

use alloy_primitives::{
    Address,
    TxHash,
};
use chrono::{
    DateTime,
    Utc,
};
use migrate_common::ArtifactId;
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
};
use tracing::debug;

use crate::{
    directive::DeployedContract,
    error::ManifestError,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub address: Address,
    pub transaction_hash: TxHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    pub deployed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentManifest {
    pub network: String,
    pub chain_id: u64,
    #[serde(default)]
    pub contracts: BTreeMap<ArtifactId, ManifestEntry>,
}

impl DeploymentManifest {
    pub fn new(network: impl Into<String>, chain_id: u64) -> Self {
        Self {
            network: network.into(),
            chain_id,
            contracts: BTreeMap::new(),
        }
    }

    /// Location of the manifest for `network` under `dir`.
    pub fn path_for(dir: &Path, network: &str) -> PathBuf {
        dir.join(format!("{network}.json"))
    }

    /// Reads the manifest at `path`, or `None` when it does not exist yet.
    pub fn load(path: &Path) -> Result<Option<Self>, ManifestError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ManifestError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| {
                ManifestError::Json {
                    path: path.to_path_buf(),
                    source,
                }
            })
    }

    /// Loads the existing manifest for `network`, or starts an empty one.
    ///
    /// The chain id is refreshed to `chain_id`, so a manifest always reflects
    /// the chain of its last write.
    pub fn load_or_default(path: &Path, network: &str, chain_id: u64) -> Result<Self, ManifestError> {
        match Self::load(path)? {
            Some(manifest) if manifest.network != network => {
                Err(ManifestError::NetworkMismatch {
                    path: path.to_path_buf(),
                    expected: network.to_string(),
                    found: manifest.network,
                })
            }
            Some(mut manifest) => {
                manifest.chain_id = chain_id;
                Ok(manifest)
            }
            None => Ok(Self::new(network, chain_id)),
        }
    }

    /// Records confirmed deployments, in order, stamped with `at`.
    pub fn record<'a>(
        &mut self,
        contracts: impl IntoIterator<Item = &'a DeployedContract>,
        at: DateTime<Utc>,
    ) {
        for contract in contracts {
            self.contracts.insert(
                contract.artifact.clone(),
                ManifestEntry {
                    address: contract.address,
                    transaction_hash: contract.transaction_hash,
                    block_number: contract.block_number,
                    deployed_at: at,
                },
            );
        }
    }

    pub fn get(&self, artifact: &ArtifactId) -> Option<&ManifestEntry> {
        self.contracts.get(artifact)
    }

    /// Writes the manifest to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let io_err = |source: std::io::Error| {
            ManifestError::Io {
                path: path.to_path_buf(),
                source,
            }
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| {
            ManifestError::Json {
                path: path.to_path_buf(),
                source,
            }
        })?;
        fs::write(path, json + "\n").map_err(io_err)?;

        debug!(path = %path.display(), contracts = self.contracts.len(), "manifest written");
        Ok(())
    }
}
