use alloy::transports::TransportError;
use alloy_primitives::TxHash;
use migrate_common::{
    ArtifactId,
    InvalidArtifactId,
};
use std::{
    path::PathBuf,
    time::Duration,
};
use thiserror::Error;

use crate::orchestrator::RunFailure;

/// Failure of a single deployment directive.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("artifact `{0}` not found")]
    ArtifactNotFound(ArtifactId),
    #[error("artifact `{artifact}` is ambiguous, it is defined in {locations}")]
    AmbiguousArtifact {
        artifact: ArtifactId,
        locations: String,
    },
    #[error("artifact `{0}` has no bytecode (interface or abstract contract)")]
    NotDeployable(ArtifactId),
    #[error("constructor of `{artifact}` expects {expected} argument(s), got {provided}")]
    InvalidConstructorArgs {
        artifact: ArtifactId,
        expected: usize,
        provided: usize,
    },
    #[error("constructor argument {position} of `{artifact}` is not a valid `{ty}`: {reason}")]
    InvalidConstructorArg {
        artifact: ArtifactId,
        position: usize,
        ty: String,
        reason: String,
    },
    #[error(
        "constructor argument {position} of `{artifact}` refers to `@{dependency}`, which is not deployed earlier in the plan"
    )]
    UnresolvedDependency {
        artifact: ArtifactId,
        position: usize,
        dependency: ArtifactId,
    },
    #[error("deployment of `{artifact}` was rejected: {reason}")]
    TransactionRejected {
        artifact: ArtifactId,
        tx_hash: Option<TxHash>,
        reason: String,
    },
    #[error(
        "deployment of `{artifact}` was not confirmed within {waited:?} (tx {tx_hash}); verify chain state before retrying"
    )]
    Timeout {
        artifact: ArtifactId,
        tx_hash: TxHash,
        waited: Duration,
    },
    #[error("network failure while deploying `{artifact}`")]
    Network {
        artifact: ArtifactId,
        #[source]
        source: NetworkError,
    },
}

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("transaction rejected by the node: {0}")]
    Rejected(String),
    #[error("chain id mismatch: expected {expected}, node reports {actual}")]
    ChainIdMismatch { expected: u64, actual: u64 },
    #[error("node exposes no account to send deployments from; set `from` for the network")]
    NoSender,
    #[error("node did not answer within {0:?}")]
    Unresponsive(Duration),
    #[error("invalid RPC URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("RPC transport error: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read artifacts from {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse artifact {location}: {source}")]
    Parse {
        location: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("artifact {location} has invalid bytecode: {reason}")]
    InvalidBytecode { location: String, reason: String },
    #[error("artifact {location} has an invalid contract name: {source}")]
    InvalidName {
        location: String,
        #[source]
        source: InvalidArtifactId,
    },
    #[error("artifact `{id}` is defined twice ({first} and {second})")]
    Duplicate {
        id: ArtifactId,
        first: String,
        second: String,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse migration plan: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("network `{name}` is not defined (known networks: {known})")]
    UnknownNetwork { name: String, known: String },
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to access manifest {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("manifest {} is malformed: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("manifest {} belongs to network `{found}`, not `{expected}`", path.display())]
    NetworkMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },
}

/// Errors surfaced by the CLI commands.
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Artifacts(#[from] ArtifactError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(
        "no deployment directives: add [[deploy]] entries to the migration plan or pass --directive"
    )]
    EmptyPlan,
    #[error("--network is required unless --dry-run is set")]
    MissingNetwork,
    #[error("no manifest recorded for network `{0}`")]
    NoManifest(String),
    #[error(transparent)]
    Run(Box<RunFailure>),
}

impl From<RunFailure> for MigrateError {
    fn from(value: RunFailure) -> Self {
        Self::Run(Box::new(value))
    }
}
