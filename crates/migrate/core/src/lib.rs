#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod artifacts;
pub mod commands;
pub mod config;
pub mod directive;
pub mod error;
pub mod manifest;
pub mod network;
pub mod orchestrator;

pub use artifacts::{
    Artifact,
    ArtifactRegistry,
};
pub use directive::{
    ConstructorArg,
    DeployedContract,
    DeploymentDirective,
};
pub use error::{
    DeployError,
    MigrateError,
};
pub use migrate_common::ArtifactId;
pub use network::{
    NetworkClient,
    SharedNetworkClient,
};
pub use orchestrator::{
    ConfirmationPolicy,
    Orchestrator,
    RunFailure,
};
