//! Sequential deployment of a migration plan.
//!
//! A run has two phases. Planning resolves every directive against the
//! artifact registry and type-checks its constructor arguments, so a typo in
//! the last directive is caught before the first transaction leaves. Deployment
//! then submits the directives one by one, each only after the previous one is
//! confirmed, and stops at the first failure.

use std::{
    sync::Arc,
    time::Duration,
};

use alloy_dyn_abi::{
    DynSolType,
    DynSolValue,
    Specifier,
};
use alloy_primitives::{
    Bytes,
    TxHash,
};
use migrate_common::ArtifactId;
use thiserror::Error;
use tracing::{
    debug,
    info,
    warn,
};

use crate::{
    artifacts::{
        Artifact,
        ArtifactRegistry,
    },
    directive::{
        ConstructorArg,
        DeployedContract,
        DeploymentDirective,
    },
    error::{
        DeployError,
        NetworkError,
    },
    network::{
        DeploymentReceipt,
        SharedNetworkClient,
    },
};

/// Default bound on how long a deployment may stay unconfirmed.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Default delay between receipt polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How confirmations are awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// The directive that stopped a run, and why.
#[derive(Debug, Error)]
#[error("directive {} (`{artifact}`) failed", .index + 1)]
pub struct DirectiveFailure {
    /// Zero-based position in the plan.
    pub index: usize,
    pub artifact: ArtifactId,
    #[source]
    pub error: DeployError,
}

/// A run that stopped early.
///
/// `completed` holds the deployments confirmed before the failing directive;
/// nothing at or after `failure.index` was recorded.
#[derive(Debug, Error)]
#[error("migration aborted after {} confirmed deployment(s)", .completed.len())]
pub struct RunFailure {
    pub completed: Vec<DeployedContract>,
    #[source]
    pub failure: DirectiveFailure,
}

/// A constructor argument after planning.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedArgument {
    Value(DynSolValue),
    /// Filled in with the address of the named deployment at submission time.
    Deployed(ArtifactId),
}

/// A directive resolved against the registry, ready to submit.
#[derive(Debug, Clone)]
pub struct PlannedDeployment {
    pub index: usize,
    pub artifact: Arc<Artifact>,
    pub arguments: Vec<PlannedArgument>,
}

impl PlannedDeployment {
    pub fn id(&self) -> &ArtifactId {
        &self.artifact.id
    }

    /// Creation bytecode followed by the ABI encoded constructor arguments.
    ///
    /// `deployed` is searched from the end, so a reference resolves to the most
    /// recent deployment of that artifact.
    pub fn init_code(&self, deployed: &[DeployedContract]) -> Result<Bytes, DeployError> {
        let values = self
            .arguments
            .iter()
            .enumerate()
            .map(|(position, argument)| {
                match argument {
                    PlannedArgument::Value(value) => Ok(value.clone()),
                    PlannedArgument::Deployed(dependency) => {
                        deployed
                            .iter()
                            .rev()
                            .find(|contract| &contract.artifact == dependency)
                            .map(|contract| DynSolValue::Address(contract.address))
                            .ok_or_else(|| {
                                DeployError::UnresolvedDependency {
                                    artifact: self.id().clone(),
                                    position,
                                    dependency: dependency.clone(),
                                }
                            })
                    }
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut code = self.artifact.bytecode.to_vec();
        if !values.is_empty() {
            code.extend(DynSolValue::Tuple(values).abi_encode_params());
        }
        Ok(code.into())
    }
}

/// Resolves every directive against `registry` without touching the network.
///
/// Fails on the first directive that names a missing or undeployable artifact,
/// passes the wrong number of arguments, passes a value that does not coerce
/// to its ABI type, or references an artifact not deployed earlier.
pub fn plan(
    registry: &ArtifactRegistry,
    directives: &[DeploymentDirective],
) -> Result<Vec<PlannedDeployment>, DirectiveFailure> {
    directives
        .iter()
        .enumerate()
        .map(|(index, directive)| {
            plan_directive(registry, &directives[..index], index, directive).map_err(|error| {
                DirectiveFailure {
                    index,
                    artifact: directive.artifact.clone(),
                    error,
                }
            })
        })
        .collect()
}

fn plan_directive(
    registry: &ArtifactRegistry,
    earlier: &[DeploymentDirective],
    index: usize,
    directive: &DeploymentDirective,
) -> Result<PlannedDeployment, DeployError> {
    let artifact = registry.get(&directive.artifact)?;
    if !artifact.is_deployable() {
        return Err(DeployError::NotDeployable(artifact.id.clone()));
    }

    let inputs = artifact.constructor_inputs();
    if inputs.len() != directive.constructor_args.len() {
        return Err(DeployError::InvalidConstructorArgs {
            artifact: artifact.id.clone(),
            expected: inputs.len(),
            provided: directive.constructor_args.len(),
        });
    }

    let arguments = inputs
        .iter()
        .zip(&directive.constructor_args)
        .enumerate()
        .map(|(position, (input, argument))| {
            let invalid = |reason: String| {
                DeployError::InvalidConstructorArg {
                    artifact: artifact.id.clone(),
                    position,
                    ty: input.selector_type().into_owned(),
                    reason,
                }
            };

            let ty: DynSolType = input.resolve().map_err(|e| invalid(e.to_string()))?;
            match argument {
                ConstructorArg::Literal(raw) => {
                    ty.coerce_str(raw)
                        .map(PlannedArgument::Value)
                        .map_err(|e| invalid(e.to_string()))
                }
                ConstructorArg::Deployed(dependency) => {
                    if ty != DynSolType::Address {
                        return Err(invalid(format!(
                            "`@{dependency}` is an address and only fits `address` parameters"
                        )));
                    }
                    if !earlier.iter().any(|d| &d.artifact == dependency) {
                        return Err(DeployError::UnresolvedDependency {
                            artifact: artifact.id.clone(),
                            position,
                            dependency: dependency.clone(),
                        });
                    }
                    Ok(PlannedArgument::Deployed(dependency.clone()))
                }
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PlannedDeployment {
        index,
        artifact: Arc::clone(artifact),
        arguments,
    })
}

/// Progress notifications emitted while a plan is deployed.
#[derive(Debug, Clone, Copy)]
pub enum Progress<'a> {
    Submitting {
        index: usize,
        total: usize,
        artifact: &'a ArtifactId,
    },
    Submitted {
        index: usize,
        artifact: &'a ArtifactId,
        tx_hash: TxHash,
    },
    Confirmed {
        index: usize,
        contract: &'a DeployedContract,
    },
}

/// Deploys directives in order against one network client.
///
/// The orchestrator holds no global state: the client and the registry are
/// handed in explicitly, and each run starts from scratch.
#[derive(Clone)]
pub struct Orchestrator {
    client: SharedNetworkClient,
    registry: Arc<ArtifactRegistry>,
    confirmation: ConfirmationPolicy,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("artifacts", &self.registry.len())
            .field("confirmation", &self.confirmation)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(client: SharedNetworkClient, registry: Arc<ArtifactRegistry>) -> Self {
        Self {
            client,
            registry,
            confirmation: ConfirmationPolicy::default(),
        }
    }

    pub fn with_confirmation(mut self, confirmation: ConfirmationPolicy) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn plan(
        &self,
        directives: &[DeploymentDirective],
    ) -> Result<Vec<PlannedDeployment>, DirectiveFailure> {
        plan(&self.registry, directives)
    }

    /// Deploys `directives` in order and returns one record per directive.
    pub async fn run(
        &self,
        directives: &[DeploymentDirective],
    ) -> Result<Vec<DeployedContract>, RunFailure> {
        self.run_with_progress(directives, |_| {}).await
    }

    /// Like [`Orchestrator::run`], reporting each step to `on_progress`.
    pub async fn run_with_progress<F>(
        &self,
        directives: &[DeploymentDirective],
        mut on_progress: F,
    ) -> Result<Vec<DeployedContract>, RunFailure>
    where
        F: FnMut(Progress<'_>),
    {
        let planned = self.plan(directives).map_err(|failure| {
            RunFailure {
                completed: vec![],
                failure,
            }
        })?;

        let total = planned.len();
        let mut deployed: Vec<DeployedContract> = Vec::with_capacity(total);

        for step in &planned {
            on_progress(Progress::Submitting {
                index: step.index,
                total,
                artifact: step.id(),
            });

            match self.deploy(step, &deployed, &mut on_progress).await {
                Ok(contract) => {
                    on_progress(Progress::Confirmed {
                        index: step.index,
                        contract: &contract,
                    });
                    deployed.push(contract);
                }
                Err(error) => {
                    warn!(
                        artifact = %step.id(),
                        index = step.index,
                        error = %error,
                        "deployment failed, aborting remaining directives"
                    );
                    return Err(RunFailure {
                        completed: deployed,
                        failure: DirectiveFailure {
                            index: step.index,
                            artifact: step.id().clone(),
                            error,
                        },
                    });
                }
            }
        }

        info!(count = deployed.len(), "migration complete");
        Ok(deployed)
    }

    async fn deploy<F>(
        &self,
        step: &PlannedDeployment,
        deployed: &[DeployedContract],
        on_progress: &mut F,
    ) -> Result<DeployedContract, DeployError>
    where
        F: FnMut(Progress<'_>),
    {
        let artifact = step.id();
        let init_code = step.init_code(deployed)?;
        debug!(%artifact, init_code_len = init_code.len(), "submitting deployment");

        let submission =
            tokio::time::timeout(self.confirmation.timeout, self.client.submit_deployment(init_code))
                .await
                .unwrap_or(Err(NetworkError::Unresponsive(self.confirmation.timeout)));
        let tx_hash = submission.map_err(|err| {
            match err {
                NetworkError::Rejected(reason) => {
                    DeployError::TransactionRejected {
                        artifact: artifact.clone(),
                        tx_hash: None,
                        reason,
                    }
                }
                source => {
                    DeployError::Network {
                        artifact: artifact.clone(),
                        source,
                    }
                }
            }
        })?;
        info!(%artifact, %tx_hash, "deployment submitted");
        on_progress(Progress::Submitted {
            index: step.index,
            artifact,
            tx_hash,
        });

        let receipt = self.await_confirmation(artifact, tx_hash).await?;
        if !receipt.success {
            return Err(DeployError::TransactionRejected {
                artifact: artifact.clone(),
                tx_hash: Some(tx_hash),
                reason: "transaction reverted".to_string(),
            });
        }
        let address = receipt.contract_address.ok_or_else(|| {
            DeployError::TransactionRejected {
                artifact: artifact.clone(),
                tx_hash: Some(tx_hash),
                reason: "receipt carries no contract address".to_string(),
            }
        })?;

        info!(%artifact, %address, "deployment confirmed");
        Ok(DeployedContract {
            artifact: artifact.clone(),
            address,
            transaction_hash: tx_hash,
            block_number: receipt.block_number,
        })
    }

    async fn await_confirmation(
        &self,
        artifact: &ArtifactId,
        tx_hash: TxHash,
    ) -> Result<DeploymentReceipt, DeployError> {
        let poll = async {
            loop {
                if let Some(receipt) = self.client.receipt(tx_hash).await? {
                    return Ok::<_, NetworkError>(receipt);
                }
                tokio::time::sleep(self.confirmation.poll_interval).await;
            }
        };

        match tokio::time::timeout(self.confirmation.timeout, poll).await {
            Ok(result) => {
                result.map_err(|source| {
                    DeployError::Network {
                        artifact: artifact.clone(),
                        source,
                    }
                })
            }
            Err(_) => {
                Err(DeployError::Timeout {
                    artifact: artifact.clone(),
                    tx_hash,
                    waited: self.confirmation.timeout,
                })
            }
        }
    }
}
