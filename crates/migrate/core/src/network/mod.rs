use std::sync::Arc;

use alloy_primitives::{
    Address,
    Bytes,
    TxHash,
};
use async_trait::async_trait;

use crate::error::NetworkError;

pub mod rpc;
pub mod simulated;

pub use rpc::{
    RpcClientConfig,
    RpcNetworkClient,
};
pub use simulated::SimulatedChain;

/// What the network reports once a deployment transaction is included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentReceipt {
    pub transaction_hash: TxHash,
    pub contract_address: Option<Address>,
    pub success: bool,
    pub block_number: Option<u64>,
}

/// Connection to the chain deployments are sent to.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    async fn chain_id(&self) -> Result<u64, NetworkError>;

    /// Sends a contract creation transaction carrying `init_code`.
    ///
    /// A transaction the node refuses outright (insufficient funds, gas
    /// estimation failure) is reported as [`NetworkError::Rejected`].
    async fn submit_deployment(&self, init_code: Bytes) -> Result<TxHash, NetworkError>;

    /// Receipt for `tx_hash`, or `None` while the transaction is pending.
    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<DeploymentReceipt>, NetworkError>;
}

pub type SharedNetworkClient = Arc<dyn NetworkClient>;
