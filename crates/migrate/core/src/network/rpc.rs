use alloy::{
    network::{
        ReceiptResponse,
        TransactionBuilder,
    },
    providers::{
        DynProvider,
        Provider,
        ProviderBuilder,
    },
    rpc::types::TransactionRequest,
    transports::TransportError,
};
use alloy_primitives::{
    Address,
    Bytes,
    TxHash,
};
use async_trait::async_trait;
use tracing::{
    debug,
    info,
};
use url::Url;

use super::{
    DeploymentReceipt,
    NetworkClient,
};
use crate::error::NetworkError;

/// Connection settings for a JSON-RPC node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcClientConfig {
    pub rpc_url: String,
    /// Refuse to deploy when the node reports a different chain.
    pub expected_chain_id: Option<u64>,
    /// Account the node signs deployments with. Defaults to the node's first account.
    pub from: Option<Address>,
}

/// [`NetworkClient`] backed by an alloy HTTP provider.
///
/// Transactions go out through `eth_sendTransaction` from an account the node
/// manages; the provider's fillers take care of nonce, gas and fees.
#[derive(Clone)]
pub struct RpcNetworkClient {
    provider: DynProvider,
    sender: Address,
    chain_id: u64,
}

impl std::fmt::Debug for RpcNetworkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcNetworkClient")
            .field("sender", &self.sender)
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

impl RpcNetworkClient {
    pub async fn connect(config: &RpcClientConfig) -> Result<Self, NetworkError> {
        let url = Url::parse(&config.rpc_url)?;
        let provider = ProviderBuilder::new().connect_http(url).erased();

        let chain_id = provider.get_chain_id().await?;
        if let Some(expected) = config.expected_chain_id {
            if expected != chain_id {
                return Err(NetworkError::ChainIdMismatch {
                    expected,
                    actual: chain_id,
                });
            }
        }

        let sender = match config.from {
            Some(from) => from,
            None => {
                provider
                    .get_accounts()
                    .await?
                    .into_iter()
                    .next()
                    .ok_or(NetworkError::NoSender)?
            }
        };

        info!(
            rpc_url = %config.rpc_url,
            chain_id,
            sender = %sender,
            "connected to network"
        );

        Ok(Self {
            provider,
            sender,
            chain_id,
        })
    }
}

#[async_trait]
impl NetworkClient for RpcNetworkClient {
    async fn chain_id(&self) -> Result<u64, NetworkError> {
        Ok(self.chain_id)
    }

    async fn submit_deployment(&self, init_code: Bytes) -> Result<TxHash, NetworkError> {
        debug!(init_code_len = init_code.len(), "sending deployment transaction");
        let tx = TransactionRequest::default()
            .from(self.sender)
            .with_deploy_code(init_code);

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(classify_transport_error)?;
        Ok(*pending.tx_hash())
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<DeploymentReceipt>, NetworkError> {
        let receipt = self.provider.get_transaction_receipt(tx_hash).await?;
        Ok(receipt.map(|receipt| {
            DeploymentReceipt {
                transaction_hash: receipt.transaction_hash,
                contract_address: ReceiptResponse::contract_address(&receipt),
                success: ReceiptResponse::status(&receipt),
                block_number: receipt.block_number,
            }
        }))
    }
}

/// JSON-RPC error responses mean the node looked at the transaction and refused
/// it; anything else is a transport problem.
fn classify_transport_error(err: TransportError) -> NetworkError {
    match err.as_error_resp() {
        Some(payload) => NetworkError::Rejected(payload.message.to_string()),
        None => NetworkError::Transport(err),
    }
}
