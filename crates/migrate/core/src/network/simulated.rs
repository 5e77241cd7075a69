//! In-memory chain used for dry runs and tests.

use std::collections::HashMap;

use alloy_primitives::{
    Address,
    Bytes,
    TxHash,
    address,
    keccak256,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::{
    DeploymentReceipt,
    NetworkClient,
};
use crate::error::NetworkError;

/// First account of a default Anvil/Hardhat node.
pub const DEFAULT_SENDER: Address = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");

/// Chain id reported by local development nodes.
pub const DEFAULT_CHAIN_ID: u64 = 31337;

#[derive(Debug, Clone)]
struct RejectionRule {
    /// Init code prefix the rule applies to; `None` matches every deployment.
    bytecode: Option<Bytes>,
    reason: String,
}

#[derive(Debug, Default)]
struct ChainState {
    nonce: u64,
    block_number: u64,
    receipts: HashMap<TxHash, DeploymentReceipt>,
    code: HashMap<Address, Bytes>,
}

/// A chain that lives in memory.
///
/// Contract addresses follow `CREATE` derivation from the sender and its
/// nonce, so deploying the same plan twice yields fresh addresses, as on a
/// real network. Each deployment is mined in its own block.
#[derive(Debug)]
pub struct SimulatedChain {
    chain_id: u64,
    sender: Address,
    confirm: bool,
    rejections: Vec<RejectionRule>,
    state: Mutex<ChainState>,
}

impl Default for SimulatedChain {
    fn default() -> Self {
        Self::new(DEFAULT_CHAIN_ID)
    }
}

impl SimulatedChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            sender: DEFAULT_SENDER,
            confirm: true,
            rejections: vec![],
            state: Mutex::new(ChainState::default()),
        }
    }

    pub fn with_sender(mut self, sender: Address) -> Self {
        self.sender = sender;
        self
    }

    /// Rejects every deployment whose init code starts with `bytecode`.
    pub fn reject_bytecode(mut self, bytecode: Bytes, reason: impl Into<String>) -> Self {
        self.rejections.push(RejectionRule {
            bytecode: Some(bytecode),
            reason: reason.into(),
        });
        self
    }

    /// Rejects every deployment.
    pub fn reject_all(mut self, reason: impl Into<String>) -> Self {
        self.rejections.push(RejectionRule {
            bytecode: None,
            reason: reason.into(),
        });
        self
    }

    /// Accepts transactions but never includes them.
    pub fn without_confirmations(mut self) -> Self {
        self.confirm = false;
        self
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    /// Number of deployment transactions accepted so far.
    pub fn transaction_count(&self) -> u64 {
        self.state.lock().nonce
    }

    /// Runtime placeholder stored at `address`: the init code that created it.
    pub fn code_at(&self, address: Address) -> Option<Bytes> {
        self.state.lock().code.get(&address).cloned()
    }

    fn rejection_for(&self, init_code: &Bytes) -> Option<&RejectionRule> {
        self.rejections.iter().find(|rule| {
            rule.bytecode
                .as_ref()
                .is_none_or(|prefix| init_code.starts_with(prefix))
        })
    }
}

#[async_trait]
impl NetworkClient for SimulatedChain {
    async fn chain_id(&self) -> Result<u64, NetworkError> {
        Ok(self.chain_id)
    }

    async fn submit_deployment(&self, init_code: Bytes) -> Result<TxHash, NetworkError> {
        if let Some(rule) = self.rejection_for(&init_code) {
            return Err(NetworkError::Rejected(rule.reason.clone()));
        }

        let mut state = self.state.lock();
        let nonce = state.nonce;
        state.nonce += 1;

        let mut preimage = Vec::with_capacity(20 + 8 + init_code.len());
        preimage.extend_from_slice(self.sender.as_slice());
        preimage.extend_from_slice(&nonce.to_be_bytes());
        preimage.extend_from_slice(&init_code);
        let tx_hash = keccak256(&preimage);

        if self.confirm {
            state.block_number += 1;
            let contract_address = self.sender.create(nonce);
            let receipt = DeploymentReceipt {
                transaction_hash: tx_hash,
                contract_address: Some(contract_address),
                success: true,
                block_number: Some(state.block_number),
            };
            state.receipts.insert(tx_hash, receipt);
            state.code.insert(contract_address, init_code);
        }

        debug!(%tx_hash, nonce, "simulated deployment accepted");
        Ok(tx_hash)
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<DeploymentReceipt>, NetworkError> {
        Ok(self.state.lock().receipts.get(&tx_hash).cloned())
    }
}
