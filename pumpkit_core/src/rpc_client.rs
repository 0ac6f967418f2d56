// RPC Client abstraction - the native implementation wraps solana_client,
// tests plug in an in-memory one.

use crate::error::CoreError;
use async_trait::async_trait;
use solana_sdk::commitment_config::CommitmentLevel;
use solana_sdk::transaction::VersionedTransaction;

/// Result type for RPC operations
pub type RpcResult<T> = Result<T, CoreError>;

/// Options passed straight through to `sendTransaction`.
#[derive(Debug, Clone, PartialEq)]
pub struct SendOptions {
    pub skip_preflight: bool,
    /// Retry count the RPC node applies on its side.
    pub max_retries: Option<usize>,
    pub preflight_commitment: Option<CommitmentLevel>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            skip_preflight: false,
            max_retries: Some(3),
            preflight_commitment: Some(CommitmentLevel::Confirmed),
        }
    }
}

/// Observed state of a submitted signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureState {
    Processed,
    Confirmed,
    Finalized,
    Failed(String),
}

impl SignatureState {
    pub fn is_landed(&self) -> bool {
        matches!(self, SignatureState::Confirmed | SignatureState::Finalized)
    }
}

#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Send a fully signed transaction, returning its signature.
    async fn send_transaction(&self, transaction: &VersionedTransaction, options: &SendOptions) -> RpcResult<String>;

    /// Look up a signature. `None` while the cluster has not seen it.
    async fn get_signature_status(&self, signature: &str) -> RpcResult<Option<SignatureState>>;
}
