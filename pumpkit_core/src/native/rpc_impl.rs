// Native RPC client implementation wrapping solana_client::RpcClient

use crate::error::CoreError;
use crate::rpc_client::{RpcClient as RpcClientTrait, RpcResult, SendOptions, SignatureState};
use async_trait::async_trait;
use log::debug;
use solana_client::rpc_client::RpcClient as SolanaRpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use solana_transaction_status::TransactionConfirmationStatus;
use std::str::FromStr;
use std::sync::Arc;

/// Native RPC client wrapping solana_client::RpcClient
pub struct NativeRpcClient {
    client: Arc<SolanaRpcClient>,
}

impl NativeRpcClient {
    /// Create a new native RPC client
    pub fn new(endpoint: String) -> Self {
        Self {
            client: Arc::new(SolanaRpcClient::new_with_commitment(endpoint, CommitmentConfig::confirmed())),
        }
    }
}

#[async_trait]
impl RpcClientTrait for NativeRpcClient {
    async fn send_transaction(&self, transaction: &VersionedTransaction, options: &SendOptions) -> RpcResult<String> {
        debug!(
            "Native RPC: send_transaction skip_preflight={} max_retries={:?}",
            options.skip_preflight, options.max_retries
        );

        let config = RpcSendTransactionConfig {
            skip_preflight: options.skip_preflight,
            preflight_commitment: options.preflight_commitment,
            max_retries: options.max_retries,
            ..Default::default()
        };

        let client = self.client.clone();
        let tx = transaction.clone();
        let signature = tokio::task::spawn_blocking(move || client.send_transaction_with_config(&tx, config))
            .await
            .map_err(|e| CoreError::Rpc(format!("Task join error: {}", e)))?
            .map_err(|e| CoreError::Rpc(format!("send_transaction failed: {}", e)))?;

        Ok(signature.to_string())
    }

    async fn get_signature_status(&self, signature: &str) -> RpcResult<Option<SignatureState>> {
        debug!("Native RPC: get_signature_status for {}", signature);

        let signature = Signature::from_str(signature)
            .map_err(|e| CoreError::Validation(format!("Invalid signature: {}", e)))?;

        let client = self.client.clone();
        let response = tokio::task::spawn_blocking(move || client.get_signature_statuses(&[signature]))
            .await
            .map_err(|e| CoreError::Rpc(format!("Task join error: {}", e)))?
            .map_err(|e| CoreError::Rpc(format!("get_signature_statuses failed: {}", e)))?;

        let Some(Some(status)) = response.value.into_iter().next() else {
            return Ok(None);
        };

        if let Some(err) = status.err {
            return Ok(Some(SignatureState::Failed(format!("{:?}", err))));
        }

        let state = match status.confirmation_status {
            Some(TransactionConfirmationStatus::Finalized) => SignatureState::Finalized,
            Some(TransactionConfirmationStatus::Confirmed) => SignatureState::Confirmed,
            Some(TransactionConfirmationStatus::Processed) => SignatureState::Processed,
            // Older nodes omit the field; a null confirmation count means rooted.
            None if status.confirmations.is_none() => SignatureState::Finalized,
            None => SignatureState::Processed,
        };
        Ok(Some(state))
    }
}
