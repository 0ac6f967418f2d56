// Submission of signed transactions through a standard RPC endpoint,
// with optional confirmation polling.

use crate::error::CoreError;
use crate::rpc_client::{RpcClient, SendOptions, SignatureState};
use log::{debug, info, warn};
use solana_sdk::commitment_config::CommitmentLevel;
use solana_sdk::transaction::VersionedTransaction;
use std::time::Duration;

pub type SubmitResult<T> = Result<T, CoreError>;

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOptions {
    pub skip_preflight: bool,
    pub max_retries: Option<usize>,
    /// Block until the signature is confirmed.
    pub confirm: bool,
    pub confirm_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            skip_preflight: false,
            max_retries: Some(3),
            confirm: false,
            confirm_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(2),
        }
    }
}

impl SubmitOptions {
    pub fn send_options(&self) -> SendOptions {
        SendOptions {
            skip_preflight: self.skip_preflight,
            max_retries: self.max_retries,
            preflight_commitment: Some(CommitmentLevel::Confirmed),
        }
    }
}

/// What came back from a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub signature: String,
    pub confirmed: bool,
}

/// Send a signed transaction once. Retries happen on the RPC node side,
/// bounded by `max_retries`.
pub async fn submit_transaction(
    rpc: &(dyn RpcClient + '_),
    tx: &VersionedTransaction,
    options: &SubmitOptions,
) -> SubmitResult<String> {
    let signature = rpc.send_transaction(tx, &options.send_options()).await?;
    info!("Transaction sent: {}", signature);
    Ok(signature)
}

/// Poll the signature status until it is confirmed or finalized, failed,
/// or `timeout` elapses.
pub async fn confirm_transaction(
    rpc: &(dyn RpcClient + '_),
    signature: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> SubmitResult<SignatureState> {
    let deadline = tokio::time::Instant::now() + timeout;
    debug!("Waiting for transaction confirmation: {}", signature);

    loop {
        match rpc.get_signature_status(signature).await {
            Ok(Some(SignatureState::Failed(err))) => {
                return Err(CoreError::Transaction(format!("{} failed: {}", signature, err)));
            }
            Ok(Some(state)) if state.is_landed() => {
                info!("Transaction confirmed: {} ({:?})", signature, state);
                return Ok(state);
            }
            Ok(state) => debug!("Transaction {} status: {:?}", signature, state),
            Err(e) => warn!("Status check failed for {}: {}", signature, e),
        }

        if tokio::time::Instant::now() + poll_interval > deadline {
            break;
        }
        tokio::time::sleep(poll_interval).await;
    }

    warn!("Transaction confirmation timeout after {:?}: {}", timeout, signature);
    Err(CoreError::Timeout(format!("confirmation of {}", signature)))
}

/// `submit_transaction`, then `confirm_transaction` when `options.confirm`.
pub async fn submit_and_confirm(
    rpc: &(dyn RpcClient + '_),
    tx: &VersionedTransaction,
    options: &SubmitOptions,
) -> SubmitResult<Submission> {
    let signature = submit_transaction(rpc, tx, options).await?;
    if !options.confirm {
        return Ok(Submission { signature, confirmed: false });
    }
    confirm_transaction(rpc, &signature, options.confirm_timeout, options.poll_interval).await?;
    Ok(Submission { signature, confirmed: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{unsigned_tx, MockRpc};
    use solana_sdk::pubkey::Pubkey;

    #[tokio::test]
    async fn submit_passes_retry_count_through() {
        let rpc = MockRpc::new();
        let tx = unsigned_tx(&[Pubkey::new_unique()]);
        let opts = SubmitOptions { max_retries: Some(7), skip_preflight: true, ..Default::default() };
        let sig = submit_transaction(&rpc, &tx, &opts).await.unwrap();

        assert_eq!(sig, tx.signatures[0].to_string());
        let sent = rpc.sent_options();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].max_retries, Some(7));
        assert!(sent[0].skip_preflight);
    }

    #[tokio::test(start_paused = true)]
    async fn confirm_polls_until_landed() {
        let rpc = MockRpc::new();
        rpc.push_status("sig", None);
        rpc.push_status("sig", Some(SignatureState::Processed));
        rpc.push_status("sig", Some(SignatureState::Confirmed));

        let state = confirm_transaction(&rpc, "sig", Duration::from_secs(30), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(state, SignatureState::Confirmed);
        assert_eq!(rpc.status_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn confirm_reports_failure_and_timeout() {
        let rpc = MockRpc::new();
        rpc.push_status("bad", Some(SignatureState::Failed("InstructionError".into())));
        let err = confirm_transaction(&rpc, "bad", Duration::from_secs(5), Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, CoreError::Transaction(_)));

        let err = confirm_transaction(&rpc, "never", Duration::from_secs(5), Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, CoreError::Timeout(_)));
    }

    #[tokio::test]
    async fn submit_without_confirm_returns_unconfirmed() {
        let rpc = MockRpc::new();
        let tx = unsigned_tx(&[Pubkey::new_unique()]);
        let sub = submit_and_confirm(&rpc, &tx, &SubmitOptions::default()).await.unwrap();
        assert!(!sub.confirmed);
        assert_eq!(rpc.status_calls(), 0);
    }
}
