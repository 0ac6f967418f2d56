// SOL transfers from the primary wallet, singly or as a paced batch.

use crate::context::ClientContext;
use crate::error::CoreError;
use crate::models::{BatchReport, Operation, OperationOutcome, TransferRequest};
use crate::pipeline::run_single;
use crate::transaction_signer::ROLE_WALLET;
use log::{error, info, warn};
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;

pub type TransferServiceResult<T> = Result<T, CoreError>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransferParams {
    pub to: String,
    pub sol_amount: f64,
    #[serde(default)]
    pub priority_fee: Option<f64>,
}

pub struct TransferService;

impl TransferService {
    pub async fn execute_transfer(ctx: &ClientContext, params: TransferParams) -> TransferServiceResult<OperationOutcome> {
        Pubkey::from_str(&params.to)
            .map_err(|e| CoreError::Validation(format!("invalid recipient {}: {}", params.to, e)))?;
        if params.sol_amount <= 0.0 {
            return Err(CoreError::Validation("transfer amount must be > 0".to_string()));
        }

        let request = TransferRequest {
            public_key: ctx.primary_pubkey()?,
            to: params.to.clone(),
            amount: params.sol_amount,
            priority_fee: params.priority_fee.unwrap_or(ctx.settings.default_priority_fee),
        };
        info!("Transferring {} SOL to {}", params.sol_amount, params.to);
        run_single(ctx, Operation::Transfer, &request, &[ROLE_WALLET]).await
    }

    /// Send each transfer in order, waiting `delay` between entries.
    /// One entry failing does not stop the others.
    pub async fn execute_batch(ctx: &ClientContext, entries: &[TransferParams], delay: Duration) -> BatchReport {
        let mut report = BatchReport { requested: entries.len(), ..Default::default() };

        for (idx, entry) in entries.iter().enumerate() {
            if idx > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match Self::execute_transfer(ctx, entry.clone()).await {
                Ok(OperationOutcome::Submitted { signature, .. }) => {
                    report.succeeded += 1;
                    report.signatures.push(signature);
                }
                Ok(OperationOutcome::Rejected { status, message }) => {
                    warn!("Transfer #{} to {} rejected ({}): {}", idx + 1, entry.to, status, message);
                    report.rejected += 1;
                }
                Err(e) => {
                    error!("Transfer #{} to {} failed: {}", idx + 1, entry.to, e);
                    report.failed += 1;
                }
            }
        }
        info!(
            "Batch transfer done: {} ok, {} rejected, {} failed of {}",
            report.succeeded, report.rejected, report.failed, report.requested
        );
        report
    }
}

/// Read batch entries from a JSON array of `{to, sol_amount, priority_fee?}`.
pub fn parse_batch(json: &str) -> TransferServiceResult<Vec<TransferParams>> {
    let entries: Vec<TransferParams> = serde_json::from_str(json)?;
    if entries.is_empty() {
        return Err(CoreError::Validation("batch file has no entries".to_string()));
    }
    Ok(entries)
}
