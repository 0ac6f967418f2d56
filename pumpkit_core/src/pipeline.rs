// Shared build -> materialize -> sign -> submit sequence used by every
// single-transaction operation.

use crate::context::ClientContext;
use crate::error::CoreError;
use crate::materializer::{materialize, Materialized};
use crate::models::{ApiResponse, Operation, OperationOutcome};
use crate::submitter::submit_and_confirm;
use crate::transaction_signer::{MissingRolePolicy, SignerSet};
use log::{info, warn};
use serde::Serialize;

pub type PipelineResult<T> = Result<T, CoreError>;

/// Result of the remote build step.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    Built(ApiResponse),
    Rejected { status: u16, message: String },
}

/// POST the request. An API rejection is an outcome, not an error; every
/// other failure propagates.
pub async fn build<B: Serialize + ?Sized>(ctx: &ClientContext, op: Operation, body: &B) -> PipelineResult<BuildOutcome> {
    match ctx.api.post_operation(op, body).await {
        Ok(resp) => Ok(BuildOutcome::Built(resp)),
        Err(CoreError::Api { status, message }) => {
            warn!("{} rejected by API ({}): {}", op.path(), status, message);
            Ok(BuildOutcome::Rejected { status, message })
        }
        Err(e) => Err(e),
    }
}

/// Sign the single transaction in `materialized` with `signers` and submit
/// it through RPC.
pub async fn sign_and_submit(
    ctx: &ClientContext,
    materialized: Materialized,
    signers: &SignerSet,
) -> PipelineResult<OperationOutcome> {
    let mint = materialized.mint.clone();
    let mut tx = materialized.into_single()?;
    signers.sign(&mut tx, MissingRolePolicy::Reject)?;

    let submission = submit_and_confirm(ctx.rpc.as_ref(), &tx.transaction, &ctx.settings.submit_options()).await?;
    info!(
        "Submitted {}{}",
        submission.signature,
        if submission.confirmed { " (confirmed)" } else { "" }
    );
    Ok(OperationOutcome::Submitted { signature: submission.signature, confirmed: submission.confirmed, mint })
}

/// Full single-transaction workflow with the context's own signer set.
pub async fn run_single<B: Serialize + ?Sized>(
    ctx: &ClientContext,
    op: Operation,
    body: &B,
    default_roles: &[&str],
) -> PipelineResult<OperationOutcome> {
    let response = match build(ctx, op, body).await? {
        BuildOutcome::Built(resp) => resp,
        BuildOutcome::Rejected { status, message } => return Ok(OperationOutcome::Rejected { status, message }),
    };
    let materialized = materialize(response, default_roles)?;
    sign_and_submit(ctx, materialized, &ctx.signers).await
}
