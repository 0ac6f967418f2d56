// Creator fee claims: one-off, per-mint batches, and on a timer.

use crate::context::ClientContext;
use crate::error::CoreError;
use crate::models::{BatchReport, ClaimFeesRequest, Operation, OperationOutcome};
use crate::pipeline::run_single;
use crate::scheduler::{OverlapPolicy, ScheduledTask};
use crate::trade_service::validate_mint;
use crate::transaction_signer::ROLE_WALLET;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

pub type ClaimServiceResult<T> = Result<T, CoreError>;

#[derive(Debug, Clone, Default)]
pub struct ClaimParams {
    /// Claim for one mint only; `None` claims everything the pool allows.
    pub mint: Option<String>,
    pub pool: Option<String>,
    pub priority_fee: Option<f64>,
}

pub struct ClaimService;

impl ClaimService {
    pub async fn execute_claim(ctx: &ClientContext, params: ClaimParams) -> ClaimServiceResult<OperationOutcome> {
        if let Some(mint) = &params.mint {
            validate_mint(mint)?;
        }
        let request = ClaimFeesRequest {
            public_key: ctx.primary_pubkey()?,
            mint: params.mint.clone(),
            pool: ctx.pool(params.pool.as_deref()),
            priority_fee: params.priority_fee.unwrap_or(ctx.settings.default_priority_fee),
        };
        info!("Claiming creator fees for {}", params.mint.as_deref().unwrap_or("all tokens"));
        run_single(ctx, Operation::ClaimFees, &request, &[ROLE_WALLET]).await
    }

    /// Claim each mint in turn. Failures are counted, never propagated.
    /// An empty list makes one claim without a mint.
    pub async fn claim_many(ctx: &ClientContext, mints: &[String], pool: Option<&str>) -> BatchReport {
        let targets: Vec<Option<String>> =
            if mints.is_empty() { vec![None] } else { mints.iter().cloned().map(Some).collect() };
        let mut report = BatchReport { requested: targets.len(), ..Default::default() };

        for mint in targets {
            let label = mint.clone().unwrap_or_else(|| "all".to_string());
            let params = ClaimParams { mint, pool: pool.map(str::to_string), priority_fee: None };
            match Self::execute_claim(ctx, params).await {
                Ok(OperationOutcome::Submitted { signature, .. }) => {
                    report.succeeded += 1;
                    report.signatures.push(signature);
                }
                Ok(OperationOutcome::Rejected { status, message }) => {
                    warn!("Claim for {} rejected ({}): {}", label, status, message);
                    report.rejected += 1;
                }
                Err(e) => {
                    error!("Claim for {} failed: {}", label, e);
                    report.failed += 1;
                }
            }
        }
        info!(
            "Claimed {}/{} (rejected {}, failed {})",
            report.succeeded, report.requested, report.rejected, report.failed
        );
        report
    }

    /// Run `claim_many` now and then every `interval` until the returned
    /// task is cancelled or dropped. A zero interval is rejected.
    pub fn schedule(
        ctx: Arc<ClientContext>,
        mints: Vec<String>,
        pool: Option<String>,
        interval: Duration,
        policy: OverlapPolicy,
    ) -> ClaimServiceResult<ScheduledTask> {
        let mints = Arc::new(mints);
        let pool = Arc::new(pool);
        ScheduledTask::start(interval, policy, move || {
            let ctx = ctx.clone();
            let mints = mints.clone();
            let pool = pool.clone();
            async move {
                ClaimService::claim_many(&ctx, &mints, pool.as_deref()).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_context, unsigned_tx, MockRpc};
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::Value;
    use solana_sdk::pubkey::Pubkey;
    use solana_sdk::signature::Signer;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn tx_bytes(body: &Value) -> Vec<u8> {
        let wallet = Pubkey::from_str(body["publicKey"].as_str().unwrap()).unwrap();
        bincode::serialize(&unsigned_tx(&[wallet])).unwrap()
    }

    #[tokio::test]
    async fn claim_without_mint_omits_it_from_the_request() {
        let bodies: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
        let log = bodies.clone();
        let router = Router::new().route(
            "/claim-fees",
            post(move |Json(body): Json<Value>| {
                let log = log.clone();
                async move {
                    let bytes = tx_bytes(&body);
                    log.lock().unwrap().push(body);
                    bytes
                }
            }),
        );
        let rpc = MockRpc::new();
        let (ctx, primary) = test_context(router, rpc.clone()).await;

        let outcome = ClaimService::execute_claim(&ctx, ClaimParams::default()).await.unwrap();
        assert!(outcome.is_submitted());
        assert_eq!(rpc.send_count(), 1);

        let body = &bodies.lock().unwrap()[0];
        assert!(body.get("mint").is_none());
        assert_eq!(body["pool"], "pump");
        assert_eq!(body["publicKey"], primary.pubkey().to_string());
    }

    #[tokio::test]
    async fn claim_many_counts_each_outcome() {
        let rejected = Pubkey::new_unique().to_string();
        let broken = Pubkey::new_unique().to_string();
        let ok = Pubkey::new_unique().to_string();
        let (r, b) = (rejected.clone(), broken.clone());

        let router = Router::new().route(
            "/claim-fees",
            post(move |Json(body): Json<Value>| {
                let (r, b) = (r.clone(), b.clone());
                async move {
                    let mint = body["mint"].as_str().unwrap_or_default().to_string();
                    let resp: Response = if mint == r {
                        (StatusCode::BAD_REQUEST, "no fees to claim").into_response()
                    } else if mint == b {
                        vec![1u8, 2, 3].into_response()
                    } else {
                        tx_bytes(&body).into_response()
                    };
                    resp
                }
            }),
        );
        let rpc = MockRpc::new();
        let (ctx, _) = test_context(router, rpc.clone()).await;

        let report = ClaimService::claim_many(&ctx, &[rejected, broken, ok], None).await;
        assert_eq!(report.requested, 3);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.signatures.len(), 1);
        assert_eq!(rpc.send_count(), 1);
    }

    #[tokio::test]
    async fn scheduled_claims_repeat_until_stopped() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/claim-fees",
            post(move |Json(body): Json<Value>| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tx_bytes(&body)
                }
            }),
        );
        let (ctx, _) = test_context(router, MockRpc::new()).await;

        let task = ClaimService::schedule(Arc::new(ctx), vec![], None, Duration::from_millis(100), OverlapPolicy::Skip)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        task.stop().await;

        let seen = hits.load(Ordering::SeqCst);
        assert!(seen >= 2, "expected repeated claims, got {}", seen);
    }

    #[tokio::test]
    async fn zero_interval_schedule_is_refused() {
        let (ctx, _) = test_context(Router::new(), MockRpc::new()).await;
        let result = ClaimService::schedule(Arc::new(ctx), vec![], None, Duration::ZERO, OverlapPolicy::Queue);
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }
}
