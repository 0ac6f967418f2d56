// Buy / sell through the trade endpoint, and the multi-account sell.

use crate::context::ClientContext;
use crate::error::CoreError;
use crate::materializer::{materialize, MaterializedTx};
use crate::models::{Amount, Operation, OperationOutcome, TradeAction, TradeRequest};
use crate::pipeline::{build, run_single, BuildOutcome};
use crate::relay::MAX_BUNDLE_TRANSACTIONS;
use crate::submitter::submit_and_confirm;
use crate::transaction_signer::{MissingRolePolicy, SignerSet, ROLE_WALLET};
use log::{info, warn};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use std::str::FromStr;
use std::sync::Arc;

pub type TradeServiceResult<T> = Result<T, CoreError>;

#[derive(Debug, Clone)]
pub struct BuyParams {
    pub mint: String,
    pub sol_amount: f64,
    pub slippage: Option<f64>,
    pub priority_fee: Option<f64>,
    pub pool: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SellParams {
    pub mint: String,
    /// Token count, SOL value, or `"N%"` of the holding.
    pub amount: Amount,
    pub denominated_in_sol: bool,
    pub slippage: Option<f64>,
    pub priority_fee: Option<f64>,
    pub pool: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BundleSellParams {
    pub mint: String,
    pub amount: Amount,
    /// Wallets to sell from, each signing its own transaction.
    pub accounts: Vec<Arc<Keypair>>,
    pub slippage: Option<f64>,
    pub priority_fee: Option<f64>,
    pub pool: Option<String>,
    /// Group the sells into relay bundles instead of sending one by one.
    pub use_relay: bool,
}

/// Counts for one bundle-sell run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleSellReport {
    pub requested: usize,
    pub built: usize,
    pub rejected: usize,
    pub build_failed: usize,
    pub attempted: usize,
    pub sent: usize,
    pub failed: usize,
    pub signatures: Vec<String>,
    pub bundle_ids: Vec<String>,
}

pub struct TradeService;

impl TradeService {
    pub async fn execute_buy(ctx: &ClientContext, params: BuyParams) -> TradeServiceResult<OperationOutcome> {
        validate_mint(&params.mint)?;
        if params.sol_amount <= 0.0 {
            return Err(CoreError::Validation("buy amount must be > 0".to_string()));
        }
        let request = TradeRequest {
            public_key: ctx.primary_pubkey()?,
            action: TradeAction::Buy,
            mint: params.mint.clone(),
            amount: Amount::Value(params.sol_amount),
            denominated_in_sol: true,
            slippage: params.slippage.unwrap_or(ctx.settings.default_slippage),
            priority_fee: params.priority_fee.unwrap_or(ctx.settings.default_priority_fee),
            pool: ctx.pool(params.pool.as_deref()),
        };
        info!("Buying {} SOL of {}", params.sol_amount, params.mint);
        run_single(ctx, Operation::Trade, &request, &[ROLE_WALLET]).await
    }

    pub async fn execute_sell(ctx: &ClientContext, params: SellParams) -> TradeServiceResult<OperationOutcome> {
        validate_mint(&params.mint)?;
        let request = sell_request(
            ctx,
            &ctx.primary_pubkey()?,
            &params.mint,
            &params.amount,
            params.denominated_in_sol,
            params.slippage,
            params.priority_fee,
            params.pool.as_deref(),
        );
        info!("Selling {:?} of {}", params.amount, params.mint);
        run_single(ctx, Operation::Trade, &request, &[ROLE_WALLET]).await
    }

    /// Sell `params.mint` from every account.
    ///
    /// Builds run one after another; accounts the API refuses are counted
    /// and skipped. Only the built transactions are signed and submitted,
    /// and a failed submission does not stop the rest.
    pub async fn execute_bundle_sell(
        ctx: &ClientContext,
        params: BundleSellParams,
    ) -> TradeServiceResult<BundleSellReport> {
        validate_mint(&params.mint)?;
        let mut report = BundleSellReport { requested: params.accounts.len(), ..Default::default() };
        let mut built: Vec<(Arc<Keypair>, MaterializedTx)> = Vec::new();

        for account in &params.accounts {
            let owner = account.pubkey().to_string();
            let request = sell_request(
                ctx,
                &owner,
                &params.mint,
                &params.amount,
                false,
                params.slippage,
                params.priority_fee,
                params.pool.as_deref(),
            );

            let response = match build(ctx, Operation::Trade, &request).await {
                Ok(BuildOutcome::Built(resp)) => resp,
                Ok(BuildOutcome::Rejected { .. }) => {
                    report.rejected += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Sell build for {} failed: {}", owner, e);
                    report.build_failed += 1;
                    continue;
                }
            };
            match materialize(response, &[ROLE_WALLET]).and_then(|m| m.into_single()) {
                Ok(tx) => built.push((account.clone(), tx)),
                Err(e) => {
                    warn!("Sell transaction for {} unreadable: {}", owner, e);
                    report.build_failed += 1;
                }
            }
        }
        report.built = built.len();
        info!(
            "Bundle sell {}: {}/{} built, {} rejected",
            params.mint, report.built, report.requested, report.rejected
        );

        if params.use_relay {
            Self::submit_via_relay(ctx, built, &mut report).await;
        } else {
            Self::submit_one_by_one(ctx, built, &mut report).await;
        }

        info!(
            "Bundle sell {} done: attempted={} sent={} failed={}",
            params.mint, report.attempted, report.sent, report.failed
        );
        Ok(report)
    }

    async fn submit_one_by_one(
        ctx: &ClientContext,
        built: Vec<(Arc<Keypair>, MaterializedTx)>,
        report: &mut BundleSellReport,
    ) {
        let options = ctx.settings.submit_options();
        for (account, mut tx) in built {
            report.attempted += 1;
            let signers = own_signer(account.clone());
            if let Err(e) = signers.sign(&mut tx, MissingRolePolicy::Reject) {
                warn!("Signing sell for {} failed: {}", account.pubkey(), e);
                report.failed += 1;
                continue;
            }
            match submit_and_confirm(ctx.rpc.as_ref(), &tx.transaction, &options).await {
                Ok(sub) => {
                    report.sent += 1;
                    report.signatures.push(sub.signature);
                }
                Err(e) => {
                    warn!("Sending sell for {} failed: {}", account.pubkey(), e);
                    report.failed += 1;
                }
            }
        }
    }

    async fn submit_via_relay(
        ctx: &ClientContext,
        built: Vec<(Arc<Keypair>, MaterializedTx)>,
        report: &mut BundleSellReport,
    ) {
        let mut signed = Vec::with_capacity(built.len());
        for (account, mut tx) in built {
            match own_signer(account.clone()).sign(&mut tx, MissingRolePolicy::Reject) {
                Ok(_) => signed.push(tx.transaction),
                Err(e) => {
                    warn!("Signing sell for {} failed: {}", account.pubkey(), e);
                    report.attempted += 1;
                    report.failed += 1;
                }
            }
        }

        for chunk in signed.chunks(MAX_BUNDLE_TRANSACTIONS) {
            report.attempted += chunk.len();
            match ctx.relay.send_bundle(chunk).await {
                Ok(bundle_id) => {
                    report.sent += chunk.len();
                    report.signatures.extend(chunk.iter().map(|tx| tx.signatures[0].to_string()));
                    report.bundle_ids.push(bundle_id);
                }
                Err(e) => {
                    warn!("Bundle of {} sell(s) failed: {}", chunk.len(), e);
                    report.failed += chunk.len();
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn sell_request(
    ctx: &ClientContext,
    owner: &str,
    mint: &str,
    amount: &Amount,
    denominated_in_sol: bool,
    slippage: Option<f64>,
    priority_fee: Option<f64>,
    pool: Option<&str>,
) -> TradeRequest {
    TradeRequest {
        public_key: owner.to_string(),
        action: TradeAction::Sell,
        mint: mint.to_string(),
        amount: amount.clone(),
        // A percentage is always of the token holding.
        denominated_in_sol: denominated_in_sol && !amount.is_percent(),
        slippage: slippage.unwrap_or(ctx.settings.default_slippage),
        priority_fee: priority_fee.unwrap_or(ctx.settings.default_priority_fee),
        pool: ctx.pool(pool),
    }
}

fn own_signer(account: Arc<Keypair>) -> SignerSet {
    let mut set = SignerSet::new();
    set.insert(ROLE_WALLET, account);
    set
}

pub(crate) fn validate_mint(mint: &str) -> Result<(), CoreError> {
    Pubkey::from_str(mint)
        .map(|_| ())
        .map_err(|e| CoreError::Validation(format!("invalid mint {}: {}", mint, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_context, unsigned_tx, MockRpc};
    use axum::body::Bytes;
    use axum::http::{header, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Trade endpoint that builds a transaction for the requesting wallet
    /// unless that wallet is in `refuse`.
    fn trade_router(refuse: HashSet<String>, seen: Arc<Mutex<Vec<Value>>>) -> Router {
        Router::new().route(
            "/trade-local",
            post(move |Json(body): Json<Value>| {
                let refuse = refuse.clone();
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(body.clone());
                    let owner = body["publicKey"].as_str().unwrap_or_default().to_string();
                    if refuse.contains(&owner) {
                        return (StatusCode::BAD_REQUEST, Json(json!({"error": "no balance"}))).into_response();
                    }
                    let payer = Pubkey::from_str(&owner).unwrap();
                    let bytes = bincode::serialize(&unsigned_tx(&[payer])).unwrap();
                    binary(bytes)
                }
            }),
        )
    }

    fn binary(bytes: Vec<u8>) -> Response {
        ([(header::CONTENT_TYPE, "application/octet-stream")], Bytes::from(bytes)).into_response()
    }

    #[tokio::test]
    async fn buy_builds_signs_and_sends() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let rpc = MockRpc::new();
        let (ctx, primary) = test_context(trade_router(HashSet::new(), seen.clone()), rpc.clone()).await;

        let mint = Pubkey::new_unique().to_string();
        let outcome = TradeService::execute_buy(
            &ctx,
            BuyParams { mint: mint.clone(), sol_amount: 0.1, slippage: None, priority_fee: Some(0.001), pool: None },
        )
        .await
        .unwrap();

        assert!(outcome.is_submitted());
        assert_eq!(rpc.send_count(), 1);
        assert!(crate::transaction_signer::is_fully_signed(&rpc.sent()[0]));

        let body = seen.lock().unwrap()[0].clone();
        assert_eq!(body["publicKey"], primary.pubkey().to_string());
        assert_eq!(body["action"], "buy");
        assert_eq!(body["mint"], mint);
        assert_eq!(body["denominatedInSol"], true);
        assert_eq!(body["priorityFee"], 0.001);
        assert_eq!(body["pool"], "pump");
    }

    #[tokio::test]
    async fn rejected_build_returns_without_submitting() {
        let rpc = MockRpc::new();
        let router = Router::new().route(
            "/trade-local",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "bonding curve complete"}))) }),
        );
        let (ctx, _) = test_context(router, rpc.clone()).await;

        let outcome = TradeService::execute_sell(
            &ctx,
            SellParams {
                mint: Pubkey::new_unique().to_string(),
                amount: Amount::percent(100.0),
                denominated_in_sol: true,
                slippage: None,
                priority_fee: None,
                pool: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            OperationOutcome::Rejected { status: 500, message: "bonding curve complete".to_string() }
        );
        assert_eq!(rpc.send_count(), 0);
    }

    #[tokio::test]
    async fn percent_sell_is_never_denominated_in_sol() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (ctx, _) = test_context(trade_router(HashSet::new(), seen.clone()), MockRpc::new()).await;
        TradeService::execute_sell(
            &ctx,
            SellParams {
                mint: Pubkey::new_unique().to_string(),
                amount: Amount::percent(50.0),
                denominated_in_sol: true,
                slippage: Some(5.0),
                priority_fee: None,
                pool: Some("auto".to_string()),
            },
        )
        .await
        .unwrap();
        let body = seen.lock().unwrap()[0].clone();
        assert_eq!(body["amount"], "50%");
        assert_eq!(body["denominatedInSol"], false);
        assert_eq!(body["pool"], "auto");
    }

    #[tokio::test]
    async fn bundle_sell_only_sends_successful_builds() {
        let accounts: Vec<Arc<Keypair>> = (0..5).map(|_| Arc::new(Keypair::new())).collect();
        let refuse: HashSet<String> =
            [accounts[1].pubkey().to_string(), accounts[3].pubkey().to_string()].into_iter().collect();
        let rpc = MockRpc::new();
        rpc.fail_for(accounts[4].pubkey());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (ctx, _) = test_context(trade_router(refuse, seen.clone()), rpc.clone()).await;

        let report = TradeService::execute_bundle_sell(
            &ctx,
            BundleSellParams {
                mint: Pubkey::new_unique().to_string(),
                amount: Amount::percent(100.0),
                accounts: accounts.clone(),
                slippage: None,
                priority_fee: None,
                pool: None,
                use_relay: false,
            },
        )
        .await
        .unwrap();

        assert_eq!(seen.lock().unwrap().len(), 5);
        assert_eq!(report.requested, 5);
        assert_eq!(report.rejected, 2);
        assert_eq!(report.built, 3);
        assert_eq!(report.attempted, 3);
        assert_eq!(rpc.send_count(), 3);
        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 1);

        let senders: Vec<Pubkey> = rpc.sent().iter().map(|tx| tx.message.static_account_keys()[0]).collect();
        assert_eq!(senders, vec![accounts[0].pubkey(), accounts[2].pubkey(), accounts[4].pubkey()]);
    }

    #[tokio::test]
    async fn relay_bundle_sell_chunks_and_counts_failed_bundles() {
        let accounts: Vec<Arc<Keypair>> = (0..8).map(|_| Arc::new(Keypair::new())).collect();
        // The last account gets a transaction paid by someone else, so it cannot sign.
        let foreign = accounts[7].pubkey().to_string();
        let bundle_sizes: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
        let sizes = bundle_sizes.clone();

        let router = Router::new()
            .route(
                "/trade-local",
                post(move |Json(body): Json<Value>| {
                    let foreign = foreign.clone();
                    async move {
                        let owner = body["publicKey"].as_str().unwrap_or_default().to_string();
                        let payer = if owner == foreign { Pubkey::new_unique() } else { Pubkey::from_str(&owner).unwrap() };
                        binary(bincode::serialize(&unsigned_tx(&[payer])).unwrap())
                    }
                }),
            )
            .route(
                "/relay",
                post(move |Json(body): Json<Value>| {
                    let sizes = sizes.clone();
                    async move {
                        let count = body["params"][0].as_array().map(Vec::len).unwrap_or_default();
                        sizes.lock().unwrap().push(count);
                        if count < MAX_BUNDLE_TRANSACTIONS {
                            return (StatusCode::BAD_REQUEST, Json(json!({"error": {"message": "bundle dropped"}})))
                                .into_response();
                        }
                        Json(json!({"jsonrpc": "2.0", "id": 1, "result": "bundle-1"})).into_response()
                    }
                }),
            );
        let rpc = MockRpc::new();
        let (ctx, _) = test_context(router, rpc.clone()).await;

        let report = TradeService::execute_bundle_sell(
            &ctx,
            BundleSellParams {
                mint: Pubkey::new_unique().to_string(),
                amount: Amount::percent(100.0),
                accounts,
                slippage: None,
                priority_fee: None,
                pool: None,
                use_relay: true,
            },
        )
        .await
        .unwrap();

        assert_eq!(*bundle_sizes.lock().unwrap(), vec![5, 2]);
        assert_eq!(report.built, 8);
        assert_eq!(report.attempted, report.built);
        assert_eq!(report.bundle_ids, vec!["bundle-1".to_string()]);
        assert_eq!(report.sent, 5);
        assert_eq!(report.signatures.len(), 5);
        assert_eq!(report.failed, 3);
        assert_eq!(rpc.send_count(), 0);
    }

    #[tokio::test]
    async fn invalid_mint_is_rejected_locally() {
        let (ctx, _) = test_context(Router::new(), MockRpc::new()).await;
        let err = TradeService::execute_buy(
            &ctx,
            BuyParams { mint: "nope".to_string(), sol_amount: 1.0, slippage: None, priority_fee: None, pool: None },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
