// Token creation, alone or bundled with buyer purchases.

use crate::api::TokenMetadataForm;
use crate::context::ClientContext;
use crate::error::CoreError;
use crate::materializer::materialize;
use crate::models::{BundleBuyer, BundleCreateRequest, CreateTokenRequest, Operation, OperationOutcome, TokenMetadata};
use crate::pipeline::{build, sign_and_submit, BuildOutcome};
use crate::transaction_signer::{MissingRolePolicy, ROLE_CREATOR, ROLE_MINT};
use log::info;
use solana_sdk::signature::{Keypair, Signer};
use std::path::Path;
use std::sync::Arc;

pub type CreateServiceResult<T> = Result<T, CoreError>;

#[derive(Debug)]
pub struct CreateParams {
    pub metadata: TokenMetadata,
    pub dev_buy_sol: f64,
    pub slippage: Option<f64>,
    pub priority_fee: Option<f64>,
    pub pool: Option<String>,
    /// Use this mint keypair instead of generating one (vanity mints).
    pub mint_keypair: Option<Keypair>,
}

#[derive(Debug, Clone)]
pub struct BundleCreateParams {
    pub metadata: TokenMetadata,
    pub dev_buy_sol: f64,
    /// Buy size per buyer wallet, matched to `buyer1..` in order.
    pub buyer_amounts: Vec<f64>,
    pub slippage: Option<f64>,
    pub priority_fee: Option<f64>,
    pub jito_tip: Option<f64>,
    pub pool: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BundleCreateOutcome {
    Submitted {
        bundle_id: String,
        mint: Option<String>,
        transactions: usize,
    },
    Rejected { status: u16, message: String },
}

pub struct CreateService;

impl CreateService {
    /// Create a token with an optional dev buy. The mint keypair is made
    /// locally; the transaction is signed by `creator` and `mint`.
    pub async fn execute_create(ctx: &ClientContext, params: CreateParams) -> CreateServiceResult<OperationOutcome> {
        validate_metadata(&params.metadata)?;
        let mint_keypair = Arc::new(params.mint_keypair.unwrap_or_else(Keypair::new));
        let mint = mint_keypair.pubkey().to_string();

        let request = CreateTokenRequest {
            public_key: ctx.primary_pubkey()?,
            token_metadata: params.metadata.clone(),
            mint: mint.clone(),
            amount: params.dev_buy_sol,
            denominated_in_sol: true,
            slippage: params.slippage.unwrap_or(ctx.settings.default_slippage),
            priority_fee: params.priority_fee.unwrap_or(ctx.settings.default_priority_fee),
            pool: ctx.pool(params.pool.as_deref()),
        };
        info!("Creating token {} ({}) mint={}", params.metadata.name, params.metadata.symbol, mint);

        let response = match build(ctx, Operation::Create, &request).await? {
            BuildOutcome::Built(resp) => resp,
            BuildOutcome::Rejected { status, message } => return Ok(OperationOutcome::Rejected { status, message }),
        };
        let mut materialized = materialize(response, &[ROLE_CREATOR, ROLE_MINT])?;
        let mint_signer = match materialized.mint_keypair.take() {
            Some(server_mint) => Arc::new(server_mint),
            None => mint_keypair,
        };
        if materialized.mint.is_none() {
            materialized.mint = Some(mint_signer.pubkey().to_string());
        }

        let signers = ctx.signers.with_role(ROLE_MINT, mint_signer);
        sign_and_submit(ctx, materialized, &signers).await
    }

    /// Create plus buyer purchases as one atomic relay bundle.
    pub async fn execute_bundle_create(
        ctx: &ClientContext,
        params: BundleCreateParams,
    ) -> CreateServiceResult<BundleCreateOutcome> {
        validate_metadata(&params.metadata)?;
        let buyers = ctx.signers.buyers();
        if params.buyer_amounts.len() > buyers.len() {
            return Err(CoreError::Validation(format!(
                "{} buyer amounts given but only {} buyer wallet(s) configured",
                params.buyer_amounts.len(),
                buyers.len()
            )));
        }
        if params.buyer_amounts.iter().any(|a| *a <= 0.0) {
            return Err(CoreError::Validation("buyer amounts must be > 0".to_string()));
        }

        let request = BundleCreateRequest {
            public_key: ctx.primary_pubkey()?,
            token_metadata: params.metadata.clone(),
            amount: params.dev_buy_sol,
            slippage: params.slippage.unwrap_or(ctx.settings.default_slippage),
            priority_fee: params.priority_fee.unwrap_or(ctx.settings.default_priority_fee),
            jito_tip: params.jito_tip.unwrap_or(ctx.settings.default_jito_tip),
            buyers: buyers
                .iter()
                .zip(&params.buyer_amounts)
                .map(|(kp, amount)| BundleBuyer { public_key: kp.pubkey().to_string(), amount: *amount })
                .collect(),
            pool: ctx.pool(params.pool.as_deref()),
        };

        let response = match build(ctx, Operation::Bundle, &request).await? {
            BuildOutcome::Built(resp) => resp,
            BuildOutcome::Rejected { status, message } => return Ok(BundleCreateOutcome::Rejected { status, message }),
        };
        let mut materialized = materialize(response, &[ROLE_CREATOR])?;

        let signers = match materialized.mint_keypair.take() {
            Some(mint_kp) => ctx.signers.with_role(ROLE_MINT, Arc::new(mint_kp)),
            None => ctx.signers.clone(),
        };

        let mut signed = Vec::with_capacity(materialized.transactions.len());
        for mut tx in materialized.transactions {
            signers.sign(&mut tx, MissingRolePolicy::Reject)?;
            info!(
                "Signed bundle tx {} with roles {:?}",
                tx.description.as_deref().unwrap_or("-"),
                tx.roles
            );
            signed.push(tx.transaction);
        }

        let bundle_id = ctx.relay.send_bundle(&signed).await?;
        Ok(BundleCreateOutcome::Submitted { bundle_id, mint: materialized.mint, transactions: signed.len() })
    }

    /// Upload metadata plus image and return the URI for a create request.
    pub async fn upload_metadata(
        ctx: &ClientContext,
        form: &TokenMetadataForm,
        image_path: &Path,
    ) -> CreateServiceResult<String> {
        let image = tokio::fs::read(image_path).await?;
        let file_name = image_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image.png")
            .to_string();
        ctx.api.upload_metadata(&ctx.settings.ipfs_url, form, image, &file_name).await
    }
}

fn validate_metadata(metadata: &TokenMetadata) -> Result<(), CoreError> {
    if metadata.name.trim().is_empty() || metadata.symbol.trim().is_empty() {
        return Err(CoreError::Validation("token name and symbol are required".to_string()));
    }
    if metadata.uri.trim().is_empty() {
        return Err(CoreError::Validation("metadata uri is required".to_string()));
    }
    Ok(())
}
