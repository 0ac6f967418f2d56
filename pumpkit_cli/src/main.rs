mod commands;
mod printer;

use clap::Parser;
use colored::Colorize;
use commands::{Cli, Commands, MetadataOpts, TradeOpts};
use log::{error, info, warn};
use pumpkit_core::api::TokenMetadataForm;
use pumpkit_core::claim_service::{ClaimParams, ClaimService};
use pumpkit_core::create_service::{BundleCreateOutcome, BundleCreateParams, CreateParams, CreateService};
use pumpkit_core::filters::SnipeFilter;
use pumpkit_core::models::{Amount, OperationOutcome, TokenMetadata};
use pumpkit_core::settings::{keypair_from_bytes, Settings};
use pumpkit_core::trade_service::{BundleSellParams, BuyParams, SellParams, TradeService};
use pumpkit_core::transfer_service::{parse_batch, TransferParams, TransferService};
use pumpkit_core::ws::{ListenerHandle, NewTokenEvent, PortalListener, SubscriptionSet, Topic};
use pumpkit_core::{ClientContext, CoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Err(error) = handle_command(cli).await {
        eprintln!("{} {}", "ERROR:".red(), error);
        std::process::exit(1);
    }
}

fn load_settings(cli: &Cli) -> Result<Settings, CoreError> {
    let path = cli
        .config
        .to_str()
        .ok_or_else(|| CoreError::Config(format!("config path is not valid UTF-8: {}", cli.config.display())))?;
    let mut settings = Settings::load(Some(path))?;
    if cli.confirm {
        settings.confirm = true;
    }
    Ok(settings)
}

async fn handle_command(cli: Cli) -> Result<(), CoreError> {
    let settings = load_settings(&cli)?;

    // The listener needs no wallet.
    if let Commands::Listen { new_tokens, migrations, tokens, accounts } = &cli.command {
        let mut subs = SubscriptionSet::new();
        if *new_tokens || (!*migrations && tokens.is_empty() && accounts.is_empty()) {
            subs.add(&Topic::NewTokens);
        }
        if *migrations {
            subs.add(&Topic::Migrations);
        }
        if !tokens.is_empty() {
            subs.add(&Topic::TokenTrades(tokens.clone()));
        }
        if !accounts.is_empty() {
            subs.add(&Topic::AccountTrades(accounts.clone()));
        }
        settings.validate()?;
        return listen(&settings, subs).await;
    }

    let ctx = ClientContext::from_settings(settings)?;
    match cli.command {
        Commands::Buy { mint, sol, opts } => {
            let params = BuyParams {
                mint,
                sol_amount: sol,
                slippage: opts.slippage,
                priority_fee: opts.priority_fee,
                pool: opts.pool,
            };
            finish("buy", TradeService::execute_buy(&ctx, params).await?)
        }

        Commands::Sell { mint, amount, in_sol, opts } => {
            let params = SellParams {
                mint,
                amount: parse_amount(&amount)?,
                denominated_in_sol: in_sol,
                slippage: opts.slippage,
                priority_fee: opts.priority_fee,
                pool: opts.pool,
            };
            finish("sell", TradeService::execute_sell(&ctx, params).await?)
        }

        Commands::Create { metadata, dev_buy, mint_keypair, opts } => {
            let metadata = resolve_metadata(&ctx, &metadata).await?;
            let mint_keypair = match mint_keypair {
                Some(encoded) => {
                    let bytes = pumpkit_core::settings::parse_private_key_string(&encoded)
                        .map_err(CoreError::InvalidKeypair)?;
                    Some(keypair_from_bytes(&bytes)?)
                }
                None => None,
            };
            let params = CreateParams {
                metadata,
                dev_buy_sol: dev_buy,
                slippage: opts.slippage,
                priority_fee: opts.priority_fee,
                pool: opts.pool,
                mint_keypair,
            };
            finish("create", CreateService::execute_create(&ctx, params).await?)
        }

        Commands::BundleCreate { metadata, dev_buy, buyer_amounts, jito_tip, opts } => {
            let metadata = resolve_metadata(&ctx, &metadata).await?;
            let params = BundleCreateParams {
                metadata,
                dev_buy_sol: dev_buy,
                buyer_amounts,
                slippage: opts.slippage,
                priority_fee: opts.priority_fee,
                jito_tip,
                pool: opts.pool,
            };
            match CreateService::execute_bundle_create(&ctx, params).await? {
                BundleCreateOutcome::Submitted { bundle_id, mint, transactions } => {
                    println!("{} {} tx(s), bundle {}", "bundle-create".bold(), transactions, bundle_id.green());
                    if let Some(mint) = mint {
                        println!("  mint: {}", mint);
                    }
                    Ok(())
                }
                BundleCreateOutcome::Rejected { status, message } => Err(CoreError::Api { status, message }),
            }
        }

        Commands::BundleSell { mint, amount, include_primary, relay, opts } => {
            let mut accounts = ctx.signers.buyers();
            if include_primary {
                accounts.insert(0, ctx.primary()?);
            }
            if accounts.is_empty() {
                return Err(CoreError::Validation(
                    "no wallets to sell from: configure buyer_private_keys or pass --include-primary".to_string(),
                ));
            }
            let params = BundleSellParams {
                mint,
                amount: parse_amount(&amount)?,
                accounts,
                slippage: opts.slippage,
                priority_fee: opts.priority_fee,
                pool: opts.pool,
                use_relay: relay,
            };
            let report = TradeService::execute_bundle_sell(&ctx, params).await?;
            println!(
                "{} built {}/{} (rejected {}), sent {}/{}, failed {}",
                "bundle-sell".bold(),
                report.built,
                report.requested,
                report.rejected,
                report.sent,
                report.attempted,
                report.failed
            );
            for sig in report.signatures.iter().chain(&report.bundle_ids) {
                println!("  {}", sig);
            }
            Ok(())
        }

        Commands::Claim { mints, pool, every } => match every {
            None if mints.len() <= 1 => {
                let params = ClaimParams { mint: mints.into_iter().next(), pool, priority_fee: None };
                finish("claim", ClaimService::execute_claim(&ctx, params).await?)
            }
            None => {
                let report = ClaimService::claim_many(&ctx, &mints, pool.as_deref()).await;
                printer::print_batch("claim", &report);
                Ok(())
            }
            Some(secs) => {
                let interval = if secs > 0 { Duration::from_secs(secs) } else { ctx.settings.claim_interval() };
                let policy = ctx.settings.overlap_policy()?;
                info!("Claiming every {:?}, Ctrl-C to stop", interval);
                let task = ClaimService::schedule(Arc::new(ctx), mints, pool, interval, policy)?;
                tokio::signal::ctrl_c().await?;
                info!("Stopping after {} run(s), {} skipped", task.runs(), task.skipped());
                task.stop().await;
                Ok(())
            }
        },

        Commands::Transfer { to, sol, priority_fee } => {
            let params = TransferParams { to, sol_amount: sol, priority_fee };
            finish("transfer", TransferService::execute_transfer(&ctx, params).await?)
        }

        Commands::BatchTransfer { file, delay_ms } => {
            let raw = tokio::fs::read_to_string(&file).await?;
            let entries = parse_batch(&raw)?;
            let delay = delay_ms.map(Duration::from_millis).unwrap_or_else(|| ctx.settings.transfer_delay());
            let report = TransferService::execute_batch(&ctx, &entries, delay).await;
            printer::print_batch("batch-transfer", &report);
            if report.succeeded == 0 {
                return Err(CoreError::Transaction("no transfer succeeded".to_string()));
            }
            Ok(())
        }

        Commands::Snipe { sol, min_market_cap, max_market_cap, min_dev_buy, name_contains, max_buys, opts } => {
            if sol <= 0.0 {
                return Err(CoreError::Validation("--sol must be > 0".to_string()));
            }
            let filter = SnipeFilter {
                min_market_cap_sol: min_market_cap,
                max_market_cap_sol: max_market_cap,
                min_initial_sol: min_dev_buy,
                name_contains,
            };
            snipe(Arc::new(ctx), filter, sol, opts, max_buys).await
        }

        Commands::Listen { .. } => Ok(()),
    }
}

fn finish(label: &str, outcome: OperationOutcome) -> Result<(), CoreError> {
    printer::print_outcome(label, &outcome);
    match outcome {
        OperationOutcome::Submitted { .. } => Ok(()),
        OperationOutcome::Rejected { status, message } => Err(CoreError::Api { status, message }),
    }
}

fn parse_amount(raw: &str) -> Result<Amount, CoreError> {
    Amount::parse(raw).ok_or_else(|| CoreError::Validation(format!("invalid amount '{}'", raw)))
}

async fn resolve_metadata(ctx: &ClientContext, opts: &MetadataOpts) -> Result<TokenMetadata, CoreError> {
    let uri = match (&opts.uri, &opts.image) {
        (Some(uri), _) => uri.clone(),
        (None, Some(image)) => {
            let form = TokenMetadataForm {
                name: opts.name.clone(),
                symbol: opts.symbol.clone(),
                description: opts.description.clone(),
                twitter: opts.twitter.clone(),
                telegram: opts.telegram.clone(),
                website: opts.website.clone(),
                show_name: true,
            };
            CreateService::upload_metadata(ctx, &form, image).await?
        }
        (None, None) => return Err(CoreError::Validation("either --uri or --image is required".to_string())),
    };
    Ok(TokenMetadata { name: opts.name.clone(), symbol: opts.symbol.clone(), uri })
}

fn shutdown_on_ctrl_c(handle: ListenerHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, closing listener");
            let _ = handle.shutdown();
        }
    });
}

async fn listen(settings: &Settings, subs: SubscriptionSet) -> Result<(), CoreError> {
    let (mut listener, handle) = PortalListener::new(settings.listener_config(), subs);
    shutdown_on_ctrl_c(handle);

    let mut console = printer::ConsolePrinter::default();
    let stats = listener.run(&mut console).await?;
    info!(
        "Listener done: {} frame(s), {} event(s), {} ignored, since {}",
        stats.frames,
        stats.events,
        stats.ignored,
        stats.started_at.to_rfc3339()
    );
    Ok(())
}

async fn snipe(
    ctx: Arc<ClientContext>,
    filter: SnipeFilter,
    sol: f64,
    opts: TradeOpts,
    max_buys: Option<usize>,
) -> Result<(), CoreError> {
    let subs = SubscriptionSet::new().with(Topic::NewTokens);
    let (mut listener, handle) = PortalListener::new(ctx.settings.listener_config(), subs);
    shutdown_on_ctrl_c(handle.clone());

    let (targets_tx, mut targets_rx) = mpsc::unbounded_channel::<NewTokenEvent>();
    let buyer_ctx = ctx.clone();
    let buyer = tokio::spawn(async move {
        let mut bought = 0usize;
        while let Some(token) = targets_rx.recv().await {
            let params = BuyParams {
                mint: token.mint.clone(),
                sol_amount: sol,
                slippage: opts.slippage,
                priority_fee: opts.priority_fee,
                pool: opts.pool.clone(),
            };
            match TradeService::execute_buy(&buyer_ctx, params).await {
                Ok(outcome) => {
                    printer::print_outcome(&format!("snipe {}", token.mint), &outcome);
                    if outcome.is_submitted() {
                        bought += 1;
                    }
                }
                Err(e) => error!("Snipe buy of {} failed: {}", token.mint, e),
            }
            if max_buys.is_some_and(|max| bought >= max) {
                info!("Reached {} buy(s), stopping", bought);
                let _ = handle.shutdown();
                break;
            }
        }
        bought
    });

    let mut handler = printer::SnipeHandler { filter, targets: targets_tx, printer: printer::ConsolePrinter::default() };
    let result = listener.run(&mut handler).await;
    drop(handler);

    let bought = buyer.await.unwrap_or_else(|e| {
        warn!("Buyer task ended abnormally: {}", e);
        0
    });
    let stats = result?;
    println!("{} {} buy(s) from {} event(s)", "snipe".bold(), bought, stats.events);
    Ok(())
}
