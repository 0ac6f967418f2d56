use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pumpkit")]
#[command(about = "Build, sign and send pump.fun transactions through the PumpPortal API")]
#[command(version)]
pub struct Cli {
    /// Configuration file path (TOML); a missing file is ignored.
    /// PUMPKIT_* environment variables override it.
    #[arg(short, long, global = true, default_value = "pumpkit.toml")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Wait for each submitted transaction to confirm
    #[arg(long, global = true)]
    pub confirm: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Per-trade overrides of the configured defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct TradeOpts {
    /// Slippage in percent
    #[arg(long)]
    pub slippage: Option<f64>,
    /// Priority fee in SOL
    #[arg(long)]
    pub priority_fee: Option<f64>,
    /// Pool to trade on (pump, raydium, pump-amm, auto, ...)
    #[arg(long)]
    pub pool: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct MetadataOpts {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub symbol: String,
    /// Metadata URI; skips the upload step
    #[arg(long, conflicts_with = "image")]
    pub uri: Option<String>,
    /// Image to upload together with the metadata
    #[arg(long, required_unless_present = "uri")]
    pub image: Option<PathBuf>,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long)]
    pub twitter: Option<String>,
    #[arg(long)]
    pub telegram: Option<String>,
    #[arg(long)]
    pub website: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Buy a token with SOL
    Buy {
        mint: String,
        /// SOL to spend
        #[arg(long)]
        sol: f64,
        #[command(flatten)]
        opts: TradeOpts,
    },

    /// Sell a token: a token count, a SOL value with --in-sol, or a percentage like 100%
    Sell {
        mint: String,
        amount: String,
        #[arg(long)]
        in_sol: bool,
        #[command(flatten)]
        opts: TradeOpts,
    },

    /// Create a token with an optional dev buy
    Create {
        #[command(flatten)]
        metadata: MetadataOpts,
        /// Dev buy in SOL
        #[arg(long, default_value_t = 0.0)]
        dev_buy: f64,
        /// Base58 mint keypair to use instead of a fresh one
        #[arg(long)]
        mint_keypair: Option<String>,
        #[command(flatten)]
        opts: TradeOpts,
    },

    /// Create a token and buy from the buyer wallets in one relay bundle
    BundleCreate {
        #[command(flatten)]
        metadata: MetadataOpts,
        #[arg(long, default_value_t = 0.0)]
        dev_buy: f64,
        /// SOL per buyer wallet, in order; repeat once per buyer
        #[arg(long = "buyer-amount")]
        buyer_amounts: Vec<f64>,
        /// Relay tip in SOL
        #[arg(long)]
        jito_tip: Option<f64>,
        #[command(flatten)]
        opts: TradeOpts,
    },

    /// Sell a token from every buyer wallet
    BundleSell {
        mint: String,
        /// Token count or percentage like 100%
        amount: String,
        /// Also sell from the primary wallet
        #[arg(long)]
        include_primary: bool,
        /// Send through the bundle relay instead of one RPC send per wallet
        #[arg(long)]
        relay: bool,
        #[command(flatten)]
        opts: TradeOpts,
    },

    /// Claim creator fees
    Claim {
        /// Mint to claim for; repeatable. Without it, claims everything.
        #[arg(long = "mint")]
        mints: Vec<String>,
        #[arg(long)]
        pool: Option<String>,
        /// Keep claiming every N seconds until Ctrl-C
        #[arg(long, value_name = "SECS")]
        every: Option<u64>,
    },

    /// Transfer SOL from the primary wallet
    Transfer {
        to: String,
        sol: f64,
        #[arg(long)]
        priority_fee: Option<f64>,
    },

    /// Run transfers listed in a JSON file, one after another
    BatchTransfer {
        file: PathBuf,
        /// Pause between transfers; defaults to the configured delay
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Stream portal events to the console until Ctrl-C
    Listen {
        #[arg(long)]
        new_tokens: bool,
        #[arg(long)]
        migrations: bool,
        /// Watch trades on a mint; repeatable
        #[arg(long = "token")]
        tokens: Vec<String>,
        /// Watch trades by a wallet; repeatable
        #[arg(long = "account")]
        accounts: Vec<String>,
    },

    /// Buy newly created tokens that pass the filter
    Snipe {
        /// SOL to spend per token
        #[arg(long)]
        sol: f64,
        #[arg(long)]
        min_market_cap: Option<f64>,
        #[arg(long)]
        max_market_cap: Option<f64>,
        /// Minimum creator dev buy in SOL
        #[arg(long)]
        min_dev_buy: Option<f64>,
        #[arg(long)]
        name_contains: Option<String>,
        /// Stop after this many buys
        #[arg(long)]
        max_buys: Option<usize>,
        #[command(flatten)]
        opts: TradeOpts,
    },
}
