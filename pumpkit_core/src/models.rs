// Request and response shapes exchanged with the trading API.
// Requests are immutable value objects serialized once per call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Build endpoints exposed by the trading API, relative to the base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Trade,
    Create,
    ClaimFees,
    Transfer,
    Bundle,
}

impl Operation {
    pub fn path(&self) -> &'static str {
        match self {
            Operation::Trade => "trade-local",
            Operation::Create => "create",
            Operation::ClaimFees => "claim-fees",
            Operation::Transfer => "transfer",
            Operation::Bundle => "bundle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

/// Trade size: either a plain number (SOL or tokens, see
/// `denominated_in_sol`) or a percentage of the holding such as `"100%"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Value(f64),
    Percent(String),
}

impl Amount {
    pub fn percent(pct: f64) -> Self {
        Amount::Percent(format!("{}%", pct))
    }

    /// Parses CLI style input: `"0.5"` or `"100%"`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(pct) = s.strip_suffix('%') {
            let v: f64 = pct.trim().parse().ok()?;
            if !(0.0..=100.0).contains(&v) {
                return None;
            }
            return Some(Amount::Percent(format!("{}%", pct.trim())));
        }
        s.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0).map(Amount::Value)
    }

    pub fn is_percent(&self) -> bool {
        matches!(self, Amount::Percent(_))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    pub public_key: String,
    pub action: TradeAction,
    pub mint: String,
    pub amount: Amount,
    pub denominated_in_sol: bool,
    pub slippage: f64,
    pub priority_fee: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub uri: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTokenRequest {
    pub public_key: String,
    pub token_metadata: TokenMetadata,
    /// Pubkey of the locally generated mint keypair.
    pub mint: String,
    /// Initial dev buy in SOL.
    pub amount: f64,
    pub denominated_in_sol: bool,
    pub slippage: f64,
    pub priority_fee: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimFeesRequest {
    pub public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
    pub priority_fee: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub public_key: String,
    pub to: String,
    /// SOL to move.
    pub amount: f64,
    pub priority_fee: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleBuyer {
    pub public_key: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleCreateRequest {
    pub public_key: String,
    pub token_metadata: TokenMetadata,
    /// Dev buy in SOL for the creator.
    pub amount: f64,
    pub slippage: f64,
    pub priority_fee: f64,
    pub jito_tip: f64,
    pub buyers: Vec<BundleBuyer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
}

/// One encoded transaction inside a JSON envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedTransaction {
    pub transaction: String,
    #[serde(default)]
    pub signers: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// JSON form of a build response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxEnvelope {
    #[serde(default)]
    pub mint: Option<String>,
    #[serde(default)]
    pub transaction: Option<String>,
    #[serde(default)]
    pub transactions: Vec<EncodedTransaction>,
    #[serde(default)]
    pub mint_secret_key: Option<String>,
    #[serde(default)]
    pub signers: Vec<String>,
    #[serde(default)]
    pub stats: Option<Value>,
    /// `base58` (default) or `base64`.
    #[serde(default)]
    pub encoding: Option<String>,
}

impl TxEnvelope {
    /// Envelope for a bare JSON array of encoded transactions.
    pub fn from_list(encoded: Vec<String>) -> Self {
        Self {
            transactions: encoded
                .into_iter()
                .map(|transaction| EncodedTransaction { transaction, signers: Vec::new(), description: None })
                .collect(),
            ..Default::default()
        }
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len() + usize::from(self.transaction.is_some())
    }
}

/// Body returned by a successful build call.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Binary(Vec<u8>),
    Envelope(TxEnvelope),
}

/// Result of a single build-sign-submit workflow.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    Submitted {
        signature: String,
        confirmed: bool,
        mint: Option<String>,
    },
    /// The API refused to build the transaction; nothing was submitted.
    Rejected { status: u16, message: String },
}

impl OperationOutcome {
    pub fn signature(&self) -> Option<&str> {
        match self {
            OperationOutcome::Submitted { signature, .. } => Some(signature),
            OperationOutcome::Rejected { .. } => None,
        }
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self, OperationOutcome::Submitted { .. })
    }
}

/// Per-entry counts for the sequential batch flows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub requested: usize,
    pub succeeded: usize,
    pub rejected: usize,
    pub failed: usize,
    pub signatures: Vec<String>,
}
