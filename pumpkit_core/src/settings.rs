use crate::error::CoreError;
use crate::scheduler::OverlapPolicy;
use crate::submitter::SubmitOptions;
use crate::ws::ListenerConfig;
use base64::{engine::general_purpose::STANDARD as Base64Engine, Engine};
use log::warn;
use serde::{Deserialize, Serialize};
use solana_sdk::signature::Keypair;
use std::fmt;
use std::time::Duration;

/// Env var holding a base64 encoded 64-byte keypair. Takes precedence over
/// `wallet_private_key` when set.
pub const KEYPAIR_B64_ENV: &str = "PUMPKIT_KEYPAIR_B64";

/// Prefix for environment overrides, e.g. `PUMPKIT_SOLANA_RPC_URL`.
pub const ENV_PREFIX: &str = "PUMPKIT";

/// A string that never shows up in `Debug` output.
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub api_key: Option<SecretString>,
    #[serde(default = "default_ipfs_url")]
    pub ipfs_url: String,
    #[serde(default = "default_solana_rpc_url")]
    pub solana_rpc_url: String,
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default)]
    pub wallet_private_key: Option<SecretString>,
    /// `;` or whitespace separated list of buyer keys (base58 or JSON arrays).
    #[serde(default)]
    pub buyer_private_keys: Option<SecretString>,
    #[serde(default)]
    pub target_mint: Option<String>,
    /// Comma separated bundle relay endpoints, tried in order.
    #[serde(default = "default_jito_endpoints")]
    pub jito_endpoints: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_slippage")]
    pub default_slippage: f64,
    #[serde(default = "default_priority_fee")]
    pub default_priority_fee: f64,
    #[serde(default = "default_jito_tip")]
    pub default_jito_tip: f64,
    #[serde(default = "default_pool")]
    pub default_pool: String,
    #[serde(default = "default_send_max_retries")]
    pub send_max_retries: usize,
    #[serde(default)]
    pub skip_preflight: bool,
    #[serde(default)]
    pub confirm: bool,
    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,
    #[serde(default = "default_confirm_poll_ms")]
    pub confirm_poll_ms: u64,
    #[serde(default = "default_transfer_delay_ms")]
    pub transfer_delay_ms: u64,
    #[serde(default = "default_claim_interval_secs")]
    pub claim_interval_secs: u64,
    #[serde(default = "default_overlap_policy")]
    pub overlap_policy: String,
    #[serde(default)]
    pub ws_reconnect: bool,
    #[serde(default = "default_ws_reconnect_delay_secs")]
    pub ws_reconnect_delay_secs: u64,
    #[serde(default = "default_ws_close_delay_ms")]
    pub ws_close_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_key: None,
            ipfs_url: default_ipfs_url(),
            solana_rpc_url: default_solana_rpc_url(),
            ws_url: default_ws_url(),
            wallet_private_key: None,
            buyer_private_keys: None,
            target_mint: None,
            jito_endpoints: default_jito_endpoints(),
            request_timeout_secs: default_request_timeout_secs(),
            default_slippage: default_slippage(),
            default_priority_fee: default_priority_fee(),
            default_jito_tip: default_jito_tip(),
            default_pool: default_pool(),
            send_max_retries: default_send_max_retries(),
            skip_preflight: false,
            confirm: false,
            confirm_timeout_secs: default_confirm_timeout_secs(),
            confirm_poll_ms: default_confirm_poll_ms(),
            transfer_delay_ms: default_transfer_delay_ms(),
            claim_interval_secs: default_claim_interval_secs(),
            overlap_policy: default_overlap_policy(),
            ws_reconnect: false,
            ws_reconnect_delay_secs: default_ws_reconnect_delay_secs(),
            ws_close_delay_ms: default_ws_close_delay_ms(),
        }
    }
}

impl Settings {
    /// Load settings from an optional TOML file overlaid by `PUMPKIT_*`
    /// environment variables. A missing file is not an error.
    pub fn load(path: Option<&str>) -> Result<Self, CoreError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX));
        let cfg = builder.build()?;
        Ok(cfg.try_deserialize()?)
    }

    /// Load settings from a TOML file only, without environment overrides.
    pub fn from_file(path: &str) -> Result<Self, CoreError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(path));
        let cfg = builder.build()?;
        Ok(cfg.try_deserialize()?)
    }

    /// Validate settings ranges and constraints
    pub fn validate(&self) -> Result<(), CoreError> {
        for (name, value) in [
            ("api_base_url", &self.api_base_url),
            ("ipfs_url", &self.ipfs_url),
            ("solana_rpc_url", &self.solana_rpc_url),
            ("ws_url", &self.ws_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| CoreError::Validation(format!("{} is not a valid URL: {}", name, e)))?;
        }
        for endpoint in self.jito_endpoints() {
            url::Url::parse(&endpoint)
                .map_err(|e| CoreError::Validation(format!("invalid relay endpoint {}: {}", endpoint, e)))?;
        }
        if self.request_timeout_secs == 0 {
            return Err(CoreError::Validation("request_timeout_secs must be > 0".to_string()));
        }
        if self.default_slippage < 0.0 {
            return Err(CoreError::Validation("default_slippage must be >= 0".to_string()));
        }
        if self.default_priority_fee < 0.0 || self.default_jito_tip < 0.0 {
            return Err(CoreError::Validation("fees and tips must be >= 0".to_string()));
        }
        if self.confirm_timeout_secs == 0 || self.confirm_poll_ms == 0 {
            return Err(CoreError::Validation("confirmation timeout and poll interval must be > 0".to_string()));
        }
        if self.claim_interval_secs == 0 {
            return Err(CoreError::Validation("claim_interval_secs must be > 0".to_string()));
        }
        self.overlap_policy()?;
        Ok(())
    }

    /// The main signing wallet. Registered as `creator` / `wallet`.
    pub fn primary_keypair(&self) -> Result<Keypair, CoreError> {
        if let Some(bytes) = load_keypair_from_env_var(KEYPAIR_B64_ENV) {
            return keypair_from_bytes(&bytes);
        }
        match &self.wallet_private_key {
            Some(secret) => {
                let bytes = parse_private_key_string(secret.expose()).map_err(CoreError::InvalidKeypair)?;
                keypair_from_bytes(&bytes)
            }
            None => Err(CoreError::InvalidKeypair(
                "No wallet keypair configured! Set wallet_private_key or PUMPKIT_KEYPAIR_B64".to_string(),
            )),
        }
    }

    /// Buyer wallets in declaration order (`buyer1`, `buyer2`, ...).
    pub fn buyer_keypairs(&self) -> Result<Vec<Keypair>, CoreError> {
        let Some(raw) = &self.buyer_private_keys else {
            return Ok(Vec::new());
        };
        split_key_list(raw.expose())
            .into_iter()
            .map(|entry| {
                let bytes = parse_private_key_string(entry).map_err(CoreError::InvalidKeypair)?;
                keypair_from_bytes(&bytes)
            })
            .collect()
    }

    pub fn jito_endpoints(&self) -> Vec<String> {
        self.jito_endpoints
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn overlap_policy(&self) -> Result<OverlapPolicy, CoreError> {
        self.overlap_policy.parse()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn claim_interval(&self) -> Duration {
        Duration::from_secs(self.claim_interval_secs)
    }

    pub fn transfer_delay(&self) -> Duration {
        Duration::from_millis(self.transfer_delay_ms)
    }

    pub fn submit_options(&self) -> SubmitOptions {
        SubmitOptions {
            skip_preflight: self.skip_preflight,
            max_retries: Some(self.send_max_retries),
            confirm: self.confirm,
            confirm_timeout: Duration::from_secs(self.confirm_timeout_secs),
            poll_interval: Duration::from_millis(self.confirm_poll_ms),
        }
    }

    pub fn listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            url: self.ws_url.clone(),
            reconnect: self.ws_reconnect,
            reconnect_delay: Duration::from_secs(self.ws_reconnect_delay_secs),
            close_delay: Duration::from_millis(self.ws_close_delay_ms),
        }
    }
}

/// Try to read a base64-encoded keypair from the given env var. Returns
/// the raw decoded bytes if present and valid, otherwise None.
pub fn load_keypair_from_env_var(var: &str) -> Option<Vec<u8>> {
    let s = std::env::var(var).ok()?;
    match Base64Engine.decode(s.trim()) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!("Failed to decode {}: {}", var, e);
            None
        }
    }
}

/// Parse a private key string in various formats:
/// - Base58 (standard Solana format, 87-88 chars)
/// - JSON array string like "[1,2,3,...]"
/// - Comma-separated bytes like "1,2,3,..."
pub fn parse_private_key_string(s: &str) -> Result<Vec<u8>, String> {
    let trimmed = s.trim();

    if trimmed.starts_with('[') {
        return serde_json::from_str::<Vec<u8>>(trimmed)
            .map_err(|e| format!("JSON parse failed: {}", e));
    }

    if trimmed.contains(',') {
        let parts: Result<Vec<u8>, _> = trimmed
            .split(',')
            .map(|s| s.trim().parse::<u8>())
            .collect();
        return parts.map_err(|e| format!("CSV parse failed: {}", e));
    }

    if trimmed.len() >= 80 {
        return bs58::decode(trimmed)
            .into_vec()
            .map_err(|e| format!("Base58 decode failed: {}", e));
    }

    Err("Unrecognized private key format. Expected: base58, JSON array, or comma-separated bytes".to_string())
}

pub fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair, CoreError> {
    Keypair::try_from(bytes).map_err(|e| CoreError::InvalidKeypair(e.to_string()))
}

// Entries are separated by ';' or whitespace. A `[...]` span is one entry
// even when it contains separators.
fn split_key_list(raw: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (idx, c) in raw.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            c if depth == 0 && (c == ';' || c.is_whitespace()) => {
                entries.push(&raw[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    entries.push(&raw[start..]);
    entries.into_iter().map(str::trim).filter(|s| !s.is_empty()).collect()
}

fn default_api_base_url() -> String { "https://pumpportal.fun/api".to_string() }
fn default_ipfs_url() -> String { "https://pump.fun/api/ipfs".to_string() }
fn default_solana_rpc_url() -> String { "https://api.mainnet-beta.solana.com".to_string() }
fn default_ws_url() -> String { "wss://pumpportal.fun/api/data".to_string() }
fn default_jito_endpoints() -> String {
    [
        "https://mainnet.block-engine.jito.wtf/api/v1/bundles",
        "https://amsterdam.mainnet.block-engine.jito.wtf/api/v1/bundles",
        "https://frankfurt.mainnet.block-engine.jito.wtf/api/v1/bundles",
        "https://ny.mainnet.block-engine.jito.wtf/api/v1/bundles",
        "https://tokyo.mainnet.block-engine.jito.wtf/api/v1/bundles",
    ]
    .join(",")
}
fn default_request_timeout_secs() -> u64 { 30 }
fn default_slippage() -> f64 { 10.0 }
fn default_priority_fee() -> f64 { 0.0005 }
fn default_jito_tip() -> f64 { 0.0005 }
fn default_pool() -> String { "pump".to_string() }
fn default_send_max_retries() -> usize { 3 }
fn default_confirm_timeout_secs() -> u64 { 60 }
fn default_confirm_poll_ms() -> u64 { 2000 }
fn default_transfer_delay_ms() -> u64 { 500 }
fn default_claim_interval_secs() -> u64 { 3600 }
fn default_overlap_policy() -> String { "skip".to_string() }
fn default_ws_reconnect_delay_secs() -> u64 { 2 }
fn default_ws_close_delay_ms() -> u64 { 500 }

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::Signer;
    use std::io::Write;

    #[test]
    fn load_example_config() {
        let s = Settings::from_file("config.example.toml").unwrap();
        assert_eq!(s.api_base_url, "https://pumpportal.fun/api");
        assert_eq!(s.default_slippage, 10.0);
        assert_eq!(s.transfer_delay_ms, 500);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "solana_rpc_url = \"http://127.0.0.1:8899\"").unwrap();
        let s = Settings::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(s.solana_rpc_url, "http://127.0.0.1:8899");
        assert_eq!(s.ws_url, default_ws_url());
        assert_eq!(s.jito_endpoints().len(), 5);
        assert_eq!(s.overlap_policy().unwrap(), OverlapPolicy::Skip);
    }

    #[test]
    fn validate_rejects_bad_url_and_policy() {
        let mut s = Settings::default();
        s.api_base_url = "not a url".to_string();
        assert!(matches!(s.validate(), Err(CoreError::Validation(_))));

        let mut s = Settings::default();
        s.overlap_policy = "sometimes".to_string();
        assert!(s.validate().is_err());
    }

    #[test]
    fn parses_all_private_key_formats() {
        let kp = Keypair::new();
        let bytes = kp.to_bytes().to_vec();

        let b58 = kp.to_base58_string();
        assert_eq!(parse_private_key_string(&b58).unwrap(), bytes);

        let json = serde_json::to_string(&bytes).unwrap();
        assert_eq!(parse_private_key_string(&json).unwrap(), bytes);

        let csv = bytes.iter().map(|b| b.to_string()).collect::<Vec<_>>().join(",");
        assert_eq!(parse_private_key_string(&csv).unwrap(), bytes);

        assert!(parse_private_key_string("short").is_err());
    }

    #[test]
    fn buyer_keys_split_on_semicolons_and_whitespace() {
        let a = Keypair::new();
        let b = Keypair::new();
        let json_b = serde_json::to_string(&b.to_bytes().to_vec()).unwrap();
        let mut s = Settings::default();
        s.buyer_private_keys = Some(SecretString::new(format!("{} ;\n{}", a.to_base58_string(), json_b)));

        let buyers = s.buyer_keypairs().unwrap();
        assert_eq!(buyers.len(), 2);
        assert_eq!(buyers[0].pubkey(), a.pubkey());
        assert_eq!(buyers[1].pubkey(), b.pubkey());
    }

    #[test]
    fn spaced_json_array_keys_stay_whole() {
        let a = Keypair::new();
        let b = Keypair::new();
        let spaced = |kp: &Keypair| {
            let parts: Vec<String> = kp.to_bytes().iter().map(|b| b.to_string()).collect();
            format!("[ {} ]", parts.join(", "))
        };
        let mut s = Settings::default();
        s.buyer_private_keys = Some(SecretString::new(format!("{}\n{}; {}", spaced(&a), spaced(&b), a.to_base58_string())));

        let buyers = s.buyer_keypairs().unwrap();
        assert_eq!(buyers.len(), 3);
        assert_eq!(buyers[0].pubkey(), a.pubkey());
        assert_eq!(buyers[1].pubkey(), b.pubkey());
        assert_eq!(buyers[2].pubkey(), a.pubkey());
    }

    #[test]
    fn secrets_are_redacted_in_debug() {
        let mut s = Settings::default();
        s.wallet_private_key = Some(SecretString::new("super-secret"));
        let dbg = format!("{:?}", s);
        assert!(!dbg.contains("super-secret"));
    }
}
