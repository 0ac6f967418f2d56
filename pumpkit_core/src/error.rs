use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid keypair: {0}")]
    InvalidKeypair(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-200 answer from the trading API. Never retried.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("No local credential for signer role '{role}'")]
    MissingSigner { role: String },

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Bundle relay error: {0}")]
    Relay(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

impl CoreError {
    /// True for a rejection reported by the trading API itself.
    pub fn is_api_rejection(&self) -> bool {
        matches!(self, CoreError::Api { .. })
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Io(err.to_string())
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        CoreError::Http(err.to_string())
    }
}

impl From<bincode::Error> for CoreError {
    fn from(err: bincode::Error) -> Self {
        CoreError::Decode(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for CoreError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        CoreError::WebSocket(err.to_string())
    }
}
