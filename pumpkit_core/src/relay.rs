// Block-engine relay client for atomic multi-transaction submission.
// Endpoints are tried in order until one accepts the bundle.

use crate::error::CoreError;
use crate::materializer::encode_transaction_base58;
use log::{debug, info, warn};
use reqwest::Client;
use serde_json::{json, Value};
use solana_sdk::transaction::VersionedTransaction;
use std::time::Duration;

pub type RelayResult<T> = Result<T, CoreError>;

/// Most transactions a single bundle may carry.
pub const MAX_BUNDLE_TRANSACTIONS: usize = 5;

#[derive(Debug, Clone)]
pub struct BundleRelay {
    client: Client,
    endpoints: Vec<String>,
}

impl BundleRelay {
    pub fn new(endpoints: Vec<String>, timeout: Duration) -> RelayResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoints })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Submit `transactions` as one bundle and return its id.
    pub async fn send_bundle(&self, transactions: &[VersionedTransaction]) -> RelayResult<String> {
        if transactions.is_empty() {
            return Err(CoreError::Validation("bundle must contain at least one transaction".to_string()));
        }
        if transactions.len() > MAX_BUNDLE_TRANSACTIONS {
            return Err(CoreError::Validation(format!(
                "bundle holds {} transactions, limit is {}",
                transactions.len(),
                MAX_BUNDLE_TRANSACTIONS
            )));
        }
        if self.endpoints.is_empty() {
            return Err(CoreError::Relay("no relay endpoints configured".to_string()));
        }

        let encoded = transactions
            .iter()
            .map(encode_transaction_base58)
            .collect::<RelayResult<Vec<String>>>()?;
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "sendBundle",
            "params": [encoded]
        });

        let mut last_error = String::new();
        for endpoint in &self.endpoints {
            debug!("Sending bundle of {} tx(s) to {}", transactions.len(), endpoint);
            match self.try_endpoint(endpoint, &payload).await {
                Ok(bundle_id) => {
                    info!("Bundle accepted by {}: {}", endpoint, bundle_id);
                    return Ok(bundle_id);
                }
                Err(e) => {
                    warn!("Relay {} rejected bundle: {}", endpoint, e);
                    last_error = e;
                }
            }
        }

        Err(CoreError::Relay(format!(
            "all {} endpoint(s) failed, last error: {}",
            self.endpoints.len(),
            last_error
        )))
    }

    async fn try_endpoint(&self, endpoint: &str, payload: &Value) -> Result<String, String> {
        let response = self
            .client
            .post(endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| format!("status {}: unreadable body: {}", status, e))?;

        if let Some(error) = body.get("error") {
            return Err(format!("status {}: {}", status, error));
        }
        match body.get("result").and_then(|r| r.as_str()) {
            Some(id) if status.is_success() => Ok(id.to_string()),
            _ => Err(format!("status {}: unexpected response {}", status, body)),
        }
    }
}
