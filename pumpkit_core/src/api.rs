// HTTP client for the trading API's transaction build endpoints.
// One POST per call; no retries, no classification of failures.

use crate::error::CoreError;
use crate::models::{ApiResponse, Operation, TxEnvelope};
use log::{debug, error, info};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub type ApiResult<T> = Result<T, CoreError>;

/// Form fields for the metadata upload that precedes a token create.
#[derive(Debug, Clone, Default)]
pub struct TokenMetadataForm {
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub twitter: Option<String>,
    pub telegram: Option<String>,
    pub website: Option<String>,
    pub show_name: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataUploadResponse {
    metadata_uri: String,
}

#[derive(Debug, Clone)]
pub struct PortalApi {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl PortalApi {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> ApiResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self, op: Operation) -> String {
        format!("{}/{}", self.base_url, op.path())
    }

    /// POST `body` to the build endpoint for `op`.
    ///
    /// A 200 answer is returned as raw transaction bytes, or as a parsed
    /// envelope when the server labels the body as JSON. Any other status
    /// becomes `CoreError::Api` carrying the server's error text.
    pub async fn post_operation<B: Serialize + ?Sized>(&self, op: Operation, body: &B) -> ApiResult<ApiResponse> {
        let url = self.endpoint(op);
        debug!("POST {} body={}", url, serde_json::to_string(body).unwrap_or_default());

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.query(&[("api-key", key.as_str())]);
        }
        let response = request.send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            let message = extract_error_message(&text);
            error!("{} failed with status {}: {}", op.path(), status.as_u16(), message);
            return Err(CoreError::Api { status: status.as_u16(), message });
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("json"))
            .unwrap_or(false);

        let bytes = response.bytes().await?;
        if is_json {
            let envelope = parse_envelope(&bytes)?;
            info!("{} returned {} encoded transaction(s)", op.path(), envelope.transaction_count());
            Ok(ApiResponse::Envelope(envelope))
        } else {
            info!("{} returned {} transaction bytes", op.path(), bytes.len());
            Ok(ApiResponse::Binary(bytes.to_vec()))
        }
    }

    /// Upload token metadata and image as a multipart form. Returns the
    /// metadata URI to put into a create request.
    pub async fn upload_metadata(
        &self,
        ipfs_url: &str,
        form: &TokenMetadataForm,
        image: Vec<u8>,
        file_name: &str,
    ) -> ApiResult<String> {
        let file_part = reqwest::multipart::Part::bytes(image).file_name(file_name.to_string());
        let mut multipart = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("name", form.name.clone())
            .text("symbol", form.symbol.clone())
            .text("description", form.description.clone())
            .text("showName", form.show_name.to_string());
        for (key, value) in [("twitter", &form.twitter), ("telegram", &form.telegram), ("website", &form.website)] {
            if let Some(v) = value {
                multipart = multipart.text(key, v.clone());
            }
        }

        let response = self.client.post(ipfs_url).multipart(multipart).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CoreError::Api { status: status.as_u16(), message: extract_error_message(&text) });
        }
        let parsed: MetadataUploadResponse = response.json().await?;
        info!("Metadata uploaded: {}", parsed.metadata_uri);
        Ok(parsed.metadata_uri)
    }
}

fn parse_envelope(bytes: &[u8]) -> ApiResult<TxEnvelope> {
    let value: Value = serde_json::from_slice(bytes)?;
    match value {
        Value::Array(items) => {
            let encoded = items
                .into_iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s),
                    other => Err(CoreError::Decode(format!("expected encoded transaction string, got {}", other))),
                })
                .collect::<ApiResult<Vec<String>>>()?;
            Ok(TxEnvelope::from_list(encoded))
        }
        obj @ Value::Object(_) => Ok(serde_json::from_value(obj)?),
        other => Err(CoreError::Decode(format!("unexpected JSON body: {}", other))),
    }
}

/// Pull a human readable message out of an error body: `{error}`,
/// `{message}`, `{errors}`, or the raw text.
pub fn extract_error_message(body: &str) -> String {
    if let Ok(v) = serde_json::from_str::<Value>(body) {
        for key in ["error", "message", "errors"] {
            match v.get(key) {
                Some(Value::String(s)) => return s.clone(),
                Some(other) if !other.is_null() => return other.to_string(),
                _ => {}
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_http;
    use axum::http::{header, StatusCode as AxumStatus};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    fn api(base: &str) -> PortalApi {
        PortalApi::new(base, None, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn binary_body_is_returned_raw() {
        let router = Router::new().route(
            "/trade-local",
            post(|| async { ([(header::CONTENT_TYPE, "application/octet-stream")], vec![1u8, 2, 3]).into_response() }),
        );
        let base = spawn_http(router).await;
        let resp = api(&base).post_operation(Operation::Trade, &json!({"action": "buy"})).await.unwrap();
        assert_eq!(resp, ApiResponse::Binary(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn json_body_is_parsed_as_envelope() {
        let router = Router::new().route(
            "/bundle",
            post(|| async { Json(json!({ "mint": "M", "transactions": [{ "transaction": "t1", "signers": ["creator"] }] })) }),
        );
        let base = spawn_http(router).await;
        let resp = api(&base).post_operation(Operation::Bundle, &json!({})).await.unwrap();
        match resp {
            ApiResponse::Envelope(env) => {
                assert_eq!(env.mint.as_deref(), Some("M"));
                assert_eq!(env.transactions.len(), 1);
            }
            other => panic!("expected envelope, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn json_array_body_becomes_envelope() {
        let router = Router::new().route("/bundle", post(|| async { Json(json!(["a", "b"])) }));
        let base = spawn_http(router).await;
        let resp = api(&base).post_operation(Operation::Bundle, &json!({})).await.unwrap();
        let ApiResponse::Envelope(env) = resp else { panic!("expected envelope") };
        assert_eq!(env.transaction_count(), 2);
        assert!(env.transactions.iter().all(|t| t.signers.is_empty()));
    }

    #[tokio::test]
    async fn non_200_surfaces_error_payload() {
        let router = Router::new().route(
            "/claim-fees",
            post(|| async { (AxumStatus::BAD_REQUEST, Json(json!({ "error": "no fees to claim" }))) }),
        );
        let base = spawn_http(router).await;
        let err = api(&base).post_operation(Operation::ClaimFees, &json!({})).await.unwrap_err();
        match err {
            CoreError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "no fees to claim");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn error_message_fallbacks() {
        assert_eq!(extract_error_message(r#"{"message":"bad mint"}"#), "bad mint");
        assert_eq!(extract_error_message(r#"{"errors":["a"]}"#), r#"["a"]"#);
        assert_eq!(extract_error_message("  gateway down "), "gateway down");
        assert_eq!(extract_error_message(""), "empty response body");
    }
}
