// Turns build responses into in-memory transactions.
// The content of each transaction is trusted as returned by the server.

use crate::error::CoreError;
use crate::models::{ApiResponse, TxEnvelope};
use crate::settings::keypair_from_bytes;
use base64::{engine::general_purpose::STANDARD as Base64Engine, Engine};
use log::debug;
use serde_json::Value;
use solana_sdk::signature::Keypair;
use solana_sdk::transaction::VersionedTransaction;

pub type MaterializeResult<T> = Result<T, CoreError>;

/// A deserialized transaction plus the signer roles it requires.
#[derive(Debug, Clone)]
pub struct MaterializedTx {
    pub transaction: VersionedTransaction,
    pub roles: Vec<String>,
    pub description: Option<String>,
}

#[derive(Debug)]
pub struct Materialized {
    pub mint: Option<String>,
    pub transactions: Vec<MaterializedTx>,
    /// Mint keypair generated server-side, if the envelope carried one.
    pub mint_keypair: Option<Keypair>,
    pub stats: Option<Value>,
}

impl Materialized {
    /// Exactly one transaction, or a decode error.
    pub fn into_single(self) -> MaterializeResult<MaterializedTx> {
        let count = self.transactions.len();
        let mut txs = self.transactions;
        match (txs.pop(), count) {
            (Some(tx), 1) => Ok(tx),
            _ => Err(CoreError::Decode(format!("expected exactly one transaction, got {}", count))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxEncoding {
    Base58,
    Base64,
}

impl TxEncoding {
    fn from_envelope(env: &TxEnvelope) -> MaterializeResult<Self> {
        match env.encoding.as_deref() {
            None | Some("base58") => Ok(TxEncoding::Base58),
            Some("base64") => Ok(TxEncoding::Base64),
            Some(other) => Err(CoreError::Decode(format!("unsupported transaction encoding '{}'", other))),
        }
    }
}

/// Deserialize a raw wire transaction.
pub fn decode_transaction(bytes: &[u8]) -> MaterializeResult<VersionedTransaction> {
    if bytes.is_empty() {
        return Err(CoreError::Decode("empty transaction payload".to_string()));
    }
    let tx: VersionedTransaction = bincode::deserialize(bytes)?;
    Ok(tx)
}

pub fn decode_encoded_transaction(encoded: &str, encoding: TxEncoding) -> MaterializeResult<VersionedTransaction> {
    let bytes = match encoding {
        TxEncoding::Base58 => bs58::decode(encoded.trim())
            .into_vec()
            .map_err(|e| CoreError::Decode(format!("base58 decode failed: {}", e)))?,
        TxEncoding::Base64 => Base64Engine
            .decode(encoded.trim())
            .map_err(|e| CoreError::Decode(format!("base64 decode failed: {}", e)))?,
    };
    decode_transaction(&bytes)
}

/// Serialize a signed transaction and base58 encode it for relays.
pub fn encode_transaction_base58(tx: &VersionedTransaction) -> MaterializeResult<String> {
    let bytes = bincode::serialize(tx)?;
    Ok(bs58::encode(bytes).into_string())
}

/// Rebuild every transaction in `response`.
///
/// `default_roles` applies to a binary body and to envelope entries that
/// declare no signers of their own or at the envelope level.
pub fn materialize(response: ApiResponse, default_roles: &[&str]) -> MaterializeResult<Materialized> {
    let defaults: Vec<String> = default_roles.iter().map(|r| r.to_string()).collect();

    match response {
        ApiResponse::Binary(bytes) => {
            let transaction = decode_transaction(&bytes)?;
            Ok(Materialized {
                mint: None,
                transactions: vec![MaterializedTx { transaction, roles: defaults, description: None }],
                mint_keypair: None,
                stats: None,
            })
        }
        ApiResponse::Envelope(env) => {
            let encoding = TxEncoding::from_envelope(&env)?;
            let envelope_roles = if env.signers.is_empty() { defaults.clone() } else { env.signers.clone() };

            let mut transactions = Vec::with_capacity(env.transaction_count());
            if let Some(encoded) = &env.transaction {
                transactions.push(MaterializedTx {
                    transaction: decode_encoded_transaction(encoded, encoding)?,
                    roles: envelope_roles.clone(),
                    description: None,
                });
            }
            for (idx, entry) in env.transactions.iter().enumerate() {
                let transaction = decode_encoded_transaction(&entry.transaction, encoding)
                    .map_err(|e| CoreError::Decode(format!("transaction #{}: {}", idx, e)))?;
                let roles = if entry.signers.is_empty() { envelope_roles.clone() } else { entry.signers.clone() };
                transactions.push(MaterializedTx { transaction, roles, description: entry.description.clone() });
            }
            if transactions.is_empty() {
                return Err(CoreError::Decode("response carried no transactions".to_string()));
            }

            let mint_keypair = match &env.mint_secret_key {
                Some(secret) => {
                    let bytes = bs58::decode(secret.trim())
                        .into_vec()
                        .map_err(|e| CoreError::Decode(format!("mintSecretKey decode failed: {}", e)))?;
                    Some(keypair_from_bytes(&bytes)?)
                }
                None => None,
            };

            debug!(
                "Materialized {} transaction(s) mint={:?} mint_keypair={}",
                transactions.len(),
                env.mint,
                mint_keypair.is_some()
            );

            Ok(Materialized { mint: env.mint, transactions, mint_keypair, stats: env.stats })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EncodedTransaction;
    use crate::test_support::{encode_b58, unsigned_tx};
    use solana_sdk::pubkey::Pubkey;
    use solana_sdk::signature::Signer;

    #[test]
    fn binary_response_uses_default_roles() {
        let payer = Pubkey::new_unique();
        let tx = unsigned_tx(&[payer]);
        let bytes = bincode::serialize(&tx).unwrap();

        let m = materialize(ApiResponse::Binary(bytes), &["creator"]).unwrap();
        let single = m.into_single().unwrap();
        assert_eq!(single.roles, vec!["creator".to_string()]);
        assert_eq!(single.transaction.message.static_account_keys()[0], payer);
    }

    #[test]
    fn envelope_roles_fall_back_in_order() {
        let a = unsigned_tx(&[Pubkey::new_unique()]);
        let b = unsigned_tx(&[Pubkey::new_unique()]);
        let env = TxEnvelope {
            transaction: Some(encode_b58(&a)),
            signers: vec!["wallet".to_string()],
            transactions: vec![
                EncodedTransaction { transaction: encode_b58(&b), signers: vec![], description: Some("tip".into()) },
                EncodedTransaction { transaction: encode_b58(&b), signers: vec!["buyer1".into()], description: None },
            ],
            ..Default::default()
        };
        let m = materialize(ApiResponse::Envelope(env), &["creator"]).unwrap();
        let roles: Vec<_> = m.transactions.iter().map(|t| t.roles.clone()).collect();
        assert_eq!(roles, vec![vec!["wallet".to_string()], vec!["wallet".to_string()], vec!["buyer1".to_string()]]);
        assert_eq!(m.transactions[1].description.as_deref(), Some("tip"));
    }

    #[test]
    fn mint_secret_key_becomes_keypair() {
        let mint = Keypair::new();
        let tx = unsigned_tx(&[Pubkey::new_unique(), mint.pubkey()]);
        let env = TxEnvelope {
            mint: Some(mint.pubkey().to_string()),
            transaction: Some(encode_b58(&tx)),
            mint_secret_key: Some(mint.to_base58_string()),
            ..Default::default()
        };
        let m = materialize(ApiResponse::Envelope(env), &["creator", "mint"]).unwrap();
        assert_eq!(m.mint_keypair.unwrap().pubkey(), mint.pubkey());
    }

    #[test]
    fn base64_encoding_is_honoured() {
        let tx = unsigned_tx(&[Pubkey::new_unique()]);
        let env = TxEnvelope {
            transaction: Some(Base64Engine.encode(bincode::serialize(&tx).unwrap())),
            encoding: Some("base64".to_string()),
            ..Default::default()
        };
        assert!(materialize(ApiResponse::Envelope(env), &["creator"]).is_ok());
    }

    #[test]
    fn malformed_payloads_fail() {
        assert!(matches!(materialize(ApiResponse::Binary(vec![]), &[]), Err(CoreError::Decode(_))));
        assert!(materialize(ApiResponse::Binary(vec![9, 9, 9]), &[]).is_err());

        let env = TxEnvelope { transaction: Some("0OIl".to_string()), ..Default::default() };
        assert!(matches!(materialize(ApiResponse::Envelope(env), &[]), Err(CoreError::Decode(_))));

        let empty = TxEnvelope::default();
        assert!(materialize(ApiResponse::Envelope(empty), &[]).is_err());
    }
}
