// Local signing of materialized transactions.
// Roles declared by the server are resolved against an explicit
// role -> keypair map; secret material never leaves the process.

use crate::error::CoreError;
use crate::materializer::MaterializedTx;
use crate::settings::Settings;
use log::{debug, warn};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::VersionedTransaction;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type SignerResult<T> = Result<T, CoreError>;

pub const ROLE_CREATOR: &str = "creator";
pub const ROLE_WALLET: &str = "wallet";
pub const ROLE_MINT: &str = "mint";

pub fn buyer_role(index: usize) -> String {
    format!("buyer{}", index + 1)
}

/// What to do when a transaction declares a role with no local credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingRolePolicy {
    /// Fail before anything is signed.
    #[default]
    Reject,
    /// Drop the role and sign with the rest. The transaction goes out
    /// under-signed and the cluster will refuse it.
    Skip,
}

#[derive(Default, Clone)]
pub struct SignerSet {
    signers: BTreeMap<String, Arc<Keypair>>,
}

impl std::fmt::Debug for SignerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let roles: BTreeMap<&str, String> =
            self.signers.iter().map(|(r, k)| (r.as_str(), k.pubkey().to_string())).collect();
        f.debug_struct("SignerSet").field("roles", &roles).finish()
    }
}

impl SignerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Primary wallet under `creator`/`wallet`, buyers under `buyerN`.
    pub fn with_wallets(primary: Arc<Keypair>, buyers: Vec<Arc<Keypair>>) -> Self {
        let mut set = Self::new();
        set.insert(ROLE_CREATOR, primary.clone());
        set.insert(ROLE_WALLET, primary);
        for (idx, buyer) in buyers.into_iter().enumerate() {
            set.insert(&buyer_role(idx), buyer);
        }
        set
    }

    /// Load the primary wallet and every buyer wallet from `settings`.
    pub fn from_settings(settings: &Settings) -> SignerResult<Self> {
        let primary = Arc::new(settings.primary_keypair()?);
        let buyers: Vec<Arc<Keypair>> = settings.buyer_keypairs()?.into_iter().map(Arc::new).collect();
        debug!("Loaded wallet {} with {} buyer wallet(s)", primary.pubkey(), buyers.len());
        Ok(Self::with_wallets(primary, buyers))
    }

    pub fn insert(&mut self, role: &str, keypair: Arc<Keypair>) {
        self.signers.insert(role.to_string(), keypair);
    }

    pub fn get(&self, role: &str) -> Option<&Arc<Keypair>> {
        self.signers.get(role)
    }

    pub fn contains(&self, role: &str) -> bool {
        self.signers.contains_key(role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.signers.keys().map(String::as_str)
    }

    /// Buyer keypairs in `buyer1..buyerN` order.
    pub fn buyers(&self) -> Vec<Arc<Keypair>> {
        let mut out = Vec::new();
        while let Some(kp) = self.signers.get(&buyer_role(out.len())) {
            out.push(kp.clone());
        }
        out
    }

    /// A copy of this set with `extra` added under `role`.
    pub fn with_role(&self, role: &str, extra: Arc<Keypair>) -> Self {
        let mut set = self.clone();
        set.insert(role, extra);
        set
    }

    /// Map each declared role to its keypair. Roles resolving to the same
    /// key appear once.
    pub fn resolve(&self, roles: &[String], policy: MissingRolePolicy) -> SignerResult<Vec<Arc<Keypair>>> {
        let mut resolved: Vec<Arc<Keypair>> = Vec::with_capacity(roles.len());
        for role in roles {
            match self.signers.get(role) {
                Some(kp) => {
                    if !resolved.iter().any(|k| k.pubkey() == kp.pubkey()) {
                        resolved.push(kp.clone());
                    }
                }
                None => match policy {
                    MissingRolePolicy::Reject => return Err(CoreError::MissingSigner { role: role.clone() }),
                    MissingRolePolicy::Skip => {
                        warn!("No local credential for role '{}', signing without it", role);
                    }
                },
            }
        }
        Ok(resolved)
    }

    /// Resolve `tx.roles` and sign in place. Returns signatures applied.
    pub fn sign(&self, tx: &mut MaterializedTx, policy: MissingRolePolicy) -> SignerResult<usize> {
        let keypairs = self.resolve(&tx.roles, policy)?;
        let refs: Vec<&Keypair> = keypairs.iter().map(|k| k.as_ref()).collect();
        sign_transaction(&mut tx.transaction, &refs)
    }
}

/// Sign `tx` with each keypair at the position the message reserves for it.
/// A keypair that is not one of the message's required signers is an error.
pub fn sign_transaction(tx: &mut VersionedTransaction, keypairs: &[&Keypair]) -> SignerResult<usize> {
    let required = usize::from(tx.message.header().num_required_signatures);
    let signer_keys: Vec<Pubkey> = tx.message.static_account_keys().iter().take(required).copied().collect();

    if tx.signatures.len() != required {
        tx.signatures.resize(required, Signature::default());
    }

    let message_bytes = tx.message.serialize();
    let mut applied = 0;
    for keypair in keypairs {
        let pubkey = keypair.pubkey();
        let position = signer_keys
            .iter()
            .position(|k| *k == pubkey)
            .ok_or_else(|| CoreError::Signing(format!("{} is not a required signer of this transaction", pubkey)))?;
        tx.signatures[position] = keypair
            .try_sign_message(&message_bytes)
            .map_err(|e| CoreError::Signing(e.to_string()))?;
        applied += 1;
        debug!("Signed slot {} with {}", position, pubkey);
    }
    Ok(applied)
}

/// Number of signature slots that hold a real signature.
pub fn signature_count(tx: &VersionedTransaction) -> usize {
    let empty = Signature::default();
    tx.signatures.iter().filter(|s| **s != empty).count()
}

/// True when every required signer slot is filled and verifies.
pub fn is_fully_signed(tx: &VersionedTransaction) -> bool {
    let required = usize::from(tx.message.header().num_required_signatures);
    signature_count(tx) == required && tx.verify_with_results().iter().all(|ok| *ok)
}
