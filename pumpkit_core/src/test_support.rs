// Shared fixtures for unit tests: local HTTP server, in-memory RPC,
// transaction builders.

use crate::api::PortalApi;
use crate::context::ClientContext;
use crate::error::CoreError;
use crate::relay::BundleRelay;
use crate::rpc_client::{RpcClient, RpcResult, SendOptions, SignatureState};
use crate::settings::Settings;
use crate::transaction_signer::SignerSet;
use async_trait::async_trait;
use axum::Router;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::{Message, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::transaction::VersionedTransaction;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_http(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Unsigned legacy transaction whose required signers are `signers`, in order.
pub fn unsigned_tx(signers: &[Pubkey]) -> VersionedTransaction {
    let accounts = signers.iter().map(|k| AccountMeta::new(*k, true)).collect();
    let ix = Instruction::new_with_bytes(Pubkey::new_unique(), &[1, 2, 3], accounts);
    let message = Message::new_with_blockhash(&[ix], Some(&signers[0]), &Hash::new_unique());
    VersionedTransaction {
        signatures: vec![Signature::default(); usize::from(message.header.num_required_signatures)],
        message: VersionedMessage::Legacy(message),
    }
}

pub fn encode_b58(tx: &VersionedTransaction) -> String {
    bs58::encode(bincode::serialize(tx).unwrap()).into_string()
}

#[derive(Default)]
struct MockRpcState {
    sent: Vec<(VersionedTransaction, SendOptions)>,
    statuses: HashMap<String, VecDeque<Option<SignatureState>>>,
    failing_payers: HashSet<Pubkey>,
}

/// In-memory RPC: records every send, replays scripted statuses.
#[derive(Clone, Default)]
pub struct MockRpc {
    state: Arc<Mutex<MockRpcState>>,
    status_calls: Arc<AtomicUsize>,
}

impl MockRpc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends whose fee payer is `payer` fail.
    pub fn fail_for(&self, payer: Pubkey) {
        self.state.lock().unwrap().failing_payers.insert(payer);
    }

    pub fn push_status(&self, signature: &str, status: Option<SignatureState>) {
        self.state
            .lock()
            .unwrap()
            .statuses
            .entry(signature.to_string())
            .or_default()
            .push_back(status);
    }

    /// Every attempted send, failed ones included.
    pub fn send_count(&self) -> usize {
        self.state.lock().unwrap().sent.len()
    }

    pub fn sent(&self) -> Vec<VersionedTransaction> {
        self.state.lock().unwrap().sent.iter().map(|(tx, _)| tx.clone()).collect()
    }

    pub fn sent_options(&self) -> Vec<SendOptions> {
        self.state.lock().unwrap().sent.iter().map(|(_, o)| o.clone()).collect()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RpcClient for MockRpc {
    async fn send_transaction(&self, transaction: &VersionedTransaction, options: &SendOptions) -> RpcResult<String> {
        let mut state = self.state.lock().unwrap();
        state.sent.push((transaction.clone(), options.clone()));
        let payer = transaction.message.static_account_keys()[0];
        if state.failing_payers.contains(&payer) {
            return Err(CoreError::Rpc("Transaction simulation failed".to_string()));
        }
        Ok(transaction.signatures[0].to_string())
    }

    async fn get_signature_status(&self, signature: &str) -> RpcResult<Option<SignatureState>> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        Ok(state.statuses.get_mut(signature).and_then(|q| q.pop_front()).flatten())
    }
}

/// Context wired to a local API server running `router`, the given RPC
/// mock, a relay pointing at the same server's `/relay`, and a fresh
/// primary wallet.
pub async fn test_context(router: Router, rpc: MockRpc) -> (ClientContext, Arc<Keypair>) {
    test_context_with_buyers(router, rpc, Vec::new()).await
}

pub async fn test_context_with_buyers(
    router: Router,
    rpc: MockRpc,
    buyers: Vec<Arc<Keypair>>,
) -> (ClientContext, Arc<Keypair>) {
    let base = spawn_http(router).await;
    let settings = Settings {
        api_base_url: base.clone(),
        jito_endpoints: format!("{}/relay", base),
        transfer_delay_ms: 10,
        ..Settings::default()
    };
    let api = PortalApi::new(&base, None, Duration::from_secs(5)).unwrap();
    let relay = BundleRelay::new(settings.jito_endpoints(), Duration::from_secs(5)).unwrap();
    let primary = Arc::new(Keypair::new());
    let signers = SignerSet::with_wallets(primary.clone(), buyers);
    let ctx = ClientContext::new(Arc::new(settings), api, Arc::new(rpc), relay, signers);
    (ctx, primary)
}
