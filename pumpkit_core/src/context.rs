// Everything an operation needs, built once and passed by reference.

use crate::api::PortalApi;
use crate::error::CoreError;
use crate::native::NativeRpcClient;
use crate::relay::BundleRelay;
use crate::rpc_client::RpcClient;
use crate::settings::Settings;
use crate::transaction_signer::{SignerSet, ROLE_CREATOR};
use log::info;
use solana_sdk::signature::{Keypair, Signer};
use std::sync::Arc;

pub struct ClientContext {
    pub settings: Arc<Settings>,
    pub api: PortalApi,
    pub rpc: Arc<dyn RpcClient>,
    pub relay: BundleRelay,
    pub signers: SignerSet,
}

impl ClientContext {
    pub fn new(
        settings: Arc<Settings>,
        api: PortalApi,
        rpc: Arc<dyn RpcClient>,
        relay: BundleRelay,
        signers: SignerSet,
    ) -> Self {
        Self { settings, api, rpc, relay, signers }
    }

    /// Build the API, RPC and relay clients and load every configured wallet.
    pub fn from_settings(settings: Settings) -> Result<Self, CoreError> {
        settings.validate()?;
        let settings = Arc::new(settings);

        let api = PortalApi::new(
            &settings.api_base_url,
            settings.api_key.as_ref().map(|k| k.expose().to_string()),
            settings.request_timeout(),
        )?;
        let rpc: Arc<dyn RpcClient> = Arc::new(NativeRpcClient::new(settings.solana_rpc_url.clone()));
        let relay = BundleRelay::new(settings.jito_endpoints(), settings.request_timeout())?;

        let signers = SignerSet::from_settings(&settings)?;
        info!("Loaded {} signing role(s)", signers.roles().count());

        Ok(Self::new(settings, api, rpc, relay, signers))
    }

    /// The main wallet.
    pub fn primary(&self) -> Result<Arc<Keypair>, CoreError> {
        self.signers
            .get(ROLE_CREATOR)
            .cloned()
            .ok_or_else(|| CoreError::MissingSigner { role: ROLE_CREATOR.to_string() })
    }

    pub fn primary_pubkey(&self) -> Result<String, CoreError> {
        Ok(self.primary()?.pubkey().to_string())
    }

    pub fn pool(&self, pool: Option<&str>) -> Option<String> {
        Some(pool.unwrap_or(&self.settings.default_pool).to_string())
    }
}
