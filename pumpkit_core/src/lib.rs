// Pumpkit Core Library
// Build, sign and submit trading-API transactions; stream portal events

pub mod models;
pub mod error;
pub mod settings;
pub mod api;
pub mod materializer;
pub mod transaction_signer;
pub mod rpc_client;
pub mod native;
pub mod submitter;
pub mod relay;
pub mod context;
pub mod pipeline;

pub mod trade_service;
pub mod create_service;
pub mod claim_service;
pub mod transfer_service;

pub mod ws;
pub mod scheduler;
pub mod filters;

#[cfg(test)]
mod test_support;

// Re-exports
pub use error::CoreError;
pub use models::*;
pub use settings::Settings;
pub use context::ClientContext;
pub use rpc_client::*;
pub use transaction_signer::*;
pub use trade_service::*;
pub use create_service::*;
pub use claim_service::*;
pub use transfer_service::*;
pub use scheduler::{OverlapPolicy, ScheduledTask};
pub use filters::SnipeFilter;
