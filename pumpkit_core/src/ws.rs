// Streaming client for the portal's data feed.
//
// One connection, a set of subscription topics, and a callback handler.
// Topics can be added or removed at runtime through a `ListenerHandle`.
// Reconnecting is opt-in.

use crate::error::CoreError;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

pub type ListenerResult<T> = Result<T, CoreError>;

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub url: String,
    pub reconnect: bool,
    pub reconnect_delay: Duration,
    /// Pause between the last unsubscribe frame and the close frame.
    pub close_delay: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            url: "wss://pumpportal.fun/api/data".to_string(),
            reconnect: false,
            reconnect_delay: Duration::from_secs(2),
            close_delay: Duration::from_millis(500),
        }
    }
}

/// A subscription topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    NewTokens,
    Migrations,
    /// Trades on the given mints.
    TokenTrades(Vec<String>),
    /// Trades made by the given wallets.
    AccountTrades(Vec<String>),
}

impl Topic {
    fn method(&self, subscribe: bool) -> &'static str {
        match (self, subscribe) {
            (Topic::NewTokens, true) => "subscribeNewToken",
            (Topic::NewTokens, false) => "unsubscribeNewToken",
            (Topic::Migrations, true) => "subscribeMigration",
            (Topic::Migrations, false) => "unsubscribeMigration",
            (Topic::TokenTrades(_), true) => "subscribeTokenTrade",
            (Topic::TokenTrades(_), false) => "unsubscribeTokenTrade",
            (Topic::AccountTrades(_), true) => "subscribeAccountTrade",
            (Topic::AccountTrades(_), false) => "unsubscribeAccountTrade",
        }
    }

    /// JSON control frame for this topic.
    pub fn frame(&self, subscribe: bool) -> String {
        let method = self.method(subscribe);
        match self {
            Topic::NewTokens | Topic::Migrations => json!({ "method": method }).to_string(),
            Topic::TokenTrades(keys) | Topic::AccountTrades(keys) => json!({ "method": method, "keys": keys }).to_string(),
        }
    }
}

/// Topics the listener keeps subscribed across the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    pub new_tokens: bool,
    pub migrations: bool,
    pub token_trades: BTreeSet<String>,
    pub account_trades: BTreeSet<String>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, topic: Topic) -> Self {
        self.add(&topic);
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.new_tokens && !self.migrations && self.token_trades.is_empty() && self.account_trades.is_empty()
    }

    pub fn add(&mut self, topic: &Topic) {
        match topic {
            Topic::NewTokens => self.new_tokens = true,
            Topic::Migrations => self.migrations = true,
            Topic::TokenTrades(keys) => self.token_trades.extend(keys.iter().cloned()),
            Topic::AccountTrades(keys) => self.account_trades.extend(keys.iter().cloned()),
        }
    }

    pub fn remove(&mut self, topic: &Topic) {
        match topic {
            Topic::NewTokens => self.new_tokens = false,
            Topic::Migrations => self.migrations = false,
            Topic::TokenTrades(keys) => keys.iter().for_each(|k| {
                self.token_trades.remove(k);
            }),
            Topic::AccountTrades(keys) => keys.iter().for_each(|k| {
                self.account_trades.remove(k);
            }),
        }
    }

    pub fn topics(&self) -> Vec<Topic> {
        let mut topics = Vec::new();
        if self.new_tokens {
            topics.push(Topic::NewTokens);
        }
        if self.migrations {
            topics.push(Topic::Migrations);
        }
        if !self.token_trades.is_empty() {
            topics.push(Topic::TokenTrades(self.token_trades.iter().cloned().collect()));
        }
        if !self.account_trades.is_empty() {
            topics.push(Topic::AccountTrades(self.account_trades.iter().cloned().collect()));
        }
        topics
    }

    pub fn subscribe_frames(&self) -> Vec<String> {
        self.topics().iter().map(|t| t.frame(true)).collect()
    }

    pub fn unsubscribe_frames(&self) -> Vec<String> {
        self.topics().iter().map(|t| t.frame(false)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Disconnected,
    Connected,
    Subscribed,
}

/// Token creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTokenEvent {
    #[serde(default)]
    pub signature: Option<String>,
    pub mint: String,
    #[serde(default)]
    pub trader_public_key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub initial_buy: Option<f64>,
    #[serde(default)]
    pub sol_amount: Option<f64>,
    #[serde(default)]
    pub market_cap_sol: Option<f64>,
    #[serde(default)]
    pub bonding_curve_key: Option<String>,
    #[serde(default)]
    pub v_tokens_in_bonding_curve: Option<f64>,
    #[serde(default)]
    pub v_sol_in_bonding_curve: Option<f64>,
    #[serde(default)]
    pub pool: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeEvent {
    #[serde(default)]
    pub signature: Option<String>,
    pub mint: String,
    #[serde(rename = "txType")]
    pub side: TradeSide,
    #[serde(default)]
    pub trader_public_key: Option<String>,
    #[serde(default)]
    pub token_amount: Option<f64>,
    #[serde(default)]
    pub sol_amount: Option<f64>,
    #[serde(default)]
    pub market_cap_sol: Option<f64>,
    #[serde(default)]
    pub pool: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationEvent {
    #[serde(default)]
    pub signature: Option<String>,
    pub mint: String,
    #[serde(default)]
    pub pool: Option<String>,
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum PortalEvent {
    NewToken(NewTokenEvent),
    Trade(TradeEvent),
    Migration(MigrationEvent),
    Connected(Option<String>),
    Subscribed(Option<String>),
    Unsubscribed(Option<String>),
    ServerError(String),
    /// Free-form server message, usually a subscription acknowledgement.
    Notice(String),
}

/// Decode one text frame. Unknown or malformed shapes give `None`.
pub fn parse_event(text: &str) -> Option<PortalEvent> {
    let value: Value = serde_json::from_str(text).ok()?;
    let message = value.get("message").and_then(Value::as_str).map(str::to_string);

    if let Some(tx_type) = value.get("txType").and_then(Value::as_str) {
        let decoded = match tx_type {
            "create" => serde_json::from_value(value.clone()).map(PortalEvent::NewToken),
            "buy" | "sell" => serde_json::from_value(value.clone()).map(PortalEvent::Trade),
            "migrate" => serde_json::from_value(value.clone()).map(PortalEvent::Migration),
            other => {
                debug!("Ignoring frame with txType '{}'", other);
                return None;
            }
        };
        return match decoded {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Malformed '{}' frame: {}", tx_type, e);
                None
            }
        };
    }

    if let Some(kind) = value.get("type").and_then(Value::as_str) {
        return match kind {
            "connected" => Some(PortalEvent::Connected(message)),
            "subscribed" => Some(PortalEvent::Subscribed(message)),
            "unsubscribed" => Some(PortalEvent::Unsubscribed(message)),
            "error" => Some(PortalEvent::ServerError(message.unwrap_or_else(|| value.to_string()))),
            _ => None,
        };
    }

    if let Some(errors) = value.get("errors") {
        return Some(PortalEvent::ServerError(errors.to_string()));
    }
    message.map(PortalEvent::Notice)
}

/// Callbacks for listener activity. Every method defaults to a no-op.
pub trait EventHandler {
    fn on_state(&mut self, _state: ListenerState) {}
    fn on_new_token(&mut self, _event: &NewTokenEvent) {}
    fn on_trade(&mut self, _event: &TradeEvent) {}
    fn on_migration(&mut self, _event: &MigrationEvent) {}
    /// Connection, subscription and error frames.
    fn on_control(&mut self, _event: &PortalEvent) {}
}

#[derive(Debug, Clone)]
pub struct ListenerStats {
    pub started_at: DateTime<Utc>,
    pub last_frame_at: Option<DateTime<Utc>>,
    pub sessions: usize,
    pub frames: usize,
    pub events: usize,
    pub ignored: usize,
}

impl Default for ListenerStats {
    fn default() -> Self {
        Self { started_at: Utc::now(), last_frame_at: None, sessions: 0, frames: 0, events: 0, ignored: 0 }
    }
}

#[derive(Debug)]
enum Command {
    Subscribe(Topic),
    Unsubscribe(Topic),
    Shutdown,
}

/// Controls a running `PortalListener` from another task.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl ListenerHandle {
    pub fn subscribe(&self, topic: Topic) -> ListenerResult<()> {
        self.send(Command::Subscribe(topic))
    }

    pub fn unsubscribe(&self, topic: Topic) -> ListenerResult<()> {
        self.send(Command::Unsubscribe(topic))
    }

    /// Ask the listener to unsubscribe everything and close.
    pub fn shutdown(&self) -> ListenerResult<()> {
        self.send(Command::Shutdown)
    }

    fn send(&self, command: Command) -> ListenerResult<()> {
        self.commands
            .send(command)
            .map_err(|_| CoreError::WebSocket("listener is no longer running".to_string()))
    }
}

enum SessionEnd {
    Shutdown,
    Closed,
}

pub struct PortalListener {
    config: ListenerConfig,
    subscriptions: SubscriptionSet,
    commands: mpsc::UnboundedReceiver<Command>,
    commands_open: bool,
    state: ListenerState,
}

impl PortalListener {
    pub fn new(config: ListenerConfig, subscriptions: SubscriptionSet) -> (Self, ListenerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = Self {
            config,
            subscriptions,
            commands: rx,
            commands_open: true,
            state: ListenerState::Disconnected,
        };
        (listener, ListenerHandle { commands: tx })
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    pub fn subscriptions(&self) -> &SubscriptionSet {
        &self.subscriptions
    }

    /// Run until shutdown, or until the connection ends when reconnecting
    /// is off.
    pub async fn run<H: EventHandler>(&mut self, handler: &mut H) -> ListenerResult<ListenerStats> {
        let mut stats = ListenerStats::default();
        loop {
            stats.sessions += 1;
            let outcome = self.run_session(handler, &mut stats).await;
            self.set_state(ListenerState::Disconnected, handler);

            match outcome {
                Ok(SessionEnd::Shutdown) => {
                    info!("Listener shut down after {} frame(s)", stats.frames);
                    return Ok(stats);
                }
                Ok(SessionEnd::Closed) if !self.config.reconnect => {
                    info!("Connection closed by server");
                    return Ok(stats);
                }
                Err(e) if !self.config.reconnect => {
                    error!("Listener error: {}", e);
                    return Err(e);
                }
                Ok(SessionEnd::Closed) => warn!("Connection closed, reconnecting in {:?}", self.config.reconnect_delay),
                Err(e) => warn!("Listener error: {}, reconnecting in {:?}", e, self.config.reconnect_delay),
            }

            if self.wait_reconnect().await {
                return Ok(stats);
            }
        }
    }

    /// Sleep out the reconnect delay while still taking commands. True if
    /// a shutdown arrived meanwhile.
    async fn wait_reconnect(&mut self) -> bool {
        let delay = tokio::time::sleep(self.config.reconnect_delay);
        tokio::pin!(delay);
        loop {
            tokio::select! {
                _ = &mut delay => return false,
                cmd = self.commands.recv(), if self.commands_open => match cmd {
                    Some(Command::Subscribe(topic)) => self.subscriptions.add(&topic),
                    Some(Command::Unsubscribe(topic)) => self.subscriptions.remove(&topic),
                    Some(Command::Shutdown) => return true,
                    None => self.commands_open = false,
                },
            }
        }
    }

    async fn run_session<H: EventHandler>(&mut self, handler: &mut H, stats: &mut ListenerStats) -> ListenerResult<SessionEnd> {
        info!("Connecting to {}", self.config.url);
        let (ws_stream, _) = connect_async(self.config.url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();
        self.set_state(ListenerState::Connected, handler);

        for frame in self.subscriptions.subscribe_frames() {
            debug!("-> {}", frame);
            write.send(Message::Text(frame)).await?;
        }
        if !self.subscriptions.is_empty() {
            self.set_state(ListenerState::Subscribed, handler);
        }

        loop {
            tokio::select! {
                cmd = self.commands.recv(), if self.commands_open => match cmd {
                    Some(Command::Subscribe(topic)) => {
                        self.subscriptions.add(&topic);
                        write.send(Message::Text(topic.frame(true))).await?;
                        self.set_state(ListenerState::Subscribed, handler);
                    }
                    Some(Command::Unsubscribe(topic)) => {
                        self.subscriptions.remove(&topic);
                        write.send(Message::Text(topic.frame(false))).await?;
                    }
                    Some(Command::Shutdown) => {
                        for frame in self.subscriptions.unsubscribe_frames() {
                            if let Err(e) = write.send(Message::Text(frame)).await {
                                debug!("Unsubscribe frame not sent: {}", e);
                                break;
                            }
                        }
                        tokio::time::sleep(self.config.close_delay).await;
                        let _ = write.close().await;
                        return Ok(SessionEnd::Shutdown);
                    }
                    None => self.commands_open = false,
                },
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        stats.frames += 1;
                        stats.last_frame_at = Some(Utc::now());
                        self.dispatch(&text, handler, stats);
                    }
                    Some(Ok(Message::Ping(payload))) => write.send(Message::Pong(payload)).await?,
                    Some(Ok(Message::Close(reason))) => {
                        debug!("Close frame: {:?}", reason);
                        return Ok(SessionEnd::Closed);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(SessionEnd::Closed),
                },
            }
        }
    }

    fn dispatch<H: EventHandler>(&mut self, text: &str, handler: &mut H, stats: &mut ListenerStats) {
        let Some(event) = parse_event(text) else {
            debug!("Ignored frame: {}", text);
            stats.ignored += 1;
            return;
        };
        stats.events += 1;
        match &event {
            PortalEvent::NewToken(e) => handler.on_new_token(e),
            PortalEvent::Trade(e) => handler.on_trade(e),
            PortalEvent::Migration(e) => handler.on_migration(e),
            PortalEvent::Subscribed(_) => {
                self.set_state(ListenerState::Subscribed, handler);
                handler.on_control(&event);
            }
            PortalEvent::ServerError(msg) => {
                warn!("Server error frame: {}", msg);
                handler.on_control(&event);
            }
            _ => handler.on_control(&event),
        }
    }

    fn set_state<H: EventHandler>(&mut self, state: ListenerState, handler: &mut H) {
        if self.state != state {
            debug!("Listener {:?} -> {:?}", self.state, state);
            self.state = state;
            handler.on_state(state);
        }
    }
}
