//! Configuration types

use serde::{Deserialize, Serialize};

use crate::chain::Chain;

/// Main settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayStreamConfig {
    /// Coordinator link settings
    #[serde(default)]
    pub coordinator: CoordinatorSettings,

    /// Session defaults sent with session-open requests
    #[serde(default)]
    pub session: SessionSettings,

    /// Settlement origin settings
    #[serde(default)]
    pub settlement: SettlementSettings,
}

/// Coordinator link settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorSettings {
    /// Coordinator WebSocket endpoint
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Bounded wait for socket open + auth ack before degraded fallback
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Application name presented during auth
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Auth grant lifetime in seconds
    #[serde(default = "default_auth_expiry")]
    pub auth_expiry_secs: u64,
}

fn default_ws_url() -> String {
    "wss://clearnet-sandbox.yellow.com/ws".to_string()
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_app_name() -> String {
    "paystream".to_string()
}

fn default_auth_expiry() -> u64 {
    3600
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            connect_timeout_secs: default_connect_timeout(),
            app_name: default_app_name(),
            auth_expiry_secs: default_auth_expiry(),
        }
    }
}

/// Session defaults for the coordinator's app-definition payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Protocol identifier
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Signing weights per participant (payer, payee)
    #[serde(default = "default_weights")]
    pub weights: [u64; 2],

    /// Quorum threshold over the weights
    #[serde(default = "default_quorum")]
    pub quorum: u64,

    /// Challenge window (0 = none)
    #[serde(default)]
    pub challenge: u64,
}

fn default_protocol() -> String {
    "paystream-v1".to_string()
}

fn default_weights() -> [u64; 2] {
    [100, 0]
}

fn default_quorum() -> u64 {
    100
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            weights: default_weights(),
            quorum: default_quorum(),
            challenge: 0,
        }
    }
}

/// Settlement origin settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementSettings {
    /// Chain the session funds settle from
    #[serde(default = "default_source_chain")]
    pub source_chain: Chain,
}

fn default_source_chain() -> Chain {
    Chain::Sepolia
}

impl Default for SettlementSettings {
    fn default() -> Self {
        Self {
            source_chain: default_source_chain(),
        }
    }
}
