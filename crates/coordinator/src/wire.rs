//! Coordinator wire messages.
//!
//! Outbound requests are structured payloads sealed into a signed
//! envelope; inbound frames are a tagged variant driving ledger/engine
//! state transitions. Both sides are plain JSON.

use serde::{Deserialize, Serialize};

use paystream_core::{Address, Allocation, Amount};
use paystream_signer::{MessageSigner, SignerError};

/// Inbound message from the coordinator.
///
/// Never the sole source of truth: the engine reconciles these against
/// its own optimistic accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinatorMessage {
    /// Session-open acknowledged; the session may go active
    SessionCreated { session_id: String },
    /// Counterparty payment notice
    Payment {
        session_id: String,
        amount: Amount,
        sender: Address,
    },
    /// Authoritative payee allocation for a session
    BalanceUpdate {
        session_id: String,
        amount: Amount,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender: Option<Address>,
    },
    /// Coordinator-side failure report
    Error { message: String },
    /// Application-level relay payload
    SessionMessage {
        session_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
}

/// Session parameters announced with a session-open request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppDefinition {
    pub protocol: String,
    pub participants: [Address; 2],
    pub weights: [u64; 2],
    pub quorum: u64,
    pub challenge: u64,
    pub nonce: u64,
}

/// Outbound request payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundRequest {
    AuthRequest {
        wallet: Address,
        participant: Address,
        app_name: String,
        expire: u64,
        scope: String,
    },
    SessionOpen {
        definition: AppDefinition,
        allocations: Vec<Allocation>,
    },
    Payment {
        id: String,
        session_id: String,
        amount: Amount,
        recipient: Address,
        timestamp: u64,
    },
    SessionClose {
        session_id: String,
        allocations: Vec<Allocation>,
    },
}

/// A signed outbound payload, ready for the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub payload: OutboundRequest,
    pub sig: String,
}

impl SignedEnvelope {
    /// Wire encoding of the envelope
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).expect("envelope serializes")
    }
}

/// Sign a payload into a sealed envelope. The signature covers the
/// payload's JSON encoding, which is exactly what `to_text` transmits.
pub async fn seal<S>(signer: &S, payload: OutboundRequest) -> Result<SignedEnvelope, SignerError>
where
    S: MessageSigner + ?Sized,
{
    let body = serde_json::to_string(&payload)
        .map_err(|e| SignerError::Signing(e.to_string()))?;
    let sig = signer.sign(&body).await?;
    Ok(SignedEnvelope { payload, sig })
}
