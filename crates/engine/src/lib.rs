//! PayStream Engine
//!
//! The orchestration core tying signer, coordinator link, ledger, and
//! settlement dispatcher together. One engine instance serves one client
//! identity; it is explicitly constructed and explicitly owned. There is
//! no ambient global client.
//!
//! A single implementation covers both the live coordinator path and the
//! degraded local-only path, switched by the link's `simulated` flag, so
//! the two modes cannot drift apart.

mod engine;
mod history;

pub use engine::{EngineEvent, PaymentEngine, SettlementTarget};
pub use history::PaymentHistory;

use thiserror::Error;

use paystream_core::SessionStatus;
use paystream_ledger::LedgerError;
use paystream_profile::ProfileError;
use paystream_signer::SignerError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine not connected: call connect() first")]
    NotConnected,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Session {id} is not open for payments (status: {status})")]
    SessionNotActive { id: String, status: SessionStatus },

    #[error("This client is not a participant of session {session}")]
    NotParticipant { session: String },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Signer error: {0}")]
    Signer(#[from] SignerError),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
