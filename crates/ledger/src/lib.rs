//! PayStream Ledger
//!
//! In-memory authoritative store for all sessions owned by this client.
//! The coordinator is never trusted to own client-side state; it only
//! notifies about it, and those notifications land here through explicit
//! reconciliation.
//!
//! ## Locking discipline
//!
//! Each session lives behind its own mutex inside a read-locked map, so
//! check-then-act on an allocation is atomic per session while distinct
//! sessions proceed fully in parallel. No operation ever leaves a session
//! partially updated: every mutation validates first, then applies both
//! sides under the one lock.

mod store;

pub use store::{Reconciliation, SessionLedger, SettleGate};

use thiserror::Error;

use paystream_core::{Amount, SessionStatus};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session {session} cannot accept transfers while {status}")]
    InvalidState {
        session: String,
        status: SessionStatus,
    },

    #[error("Insufficient balance in session {session}: requested {requested}, available {available}")]
    InsufficientBalance {
        session: String,
        requested: Amount,
        available: Amount,
    },

    #[error("Illegal status transition for session {session}: {from} -> {to}")]
    InvalidTransition {
        session: String,
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("Participant {participant} is not part of session {session}")]
    UnknownParticipant {
        session: String,
        participant: String,
    },
}

pub type Result<T> = std::result::Result<T, LedgerError>;
