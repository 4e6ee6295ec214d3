//! PayStream Coordinator Link
//!
//! Manages the single duplex WebSocket connection to the remote session
//! coordinator ("ClearNode"): connect/auth with a bounded wait, inbound
//! message fan-out, and fire-and-forget sends.
//!
//! The coordinator is a third-party service that may be unreachable in a
//! demo or development environment. A failed connect therefore degrades
//! into **local-only mode** instead of propagating: sessions are created
//! and transfers applied purely against the local ledger, sends become
//! recorded no-ops, and the mode is surfaced to callers through
//! [`CoordinatorLink::is_degraded`].

mod link;
mod wire;

pub use link::{CoordinatorLink, LinkState, LinkStatus};
pub use wire::{seal, AppDefinition, CoordinatorMessage, OutboundRequest, SignedEnvelope};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Coordinator connect timed out")]
    ConnectTimeout,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication failed: {0}")]
    Auth(String),
}

pub type Result<T> = std::result::Result<T, LinkError>;
