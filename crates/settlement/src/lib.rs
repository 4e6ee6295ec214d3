//! PayStream Settlement
//!
//! Drives a closed session's final allocation to an on-chain destination.
//!
//! ## Settlement Flow
//!
//! 1. **Same chain**: a single direct transfer through the bridge
//!    provider; no cross-chain step is ever invoked.
//! 2. **Cross chain**: the fixed pipeline `approve → burn → attestation →
//!    mint`. Each completed step's reference is recorded; the first
//!    failure stops the pipeline and the result carries every reference
//!    obtained so far (a burn without a mint surfaces as a failure with
//!    the burn reference; stranded funds are an operator problem, never
//!    silently retried here).
//!
//! The dispatcher is stateless and infallible at the type level: failures
//! are data (`SettlementResult { success: false, .. }`), and a result is
//! terminal and immutable once produced.

mod bridge;
mod dispatcher;

pub use bridge::{BridgeError, BridgeProvider, MockBridge};
pub use dispatcher::SettlementDispatcher;
