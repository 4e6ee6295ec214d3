//! PayStream Core
//!
//! Shared domain types for the PayStream payment-session engine:
//!
//! - Session, allocation, and payment records with the session status
//!   transition table
//! - Settlement request/result contract shared with the dispatcher
//! - Supported-chain registry (chain ids, USDC mints, CCTP domains)
//! - USDC smallest-unit parsing and formatting
//! - Configuration types for the coordinator link, session defaults, and
//!   settlement origin

mod chain;
mod config;
mod types;
mod units;

pub use chain::Chain;
pub use config::{
    CoordinatorSettings, PayStreamConfig, SessionSettings, SettlementSettings,
};
pub use types::{
    unix_now, Address, Allocation, Amount, BridgeStep, Payment, PaymentStatus, Session,
    SessionStatus, SettlementRequest, SettlementResult, StepRecord, USDC_ASSET,
};
pub use units::{format_usdc, parse_usdc, AmountError, USDC_DECIMALS};
