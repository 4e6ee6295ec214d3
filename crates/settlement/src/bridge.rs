//! Bridge provider contract and the in-memory mock.
//!
//! The provider is the only blockchain-facing seam in the core: real
//! implementations submit transactions and poll attestation services;
//! [`MockBridge`] fabricates deterministic references and tracks every
//! call so tests can assert which steps ran.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use paystream_core::{Address, Amount, BridgeStep, Chain};

#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    #[error("Bridge step {step:?} failed: {message}")]
    StepFailed { step: BridgeStep, message: String },
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Chain-facing operations behind settlement.
///
/// Every method returns the reference identifier (transaction hash or
/// attestation id) the step produced.
#[async_trait]
pub trait BridgeProvider: Send + Sync {
    /// Direct same-chain payout
    async fn transfer(&self, chain: Chain, recipient: &str, amount: Amount) -> Result<String>;

    /// Approve the bridge contract to move `amount`
    async fn approve(&self, chain: Chain, amount: Amount) -> Result<String>;

    /// Burn/lock on the source chain
    async fn burn(&self, chain: Chain, amount: Amount, destination_domain: u32)
        -> Result<String>;

    /// Wait for the attestation covering a burn
    async fn fetch_attestation(&self, burn_ref: &str) -> Result<String>;

    /// Mint/release on the destination chain
    async fn mint(
        &self,
        chain: Chain,
        attestation: &str,
        recipient: &str,
        amount: Amount,
    ) -> Result<String>;
}

/// In-memory bridge for development and tests: deterministic references,
/// a full call log, and an optional injected failure step.
#[derive(Debug, Default)]
pub struct MockBridge {
    state: Arc<Mutex<MockBridgeState>>,
}

#[derive(Debug, Default)]
struct MockBridgeState {
    counter: u64,
    calls: Vec<BridgeStep>,
    fail_at: Option<BridgeStep>,
}

impl MockBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the named step fail; the pipeline stops there
    pub fn fail_at(self, step: BridgeStep) -> Self {
        self.state.lock().fail_at = Some(step);
        self
    }

    /// Steps invoked so far, in order
    pub fn calls(&self) -> Vec<BridgeStep> {
        self.state.lock().calls.clone()
    }

    fn record(&self, step: BridgeStep) -> Result<String> {
        let mut state = self.state.lock();
        state.calls.push(step);

        if state.fail_at == Some(step) {
            return Err(BridgeError::StepFailed {
                step,
                message: "injected failure".to_string(),
            });
        }

        state.counter += 1;
        let digest = Sha256::digest(state.counter.to_le_bytes());
        let reference = format!("0x{}", hex::encode(&digest[..16]));
        debug!(?step, reference, "mock bridge step complete");
        Ok(reference)
    }
}

#[async_trait]
impl BridgeProvider for MockBridge {
    async fn transfer(&self, _chain: Chain, _recipient: &str, _amount: Amount) -> Result<String> {
        self.record(BridgeStep::Transfer)
    }

    async fn approve(&self, _chain: Chain, _amount: Amount) -> Result<String> {
        self.record(BridgeStep::Approve)
    }

    async fn burn(
        &self,
        _chain: Chain,
        _amount: Amount,
        _destination_domain: u32,
    ) -> Result<String> {
        self.record(BridgeStep::Burn)
    }

    async fn fetch_attestation(&self, _burn_ref: &str) -> Result<String> {
        self.record(BridgeStep::Attestation)
    }

    async fn mint(
        &self,
        _chain: Chain,
        _attestation: &str,
        _recipient: &str,
        _amount: Amount,
    ) -> Result<String> {
        self.record(BridgeStep::Mint)
    }
}
