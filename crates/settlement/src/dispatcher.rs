use tracing::{info, warn};

use paystream_core::{
    BridgeStep, Chain, SettlementRequest, SettlementResult, StepRecord,
};

use crate::bridge::BridgeProvider;

/// Takes a closed session's final allocation and drives settlement to the
/// target chain, producing a terminal [`SettlementResult`].
pub struct SettlementDispatcher<B: BridgeProvider> {
    source_chain: Chain,
    bridge: B,
}

impl<B: BridgeProvider> SettlementDispatcher<B> {
    pub fn new(source_chain: Chain, bridge: B) -> Self {
        Self {
            source_chain,
            bridge,
        }
    }

    pub fn source_chain(&self) -> Chain {
        self.source_chain
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    /// Advisory duration for UX display. Never consulted to decide
    /// success or failure; completion is result driven.
    pub fn estimate(&self, target: Chain) -> &'static str {
        Chain::bridge_estimate(self.source_chain, target)
    }

    /// Settle a request. Same-chain targets short-circuit to a direct
    /// transfer; cross-chain targets run the fixed approve → burn →
    /// attestation → mint pipeline. Failures are captured in the result
    /// together with every step reference obtained before the failure.
    pub async fn settle(&self, request: SettlementRequest) -> SettlementResult {
        if request.target_chain == self.source_chain {
            return self.settle_direct(&request).await;
        }
        self.settle_bridged(&request).await
    }

    async fn settle_direct(&self, request: &SettlementRequest) -> SettlementResult {
        info!(
            session = %request.session_id,
            chain = %request.target_chain,
            amount = request.amount,
            "same-chain settlement"
        );

        match self
            .bridge
            .transfer(self.source_chain, &request.recipient, request.amount)
            .await
        {
            Ok(reference) => SettlementResult {
                success: true,
                source_ref: Some(reference.clone()),
                destination_ref: None,
                error: None,
                steps: vec![StepRecord {
                    step: BridgeStep::Transfer,
                    reference,
                }],
            },
            Err(err) => {
                warn!(session = %request.session_id, %err, "direct settlement failed");
                SettlementResult {
                    success: false,
                    source_ref: None,
                    destination_ref: None,
                    error: Some(err.to_string()),
                    steps: vec![],
                }
            }
        }
    }

    async fn settle_bridged(&self, request: &SettlementRequest) -> SettlementResult {
        info!(
            session = %request.session_id,
            source = %self.source_chain,
            target = %request.target_chain,
            amount = request.amount,
            "cross-chain settlement"
        );

        let mut steps: Vec<StepRecord> = Vec::with_capacity(4);

        let approve_ref = match self.bridge.approve(self.source_chain, request.amount).await {
            Ok(r) => r,
            Err(e) => return fail(steps, e.to_string(), &request.session_id),
        };
        steps.push(StepRecord {
            step: BridgeStep::Approve,
            reference: approve_ref,
        });

        let burn_ref = match self
            .bridge
            .burn(
                self.source_chain,
                request.amount,
                request.target_chain.cctp_domain(),
            )
            .await
        {
            Ok(r) => r,
            Err(e) => return fail(steps, e.to_string(), &request.session_id),
        };
        steps.push(StepRecord {
            step: BridgeStep::Burn,
            reference: burn_ref.clone(),
        });

        let attestation = match self.bridge.fetch_attestation(&burn_ref).await {
            Ok(r) => r,
            Err(e) => return fail(steps, e.to_string(), &request.session_id),
        };
        steps.push(StepRecord {
            step: BridgeStep::Attestation,
            reference: attestation.clone(),
        });

        let mint_ref = match self
            .bridge
            .mint(
                request.target_chain,
                &attestation,
                &request.recipient,
                request.amount,
            )
            .await
        {
            Ok(r) => r,
            Err(e) => return fail(steps, e.to_string(), &request.session_id),
        };
        steps.push(StepRecord {
            step: BridgeStep::Mint,
            reference: mint_ref.clone(),
        });

        info!(
            session = %request.session_id,
            burn = %burn_ref,
            mint = %mint_ref,
            "settlement complete"
        );

        SettlementResult {
            success: true,
            source_ref: Some(burn_ref),
            destination_ref: Some(mint_ref),
            error: None,
            steps,
        }
    }
}

/// Terminal failure result carrying every reference obtained before the
/// failing step. The burn reference doubles as `source_ref` so operators
/// can replay the mint side.
fn fail(steps: Vec<StepRecord>, error: String, session: &str) -> SettlementResult {
    warn!(session, error = %error, "settlement pipeline failed");
    let source_ref = steps
        .iter()
        .find(|s| s.step == BridgeStep::Burn)
        .map(|s| s.reference.clone());
    SettlementResult {
        success: false,
        source_ref,
        destination_ref: None,
        error: Some(error),
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MockBridge;

    fn request(target: Chain) -> SettlementRequest {
        SettlementRequest {
            session_id: "session_t".into(),
            target_chain: target,
            recipient: "0xrecipient".into(),
            amount: 40_000_000,
        }
    }

    #[tokio::test]
    async fn test_same_chain_short_circuit() {
        let dispatcher = SettlementDispatcher::new(Chain::Sepolia, MockBridge::new());
        let result = dispatcher.settle(request(Chain::Sepolia)).await;

        assert!(result.success);
        assert!(result.source_ref.is_some());
        assert!(result.destination_ref.is_none());
        // Only the direct transfer ran; no bridging step was invoked
        assert_eq!(dispatcher.bridge().calls(), vec![BridgeStep::Transfer]);
    }

    #[tokio::test]
    async fn test_cross_chain_full_pipeline() {
        let dispatcher = SettlementDispatcher::new(Chain::Sepolia, MockBridge::new());
        let result = dispatcher.settle(request(Chain::Polygon)).await;

        assert!(result.success);
        assert!(result.source_ref.is_some());
        assert!(result.destination_ref.is_some());
        assert_eq!(
            dispatcher.bridge().calls(),
            vec![
                BridgeStep::Approve,
                BridgeStep::Burn,
                BridgeStep::Attestation,
                BridgeStep::Mint,
            ]
        );
        assert_eq!(result.steps.len(), 4);
    }

    #[tokio::test]
    async fn test_partial_failure_carries_burn_reference() {
        let bridge = MockBridge::new().fail_at(BridgeStep::Mint);
        let dispatcher = SettlementDispatcher::new(Chain::Sepolia, bridge);
        let result = dispatcher.settle(request(Chain::Base)).await;

        assert!(!result.success);
        assert!(result.error.is_some());
        // Burn happened: its reference must survive for operator replay
        assert!(result.source_ref.is_some());
        assert!(result.destination_ref.is_none());
        assert_eq!(result.steps.len(), 3); // approve, burn, attestation
    }

    #[tokio::test]
    async fn test_early_failure_has_no_references() {
        let bridge = MockBridge::new().fail_at(BridgeStep::Approve);
        let dispatcher = SettlementDispatcher::new(Chain::Sepolia, bridge);
        let result = dispatcher.settle(request(Chain::Base)).await;

        assert!(!result.success);
        assert!(result.source_ref.is_none());
        assert!(result.steps.is_empty());
    }

    #[tokio::test]
    async fn test_estimate_is_advisory_string() {
        let dispatcher = SettlementDispatcher::new(Chain::Sepolia, MockBridge::new());
        assert_eq!(dispatcher.estimate(Chain::ArcTestnet), "< 1 minute");
        assert_eq!(dispatcher.estimate(Chain::Polygon), "10-20 minutes");
    }
}
