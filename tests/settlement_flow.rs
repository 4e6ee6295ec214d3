//! Integration tests for the settlement dispatcher
//!
//! Covers the same-chain shortcut, the fixed cross-chain pipeline, and
//! partial-failure reference reporting.

use paystream_core::{BridgeStep, Chain, SettlementRequest};
use paystream_settlement::{MockBridge, SettlementDispatcher};

// =============================================================================
// HELPERS
// =============================================================================

fn request(target: Chain, amount: u64) -> SettlementRequest {
    SettlementRequest {
        session_id: "session_settle".into(),
        target_chain: target,
        recipient: "0xrecipient".into(),
        amount,
    }
}

// =============================================================================
// 1. Same-chain shortcut: no bridging steps invoked
// =============================================================================

#[tokio::test]
async fn test_same_chain_settlement_skips_bridge() {
    let dispatcher = SettlementDispatcher::new(Chain::Sepolia, MockBridge::new());

    let result = dispatcher.settle(request(Chain::Sepolia, 40)).await;

    assert!(result.success);
    let calls = dispatcher.bridge().calls();
    assert_eq!(calls, vec![BridgeStep::Transfer]);
    assert!(!calls.contains(&BridgeStep::Burn));
    assert!(!calls.contains(&BridgeStep::Mint));
}

// =============================================================================
// 2. Cross-chain pipeline order
// =============================================================================

#[tokio::test]
async fn test_cross_chain_pipeline_fixed_order() {
    let dispatcher = SettlementDispatcher::new(Chain::Sepolia, MockBridge::new());

    let result = dispatcher.settle(request(Chain::Arbitrum, 75)).await;

    assert!(result.success);
    assert_eq!(
        dispatcher.bridge().calls(),
        vec![
            BridgeStep::Approve,
            BridgeStep::Burn,
            BridgeStep::Attestation,
            BridgeStep::Mint,
        ]
    );

    // source_ref is the burn, destination_ref the mint
    let burn = result
        .steps
        .iter()
        .find(|s| s.step == BridgeStep::Burn)
        .unwrap();
    let mint = result
        .steps
        .iter()
        .find(|s| s.step == BridgeStep::Mint)
        .unwrap();
    assert_eq!(result.source_ref.as_deref(), Some(burn.reference.as_str()));
    assert_eq!(
        result.destination_ref.as_deref(),
        Some(mint.reference.as_str())
    );
}

// =============================================================================
// 3. Partial failure keeps obtained references
// =============================================================================

#[tokio::test]
async fn test_mint_failure_reports_burn_reference() {
    let dispatcher = SettlementDispatcher::new(
        Chain::Sepolia,
        MockBridge::new().fail_at(BridgeStep::Mint),
    );

    let result = dispatcher.settle(request(Chain::Base, 10)).await;

    assert!(!result.success);
    assert!(result.error.is_some());
    assert!(result.source_ref.is_some());
    assert!(result.destination_ref.is_none());

    let recorded: Vec<BridgeStep> = result.steps.iter().map(|s| s.step).collect();
    assert_eq!(
        recorded,
        vec![BridgeStep::Approve, BridgeStep::Burn, BridgeStep::Attestation]
    );
}

#[tokio::test]
async fn test_attestation_failure_stops_before_mint() {
    let dispatcher = SettlementDispatcher::new(
        Chain::Sepolia,
        MockBridge::new().fail_at(BridgeStep::Attestation),
    );

    let result = dispatcher.settle(request(Chain::Polygon, 10)).await;

    assert!(!result.success);
    // Mint was never attempted
    assert!(!dispatcher.bridge().calls().contains(&BridgeStep::Mint));
    // Burn completed, so its reference survives for operator replay
    assert!(result.source_ref.is_some());
}

// =============================================================================
// 4. Result is serializable (retained on session records)
// =============================================================================

#[tokio::test]
async fn test_result_roundtrips_through_json() {
    let dispatcher = SettlementDispatcher::new(Chain::Sepolia, MockBridge::new());
    let result = dispatcher.settle(request(Chain::Polygon, 5)).await;

    let json = serde_json::to_string(&result).unwrap();
    let restored: paystream_core::SettlementResult = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.success, result.success);
    assert_eq!(restored.source_ref, result.source_ref);
    assert_eq!(restored.steps, result.steps);
}
