use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chain::Chain;

/// Participant address (0x-prefixed hex, lowercase)
pub type Address = String;

/// Amount in the asset's smallest units (USDC: 6 decimals)
pub type Amount = u64;

/// The only asset sessions currently carry
pub const USDC_ASSET: &str = "usdc";

/// Current Unix timestamp in seconds
pub fn unix_now() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Lifecycle state of a payment session.
///
/// Transitions are monotonic along `Pending → Active → Settling →
/// {Settled | Failed}`. There is no backward transition, and `Settled`
/// and `Failed` never convert into each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created locally, awaiting coordinator acknowledgement
    Pending,
    /// Open for instant transfers
    Active,
    /// Close requested, allocations frozen, settlement in flight
    Settling,
    /// Settlement completed, funds moved on-chain
    Settled,
    /// Settlement failed, funds stranded pending operator action
    Failed,
}

impl SessionStatus {
    /// Whether instant transfers may be applied in this state
    pub fn can_transfer(&self) -> bool {
        matches!(self, SessionStatus::Pending | SessionStatus::Active)
    }

    /// Whether this state admits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Settled | SessionStatus::Failed)
    }

    /// Position along the monotonic lifecycle. `Settled` and `Failed`
    /// share the terminal rank so neither can reach the other.
    fn rank(&self) -> u8 {
        match self {
            SessionStatus::Pending => 0,
            SessionStatus::Active => 1,
            SessionStatus::Settling => 2,
            SessionStatus::Settled | SessionStatus::Failed => 3,
        }
    }

    /// Whether `next` is a legal forward transition from this state
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        next.rank() > self.rank()
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Active => "active",
            SessionStatus::Settling => "settling",
            SessionStatus::Settled => "settled",
            SessionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A participant's claim on a session's funds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub participant: Address,
    pub asset: String,
    pub amount: Amount,
}

/// A two-party off-chain payment session.
///
/// `participants[0]` is the payer, `participants[1]` the payee; the
/// allocations vector is index-aligned with the participants. The sum of
/// allocations is invariant across transfers; only settlement moves funds
/// out of session scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub participants: [Address; 2],
    pub allocations: Vec<Allocation>,
    pub status: SessionStatus,
    pub created_at: u64,
    /// Terminal settlement outcome, retained on the record for inspection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement: Option<SettlementResult>,
}

impl Session {
    /// Create a new pending session funded entirely by the payer
    pub fn new(payer: Address, payee: Address, deposit: Amount) -> Self {
        let allocations = vec![
            Allocation {
                participant: payer.clone(),
                asset: USDC_ASSET.to_string(),
                amount: deposit,
            },
            Allocation {
                participant: payee.clone(),
                asset: USDC_ASSET.to_string(),
                amount: 0,
            },
        ];

        Self {
            id: format!("session_{}", Uuid::new_v4().simple()),
            participants: [payer, payee],
            allocations,
            status: SessionStatus::Pending,
            created_at: unix_now(),
            settlement: None,
        }
    }

    pub fn payer(&self) -> &Address {
        &self.participants[0]
    }

    pub fn payee(&self) -> &Address {
        &self.participants[1]
    }

    /// Total funds in session scope (the conserved quantity)
    pub fn total(&self) -> Amount {
        self.allocations.iter().map(|a| a.amount).sum()
    }

    pub fn allocation_of(&self, participant: &str) -> Option<&Allocation> {
        self.allocations.iter().find(|a| a.participant == participant)
    }

    /// The other participant of a two-party session
    pub fn counterparty_of(&self, participant: &str) -> Option<&Address> {
        if self.participants[0] == participant {
            Some(&self.participants[1])
        } else if self.participants[1] == participant {
            Some(&self.participants[0])
        } else {
            None
        }
    }
}

/// Status of an instant payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Built but not yet applied
    Pending,
    /// Applied to the session ledger
    Confirmed,
    /// The owning session has settled on-chain
    Settled,
}

/// An instant transfer inside a session. Append-only ledger entry:
/// once confirmed it is immutable except for the settled mark applied
/// when the session closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub session_id: String,
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
    pub timestamp: u64,
    pub status: PaymentStatus,
}

impl Payment {
    pub fn confirmed(session_id: &str, from: Address, to: Address, amount: Amount) -> Self {
        Self {
            id: format!("payment_{}", Uuid::new_v4().simple()),
            session_id: session_id.to_string(),
            from,
            to,
            amount,
            timestamp: unix_now(),
            status: PaymentStatus::Confirmed,
        }
    }
}

/// Bridge pipeline step identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeStep {
    /// Same-chain direct payout (no bridging)
    Transfer,
    Approve,
    Burn,
    Attestation,
    Mint,
}

/// Reference obtained from a completed bridge step (tx hash or
/// attestation id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: BridgeStep,
    pub reference: String,
}

/// Request handed to the settlement dispatcher when a session closes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub session_id: String,
    pub target_chain: Chain,
    pub recipient: Address,
    pub amount: Amount,
}

/// Terminal, immutable outcome of a settlement attempt.
///
/// On partial failure (e.g. burn succeeded, mint did not) `steps` retains
/// every reference obtained before the failing step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== SessionStatus Tests ====================

    #[test]
    fn test_status_transfer_states() {
        assert!(SessionStatus::Pending.can_transfer());
        assert!(SessionStatus::Active.can_transfer());
        assert!(!SessionStatus::Settling.can_transfer());
        assert!(!SessionStatus::Settled.can_transfer());
        assert!(!SessionStatus::Failed.can_transfer());
    }

    #[test]
    fn test_status_forward_transitions() {
        assert!(SessionStatus::Pending.can_transition_to(SessionStatus::Active));
        assert!(SessionStatus::Active.can_transition_to(SessionStatus::Settling));
        assert!(SessionStatus::Settling.can_transition_to(SessionStatus::Settled));
        assert!(SessionStatus::Settling.can_transition_to(SessionStatus::Failed));
    }

    #[test]
    fn test_status_no_backward_transitions() {
        assert!(!SessionStatus::Active.can_transition_to(SessionStatus::Pending));
        assert!(!SessionStatus::Settling.can_transition_to(SessionStatus::Active));
        assert!(!SessionStatus::Settled.can_transition_to(SessionStatus::Settling));
        assert!(!SessionStatus::Failed.can_transition_to(SessionStatus::Pending));
    }

    #[test]
    fn test_status_terminal_states_never_convert() {
        assert!(!SessionStatus::Settled.can_transition_to(SessionStatus::Failed));
        assert!(!SessionStatus::Failed.can_transition_to(SessionStatus::Settled));
        assert!(SessionStatus::Settled.is_terminal());
        assert!(SessionStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_self_transition_illegal() {
        for status in [
            SessionStatus::Pending,
            SessionStatus::Active,
            SessionStatus::Settling,
            SessionStatus::Settled,
            SessionStatus::Failed,
        ] {
            assert!(!status.can_transition_to(status));
        }
    }

    // ==================== Session Tests ====================

    #[test]
    fn test_new_session_shape() {
        let session = Session::new("0xaaaa".into(), "0xbbbb".into(), 100_000_000);

        assert!(session.id.starts_with("session_"));
        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.participants.len(), session.allocations.len());
        assert_eq!(session.allocations[0].amount, 100_000_000);
        assert_eq!(session.allocations[1].amount, 0);
        assert_eq!(session.allocations[0].asset, USDC_ASSET);
        assert!(session.settlement.is_none());
    }

    #[test]
    fn test_session_total_is_deposit() {
        let session = Session::new("0xaaaa".into(), "0xbbbb".into(), 42_000_000);
        assert_eq!(session.total(), 42_000_000);
    }

    #[test]
    fn test_session_counterparty() {
        let session = Session::new("0xaaaa".into(), "0xbbbb".into(), 1);

        assert_eq!(session.counterparty_of("0xaaaa").unwrap(), "0xbbbb");
        assert_eq!(session.counterparty_of("0xbbbb").unwrap(), "0xaaaa");
        assert!(session.counterparty_of("0xcccc").is_none());
    }

    #[test]
    fn test_session_allocation_lookup() {
        let session = Session::new("0xaaaa".into(), "0xbbbb".into(), 10);

        assert_eq!(session.allocation_of("0xaaaa").unwrap().amount, 10);
        assert_eq!(session.allocation_of("0xbbbb").unwrap().amount, 0);
        assert!(session.allocation_of("0xcccc").is_none());
    }

    #[test]
    fn test_session_ids_unique() {
        let a = Session::new("0xaaaa".into(), "0xbbbb".into(), 1);
        let b = Session::new("0xaaaa".into(), "0xbbbb".into(), 1);
        assert_ne!(a.id, b.id);
    }

    // ==================== Payment Tests ====================

    #[test]
    fn test_payment_confirmed() {
        let payment = Payment::confirmed("session_x", "0xaaaa".into(), "0xbbbb".into(), 25);

        assert!(payment.id.starts_with("payment_"));
        assert_eq!(payment.session_id, "session_x");
        assert_eq!(payment.status, PaymentStatus::Confirmed);
        assert_eq!(payment.amount, 25);
    }

    // ==================== Serialization Tests ====================

    #[test]
    fn test_session_serialization_roundtrip() {
        let session = Session::new("0xaaaa".into(), "0xbbbb".into(), 500);
        let json = serde_json::to_string(&session).unwrap();
        let restored: Session = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.id, session.id);
        assert_eq!(restored.status, session.status);
        assert_eq!(restored.allocations, session.allocations);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Settling).unwrap(),
            "\"settling\""
        );
    }

    #[test]
    fn test_settlement_result_omits_empty_fields() {
        let result = SettlementResult {
            success: true,
            source_ref: Some("0xabc".into()),
            destination_ref: None,
            error: None,
            steps: vec![],
        };
        let json = serde_json::to_string(&result).unwrap();

        assert!(json.contains("source_ref"));
        assert!(!json.contains("destination_ref"));
        assert!(!json.contains("steps"));
    }
}
