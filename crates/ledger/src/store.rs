use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, warn};

use paystream_core::{
    Address, Allocation, Amount, Session, SessionStatus, SettlementResult,
};

use crate::{LedgerError, Result};

/// Outcome of the close gate. `Started` is returned to exactly one caller
/// per session; everyone else observes the state that caller produced.
#[derive(Debug, Clone)]
pub enum SettleGate {
    /// This caller performed the transition into `Settling`
    Started(Session),
    /// Settlement already in flight
    AlreadySettling(Session),
    /// Session already reached `Settled` or `Failed`
    AlreadyTerminal(Session),
}

impl SettleGate {
    pub fn session(&self) -> &Session {
        match self {
            SettleGate::Started(s)
            | SettleGate::AlreadySettling(s)
            | SettleGate::AlreadyTerminal(s) => s,
        }
    }
}

/// Outcome of applying an authoritative coordinator balance figure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Local optimistic figure already matched
    Unchanged,
    /// Remote disagreed materially; local state was overwritten
    Corrected { previous: Amount },
    /// Session past the transfer window; update dropped
    Ignored { status: SessionStatus },
}

/// In-memory session store, keyed by session id
#[derive(Debug, Default)]
pub struct SessionLedger {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, session_id: &str) -> Result<Arc<Mutex<Session>>> {
        self.sessions
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| LedgerError::SessionNotFound(session_id.to_string()))
    }

    /// Create a pending session funded by the payer
    pub fn create(&self, payer: Address, payee: Address, deposit: Amount) -> Session {
        let session = Session::new(payer, payee, deposit);
        debug!(session = %session.id, deposit, "session created");
        self.sessions
            .write()
            .insert(session.id.clone(), Arc::new(Mutex::new(session.clone())));
        session
    }

    /// Snapshot of a session
    pub fn get(&self, session_id: &str) -> Result<Session> {
        Ok(self.handle(session_id)?.lock().clone())
    }

    /// Snapshots of every session owned by this client
    pub fn sessions(&self) -> Vec<Session> {
        self.sessions
            .read()
            .values()
            .map(|cell| cell.lock().clone())
            .collect()
    }

    /// Per-participant allocations; pure read
    pub fn balance_of(&self, session_id: &str) -> Result<Vec<Allocation>> {
        Ok(self.handle(session_id)?.lock().allocations.clone())
    }

    /// Atomically move `amount` from one participant to the other.
    ///
    /// The balance check and both allocation mutations happen under the
    /// session lock, so concurrent transfers serialize and none can pass a
    /// stale check. Conservation holds by construction: the decrement and
    /// increment are the same figure.
    pub fn apply_transfer(
        &self,
        session_id: &str,
        amount: Amount,
        from: &str,
        to: &str,
    ) -> Result<Session> {
        let cell = self.handle(session_id)?;
        let mut session = cell.lock();

        if !session.status.can_transfer() {
            return Err(LedgerError::InvalidState {
                session: session_id.to_string(),
                status: session.status,
            });
        }

        let from_idx = session
            .allocations
            .iter()
            .position(|a| a.participant == from)
            .ok_or_else(|| LedgerError::UnknownParticipant {
                session: session_id.to_string(),
                participant: from.to_string(),
            })?;
        let to_idx = session
            .allocations
            .iter()
            .position(|a| a.participant == to)
            .ok_or_else(|| LedgerError::UnknownParticipant {
                session: session_id.to_string(),
                participant: to.to_string(),
            })?;

        let available = session.allocations[from_idx].amount;
        if available < amount {
            warn!(
                session = session_id,
                requested = amount,
                available,
                "transfer rejected: insufficient balance"
            );
            return Err(LedgerError::InsufficientBalance {
                session: session_id.to_string(),
                requested: amount,
                available,
            });
        }

        session.allocations[from_idx].amount -= amount;
        session.allocations[to_idx].amount += amount;
        debug!(session = session_id, amount, from, to, "transfer applied");

        Ok(session.clone())
    }

    /// Transition a session's status, enforcing the monotonic table.
    ///
    /// Same-state calls are logged no-ops; illegal transitions are
    /// programming errors: logged at error and returned, never applied.
    pub fn set_status(&self, session_id: &str, status: SessionStatus) -> Result<Session> {
        let cell = self.handle(session_id)?;
        let mut session = cell.lock();

        if session.status == status {
            debug!(session = session_id, %status, "status unchanged");
            return Ok(session.clone());
        }
        if !session.status.can_transition_to(status) {
            error!(
                session = session_id,
                from = %session.status,
                to = %status,
                "illegal status transition rejected"
            );
            return Err(LedgerError::InvalidTransition {
                session: session_id.to_string(),
                from: session.status,
                to: status,
            });
        }

        debug!(session = session_id, from = %session.status, to = %status, "status transition");
        session.status = status;
        Ok(session.clone())
    }

    /// Compare-and-set entry into `Settling`. Exactly one caller gets
    /// `Started` for a given session; later callers observe the in-flight
    /// or terminal state instead, which is what makes close idempotent
    /// and the settlement dispatch fire at most once.
    pub fn begin_settling(&self, session_id: &str) -> Result<SettleGate> {
        let cell = self.handle(session_id)?;
        let mut session = cell.lock();

        match session.status {
            SessionStatus::Pending | SessionStatus::Active => {
                session.status = SessionStatus::Settling;
                debug!(session = session_id, "settling started");
                Ok(SettleGate::Started(session.clone()))
            }
            SessionStatus::Settling => Ok(SettleGate::AlreadySettling(session.clone())),
            SessionStatus::Settled | SessionStatus::Failed => {
                Ok(SettleGate::AlreadyTerminal(session.clone()))
            }
        }
    }

    /// Apply an authoritative payee allocation reported by the
    /// coordinator. The payer side is derived from the conserved session
    /// total, so the invariant survives the overwrite. Updates against a
    /// session at or past `Settling` are dropped: the close snapshot is
    /// frozen.
    pub fn reconcile_balance(
        &self,
        session_id: &str,
        payee_amount: Amount,
    ) -> Result<Reconciliation> {
        let cell = self.handle(session_id)?;
        let mut session = cell.lock();

        if !session.status.can_transfer() {
            warn!(
                session = session_id,
                status = %session.status,
                "late balance update ignored"
            );
            return Ok(Reconciliation::Ignored {
                status: session.status,
            });
        }

        let total = session.total();
        if payee_amount > total {
            // A remote figure exceeding session scope cannot be honored
            // without breaking conservation; treat as a desync report.
            warn!(
                session = session_id,
                payee_amount, total, "balance update exceeds session total; ignored"
            );
            return Ok(Reconciliation::Ignored {
                status: session.status,
            });
        }

        let previous = session.allocations[1].amount;
        if previous == payee_amount {
            return Ok(Reconciliation::Unchanged);
        }

        warn!(
            session = session_id,
            local = previous,
            remote = payee_amount,
            "local/remote desync: adopting coordinator figure"
        );
        session.allocations[0].amount = total - payee_amount;
        session.allocations[1].amount = payee_amount;
        Ok(Reconciliation::Corrected { previous })
    }

    /// Attach the terminal settlement outcome to the session record
    pub fn record_settlement(&self, session_id: &str, result: SettlementResult) -> Result<()> {
        let cell = self.handle(session_id)?;
        cell.lock().settlement = Some(result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with_session(deposit: Amount) -> (SessionLedger, String) {
        let ledger = SessionLedger::new();
        let session = ledger.create("0xpayer".into(), "0xpayee".into(), deposit);
        (ledger, session.id)
    }

    // ==================== Creation Tests ====================

    #[test]
    fn test_create_pending_with_deposit() {
        let (ledger, id) = ledger_with_session(100);
        let session = ledger.get(&id).unwrap();

        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.allocations[0].amount, 100);
        assert_eq!(session.allocations[1].amount, 0);
    }

    #[test]
    fn test_unknown_session() {
        let ledger = SessionLedger::new();
        assert!(matches!(
            ledger.get("session_missing"),
            Err(LedgerError::SessionNotFound(_))
        ));
        assert!(matches!(
            ledger.apply_transfer("session_missing", 1, "0xa", "0xb"),
            Err(LedgerError::SessionNotFound(_))
        ));
    }

    // ==================== Transfer Tests ====================

    #[test]
    fn test_transfer_moves_both_sides() {
        let (ledger, id) = ledger_with_session(100);
        let session = ledger.apply_transfer(&id, 30, "0xpayer", "0xpayee").unwrap();

        assert_eq!(session.allocations[0].amount, 70);
        assert_eq!(session.allocations[1].amount, 30);
        assert_eq!(session.total(), 100);
    }

    #[test]
    fn test_transfer_conservation_over_sequence() {
        let (ledger, id) = ledger_with_session(1_000);

        for amount in [1, 10, 250, 4, 99] {
            ledger.apply_transfer(&id, amount, "0xpayer", "0xpayee").unwrap();
            assert_eq!(ledger.get(&id).unwrap().total(), 1_000);
        }
    }

    #[test]
    fn test_transfer_insufficient_balance_leaves_state_untouched() {
        let (ledger, id) = ledger_with_session(100);

        let err = ledger.apply_transfer(&id, 150, "0xpayer", "0xpayee");
        assert!(matches!(
            err,
            Err(LedgerError::InsufficientBalance {
                requested: 150,
                available: 100,
                ..
            })
        ));

        let session = ledger.get(&id).unwrap();
        assert_eq!(session.allocations[0].amount, 100);
        assert_eq!(session.allocations[1].amount, 0);
    }

    #[test]
    fn test_transfer_rejected_outside_open_states() {
        let (ledger, id) = ledger_with_session(100);
        ledger.set_status(&id, SessionStatus::Active).unwrap();
        ledger.begin_settling(&id).unwrap();

        assert!(matches!(
            ledger.apply_transfer(&id, 10, "0xpayer", "0xpayee"),
            Err(LedgerError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_transfer_unknown_participant() {
        let (ledger, id) = ledger_with_session(100);
        assert!(matches!(
            ledger.apply_transfer(&id, 10, "0xintruder", "0xpayee"),
            Err(LedgerError::UnknownParticipant { .. })
        ));
    }

    #[test]
    fn test_reverse_transfer_allowed_within_balance() {
        let (ledger, id) = ledger_with_session(100);
        ledger.apply_transfer(&id, 40, "0xpayer", "0xpayee").unwrap();
        let session = ledger.apply_transfer(&id, 15, "0xpayee", "0xpayer").unwrap();

        assert_eq!(session.allocations[0].amount, 75);
        assert_eq!(session.allocations[1].amount, 25);
    }

    // ==================== Status Tests ====================

    #[test]
    fn test_status_walk_to_settled() {
        let (ledger, id) = ledger_with_session(1);

        ledger.set_status(&id, SessionStatus::Active).unwrap();
        ledger.set_status(&id, SessionStatus::Settling).unwrap();
        let session = ledger.set_status(&id, SessionStatus::Settled).unwrap();
        assert_eq!(session.status, SessionStatus::Settled);
    }

    #[test]
    fn test_status_backward_rejected() {
        let (ledger, id) = ledger_with_session(1);
        ledger.set_status(&id, SessionStatus::Active).unwrap();

        let err = ledger.set_status(&id, SessionStatus::Pending);
        assert!(matches!(err, Err(LedgerError::InvalidTransition { .. })));
        assert_eq!(ledger.get(&id).unwrap().status, SessionStatus::Active);
    }

    #[test]
    fn test_status_same_state_noop() {
        let (ledger, id) = ledger_with_session(1);
        ledger.set_status(&id, SessionStatus::Active).unwrap();
        let session = ledger.set_status(&id, SessionStatus::Active).unwrap();
        assert_eq!(session.status, SessionStatus::Active);
    }

    // ==================== Settle Gate Tests ====================

    #[test]
    fn test_begin_settling_started_once() {
        let (ledger, id) = ledger_with_session(1);
        ledger.set_status(&id, SessionStatus::Active).unwrap();

        assert!(matches!(
            ledger.begin_settling(&id).unwrap(),
            SettleGate::Started(_)
        ));
        assert!(matches!(
            ledger.begin_settling(&id).unwrap(),
            SettleGate::AlreadySettling(_)
        ));

        ledger.set_status(&id, SessionStatus::Settled).unwrap();
        assert!(matches!(
            ledger.begin_settling(&id).unwrap(),
            SettleGate::AlreadyTerminal(_)
        ));
    }

    // ==================== Reconciliation Tests ====================

    #[test]
    fn test_reconcile_unchanged_when_in_sync() {
        let (ledger, id) = ledger_with_session(100);
        ledger.apply_transfer(&id, 30, "0xpayer", "0xpayee").unwrap();

        assert_eq!(
            ledger.reconcile_balance(&id, 30).unwrap(),
            Reconciliation::Unchanged
        );
    }

    #[test]
    fn test_reconcile_corrects_and_conserves() {
        let (ledger, id) = ledger_with_session(100);
        ledger.apply_transfer(&id, 30, "0xpayer", "0xpayee").unwrap();

        let outcome = ledger.reconcile_balance(&id, 25).unwrap();
        assert_eq!(outcome, Reconciliation::Corrected { previous: 30 });

        let session = ledger.get(&id).unwrap();
        assert_eq!(session.allocations[0].amount, 75);
        assert_eq!(session.allocations[1].amount, 25);
        assert_eq!(session.total(), 100);
    }

    #[test]
    fn test_reconcile_ignored_after_settling() {
        let (ledger, id) = ledger_with_session(100);
        ledger.set_status(&id, SessionStatus::Active).unwrap();
        ledger.begin_settling(&id).unwrap();

        assert!(matches!(
            ledger.reconcile_balance(&id, 10).unwrap(),
            Reconciliation::Ignored { .. }
        ));
    }

    #[test]
    fn test_reconcile_rejects_figure_exceeding_total() {
        let (ledger, id) = ledger_with_session(100);
        assert!(matches!(
            ledger.reconcile_balance(&id, 200).unwrap(),
            Reconciliation::Ignored { .. }
        ));
        assert_eq!(ledger.get(&id).unwrap().total(), 100);
    }

    // ==================== Settlement Record Tests ====================

    #[test]
    fn test_record_settlement_retained() {
        let (ledger, id) = ledger_with_session(100);
        ledger
            .record_settlement(
                &id,
                SettlementResult {
                    success: false,
                    source_ref: Some("0xburn".into()),
                    destination_ref: None,
                    error: Some("mint failed".into()),
                    steps: vec![],
                },
            )
            .unwrap();

        let session = ledger.get(&id).unwrap();
        let outcome = session.settlement.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.source_ref.as_deref(), Some("0xburn"));
    }

    // ==================== Concurrency Tests ====================

    #[test]
    fn test_concurrent_transfers_cannot_overdraw() {
        use std::sync::Arc as StdArc;

        let ledger = StdArc::new(SessionLedger::new());
        let session = ledger.create("0xpayer".into(), "0xpayee".into(), 100);
        let id = session.id;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = StdArc::clone(&ledger);
                let id = id.clone();
                std::thread::spawn(move || {
                    let mut applied = 0u64;
                    for _ in 0..10 {
                        if ledger.apply_transfer(&id, 3, "0xpayer", "0xpayee").is_ok() {
                            applied += 3;
                        }
                    }
                    applied
                })
            })
            .collect();

        let applied: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        let session = ledger.get(&id).unwrap();

        assert_eq!(session.total(), 100);
        assert_eq!(session.allocations[1].amount, applied);
        assert!(session.allocations[1].amount <= 100);
    }
}
