use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use paystream_core::{
    unix_now, Address, Allocation, Amount, Chain, Payment, PaymentStatus, PayStreamConfig,
    Session, SessionStatus, SettlementRequest, SettlementResult,
};
use paystream_coordinator::{
    seal, AppDefinition, CoordinatorLink, CoordinatorMessage, LinkState, LinkStatus,
    OutboundRequest,
};
use paystream_ledger::{Reconciliation, SessionLedger, SettleGate};
use paystream_profile::{ProfileLookup, ProfileRecord};
use paystream_settlement::{BridgeProvider, SettlementDispatcher};
use paystream_signer::MessageSigner;

use crate::history::PaymentHistory;
use crate::{EngineError, Result};

/// Engine event queue depth per subscriber
const EVENT_QUEUE: usize = 64;

/// Where a closed session settles to
#[derive(Debug, Clone)]
pub struct SettlementTarget {
    pub chain: Chain,
    /// Defaults to the session payee when absent
    pub recipient: Option<Address>,
}

impl From<Chain> for SettlementTarget {
    fn from(chain: Chain) -> Self {
        Self {
            chain,
            recipient: None,
        }
    }
}

/// Events surfaced to the UI collaborator
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Session moved from pending to active
    SessionActive { session_id: String },
    /// Allocations changed (optimistic apply or reconciliation)
    BalanceUpdated {
        session_id: String,
        allocations: Vec<Allocation>,
    },
    /// Coordinator disagreed with the optimistic figure; its figure won
    Desync {
        session_id: String,
        local: Amount,
        remote: Amount,
    },
    /// A payment was applied and recorded
    PaymentConfirmed(Payment),
    /// Counterparty payment notice relayed by the coordinator
    PaymentNotice {
        session_id: String,
        amount: Amount,
        sender: Address,
    },
    /// Settlement succeeded; session terminal
    SessionSettled {
        session_id: String,
        result: SettlementResult,
    },
    /// Settlement failed; session terminal, funds pending operator action
    SessionFailed {
        session_id: String,
        result: SettlementResult,
    },
    /// Coordinator-side error, surfaced without touching ledger state
    CoordinatorError { message: String },
}

/// The payment session engine. One instance per client identity,
/// explicitly owned by whatever scope drives it.
pub struct PaymentEngine<S: MessageSigner, B: BridgeProvider> {
    identity: Address,
    config: PayStreamConfig,
    signer: Arc<S>,
    link: CoordinatorLink,
    ledger: Arc<SessionLedger>,
    history: PaymentHistory,
    dispatcher: SettlementDispatcher<B>,
    events: broadcast::Sender<EngineEvent>,
    pump_started: AtomicBool,
}

impl<S: MessageSigner, B: BridgeProvider> PaymentEngine<S, B> {
    pub fn new(identity: Address, signer: S, config: PayStreamConfig, bridge: B) -> Self {
        let link = CoordinatorLink::new(config.coordinator.clone());
        let dispatcher = SettlementDispatcher::new(config.settlement.source_chain, bridge);
        let (events, _) = broadcast::channel(EVENT_QUEUE);

        Self {
            identity,
            config,
            signer: Arc::new(signer),
            link,
            ledger: Arc::new(SessionLedger::new()),
            history: PaymentHistory::new(),
            dispatcher,
            events,
            pump_started: AtomicBool::new(false),
        }
    }

    /// Connect to the coordinator (or fall into degraded local-only mode)
    /// and start the inbound reconciliation pump.
    pub async fn connect(&self) -> LinkStatus {
        let status = self.link.connect(&self.identity, self.signer.as_ref()).await;
        if !self.pump_started.swap(true, Ordering::SeqCst) {
            self.spawn_pump();
        }
        status
    }

    /// Whether the engine is running without a live coordinator
    pub fn simulated(&self) -> bool {
        self.link.is_degraded()
    }

    /// The coordinator link (tests script inbound traffic through it)
    pub fn link(&self) -> &CoordinatorLink {
        &self.link
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Subscribe to engine events. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Advisory settlement duration for a target chain
    pub fn settlement_estimate(&self, target: Chain) -> &'static str {
        self.dispatcher.estimate(target)
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.link.is_degraded() || self.link.state() == LinkState::Connected {
            Ok(())
        } else {
            Err(EngineError::NotConnected)
        }
    }

    fn spawn_pump(&self) {
        let mut inbound = self.link.subscribe();
        let ledger = Arc::clone(&self.ledger);
        let events = self.events.clone();

        tokio::spawn(async move {
            loop {
                match inbound.recv().await {
                    Ok(message) => handle_message(&ledger, &events, message),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "engine lagged behind coordinator stream");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Open a two-party session funded by this client.
    ///
    /// Degraded mode activates the session immediately (there is no
    /// handshake to await); connected mode returns it pending until the
    /// coordinator acknowledges with `session_created`.
    pub async fn create_session(&self, payee: &str, deposit: Amount) -> Result<Session> {
        self.ensure_ready()?;
        if deposit == 0 {
            return Err(EngineError::InvalidAmount(
                "deposit must be positive".to_string(),
            ));
        }

        if self.simulated() {
            let session = self
                .ledger
                .create(self.identity.clone(), payee.to_string(), deposit);
            let session = self.ledger.set_status(&session.id, SessionStatus::Active)?;
            info!(session = %session.id, deposit, "session created (local-only)");
            let _ = self.events.send(EngineEvent::SessionActive {
                session_id: session.id.clone(),
            });
            return Ok(session);
        }

        // Seal the session-open request before touching the ledger, so a
        // signer rejection leaves no orphan record behind.
        let allocations = vec![
            Allocation {
                participant: self.identity.clone(),
                asset: paystream_core::USDC_ASSET.to_string(),
                amount: deposit,
            },
            Allocation {
                participant: payee.to_string(),
                asset: paystream_core::USDC_ASSET.to_string(),
                amount: 0,
            },
        ];
        let definition = AppDefinition {
            protocol: self.config.session.protocol.clone(),
            participants: [self.identity.clone(), payee.to_string()],
            weights: self.config.session.weights,
            quorum: self.config.session.quorum,
            challenge: self.config.session.challenge,
            nonce: unix_now(),
        };
        let envelope = seal(
            self.signer.as_ref(),
            OutboundRequest::SessionOpen {
                definition,
                allocations,
            },
        )
        .await?;

        let session = self
            .ledger
            .create(self.identity.clone(), payee.to_string(), deposit);
        self.link.send(envelope.to_text());
        info!(session = %session.id, deposit, "session-open sent; awaiting coordinator ack");

        Ok(session)
    }

    /// Resolve a human-readable counterparty through the profile
    /// collaborator, then open a session against its payout address.
    pub async fn create_session_for<L>(
        &self,
        lookup: &L,
        name: &str,
        deposit: Amount,
    ) -> Result<(Session, ProfileRecord)>
    where
        L: ProfileLookup + ?Sized,
    {
        let profile = lookup.lookup(name).await?;
        let session = self.create_session(&profile.payout_address, deposit).await?;
        Ok((session, profile))
    }

    /// Instant transfer to the session's other participant.
    ///
    /// The optimistic ledger apply happens before any network
    /// confirmation is awaited (perceived instancy is the point), and
    /// the local balance check makes overdraw impossible even if the
    /// transmit later turns out to have failed silently. In connected
    /// mode the payload is signed before the apply, so a signer rejection
    /// surfaces with the ledger untouched.
    pub async fn send_payment(&self, session_id: &str, amount: Amount) -> Result<Payment> {
        self.ensure_ready()?;
        if amount == 0 {
            return Err(EngineError::InvalidAmount(
                "payment must be positive".to_string(),
            ));
        }

        let session = self.ledger.get(session_id)?;
        if !session.status.can_transfer() {
            return Err(EngineError::SessionNotActive {
                id: session_id.to_string(),
                status: session.status,
            });
        }
        let recipient = session
            .counterparty_of(&self.identity)
            .ok_or_else(|| EngineError::NotParticipant {
                session: session_id.to_string(),
            })?
            .clone();

        let payment_id = format!("payment_{}", Uuid::new_v4().simple());
        let envelope = if self.simulated() {
            None
        } else {
            Some(
                seal(
                    self.signer.as_ref(),
                    OutboundRequest::Payment {
                        id: payment_id.clone(),
                        session_id: session_id.to_string(),
                        amount,
                        recipient: recipient.clone(),
                        timestamp: unix_now(),
                    },
                )
                .await?,
            )
        };

        let snapshot = self
            .ledger
            .apply_transfer(session_id, amount, &self.identity, &recipient)?;

        match envelope {
            Some(envelope) => self.link.send(envelope.to_text()),
            // Keep the event contract alive without a coordinator: the
            // pump sees the same balance_update a live link would relay.
            None => self.link.publish_local(CoordinatorMessage::BalanceUpdate {
                session_id: session_id.to_string(),
                amount: snapshot.allocations[1].amount,
                sender: Some(self.identity.clone()),
            }),
        }

        let payment = Payment {
            id: payment_id,
            session_id: session_id.to_string(),
            from: self.identity.clone(),
            to: recipient,
            amount,
            timestamp: unix_now(),
            status: PaymentStatus::Confirmed,
        };
        self.history.append(payment.clone());
        info!(payment = %payment.id, session = session_id, amount, "payment confirmed");

        let _ = self
            .events
            .send(EngineEvent::PaymentConfirmed(payment.clone()));
        let _ = self.events.send(EngineEvent::BalanceUpdated {
            session_id: session_id.to_string(),
            allocations: snapshot.allocations,
        });

        Ok(payment)
    }

    /// Close a session and settle its payee allocation to the target.
    ///
    /// Idempotent: a session already settling or terminal returns its
    /// current state without re-dispatching settlement. The transition to
    /// `Settling` freezes the allocation before the dispatcher sees it;
    /// payments racing past that point are rejected by the ledger.
    pub async fn close_session(
        &self,
        session_id: &str,
        target: SettlementTarget,
    ) -> Result<Session> {
        self.ensure_ready()?;

        let session = self.ledger.get(session_id)?;
        if session.status == SessionStatus::Pending && !self.simulated() {
            // Never acknowledged by the coordinator; nothing to close yet
            return Err(EngineError::SessionNotActive {
                id: session_id.to_string(),
                status: session.status,
            });
        }

        let frozen = match self.ledger.begin_settling(session_id)? {
            SettleGate::Started(session) => session,
            SettleGate::AlreadySettling(session) | SettleGate::AlreadyTerminal(session) => {
                debug!(session = session_id, status = %session.status, "close is a no-op");
                return Ok(session);
            }
        };

        if !self.simulated() {
            let payload = OutboundRequest::SessionClose {
                session_id: session_id.to_string(),
                allocations: frozen.allocations.clone(),
            };
            // The close notice is advisory; settlement is the real action.
            match seal(self.signer.as_ref(), payload).await {
                Ok(envelope) => self.link.send(envelope.to_text()),
                Err(err) => {
                    warn!(session = session_id, %err, "close request signing failed; settling anyway")
                }
            }
        }

        let payout = frozen
            .allocation_of(frozen.payee())
            .map(|a| a.amount)
            .unwrap_or(0);
        let recipient = target
            .recipient
            .unwrap_or_else(|| frozen.payee().clone());
        info!(
            session = session_id,
            amount = payout,
            chain = %target.chain,
            "session closing; dispatching settlement"
        );

        let result = self
            .dispatcher
            .settle(SettlementRequest {
                session_id: session_id.to_string(),
                target_chain: target.chain,
                recipient,
                amount: payout,
            })
            .await;

        self.ledger.record_settlement(session_id, result.clone())?;

        let final_session = if result.success {
            self.history.mark_settled(session_id);
            let session = self.ledger.set_status(session_id, SessionStatus::Settled)?;
            info!(session = session_id, "session settled");
            let _ = self.events.send(EngineEvent::SessionSettled {
                session_id: session_id.to_string(),
                result,
            });
            session
        } else {
            let session = self.ledger.set_status(session_id, SessionStatus::Failed)?;
            warn!(
                session = session_id,
                error = result.error.as_deref().unwrap_or("unknown"),
                "settlement failed; funds stranded pending operator action"
            );
            let _ = self.events.send(EngineEvent::SessionFailed {
                session_id: session_id.to_string(),
                result,
            });
            session
        };

        Ok(final_session)
    }

    // ==================== Reads ====================

    pub fn session(&self, session_id: &str) -> Result<Session> {
        Ok(self.ledger.get(session_id)?)
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.ledger.sessions()
    }

    /// Per-participant allocations; pure read
    pub fn balance(&self, session_id: &str) -> Result<Vec<Allocation>> {
        Ok(self.ledger.balance_of(session_id)?)
    }

    /// Payments recorded against a session, in append order
    pub fn payments(&self, session_id: &str) -> Vec<Payment> {
        self.history.for_session(session_id)
    }
}

/// Apply one inbound coordinator message to local state.
///
/// `session_created` advances pending sessions; `balance_update` is
/// authoritative and reconciles the optimistic figure; `error` is
/// surfaced without altering ledger state.
fn handle_message(
    ledger: &SessionLedger,
    events: &broadcast::Sender<EngineEvent>,
    message: CoordinatorMessage,
) {
    match message {
        CoordinatorMessage::SessionCreated { session_id } => {
            match ledger.set_status(&session_id, SessionStatus::Active) {
                Ok(_) => {
                    debug!(session = %session_id, "coordinator ack; session active");
                    let _ = events.send(EngineEvent::SessionActive { session_id });
                }
                Err(err) => debug!(session = %session_id, %err, "session ack not applicable"),
            }
        }
        CoordinatorMessage::BalanceUpdate {
            session_id, amount, ..
        } => match ledger.reconcile_balance(&session_id, amount) {
            Ok(Reconciliation::Corrected { previous }) => {
                let _ = events.send(EngineEvent::Desync {
                    session_id: session_id.clone(),
                    local: previous,
                    remote: amount,
                });
                if let Ok(allocations) = ledger.balance_of(&session_id) {
                    let _ = events.send(EngineEvent::BalanceUpdated {
                        session_id,
                        allocations,
                    });
                }
            }
            Ok(Reconciliation::Unchanged) => {
                if let Ok(allocations) = ledger.balance_of(&session_id) {
                    let _ = events.send(EngineEvent::BalanceUpdated {
                        session_id,
                        allocations,
                    });
                }
            }
            Ok(Reconciliation::Ignored { status }) => {
                debug!(session = %session_id, %status, "balance update ignored");
            }
            Err(err) => debug!(session = %session_id, %err, "balance update for unknown session"),
        },
        CoordinatorMessage::Payment {
            session_id,
            amount,
            sender,
        } => {
            let _ = events.send(EngineEvent::PaymentNotice {
                session_id,
                amount,
                sender,
            });
        }
        CoordinatorMessage::Error { message } => {
            warn!(%message, "coordinator reported error");
            let _ = events.send(EngineEvent::CoordinatorError { message });
        }
        CoordinatorMessage::SessionMessage { session_id, .. } => {
            debug!(session = %session_id, "session message relayed");
        }
    }
}
