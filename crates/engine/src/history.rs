use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use paystream_core::{Payment, PaymentStatus};

/// Append-only payment history, indexed by session.
///
/// Entries are never deleted. A confirmed payment mutates only once, to
/// `Settled`, when its owning session settles on-chain.
#[derive(Debug, Default)]
pub struct PaymentHistory {
    entries: RwLock<HashMap<String, Vec<Payment>>>,
}

impl PaymentHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, payment: Payment) {
        debug!(payment = %payment.id, session = %payment.session_id, "payment recorded");
        self.entries
            .write()
            .entry(payment.session_id.clone())
            .or_default()
            .push(payment);
    }

    /// Payments for a session, in append order
    pub fn for_session(&self, session_id: &str) -> Vec<Payment> {
        self.entries
            .read()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Sum of confirmed/settled payment amounts for a session
    pub fn total_for(&self, session_id: &str) -> u64 {
        self.entries
            .read()
            .get(session_id)
            .map(|payments| payments.iter().map(|p| p.amount).sum())
            .unwrap_or(0)
    }

    /// Mark a session's confirmed payments settled
    pub fn mark_settled(&self, session_id: &str) {
        if let Some(payments) = self.entries.write().get_mut(session_id) {
            for payment in payments.iter_mut() {
                if payment.status == PaymentStatus::Confirmed {
                    payment.status = PaymentStatus::Settled;
                }
            }
        }
    }
}
