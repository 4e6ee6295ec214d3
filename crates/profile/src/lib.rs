//! PayStream Profile
//!
//! The profile-lookup collaborator: resolves a human-readable name into a
//! payout record before session creation. Records live as flat key-value
//! text entries under `paystream.*` keys, so any name service that stores
//! string records can back the lookup; this crate only parses and
//! validates, it does not talk to a resolver.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use paystream_core::{Address, Chain};

/// Text record keys for a PayStream profile
pub mod record_keys {
    /// Hourly rate in USDC
    pub const RATE: &str = "paystream.rate";
    /// Comma-separated services
    pub const SERVICES: &str = "paystream.services";
    /// Preferred settlement chain
    pub const CHAIN: &str = "paystream.chain";
    /// Payout wallet address
    pub const WALLET: &str = "paystream.wallet";
    /// Short bio
    pub const BIO: &str = "paystream.bio";
    /// "true" or "false"
    pub const AVAILABLE: &str = "paystream.available";
}

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Profile not found: {0}")]
    NotFound(String),

    #[error("Invalid profile record: {0}")]
    InvalidRecord(String),
}

pub type Result<T> = std::result::Result<T, ProfileError>;

/// A resolved payee profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub name: String,
    pub address: Address,
    /// Hourly rate in whole USDC
    pub rate: u64,
    pub services: Vec<String>,
    pub preferred_chain: Chain,
    /// Where settlements should land; defaults to the resolved address
    pub payout_address: Address,
    pub bio: String,
    pub available: bool,
}

impl ProfileRecord {
    /// Parse a profile from flat text records.
    ///
    /// Missing keys fall back: rate 0, empty services, Polygon chain,
    /// payout to the resolved address, unavailable.
    pub fn from_records(
        name: &str,
        address: &str,
        records: &HashMap<String, String>,
    ) -> Self {
        let services = records
            .get(record_keys::SERVICES)
            .map(|raw| parse_services(raw))
            .unwrap_or_default();

        let preferred_chain = records
            .get(record_keys::CHAIN)
            .and_then(|key| Chain::from_key(key))
            .unwrap_or_default();

        let rate = records
            .get(record_keys::RATE)
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .unwrap_or(0);

        Self {
            name: name.to_string(),
            address: address.to_string(),
            rate,
            services,
            preferred_chain,
            payout_address: records
                .get(record_keys::WALLET)
                .cloned()
                .unwrap_or_else(|| address.to_string()),
            bio: records.get(record_keys::BIO).cloned().unwrap_or_default(),
            available: records
                .get(record_keys::AVAILABLE)
                .map(|v| v == "true")
                .unwrap_or(false),
        }
    }

    /// Serialize back to flat text records; empty fields are omitted.
    pub fn to_records(&self) -> HashMap<String, String> {
        let mut records = HashMap::new();
        if self.rate > 0 {
            records.insert(record_keys::RATE.to_string(), self.rate.to_string());
        }
        if !self.services.is_empty() {
            records.insert(
                record_keys::SERVICES.to_string(),
                self.services.join(", "),
            );
        }
        records.insert(
            record_keys::CHAIN.to_string(),
            self.preferred_chain.key().to_string(),
        );
        records.insert(
            record_keys::WALLET.to_string(),
            self.payout_address.clone(),
        );
        if !self.bio.is_empty() {
            records.insert(record_keys::BIO.to_string(), self.bio.clone());
        }
        records.insert(
            record_keys::AVAILABLE.to_string(),
            self.available.to_string(),
        );
        records
    }

    /// Whether the record carries the minimum a payer needs
    pub fn is_complete(&self) -> bool {
        self.rate > 0 && !self.services.is_empty() && !self.payout_address.is_empty()
    }
}

/// Split a comma-separated services record
pub fn parse_services(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Validate a profile name: non-empty dotted labels of lowercase ASCII
/// alphanumerics and hyphens.
pub fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || !name.contains('.') {
        return false;
    }
    name.split('.').all(|label| {
        !label.is_empty()
            && label
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    })
}

/// Profile-lookup collaborator contract
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn lookup(&self, name: &str) -> Result<ProfileRecord>;
}

/// In-memory directory for tests and the demo CLI
#[derive(Debug, Default)]
pub struct StaticDirectory {
    entries: HashMap<String, ProfileRecord>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: ProfileRecord) {
        self.entries.insert(record.name.clone(), record);
    }
}

#[async_trait]
impl ProfileLookup for StaticDirectory {
    async fn lookup(&self, name: &str) -> Result<ProfileRecord> {
        debug!(%name, "profile lookup");
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))
    }
}
