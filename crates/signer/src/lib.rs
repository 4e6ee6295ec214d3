//! PayStream Signer
//!
//! Wraps a wallet's message-signing capability into a single async
//! contract the engine and coordinator link consume. A rejection is final
//! for that call; callers retry only by re-invoking with a fresh message.
//!
//! Ships [`LocalSigner`], an in-process ed25519 key for environments
//! without a browser wallet (CLI, tests). It signs the SHA-256 digest of
//! the message and returns a 0x-prefixed hex signature the coordinator can
//! verify against the derived address.

use async_trait::async_trait;
use ed25519_dalek::{Signer as _, SigningKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SignerError {
    #[error("No signing wallet available")]
    Unavailable,

    #[error("Signature request rejected: {0}")]
    Rejected(String),

    #[error("Signing failed: {0}")]
    Signing(String),
}

pub type Result<T> = std::result::Result<T, SignerError>;

/// Message-signing seam between the engine and whatever holds the key.
#[async_trait]
pub trait MessageSigner: Send + Sync {
    /// Sign an arbitrary message, producing a signature the coordinator
    /// can verify. No retries: a rejection is final for this call.
    async fn sign(&self, message: &str) -> Result<String>;

    /// Address the produced signatures verify against
    fn address(&self) -> &str;
}

/// In-process ed25519 signer
pub struct LocalSigner {
    key: SigningKey,
    address: String,
}

impl LocalSigner {
    /// Generate a fresh random key
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Construct from a 32-byte ed25519 secret key
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(secret))
    }

    fn from_signing_key(key: SigningKey) -> Self {
        let address = format!("0x{}", hex::encode(key.verifying_key().to_bytes()));
        Self { key, address }
    }

    /// The verifying key bytes for this signer
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MessageSigner for LocalSigner {
    async fn sign(&self, message: &str) -> Result<String> {
        let digest = Sha256::digest(message.as_bytes());
        let signature = self.key.sign(&digest);
        debug!(address = %self.address, bytes = message.len(), "signed message");
        Ok(format!("0x{}", hex::encode(signature.to_bytes())))
    }

    fn address(&self) -> &str {
        &self.address
    }
}
