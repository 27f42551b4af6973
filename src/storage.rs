//! Storage abstraction for custody records
//!
//! Trait-based persistence boundary: the core hands over opaque hex-encoded
//! blobs and plain metadata, and never issues queries itself. An in-memory
//! implementation covers tests, demos and single-instance deployments; a
//! PostgreSQL implementation lives in `postgres_storage`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Public wallet metadata produced by the external ledger-key library.
///
/// Stored verbatim next to the wrapped signing key; nothing in it is secret
/// and nothing in it is derived here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletMetadata {
    /// Wallet public key, hex-encoded
    pub public_key_hex: String,
    /// Wallet key hash, hex-encoded
    pub key_hash: String,
    pub address_mainnet: String,
    pub address_preprod: String,
    pub address_preview: String,
}

/// Network addresses for a stored wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAddresses {
    pub mainnet: String,
    pub preprod: String,
    pub preview: String,
}

/// A persisted customer identity
///
/// `wrapped_private_key` and `wrapped_revocation` are hex-encoded envelope
/// JSON, sealed to the operation tier; `public_key` and `revocation_digest`
/// are plain hex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub user_id: String,
    pub label: String,
    pub contact: String,
    pub public_key: String,
    pub wrapped_private_key: String,
    pub wrapped_revocation: String,
    pub revocation_digest: String,
    pub created_at: DateTime<Utc>,
}

impl IdentityRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: &str,
        label: &str,
        contact: &str,
        public_key: String,
        wrapped_private_key: String,
        wrapped_revocation: String,
        revocation_digest: String,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            label: label.to_string(),
            contact: contact.to_string(),
            public_key,
            wrapped_private_key,
            wrapped_revocation,
            revocation_digest,
            created_at: Utc::now(),
        }
    }
}

/// A persisted protected wallet secret
///
/// `wrapped_secret` is hex-encoded envelope JSON, sealed to the customer and
/// backup tiers; the remaining columns are the wallet's public metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    pub user_id: String,
    pub wrapped_secret: String,
    pub public_key_hex: String,
    pub key_hash: String,
    pub address_mainnet: String,
    pub address_preprod: String,
    pub address_preview: String,
    pub created_at: DateTime<Utc>,
}

impl WalletRecord {
    pub fn new(user_id: &str, wrapped_secret: String, metadata: WalletMetadata) -> Self {
        Self {
            user_id: user_id.to_string(),
            wrapped_secret,
            public_key_hex: metadata.public_key_hex,
            key_hash: metadata.key_hash,
            address_mainnet: metadata.address_mainnet,
            address_preprod: metadata.address_preprod,
            address_preview: metadata.address_preview,
            created_at: Utc::now(),
        }
    }

    pub fn addresses(&self) -> WalletAddresses {
        WalletAddresses {
            mainnet: self.address_mainnet.clone(),
            preprod: self.address_preprod.clone(),
            preview: self.address_preview.clone(),
        }
    }
}

/// Storage trait for the custody persistence boundary
pub trait CustodyStore: Send + Sync {
    /// Persist a customer identity record, returning the new record id
    fn save_identity_record(&self, record: IdentityRecord) -> Result<Uuid>;

    /// Persist a protected wallet secret, returning the new record id
    fn save_wallet_record(&self, record: WalletRecord) -> Result<Uuid>;

    /// Fetch a customer's wrapped private key (hex-encoded envelope JSON)
    fn get_wrapped_private_key(&self, user_id: &str) -> Result<Option<String>>;

    /// Fetch a customer's wrapped wallet secret (hex-encoded envelope JSON)
    fn get_wrapped_secret(&self, user_id: &str) -> Result<Option<String>>;

    /// Fetch a customer's wallet addresses
    fn get_wallet_addresses(&self, user_id: &str) -> Result<Option<WalletAddresses>>;

    /// Fetch the full identity record for a user
    fn get_identity_record(&self, user_id: &str) -> Result<Option<IdentityRecord>>;
}

/// In-memory implementation of CustodyStore
///
/// Suitable for development, testing, and single-instance deployments. Data
/// is lost when the process terminates.
pub struct InMemoryStore {
    identities: RwLock<HashMap<String, (Uuid, IdentityRecord)>>,
    wallets: RwLock<HashMap<String, (Uuid, WalletRecord)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            identities: RwLock::new(HashMap::new()),
            wallets: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CustodyStore for InMemoryStore {
    fn save_identity_record(&self, record: IdentityRecord) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let mut identities = self.identities.write();
        identities.insert(record.user_id.clone(), (id, record));
        Ok(id)
    }

    fn save_wallet_record(&self, record: WalletRecord) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let mut wallets = self.wallets.write();
        wallets.insert(record.user_id.clone(), (id, record));
        Ok(id)
    }

    fn get_wrapped_private_key(&self, user_id: &str) -> Result<Option<String>> {
        let identities = self.identities.read();
        Ok(identities
            .get(user_id)
            .map(|(_, r)| r.wrapped_private_key.clone()))
    }

    fn get_wrapped_secret(&self, user_id: &str) -> Result<Option<String>> {
        let wallets = self.wallets.read();
        Ok(wallets.get(user_id).map(|(_, r)| r.wrapped_secret.clone()))
    }

    fn get_wallet_addresses(&self, user_id: &str) -> Result<Option<WalletAddresses>> {
        let wallets = self.wallets.read();
        Ok(wallets.get(user_id).map(|(_, r)| r.addresses()))
    }

    fn get_identity_record(&self, user_id: &str) -> Result<Option<IdentityRecord>> {
        let identities = self.identities.read();
        Ok(identities.get(user_id).map(|(_, r)| r.clone()))
    }
}
