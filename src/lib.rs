//! Layered key custody for wallet signing keys
//!
//! Identity key pairs are locked under composite passphrases assembled from
//! up to three independently-held shares; multi-recipient envelopes chain
//! those identities into a three-tier storage design (operation, backup,
//! customer) where no single party can recover a protected secret alone.

pub mod config;
pub mod crypto;
pub mod custody;
pub mod encoding;
pub mod envelope;
pub mod error;
pub mod keypair;
pub mod storage;

// PostgreSQL backend module
pub mod postgres_storage;

pub use config::CustodyConfig;
pub use crypto::{EncryptedData, KdfParams, SecretBytes, KEY_SIZE, NONCE_SIZE, SALT_SIZE};
pub use custody::{
    CustodyService, CustomerEnrollment, InMemorySaltDirectory, ProtectedSecret, SaltDirectory,
};
pub use encoding::{bytes_to_hex, hex_to_bytes, hex_to_string, string_to_hex};
pub use envelope::{open, seal, CipherSuite, Envelope, RecipientStanza};
pub use error::{CustodyError, Result};
pub use keypair::{
    generate, revocation_matches, unlock, Identity, LockedPrivateKey, PassphraseShares, PublicKey,
    UnlockedKey,
};
pub use storage::{
    CustodyStore, IdentityRecord, InMemoryStore, WalletAddresses, WalletMetadata, WalletRecord,
};

// PostgreSQL exports
pub use postgres_storage::PostgresStore;
