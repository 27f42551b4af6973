//! Service configuration
//!
//! Everything the orchestrator needs from the environment, loaded once at
//! process start into an immutable struct. Nothing here is re-read
//! mid-operation.
//!
//! Expected variables:
//! - `OPERATION_PUBLIC_KEY`: hex-encoded X25519 public key
//! - `OPERATION_PRIVATE_KEY`: hex-encoded locked-key JSON
//! - `OPERATION_PASSPHRASE`: the single operation-tier passphrase share
//! - `BACKUP_PUBLIC_KEY`: hex-encoded X25519 public key (cold storage
//!   holds the private half)
//! - `PASSPHRASE_SALT`: service-wide share of every customer
//!   composite passphrase

use crate::encoding;
use crate::error::{CustodyError, Result};
use crate::keypair::{LockedPrivateKey, PublicKey};

/// Immutable orchestrator configuration
#[derive(Clone)]
pub struct CustodyConfig {
    /// Operation-tier public key: sole recipient of stored customer private
    /// keys
    pub operation_public: PublicKey,
    /// Operation-tier private key, locked under `operation_passphrase`
    pub operation_private: LockedPrivateKey,
    /// The one share locking the operation private key
    pub operation_passphrase: String,
    /// Backup-tier public key: co-recipient of every wallet secret
    pub backup_public: PublicKey,
    /// Service-wide share of every customer composite passphrase
    pub passphrase_salt: String,
}

impl CustodyConfig {
    /// Build a config from already-parsed values, validating the parts the
    /// protocol depends on.
    pub fn new(
        operation_public: PublicKey,
        operation_private: LockedPrivateKey,
        operation_passphrase: String,
        backup_public: PublicKey,
        passphrase_salt: String,
    ) -> Result<Self> {
        if operation_passphrase.is_empty() {
            return Err(CustodyError::Config(
                "OPERATION_PASSPHRASE must not be empty".to_string(),
            ));
        }
        if passphrase_salt.is_empty() {
            return Err(CustodyError::Config(
                "PASSPHRASE_SALT must not be empty".to_string(),
            ));
        }
        Ok(Self {
            operation_public,
            operation_private,
            operation_passphrase,
            backup_public,
            passphrase_salt,
        })
    }

    /// Load the configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let operation_public = PublicKey::from_hex(&require_var("OPERATION_PUBLIC_KEY")?)
            .map_err(|e| CustodyError::Config(format!("OPERATION_PUBLIC_KEY: {}", e)))?;

        let private_json = encoding::hex_to_string(&require_var("OPERATION_PRIVATE_KEY")?)
            .map_err(|e| CustodyError::Config(format!("OPERATION_PRIVATE_KEY: {}", e)))?;
        let operation_private = LockedPrivateKey::from_json(&private_json)
            .map_err(|e| CustodyError::Config(format!("OPERATION_PRIVATE_KEY: {}", e)))?;

        let backup_public = PublicKey::from_hex(&require_var("BACKUP_PUBLIC_KEY")?)
            .map_err(|e| CustodyError::Config(format!("BACKUP_PUBLIC_KEY: {}", e)))?;

        Self::new(
            operation_public,
            operation_private,
            require_var("OPERATION_PASSPHRASE")?,
            backup_public,
            require_var("PASSPHRASE_SALT")?,
        )
    }
}

impl std::fmt::Debug for CustodyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustodyConfig")
            .field("operation_public", &self.operation_public.fingerprint())
            .field("backup_public", &self.backup_public.fingerprint())
            .field("operation_passphrase", &"[REDACTED]")
            .field("passphrase_salt", &"[REDACTED]")
            .finish()
    }
}

fn require_var(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| CustodyError::Config(format!("{} not set", name)))
}
