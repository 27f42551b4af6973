//! Custody orchestrator: the three-tier layering protocol
//!
//! Three identity tiers with distinct share policies:
//!
//! - **operation**: one share, held by the running service. Sole recipient
//!   of every customer private key placed in storage.
//! - **backup**: zero or one shares, held in cold storage. Co-recipient of
//!   every wallet secret, so a lost customer passphrase does not lose the
//!   wallet.
//! - **customer**: up to three shares (customer PIN, service-wide secret,
//!   per-customer salt from an external directory). No single party holds
//!   all three.
//!
//! Wallet secrets are sealed to {customer, backup}; the customer's own
//! private key is sealed to {operation} only. Recovery always unwraps the
//! customer key first (via the operation identity), then the wallet secret
//! (via the recovered customer key and the reassembled customer passphrase).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;
use zeroize::Zeroizing;

use crate::config::CustodyConfig;
use crate::encoding;
use crate::envelope::{self, Envelope};
use crate::error::{CustodyError, Result};
use crate::keypair::{self, PassphraseShares, PublicKey};
use crate::storage::{IdentityRecord, WalletMetadata, WalletRecord};

/// External per-customer salt store
///
/// The third customer share lives outside the vault service, next to the
/// user's account data. The orchestrator consults it before every
/// customer-tier lock or unlock; it never caches the result.
pub trait SaltDirectory: Send + Sync {
    /// Fetch the per-customer passphrase salt; `None` when no record exists.
    fn passphrase_salt(&self, user_id: &str) -> Result<Option<String>>;
}

/// In-memory salt directory for tests, demos and single-instance deployments
pub struct InMemorySaltDirectory {
    salts: RwLock<HashMap<String, String>>,
}

impl InMemorySaltDirectory {
    pub fn new() -> Self {
        Self {
            salts: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, user_id: &str, salt: &str) {
        let mut salts = self.salts.write();
        salts.insert(user_id.to_string(), salt.to_string());
    }
}

impl Default for InMemorySaltDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl SaltDirectory for InMemorySaltDirectory {
    fn passphrase_salt(&self, user_id: &str) -> Result<Option<String>> {
        let salts = self.salts.read();
        Ok(salts.get(user_id).cloned())
    }
}

/// Everything the external layer persists after a customer enrollment
///
/// The customer's private key and revocation token leave this struct only
/// sealed to the operation tier; the cleartext token is not returned.
#[derive(Debug, Clone)]
pub struct CustomerEnrollment {
    pub user_id: String,
    pub label: String,
    pub contact: String,
    pub public_key: PublicKey,
    /// Customer locked private key, sealed to {operation}
    pub wrapped_private_key: Envelope,
    /// Customer revocation token, sealed to {operation}
    pub wrapped_revocation: Envelope,
    pub revocation_digest: [u8; 32],
}

impl CustomerEnrollment {
    /// Flatten into the hex-encoded record the persistence layer stores.
    pub fn to_record(&self) -> Result<IdentityRecord> {
        Ok(IdentityRecord::new(
            &self.user_id,
            &self.label,
            &self.contact,
            self.public_key.to_hex(),
            encoding::string_to_hex(&self.wrapped_private_key.to_json()?),
            encoding::string_to_hex(&self.wrapped_revocation.to_json()?),
            hex::encode(self.revocation_digest),
        ))
    }
}

/// A wallet secret sealed for storage, with its public metadata
#[derive(Debug, Clone)]
pub struct ProtectedSecret {
    pub user_id: String,
    /// Wallet signing key, sealed to {customer, backup}
    pub envelope: Envelope,
    pub metadata: WalletMetadata,
}

impl ProtectedSecret {
    /// Flatten into the hex-encoded record the persistence layer stores.
    pub fn to_record(&self) -> Result<WalletRecord> {
        Ok(WalletRecord::new(
            &self.user_id,
            encoding::string_to_hex(&self.envelope.to_json()?),
            self.metadata.clone(),
        ))
    }
}

/// The protocol-level composition of generate / seal / open
///
/// Holds the immutable service configuration and the salt-directory handle.
/// Every method is an independent unit: no shared mutable state, no cache of
/// unlocked key material, safe to call concurrently.
pub struct CustodyService<D: SaltDirectory> {
    config: CustodyConfig,
    salts: Arc<D>,
}

impl<D: SaltDirectory> CustodyService<D> {
    pub fn new(config: CustodyConfig, salts: Arc<D>) -> Self {
        Self { config, salts }
    }

    pub fn config(&self) -> &CustodyConfig {
        &self.config
    }

    /// Generate a customer identity and seal its private material to the
    /// operation tier.
    ///
    /// The customer composite passphrase is `(pin, service secret, external
    /// salt)`; the salt lookup happens first and its unavailability surfaces
    /// as `DependencyUnavailable`, never as a failed unlock.
    pub fn enroll_customer(
        &self,
        user_id: &str,
        label: &str,
        contact: &str,
        pin: &str,
    ) -> Result<CustomerEnrollment> {
        let shares = self.customer_shares(user_id, pin)?;

        let identity = keypair::generate(label, contact, &shares)?;

        let locked_json = identity.private_key.to_json()?;
        let wrapped_private_key =
            envelope::seal(locked_json.as_bytes(), &[self.config.operation_public])?;
        let wrapped_revocation = envelope::seal(
            identity.revocation_token.as_bytes(),
            &[self.config.operation_public],
        )?;

        info!(
            user_id,
            key = %identity.public_key.fingerprint(),
            "enrolled customer identity"
        );

        Ok(CustomerEnrollment {
            user_id: user_id.to_string(),
            label: identity.label,
            contact: identity.contact,
            public_key: identity.public_key,
            wrapped_private_key,
            wrapped_revocation,
            revocation_digest: identity.revocation_digest,
        })
    }

    /// Seal a wallet signing key for storage.
    ///
    /// Recipients are exactly {customer, backup}: the customer key covers
    /// day-to-day recovery, the backup key covers disaster recovery from
    /// cold storage.
    pub fn protect_wallet_secret(
        &self,
        user_id: &str,
        customer_public: &PublicKey,
        wallet_secret: &[u8],
        metadata: WalletMetadata,
    ) -> Result<ProtectedSecret> {
        let envelope = envelope::seal(
            wallet_secret,
            &[*customer_public, self.config.backup_public],
        )?;

        info!(
            user_id,
            customer = %customer_public.fingerprint(),
            backup = %self.config.backup_public.fingerprint(),
            "sealed wallet secret"
        );

        Ok(ProtectedSecret {
            user_id: user_id.to_string(),
            envelope,
            metadata,
        })
    }

    /// Recover a wallet secret through the customer path.
    ///
    /// Two unwraps, strictly ordered: (a) the operation identity opens the
    /// stored customer-key envelope, (b) the recovered customer key plus the
    /// full three-share passphrase opens the wallet envelope. The customer
    /// private key exists only between those two steps, in memory. Any
    /// failure in (a) is fatal to this path; the backup path requires
    /// cold-storage material and is deliberately not reachable from here.
    pub fn recover_wallet_secret(
        &self,
        user_id: &str,
        wrapped_customer_key: &Envelope,
        wrapped_secret: &Envelope,
        pin: &str,
    ) -> Result<Zeroizing<Vec<u8>>> {
        // Resolve external dependencies before touching any ciphertext, so
        // "store unreachable" is never reported as a bad passphrase.
        let shares = self.customer_shares(user_id, pin)?;

        let operation_shares = PassphraseShares::single(&self.config.operation_passphrase);
        let locked_bytes = envelope::open(
            wrapped_customer_key,
            &self.config.operation_private,
            &operation_shares,
        )?;

        let locked_json = std::str::from_utf8(&locked_bytes).map_err(|_| {
            CustodyError::MalformedEnvelope("Customer key payload is not UTF-8".to_string())
        })?;
        let customer_key = keypair::LockedPrivateKey::from_json(locked_json)?;

        let secret = envelope::open(wrapped_secret, &customer_key, &shares)?;

        info!(user_id, "recovered wallet secret via customer path");
        Ok(secret)
    }

    /// Open a stored revocation-token envelope with the operation identity
    /// (operator-side invalidation flow).
    pub fn recover_revocation_token(&self, wrapped_revocation: &Envelope) -> Result<String> {
        let operation_shares = PassphraseShares::single(&self.config.operation_passphrase);
        let token_bytes = envelope::open(
            wrapped_revocation,
            &self.config.operation_private,
            &operation_shares,
        )?;

        String::from_utf8(token_bytes.to_vec()).map_err(|_| {
            CustodyError::MalformedEnvelope("Revocation payload is not UTF-8".to_string())
        })
    }

    /// Assemble the customer's composite passphrase shares, consulting the
    /// external salt directory.
    fn customer_shares(&self, user_id: &str, pin: &str) -> Result<PassphraseShares> {
        let salt = self
            .salts
            .passphrase_salt(user_id)
            .map_err(|e| CustodyError::DependencyUnavailable(format!("Salt directory: {}", e)))?
            .ok_or_else(|| {
                CustodyError::DependencyUnavailable(format!(
                    "No passphrase salt on record for user {}",
                    user_id
                ))
            })?;

        Ok(PassphraseShares::new(
            pin,
            &self.config.passphrase_salt,
            &salt,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::generate;

    const OPERATION_PASSPHRASE: &str = "this_secret_seals_customer_keys_in_the_database";
    const SERVICE_SALT: &str = "service_wide_secret_from_the_vault_environment";
    const USER_SALT: &str = "per_user_salt_held_in_the_external_account_store";
    const WALLET_SECRET: &[u8] = b"ed25519-sk-demo";

    struct Fixture {
        service: CustodyService<InMemorySaltDirectory>,
        backup: crate::keypair::Identity,
    }

    fn fixture() -> Fixture {
        let operation = generate(
            "operation",
            "operation@vault.example",
            &PassphraseShares::single(OPERATION_PASSPHRASE),
        )
        .unwrap();
        let backup = generate(
            "backup",
            "backup@vault.example",
            &PassphraseShares::single("cold_storage_only_secret"),
        )
        .unwrap();

        let config = CustodyConfig::new(
            operation.public_key,
            operation.private_key.clone(),
            OPERATION_PASSPHRASE.to_string(),
            backup.public_key,
            SERVICE_SALT.to_string(),
        )
        .unwrap();

        let salts = Arc::new(InMemorySaltDirectory::new());
        salts.insert("user-1", USER_SALT);

        Fixture {
            service: CustodyService::new(config, salts),
            backup,
        }
    }

    fn wallet_metadata() -> WalletMetadata {
        WalletMetadata {
            public_key_hex: "bb".repeat(32),
            key_hash: "dd".repeat(28),
            address_mainnet: "addr1qxy".to_string(),
            address_preprod: "addr_test1qpp".to_string(),
            address_preview: "addr_test1qpv".to_string(),
        }
    }

    #[test]
    fn test_layering_integrity() {
        let fx = fixture();

        let enrollment = fx
            .service
            .enroll_customer("user-1", "tommy", "tommy@vault.example", "123456")
            .unwrap();
        let protected = fx
            .service
            .protect_wallet_secret(
                "user-1",
                &enrollment.public_key,
                WALLET_SECRET,
                wallet_metadata(),
            )
            .unwrap();

        let recovered = fx
            .service
            .recover_wallet_secret(
                "user-1",
                &enrollment.wrapped_private_key,
                &protected.envelope,
                "123456",
            )
            .unwrap();

        assert_eq!(recovered.as_slice(), WALLET_SECRET);
    }

    #[test]
    fn test_recipient_sets_match_protocol() {
        let fx = fixture();

        let enrollment = fx
            .service
            .enroll_customer("user-1", "tommy", "tommy@vault.example", "123456")
            .unwrap();
        let protected = fx
            .service
            .protect_wallet_secret(
                "user-1",
                &enrollment.public_key,
                WALLET_SECRET,
                wallet_metadata(),
            )
            .unwrap();

        // Customer private key: operation tier only
        assert_eq!(
            enrollment.wrapped_private_key.recipient_keys(),
            vec![fx.service.config().operation_public]
        );
        // Wallet secret: customer + backup, nothing else
        assert_eq!(
            protected.envelope.recipient_keys(),
            vec![enrollment.public_key, fx.service.config().backup_public]
        );
    }

    #[test]
    fn test_backup_path_recovers_without_customer() {
        let fx = fixture();

        let enrollment = fx
            .service
            .enroll_customer("user-1", "tommy", "tommy@vault.example", "123456")
            .unwrap();
        let protected = fx
            .service
            .protect_wallet_secret(
                "user-1",
                &enrollment.public_key,
                WALLET_SECRET,
                wallet_metadata(),
            )
            .unwrap();

        // Cold-storage flow: backup private key and its passphrase, no
        // customer identity involved.
        let recovered = envelope::open(
            &protected.envelope,
            &fx.backup.private_key,
            &PassphraseShares::single("cold_storage_only_secret"),
        )
        .unwrap();

        assert_eq!(recovered.as_slice(), WALLET_SECRET);
    }

    #[test]
    fn test_wrong_pin_is_unlock_error() {
        let fx = fixture();

        let enrollment = fx
            .service
            .enroll_customer("user-1", "tommy", "tommy@vault.example", "123456")
            .unwrap();
        let protected = fx
            .service
            .protect_wallet_secret(
                "user-1",
                &enrollment.public_key,
                WALLET_SECRET,
                wallet_metadata(),
            )
            .unwrap();

        let result = fx.service.recover_wallet_secret(
            "user-1",
            &enrollment.wrapped_private_key,
            &protected.envelope,
            "999999",
        );
        assert!(matches!(result, Err(CustodyError::Unlock)));
    }

    #[test]
    fn test_missing_salt_is_dependency_error() {
        let fx = fixture();

        // user-2 has no salt record anywhere
        let result = fx
            .service
            .enroll_customer("user-2", "ghost", "ghost@vault.example", "123456");
        assert!(matches!(result, Err(CustodyError::DependencyUnavailable(_))));

        let enrollment = fx
            .service
            .enroll_customer("user-1", "tommy", "tommy@vault.example", "123456")
            .unwrap();
        let protected = fx
            .service
            .protect_wallet_secret(
                "user-1",
                &enrollment.public_key,
                WALLET_SECRET,
                wallet_metadata(),
            )
            .unwrap();

        let result = fx.service.recover_wallet_secret(
            "user-2",
            &enrollment.wrapped_private_key,
            &protected.envelope,
            "123456",
        );
        assert!(matches!(result, Err(CustodyError::DependencyUnavailable(_))));
    }

    #[test]
    fn test_revocation_token_roundtrip() {
        let fx = fixture();

        let enrollment = fx
            .service
            .enroll_customer("user-1", "tommy", "tommy@vault.example", "123456")
            .unwrap();

        let token = fx
            .service
            .recover_revocation_token(&enrollment.wrapped_revocation)
            .unwrap();

        assert!(keypair::revocation_matches(
            &enrollment.revocation_digest,
            &token
        ));
    }

    #[test]
    fn test_records_roundtrip_through_hex() {
        let fx = fixture();

        let enrollment = fx
            .service
            .enroll_customer("user-1", "tommy", "tommy@vault.example", "123456")
            .unwrap();
        let protected = fx
            .service
            .protect_wallet_secret(
                "user-1",
                &enrollment.public_key,
                WALLET_SECRET,
                wallet_metadata(),
            )
            .unwrap();

        // What goes to storage comes back as the same envelopes.
        let identity_record = enrollment.to_record().unwrap();
        let wallet_record = protected.to_record().unwrap();

        let wrapped_key = Envelope::from_json(
            &encoding::hex_to_string(&identity_record.wrapped_private_key).unwrap(),
        )
        .unwrap();
        let wrapped_secret =
            Envelope::from_json(&encoding::hex_to_string(&wallet_record.wrapped_secret).unwrap())
                .unwrap();

        let recovered = fx
            .service
            .recover_wallet_secret("user-1", &wrapped_key, &wrapped_secret, "123456")
            .unwrap();
        assert_eq!(recovered.as_slice(), WALLET_SECRET);
    }
}
