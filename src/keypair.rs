//! Identity key-pair generation with composite-passphrase locking
//!
//! An identity is an X25519 key pair plus a revocation token. The private
//! scalar never leaves this module unencrypted: it is locked under a key
//! derived from a composite passphrase assembled from up to three
//! independently-held shares, and only materializes inside [`unlock`] for the
//! duration of a single call.

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use x25519_dalek::{PublicKey as XPublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::{self, AesGcmCipher, EncryptedData, KdfParams, SALT_SIZE};
use crate::error::{CustodyError, Result};

/// Format version written into every locked private key
const LOCKED_KEY_VERSION: u16 = 1;

/// AAD binding a locked blob to its role as private-key material
const PRIVATE_KEY_AAD: &[u8] = b"custody-vault/private-key";

/// Ordered passphrase shares
///
/// The composite passphrase is the concatenation of the three slots in fixed
/// field order; empty slots contribute nothing. The same slots, in the same
/// order, must be supplied at unlock time; there is no partial-match
/// recovery, and the struct fields (not call-site convention) carry the
/// ordering contract.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct PassphraseShares {
    /// Primary secret, held by the key owner (e.g. a customer PIN)
    pub pin: String,
    /// Service-wide secret, held by the running environment
    pub service_secret: String,
    /// Per-identity secret, held in an external record store
    pub external_salt: String,
}

impl PassphraseShares {
    pub fn new(pin: &str, service_secret: &str, external_salt: &str) -> Self {
        Self {
            pin: pin.to_string(),
            service_secret: service_secret.to_string(),
            external_salt: external_salt.to_string(),
        }
    }

    /// A single-share set, filling only the primary slot (operation and
    /// backup identities use this form).
    pub fn single(secret: &str) -> Self {
        Self {
            pin: secret.to_string(),
            service_secret: String::new(),
            external_salt: String::new(),
        }
    }

    /// An empty share set. The resulting private key is locked with an empty
    /// passphrase, acceptable only for identities whose custody relies on
    /// physical control of the key material itself.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Concatenate the shares in fixed order into the composite passphrase.
    pub(crate) fn composite(&self) -> Zeroizing<Vec<u8>> {
        let mut passphrase =
            Vec::with_capacity(self.pin.len() + self.service_secret.len() + self.external_salt.len());
        passphrase.extend_from_slice(self.pin.as_bytes());
        passphrase.extend_from_slice(self.service_secret.as_bytes());
        passphrase.extend_from_slice(self.external_salt.as_bytes());
        Zeroizing::new(passphrase)
    }
}

impl std::fmt::Debug for PassphraseShares {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PassphraseShares([REDACTED])")
    }
}

/// X25519 public key, safe to store and share
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    bytes: [u8; 32],
}

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Parse a hex-encoded public key.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| CustodyError::InvalidKey(format!("Invalid hex: {}", e)))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CustodyError::InvalidKey("Public key must be 32 bytes".to_string()))?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Short identifier for log lines; not a security boundary.
    pub fn fingerprint(&self) -> String {
        hex::encode(&crypto::sha256(&self.bytes)[..4])
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A private key at rest: always encrypted, self-describing
///
/// Carries everything needed to re-derive the lock key (salt, Argon2id cost
/// parameters, format version) so no external metadata is required to unlock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockedPrivateKey {
    pub version: u16,
    pub salt: [u8; SALT_SIZE],
    pub kdf: KdfParams,
    pub key_ct: EncryptedData,
}

impl LockedPrivateKey {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| CustodyError::Generation(format!("Serialization error: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| CustodyError::MalformedEnvelope(format!("Locked key parse error: {}", e)))
    }
}

/// An unlocked private key, alive only for the scope of one operation
///
/// The inner scalar zeroizes on drop; this type is never serialized and never
/// stored.
pub struct UnlockedKey {
    secret: StaticSecret,
}

impl UnlockedKey {
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_bytes(*XPublicKey::from(&self.secret).as_bytes())
    }

    pub(crate) fn secret(&self) -> &StaticSecret {
        &self.secret
    }
}

impl std::fmt::Debug for UnlockedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UnlockedKey([REDACTED])")
    }
}

/// An asymmetric identity: public key, locked private key, revocation token
#[derive(Debug, Clone)]
pub struct Identity {
    /// Human-readable name, not security-relevant
    pub label: String,
    /// Human-readable contact, not security-relevant
    pub contact: String,
    pub public_key: PublicKey,
    pub private_key: LockedPrivateKey,
    /// Out-of-band invalidation proof, hex-encoded; store independently of
    /// `private_key`
    pub revocation_token: String,
    /// SHA-256 digest of `revocation_token`; travels with the public record
    pub revocation_digest: [u8; 32],
}

/// Generate a fresh identity locked under the composite passphrase.
///
/// Fresh randomness every call: two invocations with identical inputs yield
/// unrelated key pairs. Nothing is persisted; the caller decides what to do
/// with the result.
pub fn generate(label: &str, contact: &str, shares: &PassphraseShares) -> Result<Identity> {
    if label.is_empty() {
        return Err(CustodyError::Generation("Label must not be empty".to_string()));
    }
    if contact.is_empty() {
        return Err(CustodyError::Generation("Contact must not be empty".to_string()));
    }

    let (secret, public) = crypto::generate_keypair();

    let salt: [u8; SALT_SIZE] = crypto::random_bytes();
    let kdf = KdfParams::default();
    let lock_key = crypto::derive_lock_key(&shares.composite(), &salt, &kdf)?;

    let mut secret_bytes = secret.to_bytes();
    let key_ct = AesGcmCipher::encrypt(&lock_key, &secret_bytes, PRIVATE_KEY_AAD)?;
    secret_bytes.zeroize();

    let token: [u8; 32] = crypto::random_bytes();
    let revocation_token = hex::encode(token);
    let revocation_digest = crypto::sha256(revocation_token.as_bytes());

    Ok(Identity {
        label: label.to_string(),
        contact: contact.to_string(),
        public_key: PublicKey::from_bytes(*public.as_bytes()),
        private_key: LockedPrivateKey {
            version: LOCKED_KEY_VERSION,
            salt,
            kdf,
            key_ct,
        },
        revocation_token,
        revocation_digest,
    })
}

/// Unlock a private key with its composite passphrase shares.
///
/// Any mismatch (wrong share, missing share, shares in the wrong slots)
/// fails with [`CustodyError::Unlock`] and no further detail.
pub fn unlock(locked: &LockedPrivateKey, shares: &PassphraseShares) -> Result<UnlockedKey> {
    if locked.version != LOCKED_KEY_VERSION {
        return Err(CustodyError::Generation(format!(
            "Unsupported locked key version: {}",
            locked.version
        )));
    }

    let lock_key = crypto::derive_lock_key(&shares.composite(), &locked.salt, &locked.kdf)?;

    let key_bytes = Zeroizing::new(
        AesGcmCipher::decrypt(&lock_key, &locked.key_ct, PRIVATE_KEY_AAD)
            .map_err(|_| CustodyError::Unlock)?,
    );

    let scalar: [u8; 32] = key_bytes
        .as_slice()
        .try_into()
        .map_err(|_| CustodyError::Unlock)?;

    Ok(UnlockedKey {
        secret: StaticSecret::from(scalar),
    })
}

/// Constant-time check of a presented revocation token against a stored
/// digest.
pub fn revocation_matches(digest: &[u8; 32], presented: &str) -> bool {
    let presented_digest = crypto::sha256(presented.as_bytes());
    bool::from(presented_digest.ct_eq(digest))
}
