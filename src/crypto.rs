//! Cryptographic primitives for the custody protocol
//!
//! This module is the narrow primitive boundary: AES-256-GCM authenticated
//! encryption, Argon2id composite-passphrase key derivation, and X25519 key
//! agreement with HKDF-SHA256 for per-recipient content-key wrapping. The
//! rest of the crate only ever touches these helpers, so the scheme is
//! substitutable behind them.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey as XPublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CustodyError, Result};

/// AES-256 key size in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// AES-GCM nonce size in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Argon2id salt size in bytes
pub const SALT_SIZE: usize = 16;

/// Argon2id memory cost in KiB (19 MiB)
pub const ARGON2_MEMORY_KIB: u32 = 19_456;

/// Argon2id iteration count
pub const ARGON2_ITERATIONS: u32 = 2;

/// Argon2id parallelism (lanes)
pub const ARGON2_PARALLELISM: u32 = 1;

/// A secret byte container that zeroizes memory on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes {
    bytes: Vec<u8>,
}

impl SecretBytes {
    /// Wrap existing secret bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Generate a fresh random 256-bit secret
    pub fn generate() -> Self {
        let mut key = vec![0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self { bytes: key }
    }

    /// Get the secret bytes (use with caution)
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Get the secret length
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the secret is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBytes([REDACTED])")
    }
}

/// Encrypted data container with nonce and ciphertext
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EncryptedData {
    /// The nonce used for encryption (12 bytes for AES-GCM)
    pub nonce: Vec<u8>,
    /// The ciphertext including authentication tag
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Create a new EncryptedData container
    pub fn new(nonce: Vec<u8>, ciphertext: Vec<u8>) -> Self {
        Self { nonce, ciphertext }
    }
}

/// AES-256-GCM cipher wrapper
pub struct AesGcmCipher;

impl AesGcmCipher {
    /// Encrypt plaintext under a 256-bit key with a fresh random nonce.
    ///
    /// `aad` binds the ciphertext to its context (domain tag, recipient key)
    /// and must be supplied identically at decryption time.
    pub fn encrypt(key: &SecretBytes, plaintext: &[u8], aad: &[u8]) -> Result<EncryptedData> {
        if key.len() != KEY_SIZE {
            return Err(CustodyError::Generation(format!(
                "Invalid cipher key size: expected {}, got {}",
                KEY_SIZE,
                key.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CustodyError::Generation(format!("Cipher init error: {}", e)))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, Payload { msg: plaintext, aad })
            .map_err(|e| CustodyError::Generation(format!("Encryption error: {}", e)))?;

        Ok(EncryptedData::new(nonce_bytes.to_vec(), ciphertext))
    }

    /// Decrypt ciphertext under a 256-bit key.
    ///
    /// Authentication failure (wrong key, wrong AAD, or tampered bytes) is
    /// reported as a malformed envelope; callers that know the failure means
    /// a wrong passphrase remap it to `Unlock`.
    pub fn decrypt(key: &SecretBytes, encrypted: &EncryptedData, aad: &[u8]) -> Result<Vec<u8>> {
        if key.len() != KEY_SIZE {
            return Err(CustodyError::MalformedEnvelope(format!(
                "Invalid cipher key size: expected {}, got {}",
                KEY_SIZE,
                key.len()
            )));
        }

        if encrypted.nonce.len() != NONCE_SIZE {
            return Err(CustodyError::MalformedEnvelope(format!(
                "Invalid nonce size: expected {}, got {}",
                NONCE_SIZE,
                encrypted.nonce.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CustodyError::MalformedEnvelope(format!("Cipher init error: {}", e)))?;

        let nonce = Nonce::from_slice(&encrypted.nonce);

        cipher
            .decrypt(
                nonce,
                Payload {
                    msg: &encrypted.ciphertext,
                    aad,
                },
            )
            .map_err(|_| CustodyError::MalformedEnvelope("Authentication failed".into()))
    }
}

/// Generate a fresh X25519 key pair from OS randomness.
pub fn generate_keypair() -> (StaticSecret, XPublicKey) {
    let secret = StaticSecret::random_from_rng(OsRng);
    let public = XPublicKey::from(&secret);
    (secret, public)
}

/// Generate cryptographically secure random bytes.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// SHA-256 digest helper (revocation digests).
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Argon2id cost parameters, stored alongside every locked private key so a
/// blob stays unlockable if the defaults ever change.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KdfParams {
    pub m_cost_kib: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost_kib: ARGON2_MEMORY_KIB,
            t_cost: ARGON2_ITERATIONS,
            p_cost: ARGON2_PARALLELISM,
        }
    }
}

/// Derive a 256-bit private-key lock key from a composite passphrase.
///
/// Argon2id with memory-hard parameters, so a stolen locked key resists
/// offline brute force of the weakest share (a short PIN). The salt is random
/// per identity and stored with the locked key.
pub fn derive_lock_key(passphrase: &[u8], salt: &[u8], kdf: &KdfParams) -> Result<SecretBytes> {
    let params = Params::new(kdf.m_cost_kib, kdf.t_cost, kdf.p_cost, Some(KEY_SIZE))
        .map_err(|e| CustodyError::Generation(format!("Invalid Argon2 params: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = vec![0u8; KEY_SIZE];
    argon2
        .hash_password_into(passphrase, salt, &mut key)
        .map_err(|e| CustodyError::Generation(format!("Key derivation failed: {}", e)))?;

    Ok(SecretBytes::new(key))
}

/// Wrap a content key for one recipient: ephemeral X25519 agreement, then
/// HKDF-SHA256 over the shared secret, then AES-GCM over the content key.
///
/// Returns the ephemeral public key the recipient needs to re-derive the
/// shared secret, plus the wrapped key ciphertext.
pub fn wrap_key_for(recipient: &[u8; 32], content_key: &SecretBytes) -> Result<([u8; 32], EncryptedData)> {
    let ephemeral = StaticSecret::random_from_rng(OsRng);
    let ephemeral_pub = XPublicKey::from(&ephemeral);

    let shared = ephemeral.diffie_hellman(&XPublicKey::from(*recipient));
    let wrap_key = derive_wrap_key(shared.as_bytes(), ephemeral_pub.as_bytes(), recipient)?;

    let key_ct = AesGcmCipher::encrypt(&wrap_key, content_key.as_bytes(), KEY_WRAP_AAD)?;
    Ok((*ephemeral_pub.as_bytes(), key_ct))
}

/// Unwrap a content key with the recipient's private key.
pub fn unwrap_key_with(
    secret: &StaticSecret,
    ephemeral: &[u8; 32],
    key_ct: &EncryptedData,
) -> Result<SecretBytes> {
    let recipient_pub = XPublicKey::from(secret);
    let shared = secret.diffie_hellman(&XPublicKey::from(*ephemeral));
    let wrap_key = derive_wrap_key(shared.as_bytes(), ephemeral, recipient_pub.as_bytes())?;

    let key_bytes = AesGcmCipher::decrypt(&wrap_key, key_ct, KEY_WRAP_AAD)?;
    Ok(SecretBytes::new(key_bytes))
}

const KEY_WRAP_AAD: &[u8] = b"custody-vault/key-wrap";

fn derive_wrap_key(shared: &[u8], ephemeral: &[u8; 32], recipient: &[u8; 32]) -> Result<SecretBytes> {
    // Context binds the derived key to both sides of the agreement.
    let mut info = Vec::with_capacity(64);
    info.extend_from_slice(ephemeral);
    info.extend_from_slice(recipient);

    let hkdf = Hkdf::<Sha256>::new(Some(b"custody-vault/wrap"), shared);
    let mut key = vec![0u8; KEY_SIZE];
    hkdf.expand(&info, &mut key)
        .map_err(|e| CustodyError::Generation(format!("Key derivation error: {}", e)))?;

    Ok(SecretBytes::new(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let key = SecretBytes::generate();
        let plaintext = b"layered custody test payload";

        let encrypted = AesGcmCipher::encrypt(&key, plaintext, b"ctx").unwrap();
        let decrypted = AesGcmCipher::decrypt(&key, &encrypted, b"ctx").unwrap();

        assert_eq!(plaintext.to_vec(), decrypted);
    }

    #[test]
    fn test_decrypt_wrong_aad_fails() {
        let key = SecretBytes::generate();
        let encrypted = AesGcmCipher::encrypt(&key, b"secret", b"context-a").unwrap();

        let result = AesGcmCipher::decrypt(&key, &encrypted, b"context-b");
        assert!(matches!(result, Err(CustodyError::MalformedEnvelope(_))));
    }

    #[test]
    fn test_lock_key_derivation() {
        let salt: [u8; SALT_SIZE] = random_bytes();
        let kdf = KdfParams::default();

        let key1 = derive_lock_key(b"123456secret", &salt, &kdf).unwrap();
        let key2 = derive_lock_key(b"123456secret", &salt, &kdf).unwrap();
        assert_eq!(key1.as_bytes(), key2.as_bytes());

        // Different salt derives a different key
        let salt2: [u8; SALT_SIZE] = random_bytes();
        let key3 = derive_lock_key(b"123456secret", &salt2, &kdf).unwrap();
        assert_ne!(key1.as_bytes(), key3.as_bytes());

        // Different passphrase derives a different key
        let key4 = derive_lock_key(b"secret123456", &salt, &kdf).unwrap();
        assert_ne!(key1.as_bytes(), key4.as_bytes());
    }

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let (secret, public) = generate_keypair();
        let content_key = SecretBytes::generate();

        let (ephemeral, key_ct) = wrap_key_for(public.as_bytes(), &content_key).unwrap();
        let unwrapped = unwrap_key_with(&secret, &ephemeral, &key_ct).unwrap();

        assert_eq!(content_key.as_bytes(), unwrapped.as_bytes());
    }

    #[test]
    fn test_unwrap_wrong_recipient_fails() {
        let (_, public) = generate_keypair();
        let (other_secret, _) = generate_keypair();
        let content_key = SecretBytes::generate();

        let (ephemeral, key_ct) = wrap_key_for(public.as_bytes(), &content_key).unwrap();
        let result = unwrap_key_with(&other_secret, &ephemeral, &key_ct);

        assert!(result.is_err());
    }

    #[test]
    fn test_random_bytes_differ() {
        let a: [u8; 16] = random_bytes();
        let b: [u8; 16] = random_bytes();
        assert_ne!(a, b);
    }
}
