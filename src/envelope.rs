//! Multi-recipient encryption envelopes
//!
//! A payload is encrypted once under a fresh content key; the content key is
//! then wrapped independently for every recipient public key. Any single
//! recipient, once its private key is unlocked, recovers the full plaintext
//! on its own; this is multi-recipient encryption, not secret sharing, and
//! there is no threshold to meet.
//!
//! The serialized form is self-describing: format version, suite tag, and one
//! stanza per recipient, so no external metadata is needed to open it.

use serde::{Deserialize, Serialize};

use crate::crypto::{self, AesGcmCipher, EncryptedData, SecretBytes};
use crate::error::{CustodyError, Result};
use crate::keypair::{self, LockedPrivateKey, PassphraseShares, PublicKey};

/// Format version written into every envelope
const ENVELOPE_VERSION: u16 = 1;

/// AAD binding the payload ciphertext to this envelope format
const PAYLOAD_AAD: &[u8] = b"custody-vault/envelope-payload";

/// Cipher suites an envelope can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CipherSuite {
    /// X25519 key agreement, HKDF-SHA256 wrap-key derivation, AES-256-GCM
    #[allow(non_camel_case_types)]
    X25519_HKDF_SHA256_AES256GCM,
}

/// One recipient's entry: who it is for and the content key wrapped for them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientStanza {
    /// Recipient public key the stanza was wrapped to
    pub recipient: PublicKey,
    /// Ephemeral X25519 public key for this wrap
    pub ephemeral: [u8; 32],
    /// Content key encrypted under the agreed wrap key
    pub key_ct: EncryptedData,
}

/// Ciphertext sealed to one or more recipient public keys
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u16,
    pub suite: CipherSuite,
    pub recipients: Vec<RecipientStanza>,
    pub payload: EncryptedData,
}

impl Envelope {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| CustodyError::MalformedEnvelope(format!("Serialization error: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| CustodyError::MalformedEnvelope(format!("Parse error: {}", e)))
    }

    /// Recipient public keys this envelope was sealed to.
    pub fn recipient_keys(&self) -> Vec<PublicKey> {
        self.recipients.iter().map(|s| s.recipient).collect()
    }
}

/// Seal a plaintext to a set of recipient public keys.
///
/// Fails with `InvalidKey` on an empty recipient set. Encryption is
/// non-deterministic: the content key, every ephemeral, and every nonce are
/// fresh per call, so two seals of identical inputs never produce equal
/// ciphertext.
pub fn seal(plaintext: &[u8], recipients: &[PublicKey]) -> Result<Envelope> {
    if recipients.is_empty() {
        return Err(CustodyError::InvalidKey(
            "At least one recipient public key is required".to_string(),
        ));
    }

    let content_key = SecretBytes::generate();
    let payload = AesGcmCipher::encrypt(&content_key, plaintext, PAYLOAD_AAD)?;

    let mut stanzas = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        let (ephemeral, key_ct) = crypto::wrap_key_for(recipient.as_bytes(), &content_key)?;
        stanzas.push(RecipientStanza {
            recipient: *recipient,
            ephemeral,
            key_ct,
        });
    }

    Ok(Envelope {
        version: ENVELOPE_VERSION,
        suite: CipherSuite::X25519_HKDF_SHA256_AES256GCM,
        recipients: stanzas,
        payload,
    })
}

/// Open an envelope with one recipient's locked private key and its
/// passphrase shares.
///
/// Returns exactly the bytes passed to `seal`, in a zeroizing container.
/// Failure modes are distinguished for the caller: wrong shares are
/// `Unlock`, a key that was never a recipient is `NotARecipient`, and a
/// damaged or foreign ciphertext is `MalformedEnvelope`.
pub fn open(
    envelope: &Envelope,
    private_key: &LockedPrivateKey,
    shares: &PassphraseShares,
) -> Result<zeroize::Zeroizing<Vec<u8>>> {
    if envelope.version != ENVELOPE_VERSION {
        return Err(CustodyError::MalformedEnvelope(format!(
            "Unsupported envelope version: {}",
            envelope.version
        )));
    }

    let unlocked = keypair::unlock(private_key, shares)?;
    let our_key = unlocked.public_key();

    let stanza = envelope
        .recipients
        .iter()
        .find(|s| s.recipient == our_key)
        .ok_or(CustodyError::NotARecipient)?;

    let content_key = crypto::unwrap_key_with(unlocked.secret(), &stanza.ephemeral, &stanza.key_ct)?;

    let plaintext = AesGcmCipher::decrypt(&content_key, &envelope.payload, PAYLOAD_AAD)?;
    Ok(zeroize::Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::generate;

    #[test]
    fn test_roundtrip_every_recipient() {
        let shares_a = PassphraseShares::new("1111", "svc", "salt-a");
        let shares_b = PassphraseShares::single("cold-storage-secret");
        let a = generate("customer", "customer@vault.example", &shares_a).unwrap();
        let b = generate("backup", "backup@vault.example", &shares_b).unwrap();

        let plaintext = b"wallet signing key bytes";
        let envelope = seal(plaintext, &[a.public_key, b.public_key]).unwrap();

        let via_a = open(&envelope, &a.private_key, &shares_a).unwrap();
        let via_b = open(&envelope, &b.private_key, &shares_b).unwrap();

        assert_eq!(via_a.as_slice(), plaintext);
        assert_eq!(via_b.as_slice(), plaintext);
    }

    #[test]
    fn test_seal_rejects_empty_recipients() {
        assert!(matches!(
            seal(b"data", &[]),
            Err(CustodyError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_non_recipient_excluded() {
        let shares = PassphraseShares::single("secret");
        let recipient = generate("customer", "customer@vault.example", &shares).unwrap();
        let outsider = generate("outsider", "outsider@vault.example", &shares).unwrap();

        let envelope = seal(b"data", &[recipient.public_key]).unwrap();

        assert!(matches!(
            open(&envelope, &outsider.private_key, &shares),
            Err(CustodyError::NotARecipient)
        ));
    }

    #[test]
    fn test_wrong_shares_fail_before_recipient_check() {
        let shares = PassphraseShares::new("1111", "svc", "salt");
        let recipient = generate("customer", "customer@vault.example", &shares).unwrap();

        let envelope = seal(b"data", &[recipient.public_key]).unwrap();

        let wrong = PassphraseShares::new("2222", "svc", "salt");
        assert!(matches!(
            open(&envelope, &recipient.private_key, &wrong),
            Err(CustodyError::Unlock)
        ));
    }

    #[test]
    fn test_seal_is_nondeterministic() {
        let shares = PassphraseShares::single("secret");
        let recipient = generate("customer", "customer@vault.example", &shares).unwrap();

        let e1 = seal(b"same plaintext", &[recipient.public_key]).unwrap();
        let e2 = seal(b"same plaintext", &[recipient.public_key]).unwrap();

        assert_ne!(e1.payload.ciphertext, e2.payload.ciphertext);
        assert_ne!(e1.recipients[0].ephemeral, e2.recipients[0].ephemeral);
    }

    #[test]
    fn test_tampered_payload_detected() {
        let shares = PassphraseShares::single("secret");
        let recipient = generate("customer", "customer@vault.example", &shares).unwrap();

        let mut envelope = seal(b"integrity matters", &[recipient.public_key]).unwrap();
        envelope.payload.ciphertext[0] ^= 0x01;

        assert!(matches!(
            open(&envelope, &recipient.private_key, &shares),
            Err(CustodyError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_tampered_key_wrap_detected() {
        let shares = PassphraseShares::single("secret");
        let recipient = generate("customer", "customer@vault.example", &shares).unwrap();

        let mut envelope = seal(b"integrity matters", &[recipient.public_key]).unwrap();
        envelope.recipients[0].key_ct.ciphertext[0] ^= 0x01;

        assert!(matches!(
            open(&envelope, &recipient.private_key, &shares),
            Err(CustodyError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_json_roundtrip_still_opens() {
        let shares = PassphraseShares::new("1111", "svc", "salt");
        let recipient = generate("customer", "customer@vault.example", &shares).unwrap();

        let envelope = seal(b"transportable", &[recipient.public_key]).unwrap();
        let restored = Envelope::from_json(&envelope.to_json().unwrap()).unwrap();

        let plaintext = open(&restored, &recipient.private_key, &shares).unwrap();
        assert_eq!(plaintext.as_slice(), b"transportable");
    }

    #[test]
    fn test_garbage_json_is_malformed() {
        assert!(matches!(
            Envelope::from_json("{\"not\": \"an envelope\"}"),
            Err(CustodyError::MalformedEnvelope(_))
        ));
    }
}
