//! Error types for the custody vault

use thiserror::Error;

/// Result type alias for custody operations
pub type Result<T> = std::result::Result<T, CustodyError>;

/// Errors that can occur during custody operations
///
/// Every variant is terminal to the single operation that raised it; nothing
/// is retried internally and no fallback passphrase is ever attempted.
#[derive(Error, Debug)]
pub enum CustodyError {
    /// The primitive could not produce a key pair, or generation parameters
    /// were malformed
    #[error("Key generation error: {0}")]
    Generation(String),

    /// A malformed or unsupported public key was supplied to `seal`
    #[error("Invalid public key: {0}")]
    InvalidKey(String),

    /// The assembled passphrase shares do not unlock the private key.
    /// Deliberately carries no detail about which share was wrong.
    #[error("Passphrase shares do not unlock this private key")]
    Unlock,

    /// The private key's public counterpart is not among the envelope's
    /// recipients
    #[error("Private key is not a recipient of this envelope")]
    NotARecipient,

    /// The envelope is not a well-formed ciphertext, or an authentication
    /// layer failed
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// An external dependency (salt directory, service secret) was not
    /// reachable or had no record. Distinct from `Unlock` so operators can
    /// tell "wrong secret" from "secret store unreachable".
    #[error("External dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// Storage operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Hex transcoding failed
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}
