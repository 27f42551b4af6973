//! Hex transcoding for the persistence boundary
//!
//! Every secret blob that crosses into storage is hex-encoded text, so the
//! relational layer only ever sees opaque strings. The transform is lossless:
//! `hex_to_string(string_to_hex(x)) == x` for all inputs.

use crate::error::{CustodyError, Result};

/// Encode raw bytes as a lowercase hex string.
pub fn bytes_to_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Decode a hex string back into raw bytes.
pub fn hex_to_bytes(data: &str) -> Result<Vec<u8>> {
    hex::decode(data).map_err(|e| CustodyError::Encoding(format!("Invalid hex: {}", e)))
}

/// Encode a UTF-8 string as hex.
pub fn string_to_hex(data: &str) -> String {
    hex::encode(data.as_bytes())
}

/// Decode a hex string back into the UTF-8 string it was produced from.
pub fn hex_to_string(data: &str) -> Result<String> {
    let bytes = hex_to_bytes(data)?;
    String::from_utf8(bytes).map_err(|e| CustodyError::Encoding(format!("Invalid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_roundtrip() {
        let input = "Hello, World!";
        assert_eq!(string_to_hex(input), "48656c6c6f2c20576f726c6421");
        assert_eq!(hex_to_string(&string_to_hex(input)).unwrap(), input);
    }

    #[test]
    fn test_multibyte_roundtrip() {
        let input = "clé privée — 秘密鍵";
        assert_eq!(hex_to_string(&string_to_hex(input)).unwrap(), input);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let input = vec![0u8, 255, 16, 32, 127];
        assert_eq!(hex_to_bytes(&bytes_to_hex(&input)).unwrap(), input);
    }

    #[test]
    fn test_invalid_hex_rejected() {
        assert!(matches!(
            hex_to_string("zz"),
            Err(CustodyError::Encoding(_))
        ));
    }
}
