//! Utility functions for the CIP decoder
//!
//! This module provides small helpers used by the harness binary and
//! by logging of opaque byte ranges.

/// Convert bytes to a hexadecimal string
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter()
        .fold(String::new(), |mut acc, b| {
            acc.push_str(&format!("{:02x}", b));
            acc
        })
}

/// Parse a hexadecimal string to bytes
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, String> {
    let digits = hex.as_bytes();
    if digits.len() % 2 != 0 {
        return Err("Invalid hex string length".to_string());
    }

    let mut bytes = Vec::with_capacity(digits.len() / 2);

    // Work on raw bytes: slicing the str could land inside a multi-byte
    // character and panic on malformed input
    for pair in digits.chunks_exact(2) {
        let byte_str = std::str::from_utf8(pair)
            .map_err(|_| "Invalid hex character".to_string())?;
        let byte = u8::from_str_radix(byte_str, 16)
            .map_err(|e| format!("Invalid hex character: {}", e))?;
        bytes.push(byte);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_hex() {
        let bytes = vec![0x12, 0x34, 0xAB, 0xCD];
        let hex = bytes_to_hex(&bytes);
        assert_eq!(hex, "1234abcd");
    }

    #[test]
    fn test_hex_to_bytes() {
        let hex = "1234abcd";
        let bytes = hex_to_bytes(hex).unwrap();
        assert_eq!(bytes, vec![0x12, 0x34, 0xAB, 0xCD]);
    }

    #[test]
    fn test_hex_to_bytes_invalid() {
        let result = hex_to_bytes("123"); // Odd length
        assert!(result.is_err());

        let result = hex_to_bytes("123G"); // Invalid character
        assert!(result.is_err());
    }

    #[test]
    fn test_hex_to_bytes_multibyte_character() {
        // 4 UTF-8 bytes; the pair boundaries split the 2-byte character
        let result = hex_to_bytes("a\u{e9}b");
        assert!(result.is_err());
    }
}
