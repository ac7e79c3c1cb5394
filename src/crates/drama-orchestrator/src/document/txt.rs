//! Plain text documents

use crate::{OrchestratorError, Result};

const UTF8_BOM: &str = "\u{feff}";

/// Decode UTF-8 text, dropping a leading byte-order mark
pub fn decode(bytes: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| OrchestratorError::FileRead(format!("text is not valid UTF-8: {}", e)))?;
    Ok(text.strip_prefix(UTF8_BOM).unwrap_or(text).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_bom() {
        assert_eq!(decode("\u{feff}hello".as_bytes()).unwrap(), "hello");
        assert_eq!(decode("hello".as_bytes()).unwrap(), "hello");
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        assert!(matches!(
            decode(&[0xff, 0xfe, 0x00]),
            Err(OrchestratorError::FileRead(_))
        ));
    }
}
