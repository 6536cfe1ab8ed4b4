//! Decoding of MIME-encoded header text.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 encoded words. Only the
//! decode direction is implemented; this crate never generates messages.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data).map_err(Into::into)
}

/// Decodes Quoted-Printable text (RFC 2045).
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(text: &str) -> Result<String> {
    let mut result = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '=' {
            // Soft line break
            if chars.peek() == Some(&'\r') {
                chars.next();
                if chars.peek() == Some(&'\n') {
                    chars.next();
                    continue;
                }
            } else if chars.peek() == Some(&'\n') {
                chars.next();
                continue;
            }

            // Hex encoded byte
            let hex: String = chars.by_ref().take(2).collect();
            if hex.len() == 2 {
                let byte = u8::from_str_radix(&hex, 16)
                    .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
                result.push(byte);
            } else {
                return Err(Error::InvalidEncoding(
                    "Incomplete escape sequence".to_string(),
                ));
            }
        } else {
            result.push(ch as u8);
        }
    }

    String::from_utf8(result).map_err(Into::into)
}

/// Decodes a single RFC 2047 encoded word.
///
/// Format: `=?charset?encoding?encoded-text?=`. Text that is not an encoded
/// word is returned unchanged.
///
/// # Errors
///
/// Returns an error if the word claims RFC 2047 format but cannot be decoded.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    if !text.starts_with("=?") || !text.ends_with("?=") || text.len() < 6 {
        return Ok(text.to_string());
    }

    let inner = &text[2..text.len() - 2];
    let parts: Vec<&str> = inner.splitn(3, '?').collect();

    if parts.len() != 3 {
        return Err(Error::InvalidEncoding(
            "Invalid RFC 2047 format".to_string(),
        ));
    }

    let encoding = parts[1].to_uppercase();
    let encoded_text = parts[2];

    match encoding.as_str() {
        "B" => {
            let decoded = decode_base64(encoded_text)?;
            String::from_utf8(decoded).map_err(Into::into)
        }
        "Q" => {
            // Q encoding uses underscore for space
            let text_with_spaces = encoded_text.replace('_', " ");
            decode_quoted_printable(&text_with_spaces)
        }
        _ => Err(Error::InvalidEncoding(format!(
            "Unknown encoding: {encoding}"
        ))),
    }
}

/// Decodes every RFC 2047 encoded word within a header value.
///
/// Plain tokens pass through unchanged. Whitespace between two adjacent
/// encoded words is dropped per RFC 2047 §6.2; whitespace between a plain
/// token and an encoded word is preserved. A token that looks like an
/// encoded word but fails to decode is kept verbatim, so this function
/// never fails on malformed input.
#[must_use]
pub fn decode_header_value(value: &str) -> String {
    let mut result = String::new();
    let mut previous_was_encoded = false;
    let mut pending_space = "";

    for token in value.split_whitespace() {
        let is_encoded = token.starts_with("=?") && token.ends_with("?=");
        let decoded = if is_encoded {
            decode_rfc2047(token).unwrap_or_else(|_| token.to_string())
        } else {
            token.to_string()
        };

        if !result.is_empty() && !(previous_was_encoded && is_encoded) {
            result.push_str(pending_space);
        }
        result.push_str(&decoded);

        previous_was_encoded = is_encoded;
        pending_space = " ";
    }

    result
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_decode() {
        let decoded = decode_base64("SGVsbG8sIFdvcmxkIQ==").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_decode_invalid() {
        assert!(decode_base64("not base64!!!").is_err());
    }

    #[test]
    fn test_quoted_printable_decode() {
        let decoded = decode_quoted_printable("Hello, World!").unwrap();
        assert_eq!(decoded, "Hello, World!");

        let decoded = decode_quoted_printable("H=C3=A9llo").unwrap();
        assert_eq!(decoded, "Héllo");
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        let decoded = decode_quoted_printable("Hello=\r\nWorld").unwrap();
        assert_eq!(decoded, "HelloWorld");
    }

    #[test]
    fn test_quoted_printable_incomplete_escape() {
        assert!(decode_quoted_printable("Hello=4").is_err());
    }

    #[test]
    fn test_rfc2047_decode_base64() {
        let decoded = decode_rfc2047("=?utf-8?B?SMOpbGxv?=").unwrap();
        assert_eq!(decoded, "Héllo");
    }

    #[test]
    fn test_rfc2047_decode_quoted_printable() {
        let decoded = decode_rfc2047("=?utf-8?Q?H=C3=A9llo?=").unwrap();
        assert_eq!(decoded, "Héllo");
    }

    #[test]
    fn test_rfc2047_plain_passthrough() {
        let decoded = decode_rfc2047("Hello").unwrap();
        assert_eq!(decoded, "Hello");
    }

    #[test]
    fn test_rfc2047_unknown_encoding() {
        assert!(decode_rfc2047("=?utf-8?X?abc?=").is_err());
    }

    #[test]
    fn test_decode_header_value_mixed() {
        let decoded = decode_header_value("=?utf-8?B?SMOpbMOobmU=?= Dupont");
        assert_eq!(decoded, "Hélène Dupont");
    }

    #[test]
    fn test_decode_header_value_adjacent_words() {
        // Whitespace between adjacent encoded words is dropped
        let decoded = decode_header_value("=?utf-8?Q?He?= =?utf-8?Q?llo?=");
        assert_eq!(decoded, "Hello");
    }

    #[test]
    fn test_decode_header_value_malformed_word_kept() {
        let decoded = decode_header_value("=?utf-8?B?%%%?= rest");
        assert_eq!(decoded, "=?utf-8?B?%%%?= rest");
    }

    #[test]
    fn test_decode_header_value_plain() {
        assert_eq!(decode_header_value("Plain Name"), "Plain Name");
        assert_eq!(decode_header_value(""), "");
    }
}
