//! Sender address extraction from raw `From` headers.
//!
//! Real-world `From` headers are messy: RFC 2047 encoded display names,
//! quoted strings, comments, bare addr-specs, or garbage. This parser is
//! tolerant by contract and reports "no address found" as `None` rather
//! than an error.

use crate::encoding::decode_header_value;

/// A parsed mailbox: the addr-spec plus an optional human-readable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// The addr-spec (`local@domain`), whitespace-trimmed but otherwise
    /// exactly as it appeared in the header.
    pub email: String,
    /// Decoded display name. Empty when the header carried none.
    pub display_name: String,
}

/// Parses a raw `From` header into a [`Mailbox`].
///
/// Handles `Name <a@b>`, `"Quoted Name" <a@b>`, `<a@b>`, bare `a@b`,
/// `a@b (Comment)`, and RFC 2047-encoded display names. Returns `None`
/// when no addr-spec can be located. Never panics.
#[must_use]
pub fn parse_sender(raw: &str) -> Option<Mailbox> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(open) = raw.rfind('<') {
        let close = raw[open + 1..].find('>')?;
        let email = raw[open + 1..open + 1 + close].trim();
        if !is_addr_spec(email) {
            return None;
        }

        let display_name = clean_display_name(&raw[..open]);
        return Some(Mailbox {
            email: email.to_string(),
            display_name,
        });
    }

    // No angle brackets: look for a bare addr-spec token.
    let token = raw
        .split_whitespace()
        .map(|t| t.trim_matches(['"', ',', ';', ':', '(', ')']))
        .find(|t| is_addr_spec(t))?;

    // A parenthesized comment after a bare address serves as the name:
    // `a@b (Alice)`.
    let display_name = raw
        .find('(')
        .and_then(|start| {
            let end = raw[start + 1..].find(')')?;
            Some(clean_display_name(&raw[start + 1..start + 1 + end]))
        })
        .unwrap_or_default();

    Some(Mailbox {
        email: token.to_string(),
        display_name,
    })
}

/// Loose addr-spec check: one `@` with a non-empty local part and domain,
/// and no embedded whitespace. Deliberately permissive; the mail store is
/// the authority on what it accepted.
fn is_addr_spec(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !s.chars().any(char::is_whitespace)
}

/// Strips quotes and decodes encoded words in a display-name fragment.
fn clean_display_name(fragment: &str) -> String {
    let trimmed = fragment.trim().trim_matches('"').trim();
    if trimmed.is_empty() {
        return String::new();
    }
    decode_header_value(trimmed)
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
    fn name_and_angle_addr() {
        let mb = parse_sender("Alice Example <alice@example.com>").unwrap();
        assert_eq!(mb.email, "alice@example.com");
        assert_eq!(mb.display_name, "Alice Example");
    }

    #[test]
    fn quoted_name() {
        let mb = parse_sender("\"Example, Alice\" <alice@example.com>").unwrap();
        assert_eq!(mb.email, "alice@example.com");
        assert_eq!(mb.display_name, "Example, Alice");
    }

    #[test]
    fn angle_addr_only() {
        let mb = parse_sender("<bob@example.org>").unwrap();
        assert_eq!(mb.email, "bob@example.org");
        assert_eq!(mb.display_name, "");
    }

    #[test]
    fn bare_addr_spec() {
        let mb = parse_sender("carol@example.net").unwrap();
        assert_eq!(mb.email, "carol@example.net");
        assert_eq!(mb.display_name, "");
    }

    #[test]
    fn bare_addr_with_comment() {
        let mb = parse_sender("carol@example.net (Carol)").unwrap();
        assert_eq!(mb.email, "carol@example.net");
        assert_eq!(mb.display_name, "Carol");
    }

    #[test]
    fn rfc2047_encoded_name() {
        let mb = parse_sender("=?utf-8?B?SMOpbMOobmU=?= <helene@example.com>").unwrap();
        assert_eq!(mb.email, "helene@example.com");
        assert_eq!(mb.display_name, "Hélène");
    }

    #[test]
    fn rfc2047_q_encoded_name() {
        let mb = parse_sender("=?utf-8?Q?Bj=C3=B6rn?= <bjorn@example.se>").unwrap();
        assert_eq!(mb.display_name, "Björn");
    }

    #[test]
    fn nested_angle_uses_last_open() {
        // Some senders put stray brackets in the name part
        let mb = parse_sender("News <daily> <news@example.com>");
        let mb = mb.unwrap();
        assert_eq!(mb.email, "news@example.com");
    }

    #[test]
    fn empty_input() {
        assert!(parse_sender("").is_none());
        assert!(parse_sender("   ").is_none());
    }

    #[test]
    fn no_addr_spec() {
        assert!(parse_sender("not an address").is_none());
        assert!(parse_sender("Alice Example").is_none());
    }

    #[test]
    fn angle_without_addr_spec() {
        assert!(parse_sender("Alice <not-an-address>").is_none());
    }

    #[test]
    fn addr_spec_rejects_whitespace_and_double_at() {
        assert!(!super::is_addr_spec("a b@example.com"));
        assert!(!super::is_addr_spec("a@b@c"));
        assert!(!super::is_addr_spec("@example.com"));
        assert!(!super::is_addr_spec("alice@"));
    }

    #[test]
    fn never_panics_on_garbage() {
        for raw in ["<", ">", "<>", "@", "\"\"", "((()))", "=?bogus?=", "<@>"] {
            let _ = parse_sender(raw);
        }
    }
}
