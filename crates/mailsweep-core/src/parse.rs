//! Sender extraction from raw `From` header values.
//!
//! Parsing is layered: a pluggable [`SenderParser`] runs first, a regex
//! sweep for anything address-shaped runs second, and sentinel values stand
//! in when both come up empty. A scan never fails on a malformed header.

use std::sync::LazyLock;

use regex::Regex;

/// Address substituted when no sender can be extracted.
pub const UNKNOWN_EMAIL: &str = "unknown@example.com";
/// Display name substituted when no sender can be extracted.
pub const UNKNOWN_NAME: &str = "Unknown Sender";

/// A sender extracted from a header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSender {
    /// The address, case preserved.
    pub email: String,
    /// Display name; may be empty.
    pub display_name: String,
}

/// Extracts a sender from a raw `From` header value.
pub trait SenderParser {
    /// Returns the sender, or `None` when the value has no usable address.
    fn parse(&self, raw: &str) -> Option<ParsedSender>;
}

/// Default parser backed by the MIME address grammar.
///
/// Handles angle-addr forms, bare addr-specs, and RFC 2047 encoded display
/// names.
#[derive(Debug, Clone, Copy, Default)]
pub struct MimeSenderParser;

impl SenderParser for MimeSenderParser {
    fn parse(&self, raw: &str) -> Option<ParsedSender> {
        mailsweep_mime::parse_sender(raw).map(|mailbox| ParsedSender {
            email: mailbox.email,
            display_name: mailbox.display_name,
        })
    }
}

#[allow(clippy::expect_used)] // pattern is a compile-time constant
static ADDR_SHAPED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[^\s<>"',;:()\[\]]+@[^\s<>"',;:()\[\]]+"#).expect("valid regex")
});

/// Resolves a raw header value to a sender, never failing.
///
/// Falls back to a regex scan for anything address-shaped, then to the
/// sentinel sender.
pub(crate) fn resolve_sender<P: SenderParser>(parser: &P, raw: &str) -> ParsedSender {
    if let Some(sender) = parser.parse(raw) {
        return sender;
    }

    if let Some(found) = ADDR_SHAPED.find(raw) {
        return ParsedSender {
            email: found.as_str().trim_matches('.').to_string(),
            display_name: String::new(),
        };
    }

    ParsedSender {
        email: UNKNOWN_EMAIL.to_string(),
        display_name: UNKNOWN_NAME.to_string(),
    }
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
    fn mime_parser_handles_angle_addr() {
        let sender = MimeSenderParser.parse("Alice <alice@example.com>").unwrap();
        assert_eq!(sender.email, "alice@example.com");
        assert_eq!(sender.display_name, "Alice");
    }

    #[test]
    fn resolve_prefers_the_parser() {
        let sender = resolve_sender(&MimeSenderParser, "\"Bob\" <bob@x.org>");
        assert_eq!(sender.email, "bob@x.org");
        assert_eq!(sender.display_name, "Bob");
    }

    #[test]
    fn resolve_falls_back_to_regex() {
        // A parser that never succeeds forces the fallback path.
        struct Never;
        impl SenderParser for Never {
            fn parse(&self, _raw: &str) -> Option<ParsedSender> {
                None
            }
        }

        let sender = resolve_sender(&Never, "garbage carol@site.net trailing");
        assert_eq!(sender.email, "carol@site.net");
        assert_eq!(sender.display_name, "");
    }

    #[test]
    fn resolve_uses_sentinel_when_nothing_matches() {
        let sender = resolve_sender(&MimeSenderParser, "no address here");
        assert_eq!(sender.email, UNKNOWN_EMAIL);
        assert_eq!(sender.display_name, UNKNOWN_NAME);
    }

    #[test]
    fn regex_fallback_trims_stray_dots() {
        struct Never;
        impl SenderParser for Never {
            fn parse(&self, _raw: &str) -> Option<ParsedSender> {
                None
            }
        }
        let sender = resolve_sender(&Never, "see dave@corp.example.");
        assert_eq!(sender.email, "dave@corp.example");
    }
}
