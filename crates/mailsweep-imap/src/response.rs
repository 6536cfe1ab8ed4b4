//! Minimal response parsing scoped to the session surface this crate uses.
//!
//! Only four response shapes matter here: tagged status lines, `* SEARCH`
//! results, `* <n> EXISTS` counts, and FETCH records carrying UID, size,
//! internal date, and a header-fields literal. Everything else is ignored
//! by the client rather than rejected.

/// Tagged response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed.
    Ok,
    /// Operational error.
    No,
    /// Protocol error.
    Bad,
    /// Server is disconnecting.
    Bye,
}

/// A parsed tagged status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedResponse {
    /// Command tag this response answers.
    pub tag: String,
    /// Response status.
    pub status: Status,
    /// Human-readable server text.
    pub text: String,
}

/// Parses a tagged status line (`TAG OK text`).
///
/// Returns `None` for untagged (`*`) and continuation (`+`) lines.
#[must_use]
pub fn parse_tagged(response: &[u8]) -> Option<TaggedResponse> {
    let line = first_line(response);
    let (tag, rest) = line.split_once(' ')?;
    if tag == "*" || tag == "+" || tag.is_empty() {
        return None;
    }

    let (status_word, text) = rest.split_once(' ').unwrap_or((rest, ""));
    let status = match status_word.to_ascii_uppercase().as_str() {
        "OK" => Status::Ok,
        "NO" => Status::No,
        "BAD" => Status::Bad,
        "BYE" => Status::Bye,
        _ => return None,
    };

    Some(TaggedResponse {
        tag: tag.to_string(),
        status,
        text: text.trim().to_string(),
    })
}

/// Parses an untagged `* SEARCH 1 2 3` line into UIDs.
#[must_use]
pub fn parse_search(response: &[u8]) -> Option<Vec<u32>> {
    let line = first_line(response);
    let mut tokens = line.split_whitespace();
    if tokens.next()? != "*" || !tokens.next()?.eq_ignore_ascii_case("SEARCH") {
        return None;
    }
    Some(tokens.filter_map(|t| t.parse().ok()).collect())
}

/// Parses an untagged `* <n> EXISTS` line.
#[must_use]
pub fn parse_exists(response: &[u8]) -> Option<u32> {
    let line = first_line(response);
    let mut tokens = line.split_whitespace();
    if tokens.next()? != "*" {
        return None;
    }
    let count: u32 = tokens.next()?.parse().ok()?;
    tokens
        .next()?
        .eq_ignore_ascii_case("EXISTS")
        .then_some(count)
}

/// Envelope-level summary extracted from one FETCH record.
///
/// Every field is optional: servers are free to omit attributes, and the
/// engine substitutes defaults rather than failing the scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Message UID.
    pub uid: Option<u32>,
    /// RFC822.SIZE in bytes.
    pub size: Option<u32>,
    /// Raw INTERNALDATE string, e.g. `17-Jul-2024 02:44:25 -0700`.
    pub internal_date: Option<String>,
    /// Raw header-fields block (`From`/`Subject` lines).
    pub header: Option<String>,
}

/// Parses an untagged FETCH record.
///
/// Attribute order is server-defined; each attribute is located
/// independently. Returns `None` if the response is not a FETCH record.
#[must_use]
pub fn parse_fetch(response: &[u8]) -> Option<FetchSummary> {
    let attrs_end = response
        .iter()
        .position(|&b| b == b'{')
        .unwrap_or(response.len());
    let attrs = String::from_utf8_lossy(&response[..attrs_end]);

    let mut tokens = attrs.split_whitespace();
    if tokens.next()? != "*" {
        return None;
    }
    let _seq: u32 = tokens.next()?.parse().ok()?;
    if !tokens.next()?.eq_ignore_ascii_case("FETCH") {
        return None;
    }

    let header = read_literal(&response[attrs_end..]);

    Some(FetchSummary {
        uid: number_after(&attrs, "UID"),
        size: number_after(&attrs, "RFC822.SIZE"),
        internal_date: quoted_after(&attrs, "INTERNALDATE"),
        header,
    })
}

/// Extracts `{n}\r\n<n bytes>` starting at the opening brace.
fn read_literal(data: &[u8]) -> Option<String> {
    if data.first() != Some(&b'{') {
        return None;
    }
    let close = data.iter().position(|&b| b == b'}')?;
    let len: usize = std::str::from_utf8(data.get(1..close)?)
        .ok()?
        .trim_end_matches('+')
        .parse()
        .ok()?;

    let start = close + 3; // skip }\r\n
    let bytes = data.get(start..start + len)?;
    Some(String::from_utf8_lossy(bytes).into_owned())
}

/// Finds the number following an attribute keyword.
fn number_after(attrs: &str, key: &str) -> Option<u32> {
    let mut tokens = attrs.split_whitespace();
    while let Some(token) = tokens.next() {
        if token.trim_start_matches('(').eq_ignore_ascii_case(key) {
            return tokens
                .next()?
                .trim_end_matches([')', ']'])
                .parse()
                .ok();
        }
    }
    None
}

/// Finds the quoted string following an attribute keyword.
fn quoted_after(attrs: &str, key: &str) -> Option<String> {
    let upper = attrs.to_ascii_uppercase();
    let key_pos = upper.find(&key.to_ascii_uppercase())?;
    let rest = &attrs[key_pos + key.len()..];
    let open = rest.find('"')?;
    let close = rest[open + 1..].find('"')?;
    Some(rest[open + 1..open + 1 + close].to_string())
}

/// Returns the first CRLF-terminated line as text.
fn first_line(response: &[u8]) -> std::borrow::Cow<'_, str> {
    let end = response
        .windows(2)
        .position(|w| w == b"\r\n")
        .unwrap_or(response.len());
    String::from_utf8_lossy(&response[..end])
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

    mod tagged {
        use super::*;

        #[test]
        fn ok_line() {
            let r = parse_tagged(b"S0001 OK LOGIN completed\r\n").unwrap();
            assert_eq!(r.tag, "S0001");
            assert_eq!(r.status, Status::Ok);
            assert_eq!(r.text, "LOGIN completed");
        }

        #[test]
        fn no_and_bad() {
            let r = parse_tagged(b"S0002 NO invalid credentials\r\n").unwrap();
            assert_eq!(r.status, Status::No);

            let r = parse_tagged(b"S0003 BAD parse error\r\n").unwrap();
            assert_eq!(r.status, Status::Bad);
        }

        #[test]
        fn bye() {
            let r = parse_tagged(b"S0004 BYE shutting down\r\n").unwrap();
            assert_eq!(r.status, Status::Bye);
        }

        #[test]
        fn untagged_rejected() {
            assert!(parse_tagged(b"* OK ready\r\n").is_none());
            assert!(parse_tagged(b"+ continue\r\n").is_none());
        }

        #[test]
        fn status_without_text() {
            let r = parse_tagged(b"S0005 OK\r\n").unwrap();
            assert_eq!(r.text, "");
        }
    }

    mod search {
        use super::*;

        #[test]
        fn with_results() {
            let ids = parse_search(b"* SEARCH 3 17 2041\r\n").unwrap();
            assert_eq!(ids, vec![3, 17, 2041]);
        }

        #[test]
        fn empty_results() {
            let ids = parse_search(b"* SEARCH\r\n").unwrap();
            assert!(ids.is_empty());
        }

        #[test]
        fn not_a_search_line() {
            assert!(parse_search(b"* 3 EXISTS\r\n").is_none());
            assert!(parse_search(b"S0001 OK done\r\n").is_none());
        }
    }

    mod exists {
        use super::*;

        #[test]
        fn parses_count() {
            assert_eq!(parse_exists(b"* 172 EXISTS\r\n"), Some(172));
        }

        #[test]
        fn rejects_other_lines() {
            assert!(parse_exists(b"* SEARCH 1\r\n").is_none());
            assert!(parse_exists(b"* 4 RECENT\r\n").is_none());
        }
    }

    mod fetch {
        use super::*;

        #[test]
        fn full_record() {
            let raw = b"* 12 FETCH (UID 457 RFC822.SIZE 1024 \
                INTERNALDATE \"17-Jul-2024 02:44:25 -0700\" \
                BODY[HEADER.FIELDS (FROM SUBJECT)] {33}\r\n\
                From: a@x.com\r\nSubject: Hello\r\n\r\n)\r\n";
            // Literal is 33 bytes: the From/Subject block above
            let summary = parse_fetch(raw).unwrap();
            assert_eq!(summary.uid, Some(457));
            assert_eq!(summary.size, Some(1024));
            assert_eq!(
                summary.internal_date.as_deref(),
                Some("17-Jul-2024 02:44:25 -0700")
            );
            let header = summary.header.unwrap();
            assert!(header.contains("From: a@x.com"));
            assert!(header.contains("Subject: Hello"));
        }

        #[test]
        fn attribute_order_is_free() {
            let raw = b"* 3 FETCH (RFC822.SIZE 99 UID 7)\r\n";
            let summary = parse_fetch(raw).unwrap();
            assert_eq!(summary.uid, Some(7));
            assert_eq!(summary.size, Some(99));
            assert!(summary.header.is_none());
        }

        #[test]
        fn uid_adjacent_to_paren() {
            let raw = b"* 3 FETCH (UID 7)\r\n";
            let summary = parse_fetch(raw).unwrap();
            assert_eq!(summary.uid, Some(7));
        }

        #[test]
        fn missing_attributes_are_none() {
            let raw = b"* 3 FETCH (FLAGS (\\Seen))\r\n";
            let summary = parse_fetch(raw).unwrap();
            assert_eq!(summary.uid, None);
            assert_eq!(summary.size, None);
            assert_eq!(summary.internal_date, None);
        }

        #[test]
        fn not_a_fetch() {
            assert!(parse_fetch(b"* SEARCH 1 2\r\n").is_none());
            assert!(parse_fetch(b"S0001 OK done\r\n").is_none());
            assert!(parse_fetch(b"* 3 EXPUNGE\r\n").is_none());
        }

        #[test]
        fn from_keyword_in_header_fields_not_confused() {
            // "FROM" appears inside BODY[HEADER.FIELDS (FROM SUBJECT)];
            // it must not be mistaken for an attribute keyword.
            let raw = b"* 1 FETCH (UID 5 BODY[HEADER.FIELDS (FROM SUBJECT)] {4}\r\nabcd)\r\n";
            let summary = parse_fetch(raw).unwrap();
            assert_eq!(summary.uid, Some(5));
            assert_eq!(summary.header.as_deref(), Some("abcd"));
        }
    }

    #[test]
    fn read_literal_bounds() {
        assert_eq!(read_literal(b"{4}\r\nabcd"), Some("abcd".to_string()));
        assert_eq!(read_literal(b"{4+}\r\nabcd"), Some("abcd".to_string()));
        assert!(read_literal(b"{4}\r\nab").is_none()); // truncated
        assert!(read_literal(b"nope").is_none());
    }
}
