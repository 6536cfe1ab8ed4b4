//! Command construction: tags, UID sets, and search criteria.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU32, Ordering};

/// Tag generator for IMAP commands.
///
/// Generates unique sequential tags in the format "S0000", "S0001", etc.
#[derive(Debug)]
pub struct TagGenerator {
    counter: AtomicU32,
    prefix: char,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self {
            counter: AtomicU32::new(0),
            prefix,
        }
    }

    /// Generates the next tag.
    #[must_use]
    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}{n:04}", self.prefix)
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('S')
    }
}

/// A set of message UIDs, serialized with range compression.
///
/// The set is non-empty by construction; IMAP has no empty sequence-set
/// syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UidSet(Vec<u32>);

impl UidSet {
    /// Creates a UID set from the given ids, sorting and deduplicating.
    ///
    /// Returns `None` for an empty input or one containing only zeros
    /// (UIDs start at 1).
    #[must_use]
    pub fn new(ids: &[u32]) -> Option<Self> {
        let mut ids: Vec<u32> = ids.iter().copied().filter(|&id| id != 0).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() { None } else { Some(Self(ids)) }
    }

    /// Number of UIDs in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; the set is non-empty by construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for UidSet {
    /// Formats as an IMAP sequence-set, e.g. `1:5,9,12:13`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        let mut i = 0;
        while i < self.0.len() {
            let start = self.0[i];
            let mut end = start;
            while i + 1 < self.0.len() && self.0[i + 1] == end + 1 {
                end = self.0[i + 1];
                i += 1;
            }
            if !first {
                f.write_str(",")?;
            }
            if start == end {
                write!(f, "{start}")?;
            } else {
                write!(f, "{start}:{end}")?;
            }
            first = false;
            i += 1;
        }
        Ok(())
    }
}

/// SEARCH criteria, restricted to what the cleanup engine uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// All messages.
    All,
    /// From header contains text (substring match per RFC 3501).
    From(String),
    /// Internal date strictly before the given IMAP date (`01-Jan-2024`).
    Before(String),
    /// Internal date on or after the given IMAP date.
    Since(String),
    /// AND of criteria (IMAP juxtaposition).
    And(Vec<Self>),
}

impl SearchCriteria {
    /// Serializes the criteria to IMAP command text.
    #[must_use]
    pub fn to_imap_string(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        match self {
            Self::All => out.push_str("ALL"),
            Self::From(s) => {
                out.push_str("FROM ");
                write_astring(out, s);
            }
            Self::Before(date) => {
                let _ = write!(out, "BEFORE {date}");
            }
            Self::Since(date) => {
                let _ = write!(out, "SINCE {date}");
            }
            Self::And(criteria) => {
                for (i, c) in criteria.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    c.write_to(out);
                }
            }
        }
    }
}

/// Writes an astring (atom or quoted string).
pub fn write_astring(out: &mut String, s: &str) {
    if s.is_empty() || s.bytes().any(needs_quoting) {
        out.push('"');
        for c in s.chars() {
            if c == '"' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('"');
    } else {
        out.push_str(s);
    }
}

/// Returns true if the byte needs quoting.
const fn needs_quoting(b: u8) -> bool {
    matches!(b, b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*') || b < 0x20 || b == 0x7F
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
    use proptest::prelude::*;

    #[test]
    fn test_tag_generation() {
        let generator = TagGenerator::default();
        assert_eq!(generator.next(), "S0000");
        assert_eq!(generator.next(), "S0001");
        assert_eq!(generator.next(), "S0002");
    }

    #[test]
    fn test_custom_prefix() {
        let generator = TagGenerator::new('T');
        assert_eq!(generator.next(), "T0000");
    }

    #[test]
    fn test_uid_set_compression() {
        let set = UidSet::new(&[1, 2, 3, 4, 5, 9, 12, 13]).unwrap();
        assert_eq!(set.to_string(), "1:5,9,12:13");
    }

    #[test]
    fn test_uid_set_single() {
        let set = UidSet::new(&[7]).unwrap();
        assert_eq!(set.to_string(), "7");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_uid_set_dedup_and_sort() {
        let set = UidSet::new(&[3, 1, 2, 2, 1]).unwrap();
        assert_eq!(set.to_string(), "1:3");
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_uid_set_empty() {
        assert!(UidSet::new(&[]).is_none());
        assert!(UidSet::new(&[0]).is_none());
    }

    #[test]
    fn test_search_all() {
        assert_eq!(SearchCriteria::All.to_imap_string(), "ALL");
    }

    #[test]
    fn test_search_from_quoted() {
        let c = SearchCriteria::From("alice@example.com".to_string());
        assert_eq!(c.to_imap_string(), "FROM alice@example.com");

        let c = SearchCriteria::From("alice smith".to_string());
        assert_eq!(c.to_imap_string(), "FROM \"alice smith\"");
    }

    #[test]
    fn test_search_dates() {
        let c = SearchCriteria::Before("01-Jan-2024".to_string());
        assert_eq!(c.to_imap_string(), "BEFORE 01-Jan-2024");

        let c = SearchCriteria::Since("15-Jun-2023".to_string());
        assert_eq!(c.to_imap_string(), "SINCE 15-Jun-2023");
    }

    #[test]
    fn test_search_and() {
        let c = SearchCriteria::And(vec![
            SearchCriteria::From("a@x.com".to_string()),
            SearchCriteria::Before("01-Jan-2024".to_string()),
        ]);
        assert_eq!(c.to_imap_string(), "FROM a@x.com BEFORE 01-Jan-2024");
    }

    #[test]
    fn test_astring_escapes() {
        let mut out = String::new();
        write_astring(&mut out, "say \"hi\"");
        assert_eq!(out, "\"say \\\"hi\\\"\"");

        let mut out = String::new();
        write_astring(&mut out, "");
        assert_eq!(out, "\"\"");
    }

    proptest! {
        #[test]
        fn uid_set_roundtrip(ids in proptest::collection::vec(1u32..10_000, 1..100)) {
            let set = UidSet::new(&ids).unwrap();
            let formatted = set.to_string();

            // Expand the formatted set back into ids
            let mut expanded = Vec::new();
            for part in formatted.split(',') {
                if let Some((a, b)) = part.split_once(':') {
                    let (a, b): (u32, u32) = (a.parse().unwrap(), b.parse().unwrap());
                    prop_assert!(a < b);
                    expanded.extend(a..=b);
                } else {
                    expanded.push(part.parse().unwrap());
                }
            }

            let mut unique = ids.clone();
            unique.sort_unstable();
            unique.dedup();
            prop_assert_eq!(expanded, unique);
        }
    }
}
