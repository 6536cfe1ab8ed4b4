//! Scan result types and per-sender aggregation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::session::MessageId;

/// Subject substituted when a message carries none.
pub const NO_SUBJECT: &str = "No Subject";

/// One message as reported in a scan result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageMetadata {
    /// Store-assigned message id, usable for deletion.
    pub id: MessageId,
    /// Unparsed `From` header value.
    pub sender_raw: String,
    /// Message subject, never empty.
    pub subject: String,
    /// Server receive timestamp; the Unix epoch when the store omits it.
    pub timestamp: DateTime<Utc>,
    /// Message size in bytes; zero when the store omits it.
    pub size_bytes: u64,
}

/// Aggregated view of one sender across the scanned mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderGroup {
    /// Normalized (lowercased) sender address; the grouping key.
    pub sender_email: String,
    /// Display name, first occurrence wins.
    pub sender_name: String,
    /// Total messages from this sender.
    pub email_count: u64,
    /// Sum of message sizes in bytes.
    pub total_size_bytes: u64,
    /// Sample of messages, newest first, capped during aggregation.
    pub emails: Vec<MessageMetadata>,
}

/// Accumulator for one sender during a scan.
#[derive(Debug)]
pub(crate) struct SenderAggregate {
    display_name: String,
    count: u64,
    total_size: u64,
    sample: Vec<MessageMetadata>,
}

impl SenderAggregate {
    pub(crate) fn new(display_name: String) -> Self {
        Self {
            display_name,
            count: 0,
            total_size: 0,
            sample: Vec::new(),
        }
    }

    /// Counts a message and retains it in the sample if under the cap.
    pub(crate) fn record(&mut self, meta: MessageMetadata, sample_cap: usize) {
        self.count += 1;
        self.total_size += meta.size_bytes;
        if self.sample.len() < sample_cap {
            self.sample.push(meta);
        }
    }

    /// Finalizes into a [`SenderGroup`], ordering the sample newest first.
    ///
    /// A blank display name falls back to the address itself.
    pub(crate) fn into_group(self, sender_email: String) -> SenderGroup {
        let mut emails = self.sample;
        emails.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let sender_name = if self.display_name.trim().is_empty() {
            sender_email.clone()
        } else {
            self.display_name
        };
        SenderGroup {
            sender_email,
            sender_name,
            email_count: self.count,
            total_size_bytes: self.total_size,
            emails,
        }
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
    use chrono::TimeZone;

    fn meta(id: u32, ts_hour: u32, size: u64) -> MessageMetadata {
        MessageMetadata {
            id: MessageId::new(id).unwrap(),
            sender_raw: "a@x.com".to_string(),
            subject: "s".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 7, 1, ts_hour, 0, 0).unwrap(),
            size_bytes: size,
        }
    }

    #[test]
    fn counts_and_sizes_cover_all_messages() {
        let mut agg = SenderAggregate::new("A".to_string());
        for i in 1..=5 {
            agg.record(meta(i, i, 100), 3);
        }
        let group = agg.into_group("a@x.com".to_string());
        assert_eq!(group.email_count, 5);
        assert_eq!(group.total_size_bytes, 500);
        assert_eq!(group.emails.len(), 3);
    }

    #[test]
    fn sample_keeps_first_encountered_sorted_newest_first() {
        let mut agg = SenderAggregate::new("A".to_string());
        agg.record(meta(1, 3, 0), 2);
        agg.record(meta(2, 9, 0), 2);
        agg.record(meta(3, 6, 0), 2); // beyond cap, dropped
        let group = agg.into_group("a@x.com".to_string());
        let ids: Vec<u32> = group.emails.iter().map(|m| m.id.get()).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn blank_display_name_falls_back_to_address() {
        let mut agg = SenderAggregate::new(String::new());
        agg.record(meta(1, 1, 10), 5);
        let group = agg.into_group("plain@x.com".to_string());
        assert_eq!(group.sender_name, "plain@x.com");

        let mut agg = SenderAggregate::new("  ".to_string());
        agg.record(meta(2, 1, 10), 5);
        let group = agg.into_group("plain@x.com".to_string());
        assert_eq!(group.sender_name, "plain@x.com");
    }

    #[test]
    fn serializes_to_json() {
        let mut agg = SenderAggregate::new("Alice".to_string());
        agg.record(meta(7, 1, 42), 10);
        let group = agg.into_group("alice@example.com".to_string());
        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(json["sender_email"], "alice@example.com");
        assert_eq!(json["email_count"], 1);
        assert_eq!(json["emails"][0]["id"], 7);
    }
}
