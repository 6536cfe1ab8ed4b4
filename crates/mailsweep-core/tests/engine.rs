//! End-to-end engine tests against an in-memory mail session.

#![allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::similar_names
)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use mailsweep_core::{
    AccountConfig, CancelToken, EnvelopeRecord, Error, MailSession, MailboxCleaner, MessageId,
    SearchQuery, Security, SessionError, SessionOp, SessionProvider, SweepOptions,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Search(String),
    Fetch(Vec<u32>),
    MarkDeleted(Vec<u32>),
    Expunge,
    Probe,
    Logout,
}

type CallLog = Arc<Mutex<Vec<Call>>>;

struct MockSession {
    records: Vec<EnvelopeRecord>,
    calls: CallLog,
    fail_first_fetch: bool,
    probe_ok: bool,
    cancel_slot: Arc<Mutex<Option<CancelToken>>>,
    fetch_count: usize,
}

impl MockSession {
    fn new(records: Vec<EnvelopeRecord>, calls: CallLog) -> Self {
        Self {
            records,
            calls,
            fail_first_fetch: false,
            probe_ok: true,
            cancel_slot: Arc::new(Mutex::new(None)),
            fetch_count: 0,
        }
    }

    fn log(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn matches(record: &EnvelopeRecord, query: &SearchQuery) -> bool {
    match query {
        SearchQuery::All => true,
        SearchQuery::FromContains(text) => record
            .sender_raw
            .as_deref()
            .is_some_and(|s| s.contains(text)),
        SearchQuery::Before(date) => record
            .internal_date
            .is_some_and(|ts| ts.date_naive() < *date),
        SearchQuery::Since(date) => record
            .internal_date
            .is_some_and(|ts| ts.date_naive() >= *date),
        SearchQuery::And(queries) => queries.iter().all(|q| matches(record, q)),
    }
}

impl MailSession for MockSession {
    async fn search(&mut self, query: &SearchQuery) -> Result<Vec<MessageId>, SessionError> {
        self.log(Call::Search(format!("{query:?}")));
        Ok(self
            .records
            .iter()
            .filter(|r| matches(r, query))
            .map(|r| r.id)
            .collect())
    }

    async fn fetch_envelopes(
        &mut self,
        ids: &[MessageId],
    ) -> Result<Vec<EnvelopeRecord>, SessionError> {
        self.log(Call::Fetch(ids.iter().map(|id| id.get()).collect()));
        self.fetch_count += 1;
        if self.fail_first_fetch && self.fetch_count == 1 {
            return Err(SessionError::new(SessionOp::Fetch, "connection reset"));
        }
        if let Some(token) = self.cancel_slot.lock().unwrap().as_ref() {
            token.cancel();
        }
        Ok(self
            .records
            .iter()
            .filter(|r| ids.contains(&r.id))
            .cloned()
            .collect())
    }

    async fn mark_deleted(&mut self, ids: &[MessageId]) -> Result<(), SessionError> {
        self.log(Call::MarkDeleted(ids.iter().map(|id| id.get()).collect()));
        Ok(())
    }

    async fn expunge(&mut self) -> Result<(), SessionError> {
        self.log(Call::Expunge);
        Ok(())
    }

    async fn probe(&mut self) -> Result<(), SessionError> {
        self.log(Call::Probe);
        if self.probe_ok {
            Ok(())
        } else {
            Err(SessionError::new(SessionOp::Probe, "gone away"))
        }
    }

    async fn logout(self) {
        self.log(Call::Logout);
    }
}

struct MockProvider {
    sessions: Mutex<VecDeque<MockSession>>,
}

impl MockProvider {
    fn single(session: MockSession) -> Self {
        Self {
            sessions: Mutex::new(VecDeque::from([session])),
        }
    }

    fn empty() -> Self {
        Self {
            sessions: Mutex::new(VecDeque::new()),
        }
    }
}

impl SessionProvider for MockProvider {
    type Session = MockSession;

    async fn connect(&self, _config: &AccountConfig) -> Result<MockSession, SessionError> {
        self.sessions
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| SessionError::new(SessionOp::Connect, "server unavailable"))
    }
}

fn config() -> AccountConfig {
    AccountConfig {
        host: "imap.example.com".to_string(),
        port: None,
        security: Security::Tls,
        username: "user".to_string(),
        password: "pass".to_string(),
        mailbox: "INBOX".to_string(),
    }
}

fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

fn record(id: u32, from: &str, subject: &str, date: DateTime<Utc>, size: u32) -> EnvelopeRecord {
    EnvelopeRecord {
        id: MessageId::new(id).unwrap(),
        sender_raw: Some(from.to_string()),
        subject: Some(subject.to_string()),
        internal_date: Some(date),
        size: Some(size),
    }
}

async fn connected_cleaner(
    records: Vec<EnvelopeRecord>,
) -> (MailboxCleaner<MockProvider>, CallLog) {
    let calls: CallLog = Arc::default();
    let session = MockSession::new(records, calls.clone());
    let mut cleaner = MailboxCleaner::new(MockProvider::single(session));
    assert!(cleaner.connect(&config()).await);
    (cleaner, calls)
}

mod connection {
    use super::*;

    #[tokio::test]
    async fn connect_success_and_probe() {
        let (mut cleaner, calls) = connected_cleaner(vec![]).await;
        assert!(cleaner.is_connected().await);
        assert!(calls.lock().unwrap().contains(&Call::Probe));
    }

    #[tokio::test]
    async fn connect_failure_returns_false() {
        let mut cleaner = MailboxCleaner::new(MockProvider::empty());
        assert!(!cleaner.connect(&config()).await);
        assert!(!cleaner.is_connected().await);
    }

    #[tokio::test]
    async fn disconnect_logs_out_and_drops_session() {
        let (mut cleaner, calls) = connected_cleaner(vec![]).await;
        cleaner.disconnect().await;
        assert!(calls.lock().unwrap().contains(&Call::Logout));
        assert!(!cleaner.is_connected().await);
    }

    #[tokio::test]
    async fn failed_probe_reports_disconnected() {
        let calls: CallLog = Arc::default();
        let mut session = MockSession::new(vec![], calls.clone());
        session.probe_ok = false;
        let mut cleaner = MailboxCleaner::new(MockProvider::single(session));
        assert!(cleaner.connect(&config()).await);
        assert!(!cleaner.is_connected().await);
    }
}

mod retrieval {
    use super::*;
    use mailsweep_core::DateFilter;

    #[tokio::test]
    async fn groups_by_normalized_sender() {
        let (mut cleaner, _) = connected_cleaner(vec![
            record(1, "Alice <ALICE@Example.COM>", "a", ts(2024, 7, 1), 100),
            record(2, "alice@example.com", "b", ts(2024, 7, 2), 200),
            record(3, "Bob <bob@x.org>", "c", ts(2024, 7, 3), 50),
        ])
        .await;

        let groups = cleaner.retrieve(&DateFilter::All).await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].sender_email, "alice@example.com");
        assert_eq!(groups[0].sender_name, "Alice");
        assert_eq!(groups[0].email_count, 2);
        assert_eq!(groups[0].total_size_bytes, 300);
        assert_eq!(groups[1].sender_email, "bob@x.org");
    }

    #[tokio::test]
    async fn sorted_by_count_then_address() {
        let (mut cleaner, _) = connected_cleaner(vec![
            record(1, "c@z.net", "s", ts(2024, 7, 1), 1),
            record(2, "a@z.net", "s", ts(2024, 7, 1), 1),
            record(3, "b@z.net", "s", ts(2024, 7, 1), 1),
            record(4, "b@z.net", "s", ts(2024, 7, 2), 1),
        ])
        .await;

        let groups = cleaner.retrieve(&DateFilter::All).await.unwrap();
        let order: Vec<&str> = groups.iter().map(|g| g.sender_email.as_str()).collect();
        assert_eq!(order, vec!["b@z.net", "a@z.net", "c@z.net"]);
    }

    #[tokio::test]
    async fn sample_is_capped_but_counts_are_not() {
        let records: Vec<EnvelopeRecord> = (1..=12)
            .map(|i| record(i, "bulk@list.com", "s", ts(2024, 7, i), 10))
            .collect();
        let (mut cleaner, _) = connected_cleaner(records).await;

        let groups = cleaner.retrieve(&DateFilter::All).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].email_count, 12);
        assert_eq!(groups[0].total_size_bytes, 120);
        assert_eq!(groups[0].emails.len(), 10);

        // Sample holds the first ten encountered, newest first.
        let ids: Vec<u32> = groups[0].emails.iter().map(|m| m.id.get()).collect();
        assert_eq!(ids, (1..=10).rev().collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn bare_sender_name_defaults_to_address() {
        let (mut cleaner, _) = connected_cleaner(vec![
            record(1, "plain@x.com", "s", ts(2024, 7, 1), 1),
            record(2, "Named <named@y.org>", "s", ts(2024, 7, 1), 1),
        ])
        .await;

        let groups = cleaner.retrieve(&DateFilter::All).await.unwrap();
        let plain = groups
            .iter()
            .find(|g| g.sender_email == "plain@x.com")
            .unwrap();
        assert_eq!(plain.sender_name, "plain@x.com");

        let named = groups
            .iter()
            .find(|g| g.sender_email == "named@y.org")
            .unwrap();
        assert_eq!(named.sender_name, "Named");
    }

    #[tokio::test]
    async fn substitutes_defaults_for_missing_fields() {
        let (mut cleaner, _) = connected_cleaner(vec![EnvelopeRecord {
            id: MessageId::new(1).unwrap(),
            sender_raw: Some("a@x.com".to_string()),
            subject: Some("   ".to_string()),
            internal_date: None,
            size: None,
        }])
        .await;

        let groups = cleaner.retrieve(&DateFilter::All).await.unwrap();
        let meta = &groups[0].emails[0];
        assert_eq!(meta.subject, "No Subject");
        assert_eq!(meta.timestamp, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(meta.size_bytes, 0);
    }

    #[tokio::test]
    async fn unparseable_senders_are_not_reported() {
        let (mut cleaner, _) = connected_cleaner(vec![
            record(1, "total garbage", "s", ts(2024, 7, 1), 1),
            record(2, "real@sender.com", "s", ts(2024, 7, 1), 1),
            EnvelopeRecord {
                id: MessageId::new(3).unwrap(),
                sender_raw: None,
                subject: Some("s".to_string()),
                internal_date: Some(ts(2024, 7, 1)),
                size: Some(1),
            },
        ])
        .await;

        let groups = cleaner.retrieve(&DateFilter::All).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].sender_email, "real@sender.com");

        // Skipped records still count toward progress.
        let status = cleaner.status();
        assert_eq!(status.processed_emails, 3);
        assert_eq!(status.total_emails, 3);
    }

    #[tokio::test]
    async fn empty_mailbox_returns_empty_without_status_churn() {
        let (mut cleaner, calls) = connected_cleaner(vec![]).await;

        let groups = cleaner.retrieve(&DateFilter::All).await.unwrap();
        assert!(groups.is_empty());
        assert!(!cleaner.status().is_processing);
        assert_eq!(cleaner.status().total_emails, 0);
        // Only the search was issued.
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn date_filter_reaches_the_search() {
        let (mut cleaner, _) = connected_cleaner(vec![
            record(1, "old@x.com", "s", ts(2020, 1, 1), 1),
            record(2, "new@x.com", "s", ts(2030, 1, 1), 1),
        ])
        .await;

        let filter = DateFilter::DateRange {
            start: None,
            end: NaiveDate::from_ymd_opt(2024, 12, 31),
        };
        let groups = cleaner.retrieve(&filter).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].sender_email, "old@x.com");
    }

    #[tokio::test]
    async fn batches_follow_the_configured_size() {
        let records: Vec<EnvelopeRecord> = (1..=5)
            .map(|i| record(i, "a@x.com", "s", ts(2024, 7, 1), 1))
            .collect();
        let calls: CallLog = Arc::default();
        let session = MockSession::new(records, calls.clone());
        let mut cleaner =
            MailboxCleaner::new(MockProvider::single(session)).with_options(SweepOptions {
                batch_size: 2,
                sample_cap: 10,
            });
        assert!(cleaner.connect(&config()).await);

        let groups = cleaner.retrieve(&DateFilter::All).await.unwrap();
        assert_eq!(groups[0].email_count, 5);

        let fetches: Vec<Vec<u32>> = calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                Call::Fetch(ids) => Some(ids.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(fetches, vec![vec![1, 2], vec![3, 4], vec![5]]);

        let status = cleaner.status();
        assert_eq!(status.total_batches, 3);
        assert_eq!(status.current_batch, 3);
        assert_eq!(status.current_operation, "Completed");
        assert!(!status.is_processing);
    }

    #[tokio::test]
    async fn scan_is_deterministic() {
        let records = vec![
            record(1, "a@x.com", "s", ts(2024, 7, 1), 10),
            record(2, "b@x.com", "s", ts(2024, 7, 2), 20),
            record(3, "a@x.com", "s", ts(2024, 7, 3), 30),
        ];
        let (mut first, _) = connected_cleaner(records.clone()).await;
        let (mut second, _) = connected_cleaner(records).await;

        let a = first.retrieve(&DateFilter::All).await.unwrap();
        let b = second.retrieve(&DateFilter::All).await.unwrap();
        assert_eq!(a, b);
    }
}

mod failures {
    use super::*;
    use mailsweep_core::DateFilter;

    #[tokio::test]
    async fn fetch_failure_discards_partial_results() {
        let calls: CallLog = Arc::default();
        let mut session = MockSession::new(
            vec![record(1, "a@x.com", "s", ts(2024, 7, 1), 1)],
            calls.clone(),
        );
        session.fail_first_fetch = true;
        let mut cleaner = MailboxCleaner::new(MockProvider::single(session));
        assert!(cleaner.connect(&config()).await);

        let err = cleaner.retrieve(&DateFilter::All).await.unwrap_err();
        assert!(matches!(err, Error::Retrieval { .. }));
        assert!(err.to_string().contains("fetch failed"));

        let status = cleaner.status();
        assert!(!status.is_processing);
        assert_eq!(status.current_operation, "Error occurred");

        // The session survives; a retry succeeds.
        let groups = cleaner.retrieve(&DateFilter::All).await.unwrap();
        assert_eq!(groups.len(), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_at_the_batch_boundary() {
        let records: Vec<EnvelopeRecord> = (1..=4)
            .map(|i| record(i, "a@x.com", "s", ts(2024, 7, 1), 1))
            .collect();
        let calls: CallLog = Arc::default();
        let session = MockSession::new(records, calls.clone());
        let cancel_slot = session.cancel_slot.clone();
        let mut cleaner =
            MailboxCleaner::new(MockProvider::single(session)).with_options(SweepOptions {
                batch_size: 2,
                sample_cap: 10,
            });
        assert!(cleaner.connect(&config()).await);

        // The session cancels the scan during the first fetch; the second
        // batch must never be requested.
        *cancel_slot.lock().unwrap() = Some(cleaner.cancel_token());

        let err = cleaner.retrieve(&DateFilter::All).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(cleaner.status().current_operation, "Cancelled");

        let fetch_calls = calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, Call::Fetch(_)))
            .count();
        assert_eq!(fetch_calls, 1);
    }

    #[tokio::test]
    async fn operations_require_a_session() {
        let mut cleaner = MailboxCleaner::new(MockProvider::empty());

        assert!(matches!(
            cleaner.retrieve(&DateFilter::All).await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            cleaner.delete_by_ids(&[MessageId::new(1).unwrap()]).await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            cleaner.delete_by_sender("a@x.com").await,
            Err(Error::NotConnected)
        ));

        // The idle status is untouched by rejected calls.
        let status = cleaner.status();
        assert!(!status.is_processing);
        assert_eq!(status.current_operation, "Idle");
        assert_eq!(status.total_emails, 0);
    }
}

mod deletion {
    use super::*;
    use mailsweep_core::DateFilter;

    #[tokio::test]
    async fn delete_by_ids_marks_then_expunges() {
        let (mut cleaner, calls) = connected_cleaner(vec![]).await;

        let ids: Vec<MessageId> = [4, 5, 9]
            .iter()
            .map(|&i| MessageId::new(i).unwrap())
            .collect();
        let count = cleaner.delete_by_ids(&ids).await.unwrap();
        assert_eq!(count, 3);

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0], Call::MarkDeleted(vec![4, 5, 9]));
        assert_eq!(calls[1], Call::Expunge);
    }

    #[tokio::test]
    async fn empty_id_list_never_contacts_the_store() {
        let (mut cleaner, calls) = connected_cleaner(vec![]).await;
        assert_eq!(cleaner.delete_by_ids(&[]).await.unwrap(), 0);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_by_sender_matches_substring_of_from() {
        let (mut cleaner, calls) = connected_cleaner(vec![
            record(1, "News <news@shop.com>", "s", ts(2024, 7, 1), 1),
            record(2, "news@shop.com", "s", ts(2024, 7, 2), 1),
            record(3, "other@x.com", "s", ts(2024, 7, 3), 1),
        ])
        .await;

        let count = cleaner.delete_by_sender("news@shop.com").await.unwrap();
        assert_eq!(count, 2);

        let calls = calls.lock().unwrap();
        assert!(calls.contains(&Call::MarkDeleted(vec![1, 2])));
        assert!(calls.contains(&Call::Expunge));
    }

    #[tokio::test]
    async fn delete_by_sender_applies_the_date_filter() {
        let (mut cleaner, calls) = connected_cleaner(vec![
            record(1, "a@x.com", "s", ts(2020, 1, 15), 1),
            record(2, "a@x.com", "s", ts(2030, 1, 15), 1),
        ])
        .await;

        let filter = DateFilter::DateRange {
            start: None,
            end: NaiveDate::from_ymd_opt(2024, 12, 31),
        };
        let count = cleaner
            .delete_by_sender_with_filter("a@x.com", &filter)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert!(calls.lock().unwrap().contains(&Call::MarkDeleted(vec![1])));
    }

    #[tokio::test]
    async fn delete_by_sender_with_no_matches_skips_deletion() {
        let (mut cleaner, calls) =
            connected_cleaner(vec![record(1, "a@x.com", "s", ts(2024, 7, 1), 1)]).await;

        let count = cleaner.delete_by_sender("nobody@y.com").await.unwrap();
        assert_eq!(count, 0);

        let calls = calls.lock().unwrap();
        assert!(!calls.iter().any(|c| matches!(c, Call::MarkDeleted(_))));
        assert!(!calls.contains(&Call::Expunge));
    }

    #[tokio::test]
    async fn empty_sender_is_rejected() {
        let (mut cleaner, calls) = connected_cleaner(vec![]).await;

        let err = cleaner.delete_by_sender("   ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(calls.lock().unwrap().is_empty());
    }
}

mod properties {
    use super::*;
    use mailsweep_core::DateFilter;
    use proptest::prelude::*;

    fn arb_records() -> impl Strategy<Value = Vec<EnvelopeRecord>> {
        proptest::collection::vec(
            (1u32..500, 0usize..5, 1u32..100_000, 0u32..1000),
            1..120,
        )
        .prop_map(|specs| {
            let mut seen = std::collections::HashSet::new();
            specs
                .into_iter()
                .filter(|(id, ..)| seen.insert(*id))
                .map(|(id, sender_idx, size, day_offset)| {
                    let senders = ["a@x.com", "b@x.com", "C@X.com", "d@y.org", "e@y.org"];
                    record(
                        id,
                        senders[sender_idx],
                        "s",
                        ts(2024, 1, 1) + chrono::Duration::days(i64::from(day_offset)),
                        size,
                    )
                })
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn counts_and_sizes_are_conserved(records in arb_records()) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            runtime.block_on(async {
                let expected_count = records.len() as u64;
                let expected_size: u64 =
                    records.iter().map(|r| u64::from(r.size.unwrap())).sum();

                let (mut cleaner, _) = connected_cleaner(records).await;
                let groups = cleaner.retrieve(&DateFilter::All).await.unwrap();

                let total_count: u64 = groups.iter().map(|g| g.email_count).sum();
                let total_size: u64 = groups.iter().map(|g| g.total_size_bytes).sum();
                assert_eq!(total_count, expected_count);
                assert_eq!(total_size, expected_size);

                for group in &groups {
                    assert!(group.emails.len() <= 10);
                    assert!(group.emails.len() as u64 <= group.email_count);
                    assert_eq!(group.sender_email, group.sender_email.to_lowercase());
                }

                let status = cleaner.status();
                assert_eq!(status.processed_emails, status.total_emails);
                assert!((status.progress_percentage() - 100.0).abs() < f64::EPSILON);
            });
        }
    }
}
