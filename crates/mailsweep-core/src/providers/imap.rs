//! IMAP-backed session provider.
//!
//! Bridges the engine's session traits onto [`mailsweep_imap::ImapClient`]:
//! queries become UID SEARCH criteria, envelope fetches become UID FETCH
//! with a header-fields literal, and deletion is mark-then-expunge.

use chrono::{DateTime, NaiveDate, Utc};
use mailsweep_imap::{Config, ImapClient, SearchCriteria, Security, UidSet};

use crate::config::{self, AccountConfig};
use crate::filter::SearchQuery;
use crate::session::{
    EnvelopeRecord, MailSession, MessageId, SessionError, SessionOp, SessionProvider,
};

/// INTERNALDATE timestamp format, e.g. `17-Jul-2024 02:44:25 -0700`.
const INTERNAL_DATE_FORMAT: &str = "%d-%b-%Y %H:%M:%S %z";

/// Opens IMAP sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImapSessionProvider;

impl SessionProvider for ImapSessionProvider {
    type Session = ImapSession;

    async fn connect(&self, config: &AccountConfig) -> Result<ImapSession, SessionError> {
        let imap_config = Config::builder(&config.host)
            .port(config.effective_port())
            .security(map_security(config.security))
            .build();

        let mut client = ImapClient::connect(&imap_config)
            .await
            .map_err(|e| SessionError::new(SessionOp::Connect, e))?;
        client
            .login(&config.username, &config.password)
            .await
            .map_err(|e| SessionError::new(SessionOp::Authenticate, e))?;
        client
            .select(&config.mailbox)
            .await
            .map_err(|e| SessionError::new(SessionOp::OpenMailbox, e))?;

        Ok(ImapSession { client })
    }
}

/// A live IMAP session with one mailbox selected.
pub struct ImapSession {
    client: ImapClient,
}

impl MailSession for ImapSession {
    async fn search(&mut self, query: &SearchQuery) -> Result<Vec<MessageId>, SessionError> {
        let criteria = to_criteria(query);
        let uids = self
            .client
            .uid_search(&criteria)
            .await
            .map_err(|e| SessionError::new(SessionOp::Search, e))?;
        Ok(uids.into_iter().filter_map(MessageId::new).collect())
    }

    async fn fetch_envelopes(
        &mut self,
        ids: &[MessageId],
    ) -> Result<Vec<EnvelopeRecord>, SessionError> {
        let uids: Vec<u32> = ids.iter().map(|id| id.get()).collect();
        let Some(set) = UidSet::new(&uids) else {
            return Ok(Vec::new());
        };

        let summaries = self
            .client
            .uid_fetch_summaries(&set)
            .await
            .map_err(|e| SessionError::new(SessionOp::Fetch, e))?;
        Ok(summaries.into_iter().filter_map(to_record).collect())
    }

    async fn mark_deleted(&mut self, ids: &[MessageId]) -> Result<(), SessionError> {
        let uids: Vec<u32> = ids.iter().map(|id| id.get()).collect();
        let Some(set) = UidSet::new(&uids) else {
            return Ok(());
        };
        self.client
            .uid_mark_deleted(&set)
            .await
            .map_err(|e| SessionError::new(SessionOp::MarkDeleted, e))
    }

    async fn expunge(&mut self) -> Result<(), SessionError> {
        self.client
            .expunge()
            .await
            .map_err(|e| SessionError::new(SessionOp::Expunge, e))
    }

    async fn probe(&mut self) -> Result<(), SessionError> {
        self.client
            .noop()
            .await
            .map_err(|e| SessionError::new(SessionOp::Probe, e))
    }

    async fn logout(self) {
        self.client.logout().await;
    }
}

const fn map_security(security: config::Security) -> Security {
    match security {
        config::Security::None => Security::None,
        config::Security::StartTls => Security::StartTls,
        config::Security::Tls => Security::Implicit,
    }
}

fn to_criteria(query: &SearchQuery) -> SearchCriteria {
    match query {
        SearchQuery::All => SearchCriteria::All,
        SearchQuery::Before(date) => SearchCriteria::Before(imap_date(*date)),
        SearchQuery::Since(date) => SearchCriteria::Since(imap_date(*date)),
        SearchQuery::FromContains(text) => SearchCriteria::From(text.clone()),
        SearchQuery::And(queries) => SearchCriteria::And(queries.iter().map(to_criteria).collect()),
    }
}

fn imap_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string()
}

/// Converts a FETCH summary to an envelope record.
///
/// Records without a UID are dropped; unparseable attributes degrade to
/// `None` rather than failing the batch.
fn to_record(summary: mailsweep_imap::FetchSummary) -> Option<EnvelopeRecord> {
    let id = summary.uid.and_then(MessageId::new)?;
    let (sender_raw, subject) = summary
        .header
        .map_or((None, None), |block| header_fields(&block));
    let internal_date = summary
        .internal_date
        .as_deref()
        .and_then(parse_internal_date);

    Some(EnvelopeRecord {
        id,
        sender_raw,
        subject,
        internal_date,
        size: summary.size,
    })
}

/// Extracts the `From` and `Subject` values from a header-fields block,
/// unfolding continuation lines. The subject is RFC 2047 decoded; the
/// sender is kept raw for the sender parser.
fn header_fields(block: &str) -> (Option<String>, Option<String>) {
    enum Field {
        From,
        Subject,
    }

    let mut from = None;
    let mut subject = None;
    let mut current: Option<(Field, String)> = None;

    for line in block.lines() {
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = current.as_mut() {
                value.push(' ');
                value.push_str(line.trim_start());
            }
            continue;
        }

        match current.take() {
            Some((Field::From, value)) => from = Some(value),
            Some((Field::Subject, value)) => subject = Some(value),
            None => {}
        }

        if let Some((name, value)) = line.split_once(':') {
            let field = if name.eq_ignore_ascii_case("from") {
                Some(Field::From)
            } else if name.eq_ignore_ascii_case("subject") {
                Some(Field::Subject)
            } else {
                None
            };
            if let Some(field) = field {
                current = Some((field, value.trim().to_string()));
            }
        }
    }
    match current.take() {
        Some((Field::From, value)) => from = Some(value),
        Some((Field::Subject, value)) => subject = Some(value),
        None => {}
    }

    let subject = subject.map(|s| mailsweep_mime::encoding::decode_header_value(&s));
    (from, subject)
}

fn parse_internal_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw.trim(), INTERNAL_DATE_FORMAT)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
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

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    mod criteria {
        use super::*;

        #[test]
        fn dates_use_imap_format() {
            let c = to_criteria(&SearchQuery::Before(date(2024, 1, 5)));
            assert_eq!(c, SearchCriteria::Before("05-Jan-2024".to_string()));

            let c = to_criteria(&SearchQuery::Since(date(2023, 11, 30)));
            assert_eq!(c, SearchCriteria::Since("30-Nov-2023".to_string()));
        }

        #[test]
        fn and_recurses() {
            let c = to_criteria(&SearchQuery::And(vec![
                SearchQuery::FromContains("a@x.com".to_string()),
                SearchQuery::Before(date(2024, 1, 1)),
            ]));
            assert_eq!(
                c.to_imap_string(),
                "FROM a@x.com BEFORE 01-Jan-2024".to_string()
            );
        }
    }

    mod headers {
        use super::*;

        #[test]
        fn extracts_from_and_subject() {
            let block = "From: Alice <alice@example.com>\r\nSubject: Hello\r\n\r\n";
            let (from, subject) = header_fields(block);
            assert_eq!(from.as_deref(), Some("Alice <alice@example.com>"));
            assert_eq!(subject.as_deref(), Some("Hello"));
        }

        #[test]
        fn unfolds_continuation_lines() {
            let block = "Subject: a very\r\n long subject\r\nFrom: a@x.com\r\n";
            let (from, subject) = header_fields(block);
            assert_eq!(subject.as_deref(), Some("a very long subject"));
            assert_eq!(from.as_deref(), Some("a@x.com"));
        }

        #[test]
        fn decodes_encoded_subject() {
            let block = "Subject: =?UTF-8?B?SGVsbG8=?=\r\nFrom: a@x.com\r\n";
            let (_, subject) = header_fields(block);
            assert_eq!(subject.as_deref(), Some("Hello"));
        }

        #[test]
        fn sender_is_left_raw() {
            let block = "From: =?UTF-8?B?Qm9i?= <bob@x.com>\r\n";
            let (from, _) = header_fields(block);
            assert_eq!(from.as_deref(), Some("=?UTF-8?B?Qm9i?= <bob@x.com>"));
        }

        #[test]
        fn missing_fields_are_none() {
            let (from, subject) = header_fields("Date: whenever\r\n");
            assert!(from.is_none());
            assert!(subject.is_none());
        }
    }

    mod records {
        use super::*;
        use mailsweep_imap::FetchSummary;

        #[test]
        fn full_summary_converts() {
            let summary = FetchSummary {
                uid: Some(42),
                size: Some(1024),
                internal_date: Some("17-Jul-2024 02:44:25 -0700".to_string()),
                header: Some("From: a@x.com\r\nSubject: Hi\r\n\r\n".to_string()),
            };
            let record = to_record(summary).unwrap();
            assert_eq!(record.id.get(), 42);
            assert_eq!(record.size, Some(1024));
            assert_eq!(record.sender_raw.as_deref(), Some("a@x.com"));
            assert_eq!(record.subject.as_deref(), Some("Hi"));
            assert_eq!(
                record.internal_date.unwrap(),
                Utc.with_ymd_and_hms(2024, 7, 17, 9, 44, 25).unwrap()
            );
        }

        #[test]
        fn missing_uid_drops_record() {
            let summary = FetchSummary {
                uid: None,
                size: Some(10),
                internal_date: None,
                header: None,
            };
            assert!(to_record(summary).is_none());
        }

        #[test]
        fn bad_internal_date_degrades_to_none() {
            let summary = FetchSummary {
                uid: Some(1),
                size: None,
                internal_date: Some("not a date".to_string()),
                header: None,
            };
            let record = to_record(summary).unwrap();
            assert!(record.internal_date.is_none());
        }
    }
}
