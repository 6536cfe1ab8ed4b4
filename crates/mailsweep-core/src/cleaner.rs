//! The mailbox cleanup engine.
//!
//! [`MailboxCleaner`] owns at most one live session and drives the three
//! core operations: scanning the mailbox into per-sender groups, deleting
//! by explicit id list, and deleting everything from one sender.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::AccountConfig;
use crate::error::{Error, Result};
use crate::filter::{self, DateFilter};
use crate::model::{MessageMetadata, NO_SUBJECT, SenderAggregate, SenderGroup};
use crate::parse::{MimeSenderParser, SenderParser, UNKNOWN_EMAIL, resolve_sender};
use crate::session::{MailSession, MessageId, SessionProvider};
use crate::status::{OP_CANCELLED, OP_COMPLETED, OP_ERROR, ProcessingStatus, StatusHandle};

/// Tunables for scan behavior.
#[derive(Debug, Clone, Copy)]
pub struct SweepOptions {
    /// Ids fetched per envelope batch.
    pub batch_size: usize,
    /// Messages retained per sender as a sample.
    pub sample_cap: usize,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            batch_size: 2000,
            sample_cap: 10,
        }
    }
}

/// Cooperative cancellation flag, checked at batch boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Requests cancellation of the current scan.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Cleared at the start of each scan so a stale request cannot abort it.
    fn clear(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

/// Mailbox cleanup engine over a pluggable session backend.
pub struct MailboxCleaner<P: SessionProvider, H: SenderParser = MimeSenderParser> {
    provider: P,
    parser: H,
    session: Option<P::Session>,
    status: StatusHandle,
    cancel: CancelToken,
    options: SweepOptions,
}

impl<P: SessionProvider> MailboxCleaner<P> {
    /// Creates a cleaner with the default MIME sender parser.
    pub fn new(provider: P) -> Self {
        Self::with_parser(provider, MimeSenderParser)
    }
}

impl<P: SessionProvider, H: SenderParser> MailboxCleaner<P, H> {
    /// Creates a cleaner with a custom sender parser.
    pub fn with_parser(provider: P, parser: H) -> Self {
        Self {
            provider,
            parser,
            session: None,
            status: StatusHandle::default(),
            cancel: CancelToken::default(),
            options: SweepOptions::default(),
        }
    }

    /// Overrides the scan tunables.
    #[must_use]
    pub fn with_options(mut self, options: SweepOptions) -> Self {
        self.options = options;
        self
    }

    /// Connects and authenticates, replacing any existing session.
    ///
    /// Returns whether a session is now established; the failure itself is
    /// logged, not returned.
    pub async fn connect(&mut self, config: &AccountConfig) -> bool {
        self.disconnect().await;

        match self.provider.connect(config).await {
            Ok(session) => {
                info!(host = %config.host, mailbox = %config.mailbox, "session established");
                self.session = Some(session);
                true
            }
            Err(error) => {
                warn!(host = %config.host, %error, "connection failed");
                false
            }
        }
    }

    /// Ends the session, if any. Logout errors are discarded.
    pub async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("closing session");
            session.logout().await;
        }
    }

    /// Probes the server to check the session is live.
    ///
    /// A failed probe reports false but keeps the session; the next
    /// operation will surface the real error.
    pub async fn is_connected(&mut self) -> bool {
        match self.session.as_mut() {
            Some(session) => match session.probe().await {
                Ok(()) => true,
                Err(error) => {
                    debug!(%error, "liveness probe failed");
                    false
                }
            },
            None => false,
        }
    }

    /// Snapshot of the current scan progress.
    #[must_use]
    pub fn status(&self) -> ProcessingStatus {
        self.status.snapshot()
    }

    /// Shared progress handle for observing a scan from another task.
    #[must_use]
    pub fn status_handle(&self) -> StatusHandle {
        self.status.clone()
    }

    /// Token for cancelling a running scan from another task.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Scans the mailbox and aggregates messages per sender.
    ///
    /// Groups are ordered by descending message count, ties broken by
    /// address. A failure discards all partial aggregates.
    pub async fn retrieve(&mut self, date_filter: &DateFilter) -> Result<Vec<SenderGroup>> {
        let session = self.session.as_mut().ok_or(Error::NotConnected)?;

        let result = scan(
            session,
            &self.parser,
            &self.status,
            &self.cancel,
            &self.options,
            date_filter,
        )
        .await;

        match result {
            Ok(groups) => {
                info!(senders = groups.len(), "scan complete");
                Ok(groups)
            }
            Err(Error::Cancelled) => {
                self.status.finish(OP_CANCELLED);
                info!("scan cancelled");
                Err(Error::Cancelled)
            }
            Err(error) => {
                self.status.finish(OP_ERROR);
                Err(Error::Retrieval {
                    source: Box::new(error),
                })
            }
        }
    }

    /// Permanently deletes the given messages.
    ///
    /// An empty id list succeeds with zero without contacting the store.
    /// Returns the number of ids requested; the store does not report how
    /// many actually existed.
    pub async fn delete_by_ids(&mut self, ids: &[MessageId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let session = self.session.as_mut().ok_or(Error::NotConnected)?;

        let result = async {
            session.mark_deleted(ids).await?;
            session.expunge().await?;
            Ok(ids.len())
        }
        .await;

        match result {
            Ok(count) => {
                info!(count, "deleted messages by id");
                Ok(count)
            }
            Err(error) => Err(Error::Deletion {
                source: Box::new(Error::Transport(error)),
            }),
        }
    }

    /// Permanently deletes every message from the given sender.
    pub async fn delete_by_sender(&mut self, sender_email: &str) -> Result<usize> {
        self.delete_by_sender_with_filter(sender_email, &DateFilter::All)
            .await
    }

    /// Permanently deletes messages from the given sender within a date
    /// filter.
    ///
    /// The sender match is a substring match on the `From` header, so an
    /// address matches regardless of display-name decoration. Returns the
    /// number of messages that matched the search.
    pub async fn delete_by_sender_with_filter(
        &mut self,
        sender_email: &str,
        date_filter: &DateFilter,
    ) -> Result<usize> {
        if sender_email.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "sender email must not be empty".to_string(),
            ));
        }
        let session = self.session.as_mut().ok_or(Error::NotConnected)?;

        let query = filter::sender_query(sender_email, date_filter);
        let result = async {
            let ids = session.search(&query).await?;
            if ids.is_empty() {
                return Ok(0);
            }
            session.mark_deleted(&ids).await?;
            session.expunge().await?;
            Ok(ids.len())
        }
        .await;

        match result {
            Ok(count) => {
                info!(sender = sender_email, count, "deleted messages by sender");
                Ok(count)
            }
            Err(error) => Err(Error::Deletion {
                source: Box::new(Error::Transport(error)),
            }),
        }
    }
}

/// Runs the batched scan against a live session.
async fn scan<S: MailSession, H: SenderParser>(
    session: &mut S,
    parser: &H,
    status: &StatusHandle,
    cancel: &CancelToken,
    options: &SweepOptions,
    date_filter: &DateFilter,
) -> Result<Vec<SenderGroup>> {
    let query = date_filter.to_query();
    let ids = session.search(&query).await?;
    if ids.is_empty() {
        debug!("no messages match the filter");
        return Ok(Vec::new());
    }

    let total = ids.len();
    let batch_size = options.batch_size.max(1);
    status.begin(total as u64, total.div_ceil(batch_size) as u64);
    cancel.clear();
    debug!(total, batch_size, "scan started");

    let mut aggregates: HashMap<String, SenderAggregate> = HashMap::new();

    for batch in ids.chunks(batch_size) {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        status.start_batch();

        let records = session.fetch_envelopes(batch).await?;
        for record in records {
            let Some(sender_raw) = record.sender_raw else {
                // No sender at all: skipped, still counted as processed.
                status.record_processed();
                continue;
            };

            let sender = resolve_sender(parser, &sender_raw);
            let key = sender.email.to_lowercase();

            let metadata = MessageMetadata {
                id: record.id,
                sender_raw,
                subject: record
                    .subject
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| NO_SUBJECT.to_string()),
                timestamp: record.internal_date.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
                size_bytes: u64::from(record.size.unwrap_or(0)),
            };

            aggregates
                .entry(key)
                .or_insert_with(|| SenderAggregate::new(sender.display_name))
                .record(metadata, options.sample_cap);
            status.record_processed();
        }
    }

    let mut groups: Vec<SenderGroup> = aggregates
        .into_iter()
        .filter(|(email, _)| is_reportable_sender(email))
        .map(|(email, aggregate)| aggregate.into_group(email))
        .collect();

    groups.sort_by(|a, b| {
        b.email_count
            .cmp(&a.email_count)
            .then_with(|| a.sender_email.cmp(&b.sender_email))
    });

    status.finish(OP_COMPLETED);
    Ok(groups)
}

/// Whether an aggregation key identifies a real, reportable sender.
fn is_reportable_sender(email: &str) -> bool {
    !email.is_empty()
        && email.contains('@')
        && email != UNKNOWN_EMAIL
        && !email.starts_with("unknown")
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
    fn reportable_sender_rules() {
        assert!(is_reportable_sender("alice@example.com"));
        assert!(!is_reportable_sender(""));
        assert!(!is_reportable_sender("not-an-address"));
        assert!(!is_reportable_sender(UNKNOWN_EMAIL));
        assert!(!is_reportable_sender("unknown@other.host"));
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::default();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
        other.clear();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn default_options() {
        let options = SweepOptions::default();
        assert_eq!(options.batch_size, 2000);
        assert_eq!(options.sample_cap, 10);
    }
}
