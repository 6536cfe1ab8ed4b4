//! Mail store session abstraction.
//!
//! The engine drives a [`MailSession`] obtained from a [`SessionProvider`];
//! the IMAP implementations live in [`crate::providers`], and tests supply
//! in-memory fakes.

use std::num::NonZeroU32;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AccountConfig;
use crate::filter::SearchQuery;

/// Opaque, non-zero message identifier (an IMAP UID for the IMAP backend).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(NonZeroU32);

impl MessageId {
    /// Creates a message id; returns `None` for zero.
    #[must_use]
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Envelope-level data for one message, as reported by the store.
///
/// Every field besides the id is optional; the engine substitutes defaults
/// instead of failing the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeRecord {
    /// Store-assigned message id.
    pub id: MessageId,
    /// Raw `From` header value, undecoded.
    pub sender_raw: Option<String>,
    /// Raw `Subject` header value, decoded if the backend can.
    pub subject: Option<String>,
    /// Server receive timestamp.
    pub internal_date: Option<DateTime<Utc>>,
    /// Message size in bytes.
    pub size: Option<u32>,
}

/// The session operation that failed, for error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOp {
    /// Establishing the connection.
    Connect,
    /// Credential verification.
    Authenticate,
    /// Opening the target mailbox.
    OpenMailbox,
    /// Searching for message ids.
    Search,
    /// Fetching envelope data.
    Fetch,
    /// Flagging messages for deletion.
    MarkDeleted,
    /// Permanently removing flagged messages.
    Expunge,
    /// Liveness probe.
    Probe,
}

impl std::fmt::Display for SessionOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Authenticate => "authenticate",
            Self::OpenMailbox => "open mailbox",
            Self::Search => "search",
            Self::Fetch => "fetch",
            Self::MarkDeleted => "mark deleted",
            Self::Expunge => "expunge",
            Self::Probe => "probe",
        };
        f.write_str(name)
    }
}

/// A failure in the underlying mail store session.
#[derive(Debug, thiserror::Error)]
#[error("{op} failed: {source}")]
pub struct SessionError {
    op: SessionOp,
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl SessionError {
    /// Wraps a backend error with the operation that produced it.
    pub fn new(
        op: SessionOp,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            op,
            source: source.into(),
        }
    }

    /// The operation that failed.
    #[must_use]
    pub const fn op(&self) -> SessionOp {
        self.op
    }
}

/// A live, authenticated session with one mailbox selected.
#[allow(async_fn_in_trait)]
pub trait MailSession {
    /// Returns the ids of all messages matching the query.
    async fn search(&mut self, query: &SearchQuery) -> Result<Vec<MessageId>, SessionError>;

    /// Fetches envelope records for the given ids.
    ///
    /// Backends may return fewer records than ids requested; the engine
    /// treats missing records as skipped, not as errors.
    async fn fetch_envelopes(
        &mut self,
        ids: &[MessageId],
    ) -> Result<Vec<EnvelopeRecord>, SessionError>;

    /// Flags the given messages for deletion.
    async fn mark_deleted(&mut self, ids: &[MessageId]) -> Result<(), SessionError>;

    /// Permanently removes all flagged messages.
    async fn expunge(&mut self) -> Result<(), SessionError>;

    /// Round-trips to the server to verify the session is still live.
    async fn probe(&mut self) -> Result<(), SessionError>;

    /// Ends the session. Best effort; errors are discarded.
    async fn logout(self);
}

/// Opens authenticated sessions against a mail store.
#[allow(async_fn_in_trait)]
pub trait SessionProvider {
    /// The session type this provider produces.
    type Session: MailSession;

    /// Connects, authenticates, and selects the configured mailbox.
    async fn connect(&self, config: &AccountConfig) -> Result<Self::Session, SessionError>;
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
    fn message_id_rejects_zero() {
        assert!(MessageId::new(0).is_none());
        assert_eq!(MessageId::new(42).unwrap().get(), 42);
    }

    #[test]
    fn session_error_carries_op() {
        let err = SessionError::new(SessionOp::Fetch, "boom");
        assert_eq!(err.op(), SessionOp::Fetch);
        assert_eq!(err.to_string(), "fetch failed: boom");
    }

    #[test]
    fn op_display_names() {
        assert_eq!(SessionOp::OpenMailbox.to_string(), "open mailbox");
        assert_eq!(SessionOp::MarkDeleted.to_string(), "mark deleted");
    }
}
