//! Mailbox cleanup engine: scan, aggregate per sender, delete in bulk.
//!
//! The engine connects to a mail store through a pluggable
//! [`SessionProvider`], scans matching messages in batches, groups them per
//! sender with counts, sizes, and a capped sample, and deletes messages
//! either by explicit id list or by sender address. Progress is observable
//! through a shared [`StatusHandle`] and scans can be cancelled between
//! batches via a [`CancelToken`].
//!
//! The IMAP backend lives in [`providers::imap`]; tests drive the engine
//! with in-memory sessions.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod cleaner;
pub mod config;
mod error;
pub mod filter;
pub mod model;
pub mod parse;
pub mod providers;
pub mod session;
pub mod status;

pub use cleaner::{CancelToken, MailboxCleaner, SweepOptions};
pub use config::{AccountConfig, Security};
pub use error::{Error, Result};
pub use filter::{DateFilter, SearchQuery};
pub use model::{MessageMetadata, SenderGroup};
pub use parse::{MimeSenderParser, ParsedSender, SenderParser};
pub use session::{
    EnvelopeRecord, MailSession, MessageId, SessionError, SessionOp, SessionProvider,
};
pub use status::{ProcessingStatus, StatusHandle};
