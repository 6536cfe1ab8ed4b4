//! Concrete session backends.

pub mod imap;

pub use imap::{ImapSession, ImapSessionProvider};
