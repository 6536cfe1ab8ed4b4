//! # mailsweep-imap
//!
//! A deliberately small async IMAP client covering exactly the session
//! surface a mailbox cleanup tool needs: LOGIN, SELECT, UID SEARCH, UID
//! FETCH of envelope summaries, UID STORE of `\Deleted`, EXPUNGE, NOOP,
//! and LOGOUT. Message bodies are never fetched.
//!
//! TLS is pure Rust via `rustls` with `webpki-roots`.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailsweep_imap::{Config, ImapClient, SearchCriteria};
//!
//! #[tokio::main]
//! async fn main() -> mailsweep_imap::Result<()> {
//!     let config = Config::builder("imap.example.com").build();
//!     let mut client = ImapClient::connect(&config).await?;
//!     client.login("user@example.com", "password").await?;
//!     client.select("INBOX").await?;
//!
//!     let uids = client.uid_search(&SearchCriteria::All).await?;
//!     println!("{} messages", uids.len());
//!
//!     client.logout().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod client;
pub mod command;
pub mod config;
mod error;
pub mod framed;
pub mod response;
pub mod stream;

pub use client::ImapClient;
pub use command::{SearchCriteria, TagGenerator, UidSet};
pub use config::{Config, ConfigBuilder, Security};
pub use error::{Error, Result};
pub use framed::FramedStream;
pub use response::{FetchSummary, Status, TaggedResponse};
pub use stream::ImapStream;
