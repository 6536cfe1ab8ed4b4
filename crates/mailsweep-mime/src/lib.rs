//! # mailsweep-mime
//!
//! Header decoding and sender address parsing for `MailSweep`.
//!
//! This crate covers the small slice of MIME that a mailbox cleanup tool
//! needs: decoding RFC 2047 encoded words in header values and extracting
//! `(email, display name)` pairs from raw `From` headers.
//!
//! ## Quick Start
//!
//! ```
//! use mailsweep_mime::address::parse_sender;
//!
//! let mailbox = parse_sender("=?utf-8?B?SMOpbMOobmU=?= <helene@example.com>");
//! let mailbox = mailbox.expect("addr-spec present");
//! assert_eq!(mailbox.email, "helene@example.com");
//! assert_eq!(mailbox.display_name, "Hélène");
//! ```
//!
//! Parsing is tolerant by contract: `parse_sender` returns `None` for input
//! without a recognizable addr-spec and never panics or propagates an error.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod address;
pub mod encoding;
mod error;

pub use address::{Mailbox, parse_sender};
pub use error::{Error, Result};
