//! The IMAP client: one authenticated session against one mailbox.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::command::{SearchCriteria, TagGenerator, UidSet, write_astring};
use crate::config::{Config, Security};
use crate::framed::FramedStream;
use crate::response::{self, FetchSummary, Status};
use crate::stream::{ImapStream, connect_plain, connect_tls};
use crate::{Error, Result};

/// Fetch attribute list used for every summary fetch. Envelope-level data
/// only; message bodies are never requested.
const SUMMARY_ITEMS: &str = "(UID RFC822.SIZE INTERNALDATE BODY.PEEK[HEADER.FIELDS (FROM SUBJECT)])";

/// An IMAP client session.
///
/// Unlike a general-purpose client, no type-state tracking is needed here:
/// the lifecycle is always connect → login → select → work → logout, and
/// the owning connection manager enforces it.
pub struct ImapClient<S = ImapStream> {
    stream: FramedStream<S>,
    tags: TagGenerator,
    io_timeout: Duration,
}

impl ImapClient<ImapStream> {
    /// Connects to the server and reads the greeting.
    ///
    /// Handles implicit TLS and STARTTLS according to the configured
    /// security mode.
    ///
    /// # Errors
    ///
    /// Returns an error on dial, TLS, timeout, or greeting failure.
    pub async fn connect(config: &Config) -> Result<Self> {
        let connect = async {
            match config.security {
                Security::Implicit => {
                    let stream = connect_tls(&config.host, config.port).await?;
                    Self::from_stream_with_timeout(stream, config.io_timeout).await
                }
                Security::None => {
                    let stream = connect_plain(&config.host, config.port).await?;
                    Self::from_stream_with_timeout(stream, config.io_timeout).await
                }
                Security::StartTls => {
                    let stream = connect_plain(&config.host, config.port).await?;
                    let mut client =
                        Self::from_stream_with_timeout(stream, config.io_timeout).await?;
                    client.command("STARTTLS".to_string()).await?;
                    let upgraded = client
                        .stream
                        .into_inner()
                        .upgrade_to_tls(&config.host)
                        .await?;
                    Ok(Self {
                        stream: FramedStream::new(upgraded),
                        tags: client.tags,
                        io_timeout: client.io_timeout,
                    })
                }
            }
        };

        tokio::time::timeout(config.connect_timeout, connect)
            .await
            .map_err(|_| Error::Timeout(config.connect_timeout))?
    }
}

impl<S> ImapClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an already-connected stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the greeting is missing or is a BYE.
    pub async fn from_stream_with_timeout(stream: S, io_timeout: Duration) -> Result<Self> {
        let mut client = Self {
            stream: FramedStream::new(stream),
            tags: TagGenerator::default(),
            io_timeout,
        };

        let greeting = client.stream.read_response().await?;
        let text = String::from_utf8_lossy(&greeting);
        if text.starts_with("* OK") || text.starts_with("* PREAUTH") {
            tracing::debug!(greeting = %text.trim_end(), "connected");
            Ok(client)
        } else if text.starts_with("* BYE") {
            Err(Error::Bye(text.trim_end().to_string()))
        } else {
            Err(Error::Protocol(format!("unexpected greeting: {text}")))
        }
    }

    /// Authenticates with LOGIN.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] when the server rejects the credentials.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let mut cmd = String::from("LOGIN ");
        write_astring(&mut cmd, username);
        cmd.push(' ');
        write_astring(&mut cmd, password);

        match self.command(cmd).await {
            Ok(_) => Ok(()),
            Err(Error::No(text)) => Err(Error::Auth(text)),
            Err(e) => Err(e),
        }
    }

    /// Selects a mailbox read-write. Returns the message count (EXISTS).
    ///
    /// # Errors
    ///
    /// Returns an error if the mailbox cannot be selected.
    pub async fn select(&mut self, mailbox: &str) -> Result<u32> {
        let mut cmd = String::from("SELECT ");
        write_astring(&mut cmd, mailbox);

        let responses = self.command(cmd).await?;
        let exists = responses
            .iter()
            .find_map(|r| response::parse_exists(r))
            .unwrap_or(0);
        tracing::debug!(mailbox, exists, "selected");
        Ok(exists)
    }

    /// Runs UID SEARCH with the given criteria. Results are in the
    /// server's order (ascending UID on conforming servers).
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub async fn uid_search(&mut self, criteria: &SearchCriteria) -> Result<Vec<u32>> {
        let cmd = format!("UID SEARCH {}", criteria.to_imap_string());
        let responses = self.command(cmd).await?;

        let mut results = Vec::new();
        for r in &responses {
            if let Some(ids) = response::parse_search(r) {
                results.extend(ids);
            }
        }
        Ok(results)
    }

    /// Fetches envelope summaries (UID, size, internal date, From/Subject
    /// header fields) for the given UID set.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails.
    pub async fn uid_fetch_summaries(&mut self, set: &UidSet) -> Result<Vec<FetchSummary>> {
        let cmd = format!("UID FETCH {set} {SUMMARY_ITEMS}");
        let responses = self.command(cmd).await?;

        Ok(responses
            .iter()
            .filter_map(|r| response::parse_fetch(r))
            .collect())
    }

    /// Marks the given UIDs `\Deleted` (silent store).
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn uid_mark_deleted(&mut self, set: &UidSet) -> Result<()> {
        let cmd = format!("UID STORE {set} +FLAGS.SILENT (\\Deleted)");
        self.command(cmd).await?;
        Ok(())
    }

    /// Permanently removes messages marked `\Deleted`.
    ///
    /// # Errors
    ///
    /// Returns an error if the expunge fails.
    pub async fn expunge(&mut self) -> Result<()> {
        self.command("EXPUNGE".to_string()).await?;
        Ok(())
    }

    /// Sends NOOP; doubles as a liveness probe.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is no longer usable.
    pub async fn noop(&mut self) -> Result<()> {
        self.command("NOOP".to_string()).await?;
        Ok(())
    }

    /// Gracefully ends the session. Errors from the server's farewell are
    /// ignored; the connection is gone either way.
    pub async fn logout(mut self) {
        let tag = self.tags.next();
        let line = format!("{tag} LOGOUT\r\n");
        if self.stream.write_command(line.as_bytes()).await.is_ok() {
            let _ = tokio::time::timeout(self.io_timeout, self.stream.read_until_tagged(&tag)).await;
        }
    }

    /// Sends one command and collects responses up to the tagged reply,
    /// enforcing the I/O timeout and mapping NO/BAD/BYE to errors.
    async fn command(&mut self, command: String) -> Result<Vec<Vec<u8>>> {
        let tag = self.tags.next();
        let line = format!("{tag} {command}\r\n");

        let exchange = async {
            self.stream.write_command(line.as_bytes()).await?;
            self.stream.read_until_tagged(&tag).await
        };
        let responses = tokio::time::timeout(self.io_timeout, exchange)
            .await
            .map_err(|_| Error::Timeout(self.io_timeout))??;

        check_tagged_ok(&responses, &tag)?;
        Ok(responses)
    }
}

/// Checks that the tagged response is OK.
fn check_tagged_ok(responses: &[Vec<u8>], tag: &str) -> Result<()> {
    for r in responses.iter().rev() {
        if let Some(tagged) = response::parse_tagged(r)
            && tagged.tag == tag
        {
            return match tagged.status {
                Status::Ok => Ok(()),
                Status::No => Err(Error::No(tagged.text)),
                Status::Bad => Err(Error::Bad(tagged.text)),
                Status::Bye => Err(Error::Bye(tagged.text)),
            };
        }
    }

    Err(Error::Protocol("missing tagged response".to_string()))
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
    use tokio_test::io::Builder;

    const IO_TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn greeting_ok() {
        let mock = Builder::new().read(b"* OK ready\r\n").build();
        assert!(
            ImapClient::from_stream_with_timeout(mock, IO_TIMEOUT)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn greeting_bye() {
        let mock = Builder::new().read(b"* BYE overloaded\r\n").build();
        let err = ImapClient::from_stream_with_timeout(mock, IO_TIMEOUT)
            .await
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, Error::Bye(_)));
    }

    #[tokio::test]
    async fn login_success() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"S0000 LOGIN user@example.com secret\r\n")
            .read(b"S0000 OK LOGIN completed\r\n")
            .build();
        let mut client = ImapClient::from_stream_with_timeout(mock, IO_TIMEOUT)
            .await
            .unwrap();
        client.login("user@example.com", "secret").await.unwrap();
    }

    #[tokio::test]
    async fn login_failure_maps_to_auth() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"S0000 LOGIN user@example.com wrong\r\n")
            .read(b"S0000 NO invalid credentials\r\n")
            .build();
        let mut client = ImapClient::from_stream_with_timeout(mock, IO_TIMEOUT)
            .await
            .unwrap();
        let err = client.login("user@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[tokio::test]
    async fn login_quotes_password_with_spaces() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"S0000 LOGIN user@example.com \"pass word\"\r\n")
            .read(b"S0000 OK done\r\n")
            .build();
        let mut client = ImapClient::from_stream_with_timeout(mock, IO_TIMEOUT)
            .await
            .unwrap();
        client.login("user@example.com", "pass word").await.unwrap();
    }

    #[tokio::test]
    async fn select_returns_exists() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"S0000 SELECT INBOX\r\n")
            .read(b"* 23 EXISTS\r\n")
            .read(b"* 0 RECENT\r\n")
            .read(b"S0000 OK [READ-WRITE] SELECT completed\r\n")
            .build();
        let mut client = ImapClient::from_stream_with_timeout(mock, IO_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(client.select("INBOX").await.unwrap(), 23);
    }

    #[tokio::test]
    async fn uid_search_collects_ids() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"S0000 UID SEARCH ALL\r\n")
            .read(b"* SEARCH 4 8 15 16 23 42\r\n")
            .read(b"S0000 OK SEARCH completed\r\n")
            .build();
        let mut client = ImapClient::from_stream_with_timeout(mock, IO_TIMEOUT)
            .await
            .unwrap();
        let ids = client.uid_search(&SearchCriteria::All).await.unwrap();
        assert_eq!(ids, vec![4, 8, 15, 16, 23, 42]);
    }

    #[tokio::test]
    async fn uid_fetch_parses_summaries() {
        let fetch = b"* 1 FETCH (UID 4 RFC822.SIZE 512 \
            INTERNALDATE \"17-Jul-2024 02:44:25 +0000\" \
            BODY[HEADER.FIELDS (FROM SUBJECT)] {33}\r\n\
            From: a@x.com\r\nSubject: Hello\r\n\r\n)\r\n";
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(
                b"S0000 UID FETCH 4 (UID RFC822.SIZE INTERNALDATE \
                  BODY.PEEK[HEADER.FIELDS (FROM SUBJECT)])\r\n",
            )
            .read(fetch)
            .read(b"S0000 OK FETCH completed\r\n")
            .build();
        let mut client = ImapClient::from_stream_with_timeout(mock, IO_TIMEOUT)
            .await
            .unwrap();
        let set = UidSet::new(&[4]).unwrap();
        let summaries = client.uid_fetch_summaries(&set).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].uid, Some(4));
        assert_eq!(summaries[0].size, Some(512));
    }

    #[tokio::test]
    async fn mark_deleted_and_expunge() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"S0000 UID STORE 4:5 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"S0000 OK STORE completed\r\n")
            .write(b"S0001 EXPUNGE\r\n")
            .read(b"* 4 EXPUNGE\r\n")
            .read(b"* 4 EXPUNGE\r\n")
            .read(b"S0001 OK EXPUNGE completed\r\n")
            .build();
        let mut client = ImapClient::from_stream_with_timeout(mock, IO_TIMEOUT)
            .await
            .unwrap();
        let set = UidSet::new(&[4, 5]).unwrap();
        client.uid_mark_deleted(&set).await.unwrap();
        client.expunge().await.unwrap();
    }

    #[tokio::test]
    async fn noop_probe() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"S0000 NOOP\r\n")
            .read(b"S0000 OK NOOP completed\r\n")
            .build();
        let mut client = ImapClient::from_stream_with_timeout(mock, IO_TIMEOUT)
            .await
            .unwrap();
        client.noop().await.unwrap();
    }

    #[tokio::test]
    async fn bad_response_is_error() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"S0000 EXPUNGE\r\n")
            .read(b"S0000 BAD no mailbox selected\r\n")
            .build();
        let mut client = ImapClient::from_stream_with_timeout(mock, IO_TIMEOUT)
            .await
            .unwrap();
        assert!(matches!(client.expunge().await, Err(Error::Bad(_))));
    }

    #[tokio::test]
    async fn logout_swallows_farewell() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"S0000 LOGOUT\r\n")
            .read(b"* BYE see you\r\n")
            .read(b"S0000 OK LOGOUT completed\r\n")
            .build();
        let client = ImapClient::from_stream_with_timeout(mock, IO_TIMEOUT)
            .await
            .unwrap();
        client.logout().await;
    }
}
