//! Account configuration.

use serde::{Deserialize, Serialize};

/// Transport security for the mail connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Security {
    /// Cleartext. Local testing only.
    None,
    /// Plain connect upgraded via STARTTLS.
    StartTls,
    /// TLS from the first byte.
    #[default]
    Tls,
}

impl Security {
    /// Standard port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls => 143,
            Self::Tls => 993,
        }
    }
}

/// Connection and credential settings for one mail account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Server hostname.
    pub host: String,
    /// Server port; defaults from the security mode when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Transport security mode.
    #[serde(default)]
    pub security: Security,
    /// Login username.
    pub username: String,
    /// Login password or app password.
    pub password: String,
    /// Mailbox to operate on.
    #[serde(default = "default_mailbox")]
    pub mailbox: String,
}

impl AccountConfig {
    /// The port to connect to, applying the security-mode default.
    #[must_use]
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.security.default_port())
    }
}

fn default_mailbox() -> String {
    "INBOX".to_string()
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
    fn default_ports() {
        assert_eq!(Security::Tls.default_port(), 993);
        assert_eq!(Security::StartTls.default_port(), 143);
        assert_eq!(Security::None.default_port(), 143);
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"{
            "host": "imap.example.com",
            "username": "alice",
            "password": "hunter2"
        }"#;
        let config: AccountConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.security, Security::Tls);
        assert_eq!(config.effective_port(), 993);
        assert_eq!(config.mailbox, "INBOX");
    }

    #[test]
    fn explicit_port_wins() {
        let json = r#"{
            "host": "localhost",
            "port": 1143,
            "security": "start-tls",
            "username": "a",
            "password": "b"
        }"#;
        let config: AccountConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.security, Security::StartTls);
        assert_eq!(config.effective_port(), 1143);
    }
}
