//! `mailsweep` - command-line mailbox cleanup over IMAP.
//!
//! Scans a mailbox into per-sender groups (count, total size, newest
//! messages) and deletes unwanted mail in bulk, either by sender or within
//! a date window.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod args;

use std::io::Write as _;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use mailsweep_core::providers::ImapSessionProvider;
use mailsweep_core::{AccountConfig, DateFilter, MailboxCleaner, SenderGroup, StatusHandle};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use args::Command;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailsweep=info,mailsweep_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let command = args::parse(&argv)?;

    match command {
        Command::Scan {
            config,
            filter,
            json,
            top,
        } => scan(&config, &filter, json, top).await,
        Command::DeleteSender {
            config,
            sender,
            filter,
            yes,
        } => delete_sender(&config, &sender, &filter, yes).await,
    }
}

async fn scan(config: &Path, filter: &DateFilter, json: bool, top: Option<usize>) -> Result<()> {
    let mut cleaner = connect(config).await?;

    let progress = spawn_progress_reporter(cleaner.status_handle());
    let result = cleaner.retrieve(filter).await;
    progress.abort();

    let mut groups = result?;
    cleaner.disconnect().await;

    if let Some(limit) = top {
        groups.truncate(limit);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
    } else {
        print_groups(&groups);
    }
    Ok(())
}

async fn delete_sender(
    config: &Path,
    sender: &str,
    filter: &DateFilter,
    yes: bool,
) -> Result<()> {
    if !yes && !confirm(sender)? {
        println!("Aborted.");
        return Ok(());
    }

    let mut cleaner = connect(config).await?;
    let deleted = cleaner.delete_by_sender_with_filter(sender, filter).await?;
    cleaner.disconnect().await;

    println!("Deleted {deleted} message(s) from {sender}.");
    Ok(())
}

async fn connect(config_path: &Path) -> Result<MailboxCleaner<ImapSessionProvider>> {
    let raw = std::fs::read_to_string(config_path)
        .with_context(|| format!("reading config {}", config_path.display()))?;
    let account: AccountConfig = serde_json::from_str(&raw)
        .with_context(|| format!("parsing config {}", config_path.display()))?;

    let mut cleaner = MailboxCleaner::new(ImapSessionProvider);
    if !cleaner.connect(&account).await {
        bail!(
            "could not connect to {}:{} as {}",
            account.host,
            account.effective_port(),
            account.username
        );
    }
    info!(host = %account.host, mailbox = %account.mailbox, "connected");
    Ok(cleaner)
}

/// Reports scan progress to stderr every two seconds.
fn spawn_progress_reporter(status: StatusHandle) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(2));
        interval.tick().await; // first tick is immediate
        loop {
            interval.tick().await;
            let snapshot = status.snapshot();
            if snapshot.is_processing {
                eprintln!(
                    "  {}/{} messages (batch {}/{}, {:.0}%)",
                    snapshot.processed_emails,
                    snapshot.total_emails,
                    snapshot.current_batch,
                    snapshot.total_batches,
                    snapshot.progress_percentage()
                );
            }
        }
    })
}

fn confirm(sender: &str) -> Result<bool> {
    print!("Permanently delete ALL matching messages from {sender}? [y/N] ");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn print_groups(groups: &[SenderGroup]) {
    if groups.is_empty() {
        println!("No messages matched.");
        return;
    }

    println!("{:<44} {:>7} {:>10}", "SENDER", "COUNT", "SIZE");
    for group in groups {
        // The engine defaults the name to the address; no point printing
        // it twice.
        let label = if group.sender_name == group.sender_email {
            group.sender_email.clone()
        } else {
            format!("{} ({})", group.sender_email, group.sender_name)
        };
        println!(
            "{:<44} {:>7} {:>10}",
            truncate_label(&label, 44),
            group.email_count,
            human_size(group.total_size_bytes)
        );
    }

    let total: u64 = groups.iter().map(|g| g.email_count).sum();
    let size: u64 = groups.iter().map(|g| g.total_size_bytes).sum();
    println!("\n{} sender(s), {} message(s), {}", groups.len(), total, human_size(size));
}

fn truncate_label(label: &str, max: usize) -> String {
    if label.chars().count() <= max {
        label.to_string()
    } else {
        let kept: String = label.chars().take(max.saturating_sub(1)).collect();
        format!("{kept}\u{2026}")
    }
}

#[allow(clippy::cast_precision_loss)]
fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
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
    fn human_size_units() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KiB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MiB");
        assert_eq!(human_size(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }

    #[test]
    fn labels_are_truncated_with_ellipsis() {
        assert_eq!(truncate_label("short", 44), "short");
        let long = "x".repeat(60);
        let out = truncate_label(&long, 10);
        assert_eq!(out.chars().count(), 10);
        assert!(out.ends_with('\u{2026}'));
    }
}
