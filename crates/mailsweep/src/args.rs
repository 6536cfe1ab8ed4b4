//! Command-line argument parsing.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use mailsweep_core::DateFilter;

/// Help text printed on usage errors.
pub const USAGE: &str = "\
mailsweep - mailbox cleanup

USAGE:
    mailsweep scan --config <FILE> [FILTER] [--json] [--top <N>]
    mailsweep delete-sender --config <FILE> --sender <EMAIL> [FILTER] [--yes]

FILTER (at most one of):
    --older-than-days <N>      messages older than N days
    --older-than-months <N>    messages older than N calendar months
    --older-than-years <N>     messages older than N calendar years
    --from <YYYY-MM-DD>        range start (inclusive)
    --to <YYYY-MM-DD>          range end (inclusive)

OPTIONS:
    --json    print scan results as JSON
    --top     only show the N largest senders
    --yes     skip the deletion confirmation prompt
";

/// A parsed invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Scan the mailbox and report per-sender groups.
    Scan {
        config: PathBuf,
        filter: DateFilter,
        json: bool,
        top: Option<usize>,
    },
    /// Delete all messages from one sender.
    DeleteSender {
        config: PathBuf,
        sender: String,
        filter: DateFilter,
        yes: bool,
    },
}

/// Parses the argument list (without the program name).
pub fn parse(args: &[String]) -> Result<Command> {
    let Some((subcommand, rest)) = args.split_first() else {
        bail!("missing subcommand\n\n{USAGE}");
    };

    let mut config = None;
    let mut sender = None;
    let mut json = false;
    let mut yes = false;
    let mut top = None;
    let mut older: Option<DateFilter> = None;
    let mut from = None;
    let mut to = None;

    let mut iter = rest.iter();
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--config" => config = Some(PathBuf::from(value(&mut iter, flag)?)),
            "--sender" => sender = Some(value(&mut iter, flag)?.to_string()),
            "--json" => json = true,
            "--yes" => yes = true,
            "--top" => top = Some(usize::try_from(number(&mut iter, flag)?)?),
            "--older-than-days" => {
                older = Some(DateFilter::OlderThanDays(number(&mut iter, flag)?));
            }
            "--older-than-months" => {
                older = Some(DateFilter::OlderThanMonths(number(&mut iter, flag)?));
            }
            "--older-than-years" => {
                older = Some(DateFilter::OlderThanYears(number(&mut iter, flag)?));
            }
            "--from" => from = Some(date(&mut iter, flag)?),
            "--to" => to = Some(date(&mut iter, flag)?),
            other => bail!("unknown flag: {other}\n\n{USAGE}"),
        }
    }

    let filter = combine_filter(older, from, to)?;
    let config = config.context("--config is required")?;

    match subcommand.as_str() {
        "scan" => {
            if sender.is_some() || yes {
                bail!("--sender and --yes only apply to delete-sender");
            }
            Ok(Command::Scan {
                config,
                filter,
                json,
                top,
            })
        }
        "delete-sender" => {
            if json || top.is_some() {
                bail!("--json and --top only apply to scan");
            }
            Ok(Command::DeleteSender {
                config,
                sender: sender.context("--sender is required")?,
                filter,
                yes,
            })
        }
        other => bail!("unknown subcommand: {other}\n\n{USAGE}"),
    }
}

fn combine_filter(
    older: Option<DateFilter>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<DateFilter> {
    match (older, from.is_some() || to.is_some()) {
        (Some(_), true) => bail!("--older-than-* cannot be combined with --from/--to"),
        (Some(filter), false) => Ok(filter),
        (None, true) => Ok(DateFilter::DateRange {
            start: from,
            end: to,
        }),
        (None, false) => Ok(DateFilter::All),
    }
}

fn value<'a>(iter: &mut std::slice::Iter<'a, String>, flag: &str) -> Result<&'a str> {
    iter.next()
        .map(String::as_str)
        .with_context(|| format!("{flag} requires a value"))
}

fn number(iter: &mut std::slice::Iter<'_, String>, flag: &str) -> Result<u32> {
    value(iter, flag)?
        .parse()
        .with_context(|| format!("{flag} requires a number"))
}

fn date(iter: &mut std::slice::Iter<'_, String>, flag: &str) -> Result<NaiveDate> {
    let raw = value(iter, flag)?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("{flag} requires a YYYY-MM-DD date, got {raw:?}"))
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

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn scan_with_defaults() {
        let cmd = parse(&args(&["scan", "--config", "acct.json"])).unwrap();
        assert_eq!(
            cmd,
            Command::Scan {
                config: PathBuf::from("acct.json"),
                filter: DateFilter::All,
                json: false,
                top: None,
            }
        );
    }

    #[test]
    fn scan_with_age_filter_and_json() {
        let cmd = parse(&args(&[
            "scan",
            "--config",
            "acct.json",
            "--older-than-months",
            "6",
            "--json",
        ]))
        .unwrap();
        assert_eq!(
            cmd,
            Command::Scan {
                config: PathBuf::from("acct.json"),
                filter: DateFilter::OlderThanMonths(6),
                json: true,
                top: None,
            }
        );
    }

    #[test]
    fn delete_sender_with_range() {
        let cmd = parse(&args(&[
            "delete-sender",
            "--config",
            "acct.json",
            "--sender",
            "news@shop.com",
            "--from",
            "2024-01-01",
            "--to",
            "2024-06-30",
            "--yes",
        ]))
        .unwrap();
        let Command::DeleteSender {
            sender,
            filter,
            yes,
            ..
        } = cmd
        else {
            panic!("wrong command");
        };
        assert_eq!(sender, "news@shop.com");
        assert!(yes);
        assert_eq!(
            filter,
            DateFilter::DateRange {
                start: NaiveDate::from_ymd_opt(2024, 1, 1),
                end: NaiveDate::from_ymd_opt(2024, 6, 30),
            }
        );
    }

    #[test]
    fn rejects_conflicting_filters() {
        let err = parse(&args(&[
            "scan",
            "--config",
            "a.json",
            "--older-than-days",
            "30",
            "--from",
            "2024-01-01",
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("cannot be combined"));
    }

    #[test]
    fn rejects_misplaced_flags() {
        assert!(parse(&args(&["scan", "--config", "a.json", "--yes"])).is_err());
        assert!(
            parse(&args(&[
                "delete-sender",
                "--config",
                "a.json",
                "--sender",
                "x@y.z",
                "--json"
            ]))
            .is_err()
        );
    }

    #[test]
    fn requires_config_and_sender() {
        assert!(parse(&args(&["scan"])).is_err());
        assert!(parse(&args(&["delete-sender", "--config", "a.json"])).is_err());
    }

    #[test]
    fn rejects_bad_dates_and_unknown_flags() {
        assert!(parse(&args(&["scan", "--config", "a.json", "--from", "01/02/2024"])).is_err());
        assert!(parse(&args(&["scan", "--config", "a.json", "--frobnicate"])).is_err());
        assert!(parse(&args(&["frobnicate"])).is_err());
        assert!(parse(&args(&[])).is_err());
    }
}
