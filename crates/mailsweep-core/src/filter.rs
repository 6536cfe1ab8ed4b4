//! Date filters and their translation to backend search queries.
//!
//! Filters describe intent in calendar terms; [`SearchQuery`] is the
//! backend-neutral query tree handed to a session. All cutoff arithmetic is
//! calendar-aware (month lengths, leap years) and anchored to a `today`
//! argument so it is testable without a clock.

use chrono::{Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Caller-facing date filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateFilter {
    /// No date constraint.
    #[default]
    All,
    /// Messages delivered strictly before `today - n` days.
    OlderThanDays(u32),
    /// Messages delivered strictly before `today - n` calendar months.
    OlderThanMonths(u32),
    /// Messages delivered strictly before `today - n` calendar years.
    OlderThanYears(u32),
    /// Messages delivered within an inclusive calendar-date range.
    ///
    /// A missing bound leaves that side open; both missing matches all.
    DateRange {
        /// First day included.
        start: Option<NaiveDate>,
        /// Last day included.
        end: Option<NaiveDate>,
    },
}

/// Backend-neutral search query tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Matches every message.
    All,
    /// Delivered strictly before the given date.
    Before(NaiveDate),
    /// Delivered on or after the given date.
    Since(NaiveDate),
    /// `From` header contains the given text.
    FromContains(String),
    /// Conjunction of sub-queries.
    And(Vec<SearchQuery>),
}

impl DateFilter {
    /// Builds the query for this filter, anchored to the current UTC date.
    #[must_use]
    pub fn to_query(&self) -> SearchQuery {
        self.to_query_at(Utc::now().date_naive())
    }

    /// Builds the query for this filter, anchored to the given date.
    #[must_use]
    pub fn to_query_at(&self, today: NaiveDate) -> SearchQuery {
        match *self {
            Self::All => SearchQuery::All,
            Self::OlderThanDays(n) => before(today.checked_sub_days(Days::new(u64::from(n)))),
            Self::OlderThanMonths(n) => before(today.checked_sub_months(Months::new(n))),
            Self::OlderThanYears(n) => {
                before(today.checked_sub_months(Months::new(n.saturating_mul(12))))
            }
            Self::DateRange { start, end } => match (start, end) {
                (Some(s), Some(e)) => SearchQuery::And(vec![
                    SearchQuery::Since(s),
                    before(e.checked_add_days(Days::new(1))),
                ]),
                (Some(s), None) => SearchQuery::Since(s),
                (None, Some(e)) => before(e.checked_add_days(Days::new(1))),
                // Neither bound present: permissive, not an error.
                (None, None) => SearchQuery::All,
            },
        }
    }
}

/// Out-of-range cutoffs degrade to match-all rather than failing.
fn before(date: Option<NaiveDate>) -> SearchQuery {
    date.map_or(SearchQuery::All, SearchQuery::Before)
}

/// Builds the deletion query for one sender under a date filter.
///
/// When the date side is unconstrained the query collapses to the sender
/// clause alone instead of `AND(sender, ALL)`.
#[must_use]
pub fn sender_query(sender_email: &str, filter: &DateFilter) -> SearchQuery {
    sender_query_at(sender_email, filter, Utc::now().date_naive())
}

/// [`sender_query`] anchored to the given date.
#[must_use]
pub fn sender_query_at(sender_email: &str, filter: &DateFilter, today: NaiveDate) -> SearchQuery {
    let from = SearchQuery::FromContains(sender_email.to_string());
    match filter.to_query_at(today) {
        SearchQuery::All => from,
        date_query => SearchQuery::And(vec![from, date_query]),
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

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    mod cutoffs {
        use super::*;

        #[test]
        fn older_than_days() {
            let q = DateFilter::OlderThanDays(30).to_query_at(date(2024, 7, 31));
            assert_eq!(q, SearchQuery::Before(date(2024, 7, 1)));
        }

        #[test]
        fn older_than_months_is_calendar_aware() {
            // March 31 minus one month clamps to February's last day.
            let q = DateFilter::OlderThanMonths(1).to_query_at(date(2024, 3, 31));
            assert_eq!(q, SearchQuery::Before(date(2024, 2, 29)));
        }

        #[test]
        fn older_than_years_handles_leap_day() {
            let q = DateFilter::OlderThanYears(1).to_query_at(date(2024, 2, 29));
            assert_eq!(q, SearchQuery::Before(date(2023, 2, 28)));
        }

        #[test]
        fn all_filter_matches_all() {
            assert_eq!(
                DateFilter::All.to_query_at(date(2024, 1, 1)),
                SearchQuery::All
            );
        }

        #[test]
        fn zero_days_is_today() {
            let q = DateFilter::OlderThanDays(0).to_query_at(date(2024, 7, 31));
            assert_eq!(q, SearchQuery::Before(date(2024, 7, 31)));
        }
    }

    mod ranges {
        use super::*;

        #[test]
        fn closed_range_is_inclusive_of_end() {
            let q = DateFilter::DateRange {
                start: Some(date(2024, 1, 1)),
                end: Some(date(2024, 6, 30)),
            }
            .to_query_at(date(2024, 8, 1));
            assert_eq!(
                q,
                SearchQuery::And(vec![
                    SearchQuery::Since(date(2024, 1, 1)),
                    SearchQuery::Before(date(2024, 7, 1)),
                ])
            );
        }

        #[test]
        fn open_ended_ranges() {
            let start_only = DateFilter::DateRange {
                start: Some(date(2024, 1, 1)),
                end: None,
            }
            .to_query_at(date(2024, 8, 1));
            assert_eq!(start_only, SearchQuery::Since(date(2024, 1, 1)));

            let end_only = DateFilter::DateRange {
                start: None,
                end: Some(date(2024, 6, 30)),
            }
            .to_query_at(date(2024, 8, 1));
            assert_eq!(end_only, SearchQuery::Before(date(2024, 7, 1)));
        }

        #[test]
        fn empty_range_matches_all() {
            let q = DateFilter::DateRange {
                start: None,
                end: None,
            }
            .to_query_at(date(2024, 8, 1));
            assert_eq!(q, SearchQuery::All);
        }
    }

    mod sender {
        use super::*;

        #[test]
        fn collapses_when_date_unconstrained() {
            let q = sender_query_at("a@x.com", &DateFilter::All, date(2024, 8, 1));
            assert_eq!(q, SearchQuery::FromContains("a@x.com".to_string()));

            let q = sender_query_at(
                "a@x.com",
                &DateFilter::DateRange {
                    start: None,
                    end: None,
                },
                date(2024, 8, 1),
            );
            assert_eq!(q, SearchQuery::FromContains("a@x.com".to_string()));
        }

        #[test]
        fn combines_with_date_clause() {
            let q = sender_query_at("a@x.com", &DateFilter::OlderThanDays(7), date(2024, 8, 8));
            assert_eq!(
                q,
                SearchQuery::And(vec![
                    SearchQuery::FromContains("a@x.com".to_string()),
                    SearchQuery::Before(date(2024, 8, 1)),
                ])
            );
        }
    }
}
