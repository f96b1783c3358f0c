//! Re-scrape eligibility and grace-period policy
//!
//! Pure functions that can be tested without network or storage.

use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::models::{CourseMetadata, Period};

/// Default length of the grace window after a term's nominal end
pub const DEFAULT_GRACE_DAYS: u32 = 14;

/// Longest accepted grace window. The shortest term (Intersession) spans 31
/// days, so a window no longer than this closes before the next term ends.
pub const MAX_GRACE_DAYS: u32 = 30;

/// Whether a course should be scraped again for `current`.
///
/// A course is eligible when any of the following hold:
/// - `current` is not yet among its relevant periods
/// - its last gather attempt failed
/// - its last scrape of `current` happened inside the grace window, so the
///   captured data may be incomplete
pub fn needs_scrape(meta: &CourseMetadata, current: Period) -> bool {
    !meta.is_relevant(current)
        || meta.last_period_failed
        || meta.last_scrape_during_grace_period == Some(current)
}

/// Window after a term's nominal end during which its data may still change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GracePolicy {
    pub grace_days: u32,
}

impl Default for GracePolicy {
    fn default() -> Self {
        Self {
            grace_days: DEFAULT_GRACE_DAYS,
        }
    }
}

impl GracePolicy {
    pub fn new(grace_days: u32) -> Self {
        Self { grace_days }
    }

    /// Last day on which a scrape of `period` still counts as "during grace"
    pub fn closes_on(&self, period: Period) -> NaiveDate {
        period
            .end_date()
            .checked_add_days(Days::new(u64::from(self.grace_days)))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Whether a scrape of `period` at `now` falls inside the grace window.
    ///
    /// Any scrape before the window closes counts, including scrapes made
    /// while the term is still running.
    pub fn is_within_grace(&self, period: Period, now: DateTime<Utc>) -> bool {
        now.date_naive() <= self.closes_on(period)
    }
}

/// The period a run gathers: the configured override, else the most recent
/// period whose nominal span has ended.
///
/// That period stays current for the whole of the following term, so its
/// grace window closes while it is still being gathered and courses settle.
pub fn current_period(configured: Option<Period>, today: NaiveDate) -> Period {
    configured.unwrap_or_else(|| Period::last_completed(today))
}
