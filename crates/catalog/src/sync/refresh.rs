//! Incremental refresh of per-course scrape state

use anyhow::Result;
use chrono::{DateTime, Utc};

use super::policy::{GracePolicy, current_period, needs_scrape};
use crate::models::Period;
use crate::sis::{CatalogSource, extract_features, offered_periods};
use crate::storage::CatalogStore;

/// Options for a refresh pass
#[derive(Debug, Clone)]
pub struct RefreshOptions {
    /// Period being gathered this run
    pub current: Period,
    pub grace: GracePolicy,
    /// Clock reading used for the grace check
    pub now: DateTime<Utc>,
    /// Stop after this many fetches (None = all eligible courses)
    pub max_courses: Option<usize>,
}

impl RefreshOptions {
    /// Options for a run at `now`; the gathered period is `configured` or
    /// derived from the same clock reading
    pub fn at(configured: Option<Period>, grace: GracePolicy, now: DateTime<Utc>) -> Self {
        Self {
            current: current_period(configured, now.date_naive()),
            grace,
            now,
            max_courses: None,
        }
    }
}

/// Statistics from a refresh pass
#[derive(Debug, Default, Clone)]
pub struct RefreshStats {
    /// Courses that were eligible for scraping
    pub eligible: usize,
    /// Courses fetched and recorded successfully
    pub refreshed: usize,
    /// Courses whose fetch failed (recorded as failed)
    pub failed: usize,
    /// Courses not eligible this run
    pub skipped: usize,
    /// Eligible courses left over because of `max_courses`
    pub deferred: usize,
    /// Per-semester feature rows stored for refreshed courses
    pub features_stored: usize,
    /// Duration of the refresh
    pub duration_ms: u64,
}

/// Fetch every eligible course and record the outcome in its metadata.
///
/// Fetch errors are not fatal: they are stored as `last_period_failed`,
/// which makes the course eligible again next run. Storage errors abort.
pub fn refresh_courses(
    source: &dyn CatalogSource,
    store: &dyn CatalogStore,
    options: &RefreshOptions,
) -> Result<RefreshStats> {
    let start = std::time::Instant::now();
    let mut stats = RefreshStats::default();

    let during_grace = options.grace.is_within_grace(options.current, options.now);
    log::info!(
        "[REFRESH] Gathering {} (grace window {})",
        options.current,
        if during_grace { "open" } else { "closed" }
    );

    for mut meta in store.list_courses()? {
        if !needs_scrape(&meta, options.current) {
            stats.skipped += 1;
            continue;
        }
        stats.eligible += 1;

        if options
            .max_courses
            .is_some_and(|max| stats.refreshed + stats.failed >= max)
        {
            stats.deferred += 1;
            continue;
        }

        let features = match source.course_history(&meta.course_code) {
            Ok(sections) => {
                let offered = offered_periods(&sections);
                log::debug!(
                    "[REFRESH] {}: {} sections across {} periods",
                    meta.course_code,
                    sections.len(),
                    offered.len()
                );
                meta.record_success(options.current, offered, during_grace);
                stats.refreshed += 1;
                extract_features(&meta.course_code, &sections)
            }
            Err(e) => {
                log::warn!("[REFRESH] Failed to fetch {}: {}", meta.course_code, e);
                meta.record_failure();
                stats.failed += 1;
                Vec::new()
            }
        };

        store.upsert_course(meta)?;
        if !features.is_empty() {
            store.upsert_features(&features)?;
            stats.features_stored += features.len();
        }
    }

    stats.duration_ms = start.elapsed().as_millis() as u64;
    log::info!(
        "[REFRESH] {} refreshed, {} failed, {} skipped, {} deferred, {} feature rows",
        stats.refreshed,
        stats.failed,
        stats.skipped,
        stats.deferred,
        stats.features_stored
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CourseCode, CourseMetadata};
    use crate::sis::SisError;
    use crate::sis::api::Section;
    use crate::storage::InMemoryCatalogStore;
    use chrono::TimeZone;
    use std::cell::Cell;

    /// Returns one section per entry of `terms` for every course, failing
    /// for `fail_code`
    struct FakeSource {
        fail_code: Option<&'static str>,
        terms: Vec<&'static str>,
        calls: Cell<usize>,
    }

    impl FakeSource {
        fn new(fail_code: Option<&'static str>) -> Self {
            Self {
                fail_code,
                terms: vec!["Spring 2024"],
                calls: Cell::new(0),
            }
        }
    }

    impl CatalogSource for FakeSource {
        fn sections_for_term(&self, _school: &str, _period: Period) -> Result<Vec<Section>, SisError> {
            Ok(Vec::new())
        }

        fn course_history(&self, course: &CourseCode) -> Result<Vec<Section>, SisError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail_code == Some(course.as_str()) {
                return Err(SisError::Status(503));
            }
            Ok(self
                .terms
                .iter()
                .map(|term| Section {
                    offering_name: Some(course.to_string()),
                    term: Some(term.to_string()),
                    actual_enrollment: Some("12".to_string()),
                    ..Default::default()
                })
                .collect())
        }
    }

    fn period(s: &str) -> Period {
        s.parse().unwrap()
    }

    fn options_on(year: i32, month: u32, day: u32) -> RefreshOptions {
        let now = Utc.with_ymd_and_hms(year, month, day, 6, 0, 0).unwrap();
        RefreshOptions::at(None, GracePolicy::default(), now)
    }

    /// FA24 is gathered, its grace window closed on Jan 14
    fn options_after_grace() -> RefreshOptions {
        options_on(2025, 1, 20)
    }

    fn seed(store: &InMemoryCatalogStore, codes: &[&str]) {
        for c in codes {
            store
                .upsert_course(CourseMetadata::new(CourseCode::new(c).unwrap()))
                .unwrap();
        }
    }

    #[test]
    fn test_refresh_records_success_and_failure() {
        let store = InMemoryCatalogStore::new();
        seed(&store, &["AS.171.101", "AS.110.202"]);
        let source = FakeSource::new(Some("AS.110.202"));

        let stats = refresh_courses(&source, &store, &options_after_grace()).unwrap();
        assert_eq!(stats.eligible, 2);
        assert_eq!(stats.refreshed, 1);
        assert_eq!(stats.failed, 1);

        let ok = store
            .get_course(&CourseCode::new("AS.171.101").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(ok.last_period_gathered, Some(period("FA24")));
        assert_eq!(ok.relevant_periods, vec![period("SP24"), period("FA24")]);
        assert!(ok.last_scrape_during_grace_period.is_none());

        let failed = store
            .get_course(&CourseCode::new("AS.110.202").unwrap())
            .unwrap()
            .unwrap();
        assert!(failed.last_period_failed);
        assert!(failed.last_period_gathered.is_none());

        assert_eq!(stats.features_stored, 1);
        let features = store.list_features().unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].course_code.as_str(), "AS.171.101");
        assert_eq!(features[0].period, period("SP24"));
        assert_eq!(features[0].actual_enrollment, 12);
    }

    #[test]
    fn test_second_run_skips_settled_courses() {
        let store = InMemoryCatalogStore::new();
        seed(&store, &["AS.171.101"]);
        let source = FakeSource::new(None);

        refresh_courses(&source, &store, &options_after_grace()).unwrap();
        let stats = refresh_courses(&source, &store, &options_after_grace()).unwrap();

        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.eligible, 0);
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn test_grace_scrape_is_repeated() {
        let store = InMemoryCatalogStore::new();
        seed(&store, &["AS.171.101"]);
        let source = FakeSource::new(None);

        let during = options_on(2025, 1, 5);
        assert_eq!(during.current, period("FA24"));
        refresh_courses(&source, &store, &during).unwrap();

        let code = CourseCode::new("AS.171.101").unwrap();
        let meta = store.get_course(&code).unwrap().unwrap();
        assert_eq!(meta.last_scrape_during_grace_period, Some(period("FA24")));

        // Once the window closes the course is gathered one more time
        let stats = refresh_courses(&source, &store, &options_after_grace()).unwrap();
        assert_eq!(stats.refreshed, 1);
        let meta = store.get_course(&code).unwrap().unwrap();
        assert!(meta.last_scrape_during_grace_period.is_none());

        let stats = refresh_courses(&source, &store, &options_after_grace()).unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(source.calls.get(), 2);
    }

    #[test]
    fn test_max_courses_defers_the_rest() {
        let store = InMemoryCatalogStore::new();
        seed(&store, &["AS.171.101", "AS.171.102", "AS.171.103"]);
        let source = FakeSource::new(None);

        let options = RefreshOptions {
            max_courses: Some(2),
            ..options_after_grace()
        };
        let stats = refresh_courses(&source, &store, &options).unwrap();

        assert_eq!(stats.eligible, 3);
        assert_eq!(stats.refreshed, 2);
        assert_eq!(stats.deferred, 1);
        assert_eq!(source.calls.get(), 2);
    }

    #[test]
    fn test_options_derive_period_from_clock() {
        let options = options_on(2024, 10, 7);
        assert_eq!(options.current, period("SU24"));
        assert_eq!(options.now.date_naive().to_string(), "2024-10-07");

        let pinned = RefreshOptions::at(Some(period("FA24")), GracePolicy::default(), options.now);
        assert_eq!(pinned.current, period("FA24"));
    }

    #[test]
    fn test_weekly_default_runs_settle_after_one_fetch() {
        let store = InMemoryCatalogStore::new();
        seed(&store, &["AS.171.101"]);
        let source = FakeSource::new(None);

        for day in [7, 14, 21, 28] {
            refresh_courses(&source, &store, &options_on(2024, 10, day)).unwrap();
        }

        assert_eq!(source.calls.get(), 1);
        let meta = store
            .get_course(&CourseCode::new("AS.171.101").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(meta.last_period_gathered, Some(period("SU24")));
        assert!(meta.last_scrape_during_grace_period.is_none());
    }

    #[test]
    fn test_later_offerings_do_not_mark_future_periods() {
        let store = InMemoryCatalogStore::new();
        seed(&store, &["AS.171.101"]);
        let mut source = FakeSource::new(None);
        source.terms = vec!["Spring 2024", "Fall 2024"];

        refresh_courses(&source, &store, &options_on(2024, 10, 7)).unwrap();

        let meta = store
            .get_course(&CourseCode::new("AS.171.101").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(meta.relevant_periods, vec![period("SP24"), period("SU24")]);
        // Features are kept for every offered semester
        assert_eq!(store.list_features().unwrap().len(), 2);

        // Once Fall is gathered the course is fetched again
        let stats = refresh_courses(&source, &store, &options_on(2025, 1, 20)).unwrap();
        assert_eq!(stats.refreshed, 1);
    }
}
