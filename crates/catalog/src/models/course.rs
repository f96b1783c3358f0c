//! Course codes and per-course scrape metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::Period;

/// Error returned for strings that are not `DEPT.XXX.XXX` course codes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid course code: {0:?}")]
pub struct CourseCodeError(pub String);

/// A catalog course code such as `AS.171.101`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CourseCode(String);

impl CourseCode {
    /// Parse and validate a course code
    pub fn new(code: impl AsRef<str>) -> Result<Self, CourseCodeError> {
        let code = code.as_ref().trim();
        if Self::is_valid(code) {
            Ok(Self(code.to_string()))
        } else {
            Err(CourseCodeError(code.to_string()))
        }
    }

    fn is_valid(code: &str) -> bool {
        let parts: Vec<&str> = code.split('.').collect();
        let &[school, dept, number] = parts.as_slice() else {
            return false;
        };

        let three_digits = |s: &str| s.len() == 3 && s.bytes().all(|b| b.is_ascii_digit());

        school.len() >= 2
            && school.bytes().all(|b| b.is_ascii_uppercase())
            && three_digits(dept)
            && three_digits(number)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Code without separators ("AS171101"), as used in per-course API paths
    pub fn compact(&self) -> String {
        self.0.replace('.', "")
    }
}

impl FromStr for CourseCode {
    type Err = CourseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for CourseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for CourseCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CourseCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

/// Scrape state for a single course
///
/// One record per course code. Created the first time the course is seen
/// and mutated after every gather attempt; never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseMetadata {
    pub course_code: CourseCode,
    /// Most recent period successfully gathered (None = never gathered)
    pub last_period_gathered: Option<Period>,
    /// Whether the most recent gather attempt errored
    pub last_period_failed: bool,
    /// Periods known to be relevant to this course, chronological and unique
    pub relevant_periods: Vec<Period>,
    /// Set when the last scrape ran inside that period's grace window
    pub last_scrape_during_grace_period: Option<Period>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CourseMetadata {
    /// Create a record for a course that has never been gathered
    pub fn new(course_code: CourseCode) -> Self {
        let now = Utc::now();
        Self {
            course_code,
            last_period_gathered: None,
            last_period_failed: false,
            relevant_periods: Vec::new(),
            last_scrape_during_grace_period: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a successful gather of `period`.
    ///
    /// `offered` holds every period the course was seen in. Those up to and
    /// including `period` are merged into `relevant_periods` along with
    /// `period` itself; later ones are left for the run that gathers them.
    pub fn record_success(
        &mut self,
        period: Period,
        offered: impl IntoIterator<Item = Period>,
        during_grace: bool,
    ) {
        self.last_period_gathered = Some(period);
        self.last_period_failed = false;
        self.last_scrape_during_grace_period = during_grace.then_some(period);

        self.relevant_periods.push(period);
        self.relevant_periods
            .extend(offered.into_iter().filter(|p| *p <= period));
        self.relevant_periods.sort();
        self.relevant_periods.dedup();

        self.touch();
    }

    /// Record a failed gather attempt
    pub fn record_failure(&mut self) {
        self.last_period_failed = true;
        self.touch();
    }

    /// Whether `period` is among the relevant periods
    pub fn is_relevant(&self, period: Period) -> bool {
        self.relevant_periods.contains(&period)
    }

    /// Bump `updated_at`, never letting it fall behind `created_at`
    fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.created_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(code: &str) -> Period {
        code.parse().unwrap()
    }

    #[test]
    fn test_course_code_validation() {
        assert!(CourseCode::new("AS.171.101").is_ok());
        assert!(CourseCode::new("EN.601.226").is_ok());
        assert!(CourseCode::new(" AS.001.100 ").is_ok());

        assert!(CourseCode::new("").is_err());
        assert!(CourseCode::new("AS171101").is_err());
        assert!(CourseCode::new("as.171.101").is_err());
        assert!(CourseCode::new("A.171.101").is_err());
        assert!(CourseCode::new("AS.17.101").is_err());
        assert!(CourseCode::new("AS.171.10a").is_err());
        assert!(CourseCode::new("AS.171.101.01").is_err());
    }

    #[test]
    fn test_course_code_compact() {
        let code = CourseCode::new("AS.171.101").unwrap();
        assert_eq!(code.compact(), "AS171101");
        assert_eq!(code.to_string(), "AS.171.101");
    }

    #[test]
    fn test_new_metadata() {
        let meta = CourseMetadata::new(CourseCode::new("AS.171.101").unwrap());
        assert!(meta.last_period_gathered.is_none());
        assert!(!meta.last_period_failed);
        assert!(meta.relevant_periods.is_empty());
        assert_eq!(meta.created_at, meta.updated_at);
    }

    #[test]
    fn test_record_success_merges_periods() {
        let mut meta = CourseMetadata::new(CourseCode::new("AS.171.101").unwrap());
        meta.record_failure();

        meta.record_success(period("FA24"), [period("SP24"), period("FA24")], false);

        assert_eq!(meta.last_period_gathered, Some(period("FA24")));
        assert!(!meta.last_period_failed);
        assert_eq!(meta.relevant_periods, vec![period("SP24"), period("FA24")]);
        assert!(meta.last_scrape_during_grace_period.is_none());
        assert!(meta.is_relevant(period("SP24")));
        assert!(!meta.is_relevant(period("SU24")));
    }

    #[test]
    fn test_record_success_ignores_later_offerings() {
        let mut meta = CourseMetadata::new(CourseCode::new("AS.171.101").unwrap());
        meta.record_success(period("SU24"), [period("SP24"), period("FA24")], false);

        assert_eq!(meta.relevant_periods, vec![period("SP24"), period("SU24")]);
        assert!(!meta.is_relevant(period("FA24")));
    }

    #[test]
    fn test_record_success_during_grace() {
        let mut meta = CourseMetadata::new(CourseCode::new("AS.171.101").unwrap());
        meta.record_success(period("SU25"), [], true);
        assert_eq!(meta.last_scrape_during_grace_period, Some(period("SU25")));

        // Rescrape after the window closes clears the marker
        meta.record_success(period("SU25"), [], false);
        assert!(meta.last_scrape_during_grace_period.is_none());
    }

    #[test]
    fn test_record_failure_keeps_history() {
        let mut meta = CourseMetadata::new(CourseCode::new("AS.171.101").unwrap());
        meta.record_success(period("FA24"), [], false);
        meta.record_failure();

        assert!(meta.last_period_failed);
        assert_eq!(meta.last_period_gathered, Some(period("FA24")));
        assert_eq!(meta.relevant_periods, vec![period("FA24")]);
    }

    #[test]
    fn test_updated_at_never_precedes_created_at() {
        let mut meta = CourseMetadata::new(CourseCode::new("AS.171.101").unwrap());
        // Simulate a clock that moved backwards since creation
        meta.created_at = Utc::now() + chrono::Duration::hours(1);
        meta.record_failure();
        assert!(meta.updated_at >= meta.created_at);
    }

    #[test]
    fn test_metadata_serialization() {
        let mut meta = CourseMetadata::new(CourseCode::new("AS.171.101").unwrap());
        meta.record_success(period("FA24"), [], true);

        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"AS.171.101\""));
        assert!(json.contains("\"FA24\""));

        let back: CourseMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
