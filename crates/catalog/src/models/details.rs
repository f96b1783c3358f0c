//! Per-term catalog details and per-semester course features

use serde::{Deserialize, Serialize};

use super::{CourseCode, Period};

/// Description and requisites of a course as published for one term
///
/// Requisites are kept as the raw JSON the API returned, `[]` when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermDetails {
    pub description: String,
    pub prerequisites_json: String,
    pub corequisites_json: String,
}

impl Default for TermDetails {
    fn default() -> Self {
        Self {
            description: String::new(),
            prerequisites_json: "[]".to_string(),
            corequisites_json: "[]".to_string(),
        }
    }
}

/// Aggregates over every section of a course in one semester
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemesterFeatures {
    pub course_code: CourseCode,
    pub period: Period,
    /// Earliest meeting start in fractional hours (13.5 = 1:30 PM)
    pub start_time_24h: Option<f64>,
    pub meets_friday: bool,
    /// Summed seating across sections
    pub max_capacity: u32,
    /// Summed enrollment across sections
    pub actual_enrollment: u32,
    /// Highest credit value of any section
    pub credits: f64,
    /// Distinct instructor names, sorted
    pub instructors: Vec<String>,
    /// First non-empty prerequisite text found among the sections
    pub prerequisites: String,
}

impl SemesterFeatures {
    /// Empty aggregate for a course and semester
    pub fn new(course_code: CourseCode, period: Period) -> Self {
        Self {
            course_code,
            period,
            start_time_24h: None,
            meets_friday: false,
            max_capacity: 0,
            actual_enrollment: 0,
            credits: 0.0,
            instructors: Vec::new(),
            prerequisites: String::new(),
        }
    }

    /// Instructor names as a single `; `-separated string
    pub fn instructors_joined(&self) -> String {
        self.instructors.join("; ")
    }
}
