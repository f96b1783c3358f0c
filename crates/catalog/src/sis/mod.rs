//! SIS classes API integration
//!
//! This module provides:
//! - Response types for the classes and codes endpoints
//! - A throttled HTTP client keyed by a static API token
//! - Helpers that turn raw sections into catalog models

mod client;
mod normalize;
mod timing;

pub use client::{ClassQuery, SisClient, SisError, TermSelector};
pub use normalize::{
    extract_features, extract_term_details, offered_periods, parse_codes, parse_sections,
    parse_time_of_day, prerequisite_text, unique_course_codes,
};
pub use timing::{Throttle, interval_for_rate, remaining_wait};

use crate::models::{CourseCode, Period};

/// Source of catalog sections
///
/// Implemented by [`SisClient`]; the sweep and refresh logic only depend on
/// this trait so they can run against canned data.
pub trait CatalogSource {
    /// All sections a school offers in a term
    fn sections_for_term(&self, school: &str, period: Period) -> Result<Vec<api::Section>, SisError>;

    /// Every historical section of a course, across all terms
    fn course_history(&self, course: &CourseCode) -> Result<Vec<api::Section>, SisError>;

    /// History of one section number of a course, across all terms
    fn section_history(
        &self,
        course: &CourseCode,
        section: &str,
    ) -> Result<Vec<api::Section>, SisError> {
        let sections = self.course_history(course)?;
        Ok(sections
            .into_iter()
            .filter(|s| s.section_name.as_deref().unwrap_or("") == section)
            .collect())
    }
}

/// SIS API response types
pub mod api {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Body of a classes endpoint: either sections or a "no records" message
    #[derive(Debug, Deserialize)]
    #[serde(untagged)]
    pub enum ClassesResponse {
        Sections(Vec<Section>),
        Message {
            #[serde(rename = "Message")]
            message: String,
        },
    }

    /// One course section as returned by the classes endpoints
    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "PascalCase", default)]
    pub struct Section {
        /// Course code, e.g. "AS.171.101"
        pub offering_name: Option<String>,
        /// Section number, e.g. "01"
        pub section_name: Option<String>,
        pub title: Option<String>,
        /// Term name, e.g. "Fall 2024"
        pub term: Option<String>,
        pub instructors_full_name: Option<String>,
        #[serde(deserialize_with = "lenient_string")]
        pub credits: Option<String>,
        pub status: Option<String>,
        pub level: Option<String>,
        pub areas: Option<String>,
        pub building: Option<String>,
        pub location: Option<String>,
        pub instruction_method: Option<String>,
        #[serde(deserialize_with = "lenient_string")]
        pub max_seats: Option<String>,
        #[serde(deserialize_with = "lenient_string")]
        pub open_seats: Option<String>,
        #[serde(rename = "DOW")]
        pub dow: Option<String>,
        #[serde(rename = "DOWSort", deserialize_with = "lenient_string")]
        pub dow_sort: Option<String>,
        #[serde(deserialize_with = "lenient_string")]
        pub actual_enrollment: Option<String>,
        #[serde(deserialize_with = "lenient_string")]
        pub max_seating: Option<String>,
        #[serde(deserialize_with = "lenient_list")]
        pub instructors: Vec<Instructor>,
        #[serde(deserialize_with = "lenient_list")]
        pub meeting_patterns: Vec<MeetingPattern>,
        /// Free text or a list of requisite records
        pub prerequisites: Option<Value>,
        pub section_details: Option<Vec<SectionDetail>>,
    }

    impl Section {
        /// First detail record, present on per-course endpoints
        pub fn detail(&self) -> Option<&SectionDetail> {
            self.section_details.as_ref().and_then(|d| d.first())
        }
    }

    /// Extended section information (only on per-course endpoints)
    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "PascalCase", default)]
    pub struct SectionDetail {
        pub description: Option<String>,
        pub prerequisites: Option<Value>,
        pub co_requisites: Option<Value>,
    }

    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "PascalCase", default)]
    pub struct Instructor {
        pub first_name: Option<String>,
        pub last_name: Option<String>,
    }

    impl Instructor {
        /// "First Last", or None when both parts are blank
        pub fn full_name(&self) -> Option<String> {
            let name = format!(
                "{} {}",
                self.first_name.as_deref().unwrap_or(""),
                self.last_name.as_deref().unwrap_or("")
            );
            let name = name.trim();
            (!name.is_empty()).then(|| name.to_string())
        }
    }

    /// One weekly meeting of a section
    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "PascalCase", default)]
    pub struct MeetingPattern {
        /// Day letters, e.g. "MWF"
        pub days: Option<String>,
        /// "13:30:00" or "1:30 PM"
        pub start_time: Option<String>,
    }

    /// Entry from a codes endpoint (schools, terms, departments)
    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "PascalCase", default)]
    pub struct CodeEntry {
        pub name: Option<String>,
        pub department_name: Option<String>,
    }

    impl CodeEntry {
        /// Display value regardless of which endpoint produced the entry
        pub fn label(&self) -> Option<&str> {
            self.name
                .as_deref()
                .or(self.department_name.as_deref())
                .filter(|s| !s.is_empty())
        }
    }

    /// Accept strings, numbers, or null for fields the API types inconsistently
    fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }

    /// Accept a list of records, dropping entries that don't fit; anything
    /// other than a list is treated as empty
    fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        })
    }
}
