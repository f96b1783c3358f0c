//! Normalization of SIS responses into catalog models

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveTime, Timelike};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::SisError;
use super::api::{ClassesResponse, Instructor, Section};
use crate::models::{CourseCode, Period, SemesterFeatures, TermDetails};

/// Parse a classes response body.
///
/// The API answers `{"Message": "No records found"}` instead of an empty
/// array; that case yields an empty list.
pub fn parse_sections(body: &str) -> Result<Vec<Section>, SisError> {
    let response: ClassesResponse = serde_json::from_str(body).map_err(SisError::MalformedJson)?;

    match response {
        ClassesResponse::Sections(sections) => Ok(sections),
        ClassesResponse::Message { message } => {
            log::debug!("[SIS] Empty result: {}", message);
            Ok(Vec::new())
        }
    }
}

/// Parse a codes response body, treating the "no records" message as empty
pub fn parse_codes<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, SisError> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(SisError::MalformedJson)?;
    if value.get("Message").is_some() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value).map_err(SisError::MalformedJson)
}

/// Sorted, de-duplicated course codes found in a set of sections.
///
/// Sections whose `OfferingName` is missing or not a valid code are skipped.
pub fn unique_course_codes<'a>(sections: impl IntoIterator<Item = &'a Section>) -> BTreeSet<CourseCode> {
    sections
        .into_iter()
        .filter_map(|s| s.offering_name.as_deref())
        .filter_map(|name| match CourseCode::new(name) {
            Ok(code) => Some(code),
            Err(e) => {
                log::debug!("[SIS] Skipping section: {}", e);
                None
            }
        })
        .collect()
}

/// Chronological, de-duplicated periods in which the sections were offered
pub fn offered_periods(sections: &[Section]) -> Vec<Period> {
    sections
        .iter()
        .filter_map(|s| s.term.as_deref())
        .filter_map(|term| term.parse::<Period>().ok())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Description and requisites per term from a section history.
///
/// Only records that carry section details contribute; a later record for
/// the same term replaces an earlier one.
pub fn extract_term_details(history: &[Section]) -> BTreeMap<Period, TermDetails> {
    let mut details = BTreeMap::new();

    for section in history {
        let Some(period) = section.term.as_deref().and_then(|t| t.parse::<Period>().ok()) else {
            continue;
        };
        let Some(detail) = section.detail() else {
            continue;
        };

        details.insert(
            period,
            TermDetails {
                description: detail.description.clone().unwrap_or_default(),
                prerequisites_json: raw_json(detail.prerequisites.as_ref()),
                corequisites_json: raw_json(detail.co_requisites.as_ref()),
            },
        );
    }

    details
}

/// Compact JSON text of a requisite value, `[]` when absent or empty
fn raw_json(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "[]".to_string(),
        Some(Value::Array(items)) if items.is_empty() => "[]".to_string(),
        Some(Value::Object(map)) if map.is_empty() => "[]".to_string(),
        Some(Value::String(s)) if s.is_empty() => "[]".to_string(),
        Some(v) => v.to_string(),
    }
}

/// Readable prerequisite text from either a plain string or a list of
/// records with a `Description`
pub fn prerequisite_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(record) => record
                    .get("Description")
                    .and_then(Value::as_str)
                    .filter(|d| !d.is_empty()),
                Value::String(s) => Some(s.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("; "),
        _ => String::new(),
    }
}

/// Convert "13:30:00" or "1:30 PM" to fractional hours (13.5)
pub fn parse_time_of_day(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let time = NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%I:%M %p"))
        .ok()?;
    Some(f64::from(time.hour()) + f64::from(time.minute()) / 60.0)
}

/// Per-semester features of a course from its section history.
///
/// Sections are grouped by term; sections without a parseable term are
/// ignored. Results are chronological.
pub fn extract_features(course: &CourseCode, sections: &[Section]) -> Vec<SemesterFeatures> {
    let mut by_period: BTreeMap<Period, Vec<&Section>> = BTreeMap::new();
    for section in sections {
        match section.term.as_deref().map(str::parse::<Period>) {
            Some(Ok(period)) => by_period.entry(period).or_default().push(section),
            Some(Err(e)) => log::debug!("[SIS] {}: {}", course, e),
            None => {}
        }
    }

    by_period
        .into_iter()
        .map(|(period, sections)| semester_features(course, period, &sections))
        .collect()
}

fn semester_features(course: &CourseCode, period: Period, sections: &[&Section]) -> SemesterFeatures {
    let mut features = SemesterFeatures::new(course.clone(), period);
    let mut instructors = BTreeSet::new();

    for section in sections {
        features.actual_enrollment = features
            .actual_enrollment
            .saturating_add(parse_count(section.actual_enrollment.as_deref()));
        features.max_capacity = features
            .max_capacity
            .saturating_add(parse_count(section.max_seating.as_deref()));

        if let Some(credits) = section
            .credits
            .as_deref()
            .and_then(|c| c.trim().parse::<f64>().ok())
            .filter(|c| c.is_finite())
        {
            features.credits = features.credits.max(credits);
        }

        if features.prerequisites.is_empty() {
            let value = section
                .prerequisites
                .as_ref()
                .or_else(|| section.detail().and_then(|d| d.prerequisites.as_ref()));
            if let Some(value) = value {
                features.prerequisites = prerequisite_text(value);
            }
        }

        instructors.extend(section.instructors.iter().filter_map(Instructor::full_name));

        if section.dow.as_deref().is_some_and(|d| d.contains('F')) {
            features.meets_friday = true;
        }
        for meeting in &section.meeting_patterns {
            if meeting.days.as_deref().is_some_and(|d| d.contains('F')) {
                features.meets_friday = true;
            }
            if let Some(start) = meeting.start_time.as_deref().and_then(parse_time_of_day) {
                features.start_time_24h =
                    Some(features.start_time_24h.map_or(start, |t| t.min(start)));
            }
        }
    }

    features.instructors = instructors.into_iter().collect();
    features
}

fn parse_count(value: Option<&str>) -> u32 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}
