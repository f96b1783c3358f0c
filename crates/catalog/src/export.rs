//! CSV files produced by a run
//!
//! - The course code list (`course_code` header, one code per line)
//! - The full catalog: one row per section, with per-term details
//! - Per-semester course features

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::models::{CourseCode, Period, SemesterFeatures, TermDetails};
use crate::sis::api::Section;

/// Header of the course code list file
pub const COURSE_CODES_HEADER: &str = "course_code";

/// Columns of the full catalog file
pub const CATALOG_COLUMNS: [&str; 19] = [
    "Term",
    "CourseCode",
    "SectionName",
    "Title",
    "Instructors",
    "Credits",
    "Status",
    "Level",
    "Area",
    "Building",
    "Location",
    "InstructionMethod",
    "MaxSeats",
    "OpenSeats",
    "DOW",
    "DOWSort",
    "Description",
    "Prereq_JSON",
    "CoReq_JSON",
];

/// Columns of the semester features file
pub const FEATURE_COLUMNS: [&str; 9] = [
    "course_code",
    "semester",
    "start_time_24h",
    "is_friday",
    "max_capacity",
    "actual_enrollment",
    "credits",
    "instructors",
    "prerequisites",
];

/// Open a headerless CSV writer, creating parent directories
fn create_writer(path: &Path) -> Result<csv::Writer<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))
}

/// Write course codes under a `course_code` header.
///
/// Codes are written in iteration order; pass a sorted set.
pub fn write_course_codes<'a>(
    path: &Path,
    codes: impl IntoIterator<Item = &'a CourseCode>,
) -> Result<usize> {
    let mut writer = create_writer(path)?;

    writer.write_record([COURSE_CODES_HEADER])?;
    let mut written = 0;
    for code in codes {
        writer.write_record([code.as_str()])?;
        written += 1;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(written)
}

/// Read a course code list, skipping the header, blank lines and invalid codes
pub fn read_course_codes(path: &Path) -> Result<BTreeSet<CourseCode>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut codes = BTreeSet::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("Failed to read {}", path.display()))?;
        let Some(value) = record.get(0).map(str::trim) else {
            continue;
        };
        if value.is_empty() || value.eq_ignore_ascii_case(COURSE_CODES_HEADER) {
            continue;
        }
        match CourseCode::new(value) {
            Ok(code) => {
                codes.insert(code);
            }
            Err(e) => log::warn!("[EXPORT] {}", e),
        }
    }
    Ok(codes)
}

/// Where an existing file is moved before being rewritten:
/// `dir/name.csv` becomes `dir/name.YYYYmmdd-HHMMSS.bak.csv`
pub fn backup_path(path: &Path, now: DateTime<Utc>) -> PathBuf {
    let stamp = now.format("%Y%m%d-%H%M%S");
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}.{}.bak.{}", stem, stamp, ext.to_string_lossy()),
        None => format!("{}.{}.bak", stem, stamp),
    };
    path.with_file_name(name)
}

/// Move an existing file out of the way; returns the backup location
pub fn backup_existing(path: &Path, now: DateTime<Utc>) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }

    let backup = backup_path(path, now);
    std::fs::rename(path, &backup).with_context(|| {
        format!("Failed to back up {} to {}", path.display(), backup.display())
    })?;
    log::info!("[EXPORT] Moved previous {} to {}", path.display(), backup.display());
    Ok(Some(backup))
}

fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

/// One catalog row, in [`CATALOG_COLUMNS`] order
#[derive(Serialize)]
struct CatalogRow<'a> {
    term: String,
    course_code: &'a str,
    section_name: &'a str,
    title: &'a str,
    instructors: &'a str,
    credits: &'a str,
    status: &'a str,
    level: &'a str,
    area: &'a str,
    building: &'a str,
    location: &'a str,
    instruction_method: &'a str,
    max_seats: &'a str,
    open_seats: &'a str,
    dow: &'a str,
    dow_sort: &'a str,
    description: &'a str,
    prereq_json: &'a str,
    coreq_json: &'a str,
}

/// Streaming writer for the full catalog file
pub struct CatalogWriter {
    writer: csv::Writer<File>,
    path: PathBuf,
    rows: usize,
}

impl CatalogWriter {
    /// Create the file and write the header
    pub fn create(path: &Path) -> Result<Self> {
        let mut writer = create_writer(path)?;
        writer.write_record(CATALOG_COLUMNS)?;
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            rows: 0,
        })
    }

    /// Write one section, hydrated with the details of its term if known
    pub fn write_section(
        &mut self,
        course: &CourseCode,
        period: Period,
        section: &Section,
        details: Option<&TermDetails>,
    ) -> Result<()> {
        let empty = TermDetails::default();
        let details = details.unwrap_or(&empty);
        self.writer.serialize(CatalogRow {
            term: section.term.clone().unwrap_or_else(|| period.api_term()),
            course_code: course.as_str(),
            section_name: text(&section.section_name),
            title: text(&section.title),
            instructors: text(&section.instructors_full_name),
            credits: text(&section.credits),
            status: text(&section.status),
            level: text(&section.level),
            area: text(&section.areas),
            building: text(&section.building),
            location: text(&section.location),
            instruction_method: text(&section.instruction_method),
            max_seats: text(&section.max_seats),
            open_seats: text(&section.open_seats),
            dow: text(&section.dow),
            dow_sort: text(&section.dow_sort),
            description: &details.description,
            prereq_json: &details.prerequisites_json,
            coreq_json: &details.corequisites_json,
        })?;
        self.rows += 1;
        Ok(())
    }

    /// Flush and return the number of rows written
    pub fn finish(mut self) -> Result<usize> {
        self.writer
            .flush()
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(self.rows)
    }
}

/// One features row, in [`FEATURE_COLUMNS`] order
#[derive(Serialize)]
struct FeatureRow<'a> {
    course_code: &'a str,
    semester: String,
    start_time_24h: Option<f64>,
    is_friday: bool,
    max_capacity: u32,
    actual_enrollment: u32,
    credits: f64,
    instructors: String,
    prerequisites: &'a str,
}

/// Write per-semester features, one row per course and semester
pub fn write_features(path: &Path, features: &[SemesterFeatures]) -> Result<usize> {
    let mut writer = create_writer(path)?;
    writer.write_record(FEATURE_COLUMNS)?;

    for f in features {
        writer.serialize(FeatureRow {
            course_code: f.course_code.as_str(),
            semester: f.period.api_term(),
            start_time_24h: f.start_time_24h,
            is_friday: f.meets_friday,
            max_capacity: f.max_capacity,
            actual_enrollment: f.actual_enrollment,
            credits: f.credits,
            instructors: f.instructors_joined(),
            prerequisites: &f.prerequisites,
        })?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(features.len())
}
