//! Per-term detail gathering and the full catalog export
//!
//! Descriptions and requisites only come back from per-section history
//! requests, and one section's history covers every term that section ran
//! in. [`DetailCoverage`] picks sections greedily so that every term of a
//! course is covered with as few requests as possible.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use super::sweep::CatalogSkeleton;
use crate::export::{CatalogWriter, backup_existing};
use crate::models::{CourseCode, Period, TermDetails};
use crate::sis::api::Section;
use crate::sis::{CatalogSource, extract_term_details};

/// Greedy set cover of a course's terms by section number
#[derive(Debug, Clone, Default)]
pub struct DetailCoverage {
    /// Section names still worth trying, per uncovered term
    sections_by_term: BTreeMap<Period, BTreeSet<String>>,
    uncovered: BTreeSet<Period>,
    details: BTreeMap<Period, TermDetails>,
    abandoned: BTreeSet<Period>,
}

impl DetailCoverage {
    /// Start from the sections listed for each term. Terms without sections
    /// are not tracked; a section without a name counts as "".
    pub fn new(term_map: &BTreeMap<Period, Vec<Section>>) -> Self {
        let sections_by_term: BTreeMap<Period, BTreeSet<String>> = term_map
            .iter()
            .filter(|(_, sections)| !sections.is_empty())
            .map(|(period, sections)| {
                let names = sections
                    .iter()
                    .map(|s| s.section_name.clone().unwrap_or_default())
                    .collect();
                (*period, names)
            })
            .collect();

        Self {
            uncovered: sections_by_term.keys().copied().collect(),
            sections_by_term,
            ..Default::default()
        }
    }

    /// The section whose history should be fetched next, or None once every
    /// term is covered or abandoned.
    ///
    /// Sections that are the only option for some term are preferred; among
    /// the candidates the one listed in the most uncovered terms wins, ties
    /// going to the lowest section name.
    pub fn next_section(&self) -> Option<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut forced: BTreeSet<&str> = BTreeSet::new();

        for period in &self.uncovered {
            let Some(names) = self.sections_by_term.get(period) else {
                continue;
            };
            if names.len() == 1 {
                forced.extend(names.iter().map(String::as_str));
            }
            for name in names {
                *counts.entry(name.as_str()).or_default() += 1;
            }
        }

        let candidates: Vec<&str> = if forced.is_empty() {
            counts.keys().copied().collect()
        } else {
            forced.into_iter().collect()
        };

        candidates
            .into_iter()
            .max_by(|a, b| {
                let count = |name: &str| counts.get(name).copied().unwrap_or(0);
                count(a).cmp(&count(b)).then_with(|| b.cmp(a))
            })
            .map(str::to_string)
    }

    /// Record the details fetched for `section`.
    ///
    /// Uncovered terms present in `fetched` become covered. Any term still
    /// uncovered that lists `section` stops considering it; a term left with
    /// no sections to try is abandoned.
    pub fn apply(&mut self, course: &CourseCode, section: &str, fetched: BTreeMap<Period, TermDetails>) {
        for (period, details) in fetched {
            if self.uncovered.remove(&period) {
                self.details.insert(period, details);
            }
        }

        let uncovered: Vec<Period> = self.uncovered.iter().copied().collect();
        for period in uncovered {
            let Some(names) = self.sections_by_term.get_mut(&period) else {
                continue;
            };
            if names.remove(section) && names.is_empty() {
                log::error!(
                    "[DETAILS] No details for {} {}; no sections left to try",
                    course,
                    period.api_term()
                );
                self.uncovered.remove(&period);
                self.abandoned.insert(period);
            }
        }
    }

    /// Terms given up on because no section returned details for them
    pub fn abandoned(&self) -> &BTreeSet<Period> {
        &self.abandoned
    }

    pub fn into_details(self) -> BTreeMap<Period, TermDetails> {
        self.details
    }
}

/// Details gathered for one course
#[derive(Debug, Default, Clone)]
pub struct CourseDetails {
    pub details: BTreeMap<Period, TermDetails>,
    /// Section history requests made
    pub fetches: usize,
    pub abandoned: BTreeSet<Period>,
}

/// Fetch section histories until every term of `term_map` has details or
/// has been abandoned. A failed request counts as a history with no details.
pub fn gather_term_details(
    source: &dyn CatalogSource,
    course: &CourseCode,
    term_map: &BTreeMap<Period, Vec<Section>>,
) -> CourseDetails {
    let mut coverage = DetailCoverage::new(term_map);
    let mut fetches = 0;

    while let Some(section) = coverage.next_section() {
        fetches += 1;
        let fetched = match source.section_history(course, &section) {
            Ok(history) => extract_term_details(&history),
            Err(e) => {
                log::warn!("[DETAILS] Failed to fetch {} section {:?}: {}", course, section, e);
                BTreeMap::new()
            }
        };
        log::debug!(
            "[DETAILS] {} section {:?} returned {} terms",
            course,
            section,
            fetched.len()
        );
        coverage.apply(course, &section, fetched);
    }

    CourseDetails {
        abandoned: coverage.abandoned().clone(),
        details: coverage.into_details(),
        fetches,
    }
}

/// Statistics from a catalog export
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportStats {
    pub courses: usize,
    pub rows: usize,
    /// Section history requests made
    pub fetches: usize,
    /// Course terms written without details
    pub abandoned_terms: usize,
    /// Where the previous file was moved, if there was one
    pub backup: Option<std::path::PathBuf>,
}

/// Write every swept section to `path`, hydrated with its term's details.
///
/// An existing file is first moved aside with a timestamped `.bak` name.
pub fn export_catalog(
    source: &dyn CatalogSource,
    skeleton: &CatalogSkeleton,
    path: &Path,
    now: DateTime<Utc>,
) -> Result<ExportStats> {
    let mut stats = ExportStats {
        backup: backup_existing(path, now)?,
        ..Default::default()
    };
    let mut writer = CatalogWriter::create(path)?;

    log::info!(
        "[DETAILS] Gathering details for {} courses",
        skeleton.len()
    );

    for (course, term_map) in skeleton {
        let gathered = gather_term_details(source, course, term_map);
        stats.courses += 1;
        stats.fetches += gathered.fetches;
        stats.abandoned_terms += gathered.abandoned.len();

        for (period, sections) in term_map {
            for section in sections {
                writer.write_section(course, *period, section, gathered.details.get(period))?;
            }
        }
    }

    stats.rows = writer.finish()?;
    log::info!(
        "[DETAILS] Wrote {} rows for {} courses to {} ({} requests, {} terms without details)",
        stats.rows,
        stats.courses,
        path.display(),
        stats.fetches,
        stats.abandoned_terms
    );
    Ok(stats)
}
