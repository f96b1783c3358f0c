//! Catalog sweep: discover every course code across schools and terms

use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};

use crate::models::{CourseCode, CourseMetadata, Period};
use crate::sis::api::Section;
use crate::sis::{CatalogSource, unique_course_codes};
use crate::storage::CatalogStore;

/// Sections seen during a sweep, by course then by the term they were listed in
pub type CatalogSkeleton = BTreeMap<CourseCode, BTreeMap<Period, Vec<Section>>>;

/// Statistics from a sweep
#[derive(Debug, Default, Clone)]
pub struct SweepStats {
    /// Number of school/term pairs requested
    pub requests: usize,
    /// Number of sections returned across all requests
    pub sections_seen: usize,
    /// Number of school/term pairs that failed and were skipped
    pub errors: usize,
    /// Duration of the sweep
    pub duration_ms: u64,
}

/// Result of a sweep
#[derive(Debug, Default, Clone)]
pub struct SweepOutcome {
    /// Every distinct course code seen, sorted
    pub codes: BTreeSet<CourseCode>,
    /// Every section seen, only filled when sections are collected
    pub skeleton: CatalogSkeleton,
    pub stats: SweepStats,
}

/// Sweep every school × term pair and collect distinct course codes.
///
/// With `collect_sections`, the sections themselves are kept in the
/// outcome's skeleton for a later catalog export. A failing pair is logged
/// and skipped; the sweep always runs to the end.
pub fn sweep_catalog(
    source: &dyn CatalogSource,
    schools: &[String],
    terms: &[Period],
    collect_sections: bool,
) -> SweepOutcome {
    let start = std::time::Instant::now();
    let mut outcome = SweepOutcome::default();

    for term in terms {
        log::info!("[SWEEP] Scanning {}", term.api_term());

        for school in schools {
            outcome.stats.requests += 1;

            match source.sections_for_term(school, *term) {
                Ok(sections) => {
                    outcome.stats.sections_seen += sections.len();
                    outcome.codes.extend(unique_course_codes(&sections));
                    if collect_sections {
                        add_to_skeleton(&mut outcome.skeleton, *term, sections);
                    }
                }
                Err(e) => {
                    log::warn!("[SWEEP] Skipping {} / {}: {}", school, term.api_term(), e);
                    outcome.stats.errors += 1;
                }
            }
        }
    }

    outcome.stats.duration_ms = start.elapsed().as_millis() as u64;
    log::info!(
        "[SWEEP] Found {} unique courses in {} sections ({} errors)",
        outcome.codes.len(),
        outcome.stats.sections_seen,
        outcome.stats.errors
    );
    outcome
}

fn add_to_skeleton(skeleton: &mut CatalogSkeleton, term: Period, sections: Vec<Section>) {
    for section in sections {
        let Some(code) = section
            .offering_name
            .as_deref()
            .and_then(|name| CourseCode::new(name).ok())
        else {
            continue;
        };
        skeleton
            .entry(code)
            .or_default()
            .entry(term)
            .or_default()
            .push(section);
    }
}

/// Ensure a metadata record exists for every code; returns how many were new
pub fn register_courses<'a>(
    store: &dyn CatalogStore,
    codes: impl IntoIterator<Item = &'a CourseCode>,
) -> Result<usize> {
    let mut created = 0;
    for code in codes {
        if !store.has_course(code)? {
            store.upsert_course(CourseMetadata::new(code.clone()))?;
            created += 1;
        }
    }
    Ok(created)
}
