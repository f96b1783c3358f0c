//! Sync engine for discovering courses and tracking their scrape state
//!
//! A run has two phases:
//! 1. Sweep: list every course offered by each school in each term, write
//!    the de-duplicated code list, and register unseen courses.
//! 2. Refresh: fetch every course the eligibility policy selects, record
//!    success or failure in its metadata and store its semester features.
//!
//! Optionally the swept sections are then exported as a full catalog with
//! per-term details, and stored features are written out as CSV.

mod details;
mod policy;
mod refresh;
mod sweep;

pub use details::{CourseDetails, DetailCoverage, ExportStats, export_catalog, gather_term_details};
pub use policy::{DEFAULT_GRACE_DAYS, GracePolicy, MAX_GRACE_DAYS, current_period, needs_scrape};
pub use refresh::{RefreshOptions, RefreshStats, refresh_courses};
pub use sweep::{CatalogSkeleton, SweepOutcome, SweepStats, register_courses, sweep_catalog};

use anyhow::Result;
use std::path::PathBuf;

use crate::export::{write_course_codes, write_features};
use crate::models::Period;
use crate::sis::CatalogSource;
use crate::storage::CatalogStore;

/// Options for a full sweep + refresh run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub schools: Vec<String>,
    pub terms: Vec<Period>,
    /// Where the sorted course code list is written
    pub output_file: PathBuf,
    /// Full catalog export with per-term details (None = skip)
    pub catalog_file: Option<PathBuf>,
    /// Per-semester features of every stored course (None = skip)
    pub features_file: Option<PathBuf>,
    pub refresh: RefreshOptions,
}

/// Combined statistics of a full run
#[derive(Debug, Default, Clone)]
pub struct SyncReport {
    pub sweep: SweepStats,
    /// Distinct course codes written to the output file
    pub courses_written: usize,
    /// Metadata records created for newly seen courses
    pub courses_registered: usize,
    pub refresh: RefreshStats,
    pub catalog: Option<ExportStats>,
    /// Feature rows written to the features file
    pub features_written: Option<usize>,
}

/// Run a full sweep followed by an incremental refresh
pub fn sync_catalog(
    source: &dyn CatalogSource,
    store: &dyn CatalogStore,
    options: &SyncOptions,
) -> Result<SyncReport> {
    let outcome = sweep_catalog(
        source,
        &options.schools,
        &options.terms,
        options.catalog_file.is_some(),
    );

    let courses_written = write_course_codes(&options.output_file, &outcome.codes)?;
    log::info!(
        "[SWEEP] Wrote {} course codes to {}",
        courses_written,
        options.output_file.display()
    );

    let courses_registered = register_courses(store, &outcome.codes)?;
    let refresh = refresh_courses(source, store, &options.refresh)?;

    let catalog = match &options.catalog_file {
        Some(path) => Some(export_catalog(
            source,
            &outcome.skeleton,
            path,
            options.refresh.now,
        )?),
        None => None,
    };

    let features_written = match &options.features_file {
        Some(path) => {
            let written = write_features(path, &store.list_features()?)?;
            log::info!("[REFRESH] Wrote {} feature rows to {}", written, path.display());
            Some(written)
        }
        None => None,
    };

    Ok(SyncReport {
        sweep: outcome.stats,
        courses_written,
        courses_registered,
        refresh,
        catalog,
        features_written,
    })
}
