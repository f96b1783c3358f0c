//! Catalog crate - Business logic for scraping the SIS course catalog
//!
//! This crate provides:
//! - Domain models (Period, CourseCode, CourseMetadata, CourseEvaluation)
//! - SIS API client with request pacing
//! - Storage trait abstractions (SQLite and in-memory)
//! - Sweep and incremental refresh driven by per-course scrape state
//! - CSV exports: course codes, the full catalog, semester features
//!
//! This crate has no CLI dependencies; the `sweep` app wires it together.

pub mod config;
pub mod export;
pub mod models;
pub mod sis;
pub mod storage;
pub mod sync;

pub use self::config::{ScrapeSettings, SisCredentials};
pub use export::{read_course_codes, write_course_codes, write_features};
pub use models::{
    CourseCode, CourseEvaluation, CourseMetadata, EvaluationData, InstanceKey, Period, Season,
    SemesterFeatures, TermDetails, terms_through,
};
pub use sis::{CatalogSource, ClassQuery, SisClient, SisError, TermSelector};
pub use storage::{CatalogStore, InMemoryCatalogStore, SqliteCatalogStore};
pub use sync::{
    // Sync execution
    RefreshOptions, RefreshStats, SweepOutcome, SweepStats, SyncOptions, SyncReport,
    refresh_courses, register_courses, sweep_catalog, sync_catalog,
    // Sync decision
    GracePolicy, current_period, needs_scrape,
    // Catalog details
    CatalogSkeleton, DetailCoverage, ExportStats, export_catalog, gather_term_details,
};
