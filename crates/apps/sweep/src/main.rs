//! sis-sweep - Scrape the SIS course catalog and refresh per-course state
//!
//! Runs a full sweep across the configured schools and terms, writes the
//! sorted course code list, then re-fetches every course that is due.
//! Optionally exports the full catalog and per-semester features.

use anyhow::{Context, Result};
use catalog::{ScrapeSettings, SisCredentials, SqliteCatalogStore, sync_catalog};
use chrono::Utc;
use log::{error, info, warn};

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run() {
        error!("Sweep aborted: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Bootstrap config directory
    let config_dir = config::init().context("Failed to initialize config directory")?;

    if !SisCredentials::is_available(&config_dir) {
        warn!(
            "To configure SIS access, either:\n\
             1. Place {{\"api_key\": \"...\"}} at: {}\n\
             2. Or set the environment variable: SIS_API_KEY",
            SisCredentials::credentials_path(&config_dir).display()
        );
    }
    let credentials = SisCredentials::load(&config_dir)?;

    let settings = ScrapeSettings::load_or_init(&config_dir)?;
    let client = settings.client(&credentials)?;

    let db_path = settings.database_path(&config_dir);
    let store = SqliteCatalogStore::new(&db_path)?;
    info!("Using database {}", db_path.display());

    let options = settings.sync_options(Utc::now());
    info!(
        "Sweeping {} schools across {} terms; gathering {}",
        options.schools.len(),
        options.terms.len(),
        options.refresh.current
    );

    let report = sync_catalog(&client, &store, &options)?;

    info!(
        "Done in {}ms: {} courses written to {}, {} new, {} refreshed, {} failed ({} sweep errors)",
        report.sweep.duration_ms + report.refresh.duration_ms,
        report.courses_written,
        options.output_file.display(),
        report.courses_registered,
        report.refresh.refreshed,
        report.refresh.failed,
        report.sweep.errors
    );
    if let (Some(stats), Some(path)) = (&report.catalog, &options.catalog_file) {
        info!(
            "Catalog: {} rows for {} courses in {} ({} detail requests, {} terms without details)",
            stats.rows,
            stats.courses,
            path.display(),
            stats.fetches,
            stats.abandoned_terms
        );
    }
    if let (Some(written), Some(path)) = (report.features_written, &options.features_file) {
        info!("Features: {} rows in {}", written, path.display());
    }

    Ok(())
}
