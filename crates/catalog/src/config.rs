//! Configuration loading for the scraper
//!
//! Supports loading the SIS API key from (in order of priority):
//! 1. JSON file (`sis-credentials.json` in the config directory)
//! 2. Runtime environment variable `SIS_API_KEY`
//!
//! Run settings come from `settings.json` in the same directory; a default
//! file is written on first run and every missing field takes its default.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use config::ConfigDir;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::models::{Period, terms_through};
use crate::sis::{SisClient, interval_for_rate};
use crate::sync::{DEFAULT_GRACE_DAYS, GracePolicy, MAX_GRACE_DAYS, RefreshOptions, SyncOptions};

/// Credentials filename in the scraper config directory
const CREDENTIALS_FILE: &str = "sis-credentials.json";

/// Settings filename in the scraper config directory
const SETTINGS_FILE: &str = "settings.json";

/// Environment variable holding the API key
const API_KEY_VAR: &str = "SIS_API_KEY";

/// Static API key for the SIS API
#[derive(Clone)]
pub struct SisCredentials {
    pub api_key: String,
}

impl std::fmt::Debug for SisCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SisCredentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// On-disk credential file format
#[derive(Deserialize)]
struct CredentialFile {
    api_key: String,
}

impl SisCredentials {
    /// Load credentials from the config file, then the environment
    pub fn load(dir: &ConfigDir) -> Result<Self> {
        if dir.exists(CREDENTIALS_FILE) {
            let creds: CredentialFile = dir.load(CREDENTIALS_FILE)?;
            return Self::from_key(creds.api_key);
        }

        Self::from_env()
    }

    /// Parse credentials from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: CredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_key(creds.api_key)
    }

    /// Load credentials from the `SIS_API_KEY` environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_VAR)
            .with_context(|| format!("{} environment variable not set", API_KEY_VAR))?;
        Self::from_key(api_key)
    }

    fn from_key(api_key: String) -> Result<Self> {
        let api_key = api_key.trim().to_string();
        if api_key.is_empty() {
            bail!("SIS API key is empty");
        }
        Ok(Self { api_key })
    }

    /// Where the credentials file is expected
    pub fn credentials_path(dir: &ConfigDir) -> PathBuf {
        dir.path(CREDENTIALS_FILE)
    }

    /// Check if credentials are available (file or env var)
    pub fn is_available(dir: &ConfigDir) -> bool {
        dir.exists(CREDENTIALS_FILE) || std::env::var(API_KEY_VAR).is_ok()
    }
}

/// Settings for a scrape run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeSettings {
    pub base_url: String,
    /// Schools swept for course codes
    pub schools: Vec<String>,
    /// First year of the term enumeration
    pub start_year: i32,
    /// Request budget; sets the fixed gap between requests
    pub requests_per_minute: u32,
    pub timeout_secs: u64,
    /// Days after a term's end during which scrapes are repeated (max 30)
    pub grace_days: u32,
    /// Period to gather instead of the most recently completed one
    pub current_period: Option<Period>,
    /// Course code list, relative to the working directory
    pub output_file: PathBuf,
    /// Full catalog with per-term details; not written when unset
    pub catalog_file: Option<PathBuf>,
    /// Per-semester features of every known course; not written when unset
    pub features_file: Option<PathBuf>,
    /// SQLite database; relative paths resolve against the config directory
    pub database_file: PathBuf,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            base_url: SisClient::DEFAULT_BASE_URL.to_string(),
            schools: vec![
                "Krieger School of Arts and Sciences".to_string(),
                "Whiting School of Engineering".to_string(),
            ],
            start_year: 2010,
            requests_per_minute: 100,
            timeout_secs: 30,
            grace_days: DEFAULT_GRACE_DAYS,
            current_period: None,
            output_file: PathBuf::from("unique_course_codes.csv"),
            catalog_file: None,
            features_file: Some(PathBuf::from("sis_metadata_enriched.csv")),
            database_file: PathBuf::from("catalog.sqlite"),
        }
    }
}

impl ScrapeSettings {
    /// Load settings from the config directory, writing the defaults there
    /// first if no settings file exists
    pub fn load_or_init(dir: &ConfigDir) -> Result<Self> {
        if dir.save_if_missing(SETTINGS_FILE, &Self::default())? {
            log::info!("Wrote default settings to {}", dir.path(SETTINGS_FILE).display());
        }
        let settings: Self = dir.load_or_default(SETTINGS_FILE)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse and validate settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json).context("Failed to parse settings JSON")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the run cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.grace_days > MAX_GRACE_DAYS {
            bail!(
                "grace_days must be at most {} (got {})",
                MAX_GRACE_DAYS,
                self.grace_days
            );
        }
        if !(Period::MIN_YEAR..=Period::MAX_YEAR).contains(&self.start_year) {
            bail!(
                "start_year must be between {} and {} (got {})",
                Period::MIN_YEAR,
                Period::MAX_YEAR,
                self.start_year
            );
        }
        if self.schools.is_empty() {
            bail!("At least one school must be configured");
        }
        Ok(())
    }

    pub fn request_interval(&self) -> Duration {
        interval_for_rate(self.requests_per_minute)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Database path, resolving relative paths against the config directory
    pub fn database_path(&self, dir: &ConfigDir) -> PathBuf {
        dir.resolve(&self.database_file)
    }

    /// Options for a run at `now`: every term through `now`'s year, and the
    /// gathered period derived from the same clock reading
    pub fn sync_options(&self, now: DateTime<Utc>) -> SyncOptions {
        SyncOptions {
            schools: self.schools.clone(),
            terms: terms_through(self.start_year, now.date_naive()),
            output_file: self.output_file.clone(),
            catalog_file: self.catalog_file.clone(),
            features_file: self.features_file.clone(),
            refresh: RefreshOptions::at(
                self.current_period,
                GracePolicy::new(self.grace_days),
                now,
            ),
        }
    }

    /// Build an API client from these settings
    pub fn client(&self, credentials: &SisCredentials) -> Result<SisClient> {
        SisClient::new(
            &self.base_url,
            credentials.api_key.clone(),
            self.request_interval(),
            self.timeout(),
        )
        .context("Failed to create SIS client")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_credentials() {
        let creds = SisCredentials::from_json(r#"{ "api_key": " abc123 " }"#).unwrap();
        assert_eq!(creds.api_key, "abc123");
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(SisCredentials::from_json(r#"{ "api_key": "  " }"#).is_err());
        assert!(SisCredentials::from_json(r#"{ "other": "x" }"#).is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let creds = SisCredentials::from_json(r#"{ "api_key": "abc123" }"#).unwrap();
        assert!(!format!("{:?}", creds).contains("abc123"));
    }

    #[test]
    fn test_default_settings() {
        let settings = ScrapeSettings::default();
        assert_eq!(settings.schools.len(), 2);
        assert_eq!(settings.request_interval(), Duration::from_millis(600));
        assert_eq!(settings.grace_days, 14);
        assert!(settings.current_period.is_none());
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings = ScrapeSettings::from_json(
            r#"{ "schools": ["Carey Business School"], "current_period": "SU25", "grace_days": 30 }"#,
        )
        .unwrap();
        assert_eq!(settings.schools, vec!["Carey Business School"]);
        assert_eq!(settings.current_period, Some("SU25".parse().unwrap()));
        assert_eq!(settings.grace_days, 30);
        assert_eq!(settings.start_year, 2010);
        assert_eq!(settings.base_url, SisClient::DEFAULT_BASE_URL);
    }

    #[test]
    fn test_invalid_period_rejected() {
        assert!(ScrapeSettings::from_json(r#"{ "current_period": "Autumn" }"#).is_err());
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        assert!(ScrapeSettings::from_json(r#"{ "grace_days": 31 }"#).is_err());
        assert!(ScrapeSettings::from_json(r#"{ "start_year": 1999 }"#).is_err());
        assert!(ScrapeSettings::from_json(r#"{ "start_year": 2100 }"#).is_err());
        assert!(ScrapeSettings::from_json(r#"{ "schools": [] }"#).is_err());
    }

    #[test]
    fn test_database_path_resolution() {
        let dir = ConfigDir::new("/tmp/sis-scraper");
        let settings = ScrapeSettings::default();
        assert_eq!(
            settings.database_path(&dir),
            PathBuf::from("/tmp/sis-scraper/catalog.sqlite")
        );

        let settings = ScrapeSettings {
            database_file: PathBuf::from("/var/lib/catalog.sqlite"),
            ..Default::default()
        };
        assert_eq!(
            settings.database_path(&dir),
            PathBuf::from("/var/lib/catalog.sqlite")
        );
    }

    #[test]
    fn test_load_or_init_writes_defaults_once() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = ConfigDir::new(tmp.path());

        let settings = ScrapeSettings::load_or_init(&dir).unwrap();
        assert_eq!(settings, ScrapeSettings::default());
        assert!(dir.exists(SETTINGS_FILE));

        std::fs::write(dir.path(SETTINGS_FILE), r#"{ "grace_days": 7 }"#).unwrap();
        let settings = ScrapeSettings::load_or_init(&dir).unwrap();
        assert_eq!(settings.grace_days, 7);
        assert_eq!(settings.schools.len(), 2);
    }

    #[test]
    fn test_credentials_from_config_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = ConfigDir::new(tmp.path());

        std::fs::write(
            SisCredentials::credentials_path(&dir),
            r#"{ "api_key": "from-file" }"#,
        )
        .unwrap();

        assert!(SisCredentials::is_available(&dir));
        assert_eq!(SisCredentials::load(&dir).unwrap().api_key, "from-file");
    }

    #[test]
    fn test_sync_options_derive_from_one_clock_reading() {
        let settings = ScrapeSettings::default();
        let now = Utc.with_ymd_and_hms(2024, 10, 7, 23, 30, 0).unwrap();

        let options = settings.sync_options(now);
        assert_eq!(options.refresh.now, now);
        assert_eq!(options.refresh.current, "SU24".parse().unwrap());
        assert_eq!(options.terms.first(), Some(&"IN10".parse().unwrap()));
        assert_eq!(options.terms.last(), Some(&"SP25".parse().unwrap()));
        assert!(options.catalog_file.is_none());
        assert_eq!(
            options.features_file,
            Some(PathBuf::from("sis_metadata_enriched.csv"))
        );

        let pinned = ScrapeSettings {
            current_period: Some("FA24".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(pinned.sync_options(now).refresh.current, "FA24".parse().unwrap());
    }
}
