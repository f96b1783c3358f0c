//! Configuration directory for the SIS scraper
//!
//! Settings, credentials and the scrape database live together in one
//! directory, `~/.config/sis-scraper/` unless `SIS_SCRAPER_CONFIG_DIR`
//! points elsewhere. [`ConfigDir`] wraps that location so callers and tests
//! can work against any directory.
//!
//! Call [`init`] at application startup to locate and create it.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Name of the directory under the platform config dir
const APP_DIR: &str = "sis-scraper";

/// Environment variable overriding the config directory
pub const CONFIG_DIR_VAR: &str = "SIS_SCRAPER_CONFIG_DIR";

/// Locate the config directory and make sure it exists.
/// Call this once at application startup.
pub fn init() -> Result<ConfigDir> {
    let dir = ConfigDir::locate()?;
    dir.ensure()?;
    Ok(dir)
}

/// A directory holding the scraper's JSON config files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDir {
    root: PathBuf,
}

impl ConfigDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$SIS_SCRAPER_CONFIG_DIR` if set, else the platform config dir
    pub fn locate() -> Result<Self> {
        if let Some(root) = std::env::var_os(CONFIG_DIR_VAR).filter(|v| !v.is_empty()) {
            return Ok(Self::new(root));
        }
        let base = dirs::config_dir().context("Could not determine config directory")?;
        Ok(Self::new(base.join(APP_DIR)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a file within the directory
    pub fn path(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    pub fn exists(&self, filename: &str) -> bool {
        self.path(filename).exists()
    }

    /// Create the directory if needed
    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root).with_context(|| {
            format!("Failed to create config directory: {}", self.root.display())
        })
    }

    /// Load and parse a JSON file from the directory
    pub fn load<T: DeserializeOwned>(&self, filename: &str) -> Result<T> {
        load_json_file(&self.path(filename))
    }

    /// Load a JSON file if present, falling back to `T::default()`.
    ///
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self, filename: &str) -> Result<T> {
        if self.exists(filename) {
            self.load(filename)
        } else {
            Ok(T::default())
        }
    }

    /// Save a value as pretty JSON, creating the directory first
    pub fn save<T: Serialize>(&self, filename: &str, value: &T) -> Result<PathBuf> {
        self.ensure()?;
        let path = self.path(filename);
        save_json_file(&path, value)?;
        Ok(path)
    }

    /// Save `value` only if the file does not exist yet; returns whether it
    /// was written
    pub fn save_if_missing<T: Serialize>(&self, filename: &str, value: &T) -> Result<bool> {
        if self.exists(filename) {
            return Ok(false);
        }
        self.save(filename, value)?;
        Ok(true)
    }

    /// Resolve a path relative to the directory; absolute paths are kept
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Save a value as pretty JSON to an arbitrary path
pub fn save_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    fn sample() -> Sample {
        Sample {
            name: "sweep".to_string(),
            count: 3,
        }
    }

    #[test]
    fn test_paths() {
        let dir = ConfigDir::new("/tmp/sis-scraper");
        assert_eq!(dir.path("settings.json"), PathBuf::from("/tmp/sis-scraper/settings.json"));
        assert_eq!(
            dir.resolve(Path::new("catalog.sqlite")),
            PathBuf::from("/tmp/sis-scraper/catalog.sqlite")
        );
        assert_eq!(
            dir.resolve(Path::new("/var/lib/catalog.sqlite")),
            PathBuf::from("/var/lib/catalog.sqlite")
        );
    }

    #[test]
    fn test_save_creates_directory_and_loads_back() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = ConfigDir::new(tmp.path().join("nested"));

        let path = dir.save("sample.json", &sample()).unwrap();
        assert!(path.ends_with("nested/sample.json"));
        assert!(dir.exists("sample.json"));

        let loaded: Sample = dir.load("sample.json").unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_load_or_default() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = ConfigDir::new(tmp.path());

        let loaded: Sample = dir.load_or_default("missing.json").unwrap();
        assert_eq!(loaded, Sample::default());

        std::fs::write(dir.path("broken.json"), "{ not json").unwrap();
        let result: Result<Sample> = dir.load_or_default("broken.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_save_if_missing_keeps_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = ConfigDir::new(tmp.path());

        assert!(dir.save_if_missing("sample.json", &sample()).unwrap());

        let other = Sample {
            name: "other".to_string(),
            count: 0,
        };
        assert!(!dir.save_if_missing("sample.json", &other).unwrap());

        let loaded: Sample = dir.load("sample.json").unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_load_missing_file_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let result: Result<Sample> = load_json_file(&tmp.path().join("missing.json"));
        assert!(result.is_err());
    }
}
