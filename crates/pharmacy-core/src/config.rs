//! Store configuration.
//!
//! Sources, highest priority first:
//!
//! 1. `PHARMACY_DATA_DIR` environment variable (data directory only)
//! 2. A JSON file loaded with [`StoreConfig::from_json_file`]
//! 3. Defaults: `./data` with the standard file names
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/pharmacy",
//!   "operations_file": "inventory_operations.txt"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::{StoreError, StoreResult};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "PHARMACY_DATA_DIR";

/// Where the record files live and what they are called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub medicines_file: String,
    pub pharmacies_file: String,
    /// Optional; a missing file means no analogue links
    pub analogues_file: String,
    pub operations_file: String,
    /// Read when `operations_file` does not exist
    pub legacy_operations_file: String,
    pub stock_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            medicines_file: "medicines.txt".into(),
            pharmacies_file: "pharmacies.txt".into(),
            analogues_file: "analogues.txt".into(),
            operations_file: "inventory_operations.txt".into(),
            legacy_operations_file: "operations.txt".into(),
            stock_file: "stock.txt".into(),
        }
    }
}

impl StoreConfig {
    /// Default file names inside `data_dir`.
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Defaults, with the data directory taken from `PHARMACY_DATA_DIR` if set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load a JSON config file; missing keys take their defaults and
    /// `PHARMACY_DATA_DIR` still wins over the file.
    pub fn from_json_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| StoreError::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = serde_json::from_str(&text)
            .map_err(|e| StoreError::Config(format!("{}: {}", path.display(), e)))?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                debug!(%dir, "data directory from environment");
                self.data_dir = PathBuf::from(dir);
            }
        }
    }

    /// File names must be plain, non-empty names.
    pub fn validate(&self) -> StoreResult<()> {
        let names = [
            ("medicines_file", &self.medicines_file),
            ("pharmacies_file", &self.pharmacies_file),
            ("analogues_file", &self.analogues_file),
            ("operations_file", &self.operations_file),
            ("legacy_operations_file", &self.legacy_operations_file),
            ("stock_file", &self.stock_file),
        ];
        for (key, name) in names {
            if name.trim().is_empty() || name.contains(['/', '\\']) {
                return Err(StoreError::Config(format!(
                    "{} must be a plain file name, got '{}'",
                    key, name
                )));
            }
        }
        Ok(())
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }

    pub fn medicines_path(&self) -> PathBuf {
        self.path_for(&self.medicines_file)
    }

    pub fn pharmacies_path(&self) -> PathBuf {
        self.path_for(&self.pharmacies_file)
    }

    pub fn analogues_path(&self) -> PathBuf {
        self.path_for(&self.analogues_file)
    }

    pub fn operations_path(&self) -> PathBuf {
        self.path_for(&self.operations_file)
    }

    pub fn legacy_operations_path(&self) -> PathBuf {
        self.path_for(&self.legacy_operations_file)
    }

    pub fn stock_path(&self) -> PathBuf {
        self.path_for(&self.stock_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_file_names() {
        let config = StoreConfig::in_dir("/tmp/pharmacy");
        assert_eq!(
            config.medicines_path(),
            PathBuf::from("/tmp/pharmacy/medicines.txt")
        );
        assert_eq!(
            config.operations_path(),
            PathBuf::from("/tmp/pharmacy/inventory_operations.txt")
        );
        assert_eq!(
            config.legacy_operations_path(),
            PathBuf::from("/tmp/pharmacy/operations.txt")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, r#"{ "data_dir": "/srv/pharmacy", "stock_file": "levels.txt" }"#)
            .unwrap();

        let config = StoreConfig::from_json_file(&path).unwrap();
        assert_eq!(config.stock_file, "levels.txt");
        assert_eq!(config.medicines_file, "medicines.txt");
    }

    #[test]
    fn test_json_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = StoreConfig::from_json_file(dir.path().join("none.json")).unwrap_err();
        assert!(missing.is_missing_file());

        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            StoreConfig::from_json_file(&path),
            Err(StoreError::Config(_))
        ));

        fs::write(&path, r#"{ "stock_file": "../stock.txt" }"#).unwrap();
        assert!(matches!(
            StoreConfig::from_json_file(&path),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn test_config_serializes() {
        let json = serde_json::to_string(&StoreConfig::default()).unwrap();
        let back: StoreConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, StoreConfig::default());
    }
}
