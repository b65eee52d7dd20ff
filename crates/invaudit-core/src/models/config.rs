//! Configuration structures for the audit pipeline.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::table::{ColumnMap, ColumnRole};
use crate::error::{AuditError, Result};

/// Main configuration for the invaudit pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// PDF processing configuration.
    pub pdf: PdfConfig,

    /// Table and row extraction configuration.
    pub extraction: ExtractionConfig,

    /// Price validation configuration.
    pub validation: ValidationConfig,

    /// Reference store configuration.
    pub store: StoreConfig,

    /// Unknown part handling.
    pub discovery: DiscoveryConfig,
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Minimum text length for a document to count as readable.
    pub min_text_length: usize,

    /// Maximum pages to process (0 = unlimited).
    pub max_pages: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            min_text_length: 100,
            max_pages: 0,
        }
    }
}

/// Table and row extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Column roles used when a table has no recognizable header.
    pub columns: ColumnMap,

    /// Full-length reference column for cell alignment.
    pub anchor: ColumnRole,

    /// Color/variant codes that may suffix an item code.
    pub variant_codes: Vec<String>,

    /// Infer column roles from header rows.
    pub detect_headers: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            columns: ColumnMap::default(),
            anchor: ColumnRole::Subject,
            variant_codes: [
                "NAVY", "BLACK", "WHITE", "GREY", "GRAY", "RED", "BLUE", "KHAKI", "GREEN",
                "ORANGE", "YELLOW", "CHARCOAL", "BROWN", "TAN",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            detect_headers: true,
        }
    }
}

/// Price validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Maximum absolute price difference for a passing line.
    pub tolerance: Decimal,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            tolerance: Decimal::new(1, 3),
        }
    }
}

/// Reference store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite parts database.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("parts.db"),
        }
    }
}

/// Unknown part handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Prompt for unknown parts; otherwise they are skipped.
    pub interactive: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { interactive: true }
    }
}

impl AuditConfig {
    /// Load and check configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| AuditError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that deserialize but cannot be used.
    pub fn validate(&self) -> Result<()> {
        if self.validation.tolerance.is_sign_negative() {
            return Err(AuditError::Config(format!(
                "tolerance must not be negative, got {}",
                self.validation.tolerance
            )));
        }
        if self.extraction.columns.width() == 0 {
            return Err(AuditError::Config("column layout is empty".to_string()));
        }
        Ok(())
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> std::io::Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuditConfig::default();
        assert_eq!(config.pdf.min_text_length, 100);
        assert_eq!(config.validation.tolerance, Decimal::new(1, 3));
        assert_eq!(config.extraction.columns.width(), 9);
        assert_eq!(config.extraction.anchor, ColumnRole::Subject);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: AuditConfig =
            serde_json::from_str(r#"{"validation": {"tolerance": "0.01"}}"#).unwrap();
        assert_eq!(config.validation.tolerance, Decimal::new(1, 2));
        assert!(config.discovery.interactive);
        assert_eq!(config.store.path, PathBuf::from("parts.db"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("negative.json");
        std::fs::write(&path, r#"{"validation": {"tolerance": "-0.01"}}"#).unwrap();
        let err = AuditConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, AuditError::Config(_)));
        assert!(err.halts_run());

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            AuditConfig::from_file(&path),
            Err(AuditError::Config(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AuditConfig::default();
        config.extraction.anchor = ColumnRole::SubjectId;
        config.save(&path).unwrap();

        let loaded = AuditConfig::from_file(&path).unwrap();
        assert_eq!(loaded.extraction.anchor, ColumnRole::SubjectId);
        assert_eq!(loaded.extraction.columns, config.extraction.columns);
    }
}
