//! Conversion parameters shared by every request of a session.

use crate::error::{ChunkError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MERGE_N: usize = 1;
pub const DEFAULT_CONCURRENCY: usize = 188;

/// Parameters of one conversion. Frozen while the session is locked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionParameters {
    pub source_format: String,
    pub destination_format: String,
    #[serde(default)]
    pub target_schema: String,
    #[serde(default)]
    pub destination_sql_language: String,
    /// Number of segments merged into one chunk
    #[serde(default = "default_merge_n")]
    pub merge_n: usize,
    /// Upper bound of concurrent conversion calls
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_merge_n() -> usize {
    DEFAULT_MERGE_N
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl Default for ConversionParameters {
    fn default() -> Self {
        Self {
            source_format: String::new(),
            destination_format: String::new(),
            target_schema: String::new(),
            destination_sql_language: String::new(),
            merge_n: DEFAULT_MERGE_N,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl ConversionParameters {
    /// Returns a copy with trimmed strings and numeric fields clamped to at least 1.
    pub fn normalized(&self) -> Self {
        Self {
            source_format: self.source_format.trim().to_string(),
            destination_format: self.destination_format.trim().to_string(),
            target_schema: self.target_schema.trim().to_string(),
            destination_sql_language: self.destination_sql_language.trim().to_string(),
            merge_n: self.merge_n.max(1),
            concurrency: self.concurrency.max(1),
        }
    }

    /// Checks that both formats are present.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.source_format.trim().is_empty() {
            missing.push("source_format is required");
        }
        if self.destination_format.trim().is_empty() {
            missing.push("destination_format is required");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ChunkError::validation(format!(
                "parameter validation failed: {}",
                missing.join("; ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ConversionParameters {
        ConversionParameters {
            source_format: "gbase8c".to_string(),
            destination_format: "gbasehd".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let p = ConversionParameters::default();
        assert_eq!(p.merge_n, 1);
        assert_eq!(p.concurrency, 188);
    }

    #[test]
    fn test_validate_reports_missing_destination() {
        let mut p = params();
        p.destination_format = "  ".to_string();
        let err = p.validate().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("destination_format"));
        assert!(!err.to_string().contains("source_format"));
    }

    #[test]
    fn test_normalized_clamps() {
        let mut p = params();
        p.merge_n = 0;
        p.concurrency = 0;
        p.target_schema = " stg ".to_string();
        let n = p.normalized();
        assert_eq!(n.merge_n, 1);
        assert_eq!(n.concurrency, 1);
        assert_eq!(n.target_schema, "stg");
    }
}
