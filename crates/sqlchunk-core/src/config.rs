use crate::session::{ConversionParameters, DEFAULT_CONCURRENCY, DEFAULT_MERGE_N};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8000";
pub const DEFAULT_NORMALIZE_PATH: &str = "/api/normalize_prompt";
pub const DEFAULT_CONVERT_PATH: &str = "/api/convert_chunk";

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_normalize_path")]
    pub normalize_path: String,
    #[serde(default = "default_convert_path")]
    pub convert_path: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            normalize_path: default_normalize_path(),
            convert_path: default_convert_path(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_SERVICE_URL.to_string()
}

fn default_normalize_path() -> String {
    DEFAULT_NORMALIZE_PATH.to_string()
}

fn default_convert_path() -> String {
    DEFAULT_CONVERT_PATH.to_string()
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageConfig {
    /// Where the session snapshot lives; defaults to the config directory
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

/// Parameter defaults for a fresh session.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DefaultsConfig {
    #[serde(default = "default_merge_n")]
    pub merge_n: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            merge_n: DEFAULT_MERGE_N,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

fn default_merge_n() -> usize {
    DEFAULT_MERGE_N
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl DefaultsConfig {
    /// Parameters a new session starts with.
    pub fn initial_parameters(&self) -> ConversionParameters {
        ConversionParameters {
            merge_n: self.merge_n.max(1),
            concurrency: self.concurrency.max(1),
            ..Default::default()
        }
    }
}
