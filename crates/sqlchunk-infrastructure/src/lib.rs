pub mod config_loader;
pub mod dto;
pub mod paths;
pub mod storage;
pub mod toml_session_store;

pub use crate::config_loader::load_config;
pub use crate::paths::SqlchunkPaths;
pub use crate::toml_session_store::TomlSessionStore;
