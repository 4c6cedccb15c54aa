//! Low-level file storage.

pub mod atomic_toml;

pub use atomic_toml::AtomicTomlFile;
