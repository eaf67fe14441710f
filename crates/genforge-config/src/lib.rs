//! Genforge configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `GENFORGE_*` environment variables (`__` separates nested keys, e.g.
//! `GENFORGE_PATCH__STRICT=false`).

pub mod di;
pub mod error;
pub mod manager;
pub mod types;

pub use error::{ConfigError, Result};
pub use manager::ConfigManager;
pub use types::{
    GenforgeConfig, PatchSettings, RenderSettings, StagingSettings, DEFAULT_BINARY_SNIFF_BYTES,
};
