//! Shared building blocks for genforge crates
//!
//! Holds the inventory-based service registration types and the logging
//! bootstrap used by binaries and integration tests.

pub mod di;
pub mod logging;

pub use logging::{init_logging, LogFormat, LogOptions};
