#![warn(missing_docs)]

//! File management for genforge
//!
//! Provides the pieces a generation run needs to touch the filesystem safely:
//! path containment checks, line-ending handling, atomic single-file writes,
//! and the staging manager that commits a fully materialized tree into its
//! target with backup and restore.

pub mod di;
pub mod error;
pub mod line_endings;
pub mod models;
pub mod paths;
pub mod relocate;
pub mod staging;
pub mod writer;

// Re-export public API
pub use error::FileError;
pub use line_endings::{LineEnding, LineEndingPolicy};
pub use models::{
    CommitOptions, CommitOutcome, StagingConfig, StagingTransaction, TransactionStatus,
    WriteRecord,
};
pub use paths::{resolve_within, to_slash_string};
pub use relocate::{is_cross_device, AtomicRename, CopyThenDelete, Relocator};
pub use staging::StagingManager;
pub use writer::SafeWriter;
