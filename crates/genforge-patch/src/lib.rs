//! Idempotent, marker-delimited edits to generated files
//!
//! Each [`PatchOperation`] carries an idempotency key. When the engine applies
//! an operation it writes an [`IdempotencyStamp`] for that key next to the new
//! content; a file that already contains the stamp is never patched again.

pub mod di;
pub mod engine;
pub mod error;
pub mod models;
pub mod stamp;

pub use engine::PatchEngine;
pub use error::PatchError;
pub use models::{
    PatchApplySummary, PatchKind, PatchOperation, PatchOptions, PatchResult, PatchStatus,
    SkipReason,
};
pub use stamp::{CommentStyle, IdempotencyStamp};
