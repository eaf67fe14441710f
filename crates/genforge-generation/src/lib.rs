//! Template rendering and staged generation runs for genforge
//!
//! A generation run discovers a template tree, rewrites its paths with rename
//! rules, renders text files through Handlebars and copies binaries verbatim.
//! Output is materialized in a staging directory and committed to the target
//! in one step; idempotent patches are applied afterwards.
//!
//! [`PreviewPlanner`] answers what a run would do without writing anything,
//! and [`ConflictDetector`] reports outputs that already exist.

pub mod binary;
pub mod conflict_detector;
pub mod di;
pub mod error;
pub mod generation_manager;
pub mod models;
pub mod path_rewriter;
pub mod preview;
pub mod renderer;
pub mod templates;

// Re-export public API
pub use binary::BinaryClassifier;
pub use conflict_detector::ConflictDetector;
pub use error::GenerationError;
pub use generation_manager::GenerationManager;
pub use models::{
    Conflict, ConflictReport, FileEntry, FileMode, GenerationOutcome, GenerationRequest,
    PreviewCounts, PreviewFile, PreviewOperation, PreviewReport, RenameRuleSet, RenderOptions,
    RenderResult, TemplateEntry, DEFAULT_BINARY_SNIFF_BYTES,
};
pub use path_rewriter::PathRewriter;
pub use preview::PreviewPlanner;
pub use renderer::TemplateRenderer;
pub use templates::{TemplateEngine, TemplateLoader};
