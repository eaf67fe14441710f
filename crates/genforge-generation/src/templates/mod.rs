//! Template engine and template tree discovery

pub mod engine;
pub mod loader;

pub use engine::TemplateEngine;
pub use loader::TemplateLoader;
