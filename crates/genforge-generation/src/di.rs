//! Service registration for genforge-generation

use std::sync::Arc;

use genforge_common::di::{ServiceEntry, ServiceFactory};

use crate::{ConflictDetector, PreviewPlanner, TemplateEngine, TemplateRenderer};

inventory::submit! {
    ServiceFactory::new("generation", create_generation_services)
}

fn create_generation_services() -> Vec<ServiceEntry> {
    let renderer = TemplateRenderer::new();
    vec![
        ServiceEntry::new::<TemplateEngine>(Arc::new(TemplateEngine::new())),
        ServiceEntry::new::<PreviewPlanner>(Arc::new(PreviewPlanner::new(renderer.clone()))),
        ServiceEntry::new::<TemplateRenderer>(Arc::new(renderer)),
        ServiceEntry::new::<ConflictDetector>(Arc::new(ConflictDetector::new())),
    ]
}
