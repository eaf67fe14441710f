//! Service registration for genforge-patch

use std::sync::Arc;

use genforge_common::di::{ServiceEntry, ServiceFactory};

use crate::engine::PatchEngine;

inventory::submit! {
    ServiceFactory::new("patch", create_patch_services)
}

fn create_patch_services() -> Vec<ServiceEntry> {
    vec![ServiceEntry::new::<PatchEngine>(Arc::new(PatchEngine::default()))]
}

#[cfg(test)]
mod tests {
    use super::*;
    use genforge_common::di::list_discovered_factories;

    #[test]
    fn test_patch_factory_registered() {
        let factories = list_discovered_factories();
        assert!(factories.contains(&"patch"), "Patch factory should be registered");
    }

    #[test]
    fn test_create_patch_services() {
        let services = create_patch_services();
        assert!(services[0].downcast::<PatchEngine>().is_some());
    }
}
