//! Service registration for genforge-files
//!
//! Registers a [`SafeWriter`] and a [`StagingManager`] built from the default
//! staging roots.

use std::sync::Arc;

use genforge_common::di::{ServiceEntry, ServiceFactory};

use crate::staging::StagingManager;
use crate::writer::SafeWriter;

inventory::submit! {
    ServiceFactory::new("files", create_files_services)
}

fn create_files_services() -> Vec<ServiceEntry> {
    vec![
        ServiceEntry::new::<SafeWriter>(Arc::new(SafeWriter::new())),
        ServiceEntry::new::<StagingManager>(Arc::new(StagingManager::default())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use genforge_common::di::list_discovered_factories;

    #[test]
    fn test_files_factory_registered() {
        let factories = list_discovered_factories();
        assert!(
            factories.contains(&"files"),
            "Files factory should be registered"
        );
    }

    #[test]
    fn test_create_files_services() {
        let services = create_files_services();
        assert_eq!(services.len(), 2);

        let has_staging = services
            .iter()
            .any(|s| s.downcast::<StagingManager>().is_some());
        assert!(has_staging, "Should include StagingManager");
    }
}
