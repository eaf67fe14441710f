//! Service registration for genforge-config

use std::sync::Arc;

use genforge_common::di::{ServiceEntry, ServiceFactory};

use crate::manager::ConfigManager;

// Config is loaded before the services that consume it
inventory::submit! {
    ServiceFactory::with_priority("config", create_config_services, 10)
}

fn create_config_services() -> Vec<ServiceEntry> {
    vec![ServiceEntry::new::<ConfigManager>(Arc::new(ConfigManager::new()))]
}

#[cfg(test)]
mod tests {
    use super::*;
    use genforge_common::di::list_discovered_factories;

    #[test]
    fn test_config_factory_registered() {
        let factories = list_discovered_factories();
        assert!(factories.contains(&"config"));
    }
}
