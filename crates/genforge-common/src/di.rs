//! Service registration types for auto-discovery
//!
//! Each genforge crate submits a [`ServiceFactory`] through `inventory`. The
//! factory returns default instances of the crate's services, and
//! [`collect_all_services`] gathers them across every linked crate.
//!
//! ```rust,ignore
//! use genforge_common::di::{ServiceEntry, ServiceFactory};
//! use std::sync::Arc;
//!
//! inventory::submit! {
//!     ServiceFactory::new("files", create_file_services)
//! }
//!
//! fn create_file_services() -> Vec<ServiceEntry> {
//!     vec![ServiceEntry::new::<SafeWriter>(Arc::new(SafeWriter::new()))]
//! }
//! ```

use std::any::{Any, TypeId};
use std::sync::Arc;

use tracing::{debug, info};

/// Errors raised while resolving registered services
#[derive(Debug, thiserror::Error)]
pub enum DIRegistrationError {
    /// No entry of the requested type was registered
    #[error("Service resolution failed: {type_name}")]
    NotRegistered {
        /// Name of the requested type
        type_name: &'static str,
    },
}

/// A type-erased service instance produced by a factory
pub struct ServiceEntry {
    /// The TypeId of the service (used as lookup key)
    pub type_id: TypeId,

    /// Human-readable type name for diagnostics
    pub type_name: &'static str,

    /// The service instance
    pub instance: Arc<dyn Any + Send + Sync>,
}

impl ServiceEntry {
    /// Create a new service entry for a concrete type
    pub fn new<T: Send + Sync + 'static>(instance: Arc<T>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            instance: instance as Arc<dyn Any + Send + Sync>,
        }
    }

    /// Downcast the instance back to its concrete type
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.instance).downcast::<T>().ok()
    }
}

impl std::fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceEntry")
            .field("type_id", &self.type_id)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// A factory that creates the services of one crate
pub struct ServiceFactory {
    /// Name of the service group (e.g. "files", "patch", "generation")
    pub name: &'static str,

    /// Factory function that creates and returns services
    pub factory_fn: fn() -> Vec<ServiceEntry>,

    /// Registration order (lower = earlier, default = 100)
    pub priority: u32,
}

impl ServiceFactory {
    /// Create a new service factory with default priority
    pub const fn new(name: &'static str, factory_fn: fn() -> Vec<ServiceEntry>) -> Self {
        Self {
            name,
            factory_fn,
            priority: 100,
        }
    }

    /// Create a new service factory with custom priority
    pub const fn with_priority(
        name: &'static str,
        factory_fn: fn() -> Vec<ServiceEntry>,
        priority: u32,
    ) -> Self {
        Self {
            name,
            factory_fn,
            priority,
        }
    }
}

inventory::collect!(ServiceFactory);

/// Collect all services from discovered factories, in priority order.
pub fn collect_all_services() -> Vec<ServiceEntry> {
    let mut factories: Vec<&ServiceFactory> = inventory::iter::<ServiceFactory>().collect();

    // Stable sort keeps submission order for equal priorities
    factories.sort_by_key(|f| f.priority);

    info!(
        "Discovered {} service factories via inventory",
        factories.len()
    );

    let mut all_services = Vec::new();
    for factory in factories {
        let services = (factory.factory_fn)();
        debug!(
            "Factory '{}' (priority {}) created {} services",
            factory.name,
            factory.priority,
            services.len()
        );
        all_services.extend(services);
    }

    all_services
}

/// Resolve the first registered service of type `T`.
pub fn resolve<T: Send + Sync + 'static>() -> Result<Arc<T>, DIRegistrationError> {
    collect_all_services()
        .iter()
        .filter(|entry| entry.type_id == TypeId::of::<T>())
        .find_map(|entry| entry.downcast::<T>())
        .ok_or(DIRegistrationError::NotRegistered {
            type_name: std::any::type_name::<T>(),
        })
}

/// Count of discovered service factories.
pub fn discovered_factory_count() -> usize {
    inventory::iter::<ServiceFactory>().count()
}

/// Names of all discovered service factories.
pub fn list_discovered_factories() -> Vec<&'static str> {
    inventory::iter::<ServiceFactory>().map(|f| f.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    inventory::submit! {
        ServiceFactory::with_priority("test_common_factory", create_test_services, 1)
    }

    fn create_test_services() -> Vec<ServiceEntry> {
        vec![ServiceEntry::new::<String>(Arc::new(
            "test_service".to_string(),
        ))]
    }

    #[test]
    fn test_discovered_factories_include_test() {
        let names = list_discovered_factories();
        assert!(names.contains(&"test_common_factory"));
    }

    #[test]
    fn test_factory_count() {
        assert!(discovered_factory_count() >= 1);
    }

    #[test]
    fn test_collect_all_services() {
        let services = collect_all_services();
        let has_string_service = services
            .iter()
            .any(|s| s.type_id == TypeId::of::<String>());
        assert!(has_string_service);
    }

    #[test]
    fn test_resolve_registered_service() {
        let service = resolve::<String>().unwrap();
        assert_eq!(service.as_str(), "test_service");
    }

    #[test]
    fn test_resolve_missing_service() {
        let result = resolve::<u128>();
        assert!(matches!(
            result,
            Err(DIRegistrationError::NotRegistered { .. })
        ));
    }

    #[test]
    fn test_service_entry_downcast() {
        let entry = ServiceEntry::new::<i32>(Arc::new(42));
        assert_eq!(entry.type_id, TypeId::of::<i32>());
        assert!(entry.type_name.contains("i32"));
        assert_eq!(*entry.downcast::<i32>().unwrap(), 42);
        assert!(entry.downcast::<u8>().is_none());
    }
}
