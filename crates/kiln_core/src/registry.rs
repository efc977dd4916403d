//! Station registry for managing station implementations.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::graph::Node;
use crate::station::Station;

/// A registry of station implementations, keyed by station name.
#[derive(Default)]
pub struct StationRegistry {
    stations: HashMap<String, Arc<dyn Station>>,
}

impl StationRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            stations: HashMap::new(),
        }
    }

    /// Register a station under its `name()`. Replaces any previous entry.
    pub fn register(&mut self, station: Arc<dyn Station>) {
        let name = station.name().to_string();
        debug!("Registering station: {}", name);
        self.stations.insert(name, station);
    }

    /// Get a station by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Station>> {
        self.stations.get(name).cloned()
    }

    /// Get a station by name, returning an error if not found.
    pub fn get_required(&self, name: &str) -> CoreResult<Arc<dyn Station>> {
        self.get(name)
            .ok_or_else(|| CoreError::StationNotFound(name.to_string()))
    }

    /// Check if a station is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.stations.contains_key(name)
    }

    /// Names of pipeline nodes with no registered station.
    pub fn missing_nodes(&self) -> Vec<&'static str> {
        Node::all()
            .iter()
            .map(|n| n.as_str())
            .filter(|name| !self.contains(name))
            .collect()
    }

    /// Get all registered station names.
    pub fn names(&self) -> Vec<&str> {
        self.stations.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

impl std::fmt::Debug for StationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StationRegistry")
            .field("stations", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::WorkflowContext;
    use crate::station::StationResult;
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl Station for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "test station"
        }

        async fn execute(&self, _context: &mut WorkflowContext) -> CoreResult<StationResult> {
            Ok(StationResult::success(self.0))
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = StationRegistry::new();
        registry.register(Arc::new(Named("routing")));

        assert!(registry.contains("routing"));
        assert!(registry.get("routing").is_some());
        assert!(matches!(
            registry.get_required("quality_check"),
            Err(CoreError::StationNotFound(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_missing_nodes() {
        let mut registry = StationRegistry::new();
        for node in Node::all() {
            if node != Node::ProjectBuild {
                registry.register(Arc::new(Named(node.as_str())));
            }
        }

        assert_eq!(registry.missing_nodes(), vec!["project_build"]);
    }
}
