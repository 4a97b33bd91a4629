//! Tool router: flattens tools across sessions and resolves names back to
//! the owning session.

use std::collections::HashMap;

use crate::provider::ToolDefinition;
use crate::registry::{SessionId, SessionRegistry};

/// A flattened, deduplicated snapshot of every tool advertised across the
/// registry, plus the routing map from tool name to owning session.
///
/// Rebuilt on every turn submission so sessions connected mid-conversation
/// are picked up; nothing is cached.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCatalog {
    entries: Vec<ToolDefinition>,
    routes: HashMap<String, SessionId>,
}

impl ToolCatalog {
    /// Build the catalog by iterating sessions in registration order and
    /// each session's tools in listing order.
    ///
    /// On a name collision the later iteration wins: both the routing map
    /// entry and the catalog definition are overwritten by the
    /// later-registered session's tool.
    pub fn build(registry: &SessionRegistry) -> Self {
        let mut entries: Vec<ToolDefinition> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut routes = HashMap::new();

        for (session_id, tools) in registry.iter() {
            for tool in tools {
                let definition = ToolDefinition {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.input_schema.clone(),
                };
                match positions.get(&tool.name) {
                    Some(&idx) => entries[idx] = definition,
                    None => {
                        positions.insert(tool.name.clone(), entries.len());
                        entries.push(definition);
                    }
                }
                routes.insert(tool.name.clone(), session_id.clone());
            }
        }

        Self { entries, routes }
    }

    /// Resolve a tool name to the session that owns it.
    pub fn resolve(&self, tool_name: &str) -> Option<&SessionId> {
        self.routes.get(tool_name)
    }

    /// Catalog entries in deterministic order.
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::test_support::{descriptor, FakeSession};
    use pretty_assertions::assert_eq;

    #[test]
    fn build_flattens_in_registration_then_listing_order() {
        let mut registry = SessionRegistry::new();
        let first = registry.register(
            Box::new(FakeSession::new(Vec::new())),
            vec![descriptor("alpha"), descriptor("beta")],
        );
        let second = registry.register(
            Box::new(FakeSession::new(Vec::new())),
            vec![descriptor("gamma")],
        );

        let catalog = ToolCatalog::build(&registry);
        let names: Vec<&str> = catalog.definitions().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);
        assert_eq!(catalog.resolve("alpha"), Some(&first));
        assert_eq!(catalog.resolve("gamma"), Some(&second));
        assert_eq!(catalog.resolve("missing"), None);
    }

    #[test]
    fn collision_resolves_to_later_registered_session() {
        let mut registry = SessionRegistry::new();
        let earlier = registry.register(
            Box::new(FakeSession::new(Vec::new())),
            vec![descriptor("echo")],
        );
        let later = registry.register(
            Box::new(FakeSession::new(Vec::new())),
            vec![descriptor("echo")],
        );

        let catalog = ToolCatalog::build(&registry);
        assert_eq!(catalog.len(), 1);
        assert_ne!(earlier, later);
        assert_eq!(catalog.resolve("echo"), Some(&later));
    }

    #[test]
    fn rebuild_is_idempotent_for_an_unchanged_registry() {
        let mut registry = SessionRegistry::new();
        registry.register(
            Box::new(FakeSession::new(Vec::new())),
            vec![descriptor("alpha"), descriptor("beta")],
        );
        registry.register(
            Box::new(FakeSession::new(Vec::new())),
            vec![descriptor("beta")],
        );

        let first = ToolCatalog::build(&registry);
        let second = ToolCatalog::build(&registry);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_registry_yields_empty_catalog() {
        let registry = SessionRegistry::new();
        let catalog = ToolCatalog::build(&registry);
        assert!(catalog.is_empty());
        assert_eq!(catalog.resolve("anything"), None);
    }
}
