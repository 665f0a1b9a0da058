use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::{Tool, ToolDefinition};

/// Immutable name -> tool mapping, built once at startup and shared by
/// handle.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    by_name: HashMap<String, Arc<dyn Tool>>,
    /// Catalog in registration order, so prompts are stable across runs.
    definitions: Vec<ToolDefinition>,
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistryBuilder {
    pub fn register(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn register_all(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Later registrations of an already-used name are dropped.
    pub fn build(self) -> ToolRegistry {
        let mut by_name = HashMap::new();
        let mut definitions = Vec::new();
        for tool in self.tools {
            let def = tool.definition();
            if by_name.contains_key(&def.name) {
                warn!("duplicate tool registration ignored: {}", def.name);
                continue;
            }
            by_name.insert(def.name.clone(), tool);
            definitions.push(def);
        }
        ToolRegistry {
            by_name,
            definitions,
        }
    }
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.by_name.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn names(&self) -> Vec<String> {
        self.definitions.iter().map(|d| d.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolError;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo(&'static str);

    #[async_trait]
    impl Tool for Echo {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".into(),
                description: self.0.into(),
                input_schema: json!({"type": "object"}),
            }
        }

        async fn call(&self, arguments: &str) -> Result<String, ToolError> {
            Ok(format!("{}:{arguments}", self.0))
        }
    }

    #[tokio::test]
    async fn lookup_by_name() {
        let registry = ToolRegistry::builder()
            .register(Arc::new(Echo("first")))
            .build();
        assert!(registry.contains("echo"));
        assert!(registry.get("missing").is_none());
        let out = registry.get("echo").unwrap().call("x").await.unwrap();
        assert_eq!(out, "first:x");
    }

    #[tokio::test]
    async fn first_registration_wins() {
        let registry = ToolRegistry::builder()
            .register(Arc::new(Echo("first")))
            .register(Arc::new(Echo("second")))
            .build();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.definitions()[0].description, "first");
    }
}
