use std::collections::HashMap;

use anyhow::Result;
use serde_json::Value;

use crate::schemas::{Tool, ToolBelt, ToolSchema};

/// Fixed mapping from tool name to the toolbelt that serves it.
///
/// Built once at start-up; there is no way to add or remove tools afterwards.
pub struct ToolRegistry {
    toolbelts: Vec<Box<dyn ToolBelt>>,
    schemas: Vec<ToolSchema>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    pub fn new(toolbelts: Vec<Box<dyn ToolBelt>>) -> Result<Self> {
        let mut schemas = Vec::new();
        let mut index = HashMap::new();

        for (position, toolbelt) in toolbelts.iter().enumerate() {
            for schema in toolbelt.tool_schemas() {
                if index.insert(schema.name, position).is_some() {
                    anyhow::bail!(
                        "Tool '{}' from {} is already registered",
                        schema.name,
                        toolbelt.name()
                    );
                }
                schemas.push(schema);
            }
        }

        Ok(Self {
            toolbelts,
            schemas,
            index,
        })
    }

    pub async fn use_tool(&self, name: &str, args: &Value) -> Result<String> {
        let position = self
            .index
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Tool '{}' not found", name))?;

        self.toolbelts[*position].use_tool(name, args).await
    }

    /// All tools in Ollama/OpenAI format, in registration order.
    pub fn tools(&self) -> Vec<Tool> {
        self.schemas.iter().map(|s| s.to_tool()).collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.schemas.iter().map(|s| s.name).collect()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
