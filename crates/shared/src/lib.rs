pub mod db;
pub mod macros;
pub mod registry;
pub mod schemas;
pub mod toolbelts;

pub use async_trait::async_trait;
pub use rusqlite;
pub use schemas::{FunctionDefinition, ParameterSchema, Tool, ToolBelt, ToolSchema};
pub use registry::ToolRegistry;
