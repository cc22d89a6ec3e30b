//! Chat-completion backends the agent talks to.
//!
//! The agent only sees [`ChatBackend`]; the wire formats of the
//! OpenAI-compatible and Ollama endpoints stay inside their modules.

pub mod mock;
pub mod ollama;
pub mod openai;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use errand_shared::Tool;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{GROQ_BASE_URL, LlmConfig, Provider};

pub use mock::{MockBackend, MockReply};
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    /// Set on tool results: the call being answered.
    pub tool_call_id: Option<String>,
    /// Set on tool results: the tool that produced them.
    pub tool_name: Option<String>,
}

impl ChatMessage {
    fn new(role: Role, content: Option<String>) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, Some(content.into()))
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, Some(content.into()))
    }

    pub fn assistant_with_tools(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(Role::Assistant, content)
        }
    }

    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call.id.clone()),
            tool_name: Some(call.name.clone()),
            ..Self::new(Role::Tool, Some(content.into()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<Tool>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }
}

/// What the model said back: text, tool calls, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply>;

    fn name(&self) -> &str;

    fn model(&self) -> &str;
}

/// Builds a backend for the first candidate model that answers a probe.
pub async fn connect(config: &LlmConfig) -> Result<Arc<dyn ChatBackend>> {
    if config.models.is_empty() {
        anyhow::bail!("No candidate models configured (LLM_MODELS is empty)");
    }

    if config.provider == Provider::OpenAi {
        match config.api_key.as_deref() {
            None => anyhow::bail!("GROQ_API_KEY (or LLM_API_KEY) environment variable not set"),
            Some(key) if config.base_url == GROQ_BASE_URL && !key.starts_with("gsk_") => {
                tracing::warn!("API key should start with 'gsk_'");
            }
            Some(_) => {}
        }
    }

    let mut failures = Vec::new();
    for model in &config.models {
        tracing::info!("Trying model: {}", model);

        let backend = build(config, model)?;
        match probe(backend.as_ref()).await {
            Ok(()) => {
                tracing::info!("Using model: {} via {}", model, backend.name());
                return Ok(backend);
            }
            Err(e) => {
                tracing::warn!("Failed with {}: {:#}", model, e);
                failures.push(format!("{}: {:#}", model, e));
            }
        }
    }

    anyhow::bail!(
        "All models failed. Please check your API key and try again.\n{}",
        failures.join("\n")
    )
}

fn build(config: &LlmConfig, model: &str) -> Result<Arc<dyn ChatBackend>> {
    Ok(match config.provider {
        Provider::OpenAi => Arc::new(OpenAiBackend::new(
            &config.base_url,
            config.api_key.as_deref().unwrap_or_default(),
            model,
            config.timeout,
        )?),
        Provider::Ollama => Arc::new(OllamaBackend::new(&config.base_url, model, config.timeout)?),
    })
}

/// Sends a one-word greeting; any reply counts as success.
pub async fn probe(backend: &dyn ChatBackend) -> Result<()> {
    backend
        .chat(&ChatRequest::new(vec![ChatMessage::user("Hi")]))
        .await
        .map(|_| ())
}
