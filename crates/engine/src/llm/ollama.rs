// crates/engine/src/llm/ollama.rs
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use errand_shared::Tool;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ChatBackend, ChatMessage, ChatReply, ChatRequest, Role, ToolCall};

pub struct OllamaBackend {
    client: Client,
    url: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Tool]>,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    message: Message,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct Message {
    role: Role,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct OllamaToolCall {
    function: FunctionCall,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct FunctionCall {
    name: String,
    /// Ollama sends arguments as a JSON object, not a string.
    arguments: Value,
}

impl OllamaBackend {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url: format!("{}/api/chat", base_url.trim_end_matches('/')),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply> {
        let body = OllamaRequest {
            model: &self.model,
            messages: request.messages.iter().map(to_message).collect(),
            stream: false,
            tools: (!request.tools.is_empty()).then_some(request.tools.as_slice()),
        };

        let response = self.client.post(&self.url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("{} returned {}: {}", self.url, status, text);
        }

        let response = response.json::<OllamaResponse>().await?;
        Ok(from_message(response.message))
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn to_message(message: &ChatMessage) -> Message {
    let tool_calls = (!message.tool_calls.is_empty()).then(|| {
        message
            .tool_calls
            .iter()
            .map(|call| OllamaToolCall {
                function: FunctionCall {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                },
            })
            .collect()
    });

    Message {
        role: message.role,
        content: message.content.clone().unwrap_or_default(),
        tool_calls,
        tool_name: message.tool_name.clone(),
    }
}

/// Ollama does not number its tool calls, so ids are minted here.
fn from_message(message: Message) -> ChatReply {
    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| {
            let id = format!("call_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
            ToolCall::new(id, call.function.name, call.function.arguments)
        })
        .collect();

    ChatReply {
        content: Some(message.content).filter(|c| !c.trim().is_empty()),
        tool_calls,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_object_arguments_and_mints_ids() {
        let raw = r#"{
            "model": "qwen3:8b",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    { "function": { "name": "list_issues", "arguments": { "repo_name": "microsoft/vscode" } } },
                    { "function": { "name": "get_repo_details", "arguments": { "repo_name": "microsoft/vscode" } } }
                ]
            },
            "done": true
        }"#;

        let response: OllamaResponse = serde_json::from_str(raw).unwrap();
        let reply = from_message(response.message);

        assert!(reply.content.is_none());
        assert_eq!(reply.tool_calls.len(), 2);
        assert_eq!(reply.tool_calls[0].arguments, json!({ "repo_name": "microsoft/vscode" }));
        assert!(reply.tool_calls[0].id.starts_with("call_"));
        assert_ne!(reply.tool_calls[0].id, reply.tool_calls[1].id);
    }

    #[test]
    fn tool_results_name_their_tool() {
        let call = ToolCall::new("call_1", "list_issues", json!({}));
        let encoded = serde_json::to_value(to_message(&ChatMessage::tool_result(&call, "none"))).unwrap();

        assert_eq!(encoded["role"], "tool");
        assert_eq!(encoded["tool_name"], "list_issues");
        assert_eq!(encoded["content"], "none");
    }
}
