use std::sync::Arc;

use errand_shared::ToolRegistry;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::DEFAULT_MAX_STEPS;
use crate::llm::{ChatBackend, ChatMessage, ChatRequest};

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Use the available tools to answer questions.";

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent gave no final answer within {0} steps")]
    StepLimit(usize),
    #[error("LLM backend '{backend}' failed: {message}")]
    Backend { backend: String, message: String },
}

/// One executed tool call and what it returned.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentStep {
    pub tool: String,
    pub arguments: Value,
    pub observation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutcome {
    pub output: String,
    pub steps: Vec<AgentStep>,
}

/// Hands a goal to the model and runs the tools it asks for until it answers.
pub struct AgentExecutor {
    backend: Arc<dyn ChatBackend>,
    registry: ToolRegistry,
    system_prompt: String,
    max_steps: usize,
    verbose: bool,
}

impl AgentExecutor {
    pub fn new(backend: Arc<dyn ChatBackend>, registry: ToolRegistry) -> Self {
        Self {
            backend,
            registry,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_steps: DEFAULT_MAX_STEPS,
            verbose: false,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Log every tool call and observation at info level instead of debug.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn backend(&self) -> &dyn ChatBackend {
        self.backend.as_ref()
    }

    pub async fn invoke(&self, query: &str) -> Result<AgentOutcome, AgentError> {
        let mut messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(query),
        ];
        let tools = self.registry.tools();
        let mut steps = Vec::new();

        for turn in 1..=self.max_steps {
            let request = ChatRequest::new(messages.clone()).with_tools(tools.clone());
            let reply = self
                .backend
                .chat(&request)
                .await
                .map_err(|e| AgentError::Backend {
                    backend: self.backend.name().to_string(),
                    message: format!("{:#}", e),
                })?;

            if reply.tool_calls.is_empty() {
                debug!(turn, "final answer");
                return Ok(AgentOutcome {
                    output: reply.content.unwrap_or_default(),
                    steps,
                });
            }

            messages.push(ChatMessage::assistant_with_tools(
                reply.content.clone(),
                reply.tool_calls.clone(),
            ));

            for call in &reply.tool_calls {
                self.trace(format_args!("Calling tool: {} with args: {}", call.name, call.arguments));

                let observation = self
                    .registry
                    .use_tool(&call.name, &call.arguments)
                    .await
                    .unwrap_or_else(|e| format!("Error: {}", e));

                self.trace(format_args!("Tool result: {}", observation));

                messages.push(ChatMessage::tool_result(call, observation.clone()));
                steps.push(AgentStep {
                    tool: call.name.clone(),
                    arguments: call.arguments.clone(),
                    observation,
                });
            }
        }

        Err(AgentError::StepLimit(self.max_steps))
    }

    fn trace(&self, line: std::fmt::Arguments<'_>) {
        if self.verbose {
            info!("{}", line);
        } else {
            debug!("{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockBackend, MockReply, Role, ToolCall};
    use errand_shared::toolbelts::Calculator;
    use serde_json::json;

    fn executor(backend: &Arc<MockBackend>) -> AgentExecutor {
        let registry = ToolRegistry::new(vec![Box::new(Calculator)]).unwrap();
        AgentExecutor::new(backend.clone(), registry)
    }

    #[tokio::test]
    async fn direct_answer_needs_no_tools() {
        let backend = Arc::new(MockBackend::with_replies([MockReply::text("Hello there")]));

        let outcome = executor(&backend).invoke("Hi").await.unwrap();

        assert_eq!(outcome.output, "Hello there");
        assert!(outcome.steps.is_empty());

        let request = &backend.requests()[0];
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[0].content.as_deref(), Some(DEFAULT_SYSTEM_PROMPT));
        assert_eq!(request.messages[1].content.as_deref(), Some("Hi"));
        assert_eq!(request.tools[0].function.name, "calculate");
    }

    #[tokio::test]
    async fn tool_results_are_fed_back() {
        let backend = Arc::new(MockBackend::with_replies([
            MockReply::tool_call("calculate", json!({ "expression": "15 * 7 + 23" })),
            MockReply::text("15 * 7 + 23 = 128"),
        ]));

        let outcome = executor(&backend).invoke("Calculate 15 * 7 + 23").await.unwrap();

        assert_eq!(outcome.output, "15 * 7 + 23 = 128");
        assert_eq!(outcome.steps.len(), 1);
        assert_eq!(outcome.steps[0].tool, "calculate");
        assert_eq!(outcome.steps[0].observation, "128");

        let second = &backend.requests()[1];
        assert_eq!(second.messages.len(), 4);
        assert_eq!(second.messages[2].role, Role::Assistant);
        assert_eq!(second.messages[2].tool_calls[0].name, "calculate");
        assert_eq!(second.messages[3].role, Role::Tool);
        assert_eq!(second.messages[3].tool_call_id.as_deref(), Some("call_calculate"));
        assert_eq!(second.messages[3].content.as_deref(), Some("128"));
    }

    #[tokio::test]
    async fn unknown_tools_become_error_observations() {
        let backend = Arc::new(MockBackend::with_replies([
            MockReply::tool_calls(vec![
                ToolCall::new("a", "launch_rockets", json!({})),
                ToolCall::new("b", "calculate", json!({ "expression": "2*3" })),
            ]),
            MockReply::text("Only the calculator exists; the answer is 6."),
        ]));

        let outcome = executor(&backend).invoke("Do both").await.unwrap();

        assert_eq!(outcome.steps[0].observation, "Error: Tool 'launch_rockets' not found");
        assert_eq!(outcome.steps[1].observation, "6");
    }

    #[tokio::test]
    async fn stops_at_the_step_limit() {
        let backend = Arc::new(MockBackend::new());
        for _ in 0..3 {
            backend.push(MockReply::tool_call("calculate", json!({ "expression": "1+1" })));
        }

        let err = executor(&backend)
            .with_max_steps(2)
            .invoke("Loop forever")
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::StepLimit(2)));
        assert_eq!(backend.remaining(), 1);
    }

    #[tokio::test]
    async fn backend_failures_surface() {
        let backend = Arc::new(MockBackend::with_replies([MockReply::error("503 Service Unavailable")]));

        let err = executor(&backend).invoke("Hi").await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "LLM backend 'mock' failed: 503 Service Unavailable"
        );
    }
}
