use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::{ChatBackend, ChatReply, ChatRequest, ToolCall};

/// Backend that replays scripted replies, for tests and offline runs.
#[derive(Default)]
pub struct MockBackend {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<ChatRequest>>,
}

#[derive(Debug, Clone)]
pub enum MockReply {
    Reply(ChatReply),
    Error(String),
}

impl MockReply {
    pub fn text(content: impl Into<String>) -> Self {
        MockReply::Reply(ChatReply::text(content))
    }

    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        let name = name.into();
        MockReply::Reply(ChatReply {
            content: None,
            tool_calls: vec![ToolCall::new(format!("call_{}", name), name, arguments)],
        })
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        MockReply::Reply(ChatReply {
            content: None,
            tool_calls: calls,
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        MockReply::Error(message.into())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: impl IntoIterator<Item = MockReply>) -> Self {
        let backend = Self::new();
        for reply in replies {
            backend.push(reply);
        }
        backend
    }

    pub fn push(&self, reply: MockReply) {
        lock(&self.replies).push_back(reply);
    }

    pub fn remaining(&self) -> usize {
        lock(&self.replies).len()
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply> {
        lock(&self.requests).push(request.clone());

        let reply = lock(&self.replies).pop_front();
        match reply {
            Some(MockReply::Reply(reply)) => Ok(reply),
            Some(MockReply::Error(message)) => Err(anyhow::anyhow!(message)),
            None => Err(anyhow::anyhow!("MockBackend: no more replies in queue")),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("remaining_replies", &self.remaining())
            .finish()
    }
}
