use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// One prior turn passed back to the model (role is "user", "assistant" or
/// "system").
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A chat response decoded once at the provider boundary. Downstream code
/// matches on this instead of poking at optional keys: either the model asked
/// for a tool, or it replied in text.
#[derive(Debug, Clone)]
pub enum LlmTurn {
    ToolCall { name: String, arguments: Value },
    TextReply { content: String },
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<Value>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<LlmTurn>;

    /// Single-shot structured output call, constrained by a JSON schema.
    async fn parse_structured_output(
        &self,
        prompt: &str,
        system_prompt: &str,
        json_schema: Value,
    ) -> Result<Value>;
}

/// Converts text to fixed-length vectors. The dimension is fixed by the
/// configured model; stores validate it on insert and query. Transport and
/// rate-limit errors propagate as hard failures, no retry here.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}
