//! Tool-memory write-back and recall.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::domains::memory::ToolMemorySearchResult;
use crate::error::Result;
use crate::interfaces::providers::EmbeddingProvider;
use crate::interfaces::stores::AgentMemory;
use crate::services::with_timeout;

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.7;

#[derive(Clone)]
pub struct MemoryWriter {
    embedder: Arc<dyn EmbeddingProvider>,
    memory: Arc<dyn AgentMemory>,
    threshold: f32,
    timeout: Duration,
}

impl MemoryWriter {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        memory: Arc<dyn AgentMemory>,
        threshold: f32,
        timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            memory,
            threshold,
            timeout,
        }
    }

    /// Embed the question and record the invocation. Callers decide whether a
    /// failure here is fatal; for the query pipeline it is not.
    pub async fn memorize(
        &self,
        question: &str,
        tool_name: &str,
        args: Value,
        user_id: Option<&str>,
        success: bool,
    ) -> Result<()> {
        let embedding = with_timeout(self.timeout, "embedding", self.embedder.embed(question)).await?;
        self.memory
            .save_tool_usage(question, tool_name, args, user_id, success, embedding)
            .await
    }

    /// Ranked successful invocations similar to the question, above the
    /// configured similarity floor.
    pub async fn recall(
        &self,
        question: &str,
        limit: usize,
        tool_name: Option<&str>,
    ) -> Result<Vec<ToolMemorySearchResult>> {
        let embedding = with_timeout(self.timeout, "embedding", self.embedder.embed(question)).await?;
        self.memory
            .search_similar_usage(&embedding, limit, self.threshold, tool_name)
            .await
    }
}
