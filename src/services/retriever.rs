//! Context retrieval: one embedding, three concurrent searches.

use std::sync::Arc;
use std::time::Duration;

use crate::domains::memory::RagContext;
use crate::error::Result;
use crate::interfaces::providers::EmbeddingProvider;
use crate::interfaces::stores::AgentMemory;
use crate::services::with_timeout;

pub const DDL_LIMIT: usize = 10;
pub const DOCUMENTATION_LIMIT: usize = 5;
pub const EXAMPLE_LIMIT: usize = 5;

/// Read-only and idempotent: retrieval never mutates the store, and asking
/// the same question twice against an unchanged store yields the same context.
#[derive(Clone)]
pub struct ContextRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    memory: Arc<dyn AgentMemory>,
    timeout: Duration,
}

impl ContextRetriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        memory: Arc<dyn AgentMemory>,
        timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            memory,
            timeout,
        }
    }

    pub async fn get_context_for_question(&self, question: &str) -> Result<RagContext> {
        let embedding = with_timeout(self.timeout, "embedding", self.embedder.embed(question)).await?;
        let (ddl, documentation, sql_examples) = tokio::try_join!(
            self.memory.search_ddl(&embedding, DDL_LIMIT),
            self.memory.search_documentation(&embedding, DOCUMENTATION_LIMIT),
            self.memory.search_sql_examples(&embedding, EXAMPLE_LIMIT),
        )?;
        tracing::debug!(
            ddl = ddl.len(),
            documentation = documentation.len(),
            examples = sql_examples.len(),
            "retrieved context"
        );
        Ok(RagContext {
            ddl,
            documentation,
            sql_examples,
        })
    }
}
