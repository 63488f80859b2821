//! The embedding-friendly facade: wire every component from a [`Config`] and
//! expose the operations the CLI and HTTP server build on.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::config::Config;
use crate::domains::conversation::{Conversation, StoredMessage, User};
use crate::domains::memory::{SqlExamplePair, ToolMemorySearchResult};
use crate::domains::query::{ColumnInfo, QueryResponse, QueryResult};
use crate::error::{QueryPilotError, Result};
use crate::interfaces::providers::{EmbeddingProvider, LlmProvider};
use crate::interfaces::stores::{
    AgentMemory, ConversationStore, KnowledgeCollection, SqlRunner, UserResolver,
};
use crate::interfaces::tools::Tool;
use crate::providers::openai::OpenAiProvider;
use crate::providers::sqlite::SqliteStore;
use crate::runner::{SqliteSqlRunner, DEFAULT_ROW_LIMIT};
use crate::services::memory_writer::{MemoryWriter, DEFAULT_SIMILARITY_THRESHOLD};
use crate::services::orchestrator::QueryOrchestrator;
use crate::services::retriever::ContextRetriever;
use crate::services::user::MetadataUserResolver;
use crate::services::DEFAULT_REQUEST_TIMEOUT;
use crate::tools::chart::ChartTool;
use crate::tools::insights::InsightsTool;

const DEFAULT_MEMORY_PATH: &str = "data/memory.db";
const DEFAULT_DATASOURCE_PATH: &str = "data/analytics.db";

pub struct QueryPilot {
    orchestrator: QueryOrchestrator,
    embedder: Arc<dyn EmbeddingProvider>,
    memory: Arc<SqliteStore>,
    memory_writer: MemoryWriter,
    runner: Arc<SqliteSqlRunner>,
    chart: ChartTool,
    insights: InsightsTool,
    resolver: MetadataUserResolver,
}

impl QueryPilot {
    pub async fn from_config(config: Config) -> Result<Self> {
        let openai = config
            .openai
            .as_ref()
            .ok_or_else(|| QueryPilotError::Config("missing openai section".to_string()))?;
        let api_key = openai
            .api_key
            .clone()
            .ok_or_else(|| QueryPilotError::Config("missing openai api key".to_string()))?;

        let provider = OpenAiProvider::new(
            api_key,
            openai.model.clone(),
            openai.embedding_model.clone(),
            openai.base_url.clone(),
        );
        let llm: Arc<dyn LlmProvider> = Arc::new(provider.clone());
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(provider);

        let memory_path = config
            .memory
            .as_ref()
            .and_then(|m| m.path.clone())
            .unwrap_or_else(|| DEFAULT_MEMORY_PATH.to_string());
        let threshold = config
            .memory
            .as_ref()
            .and_then(|m| m.similarity_threshold)
            .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);
        let memory = Arc::new(SqliteStore::open(&memory_path).await?);

        let datasource_path = config
            .datasource
            .as_ref()
            .and_then(|d| d.path.clone())
            .unwrap_or_else(|| DEFAULT_DATASOURCE_PATH.to_string());
        let row_limit = config
            .datasource
            .as_ref()
            .and_then(|d| d.row_limit)
            .unwrap_or(DEFAULT_ROW_LIMIT);
        let runner = Arc::new(SqliteSqlRunner::open(&datasource_path, row_limit).await?);

        let timeout = config
            .request_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let agent_memory: Arc<dyn AgentMemory> = memory.clone();
        let retriever = ContextRetriever::new(embedder.clone(), agent_memory.clone(), timeout);
        let memory_writer = MemoryWriter::new(embedder.clone(), agent_memory, threshold, timeout);
        let sql_runner: Arc<dyn SqlRunner> = runner.clone();
        let orchestrator = QueryOrchestrator::new(
            llm.clone(),
            retriever,
            memory_writer.clone(),
            sql_runner,
            timeout,
        );

        Ok(Self {
            orchestrator,
            embedder,
            memory,
            memory_writer,
            runner,
            chart: ChartTool::new(llm.clone()),
            insights: InsightsTool::new(llm),
            resolver: MetadataUserResolver,
        })
    }

    pub async fn from_config_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::from_file(path)?.resolve_env();
        Self::from_config(config).await
    }

    /// Answer one natural-language question. Never fails: faults come back in
    /// the response's `error` field.
    pub async fn ask(&self, question: &str, user_id: Option<&str>) -> QueryResponse {
        self.orchestrator.ask(question, user_id).await
    }

    pub async fn train_ddl(&self, statements: Vec<String>, replace: bool) -> Result<usize> {
        if replace {
            self.memory.clear_collection(KnowledgeCollection::Ddl).await?;
        }
        let embeddings = self.embedder.embed_batch(&statements).await?;
        let count = statements.len();
        self.memory
            .add_ddl(statements.into_iter().zip(embeddings).collect())
            .await?;
        Ok(count)
    }

    pub async fn train_documentation(&self, documents: Vec<String>, replace: bool) -> Result<usize> {
        if replace {
            self.memory
                .clear_collection(KnowledgeCollection::Documentation)
                .await?;
        }
        let embeddings = self.embedder.embed_batch(&documents).await?;
        let count = documents.len();
        self.memory
            .add_documentation(documents.into_iter().zip(embeddings).collect())
            .await?;
        Ok(count)
    }

    /// Example pairs are embedded over the question text only.
    pub async fn train_examples(&self, pairs: Vec<SqlExamplePair>, replace: bool) -> Result<usize> {
        if replace {
            self.memory
                .clear_collection(KnowledgeCollection::SqlExamples)
                .await?;
        }
        let questions: Vec<String> = pairs.iter().map(|p| p.question.clone()).collect();
        let embeddings = self.embedder.embed_batch(&questions).await?;
        let count = pairs.len();
        self.memory
            .add_sql_examples(pairs.into_iter().zip(embeddings).collect())
            .await?;
        Ok(count)
    }

    pub async fn list_tables(&self) -> Result<Vec<String>> {
        self.runner.list_tables().await
    }

    pub async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        self.runner.describe_table(table).await
    }

    pub async fn generate_chart(&self, question: &str, result: &QueryResult) -> Result<Value> {
        self.chart.execute(dataset_params(question, result)).await
    }

    pub async fn generate_insights(&self, question: &str, result: &QueryResult) -> Result<Value> {
        self.insights.execute(dataset_params(question, result)).await
    }

    pub async fn recall_similar(
        &self,
        question: &str,
        limit: usize,
        tool_name: Option<&str>,
    ) -> Result<Vec<ToolMemorySearchResult>> {
        self.memory_writer.recall(question, limit, tool_name).await
    }

    pub async fn prune_tool_memory(&self, cutoff: i64) -> Result<usize> {
        self.memory.prune_tool_usage(cutoff).await
    }

    pub async fn resolve_user(&self, metadata: &Value) -> Result<User> {
        self.resolver.resolve(metadata).await
    }

    pub async fn save_message(
        &self,
        conversation_id: &str,
        user_id: &str,
        role: &str,
        content: &str,
        metadata: Value,
    ) -> Result<()> {
        self.memory
            .save_message(conversation_id, user_id, role, content, metadata)
            .await
    }

    pub async fn get_conversation(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Option<Conversation>> {
        self.memory.get_conversation(conversation_id, user_id).await
    }

    pub async fn list_conversations(&self, user_id: &str, limit: usize) -> Result<Vec<Conversation>> {
        self.memory.list_conversations(user_id, limit).await
    }

    pub async fn delete_conversation(&self, conversation_id: &str, user_id: &str) -> Result<bool> {
        self.memory.delete_conversation(conversation_id, user_id).await
    }

    pub async fn recent_messages(
        &self,
        conversation_id: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        self.memory
            .recent_messages(conversation_id, user_id, limit)
            .await
    }
}

fn dataset_params(question: &str, result: &QueryResult) -> Value {
    serde_json::json!({
        "question": question,
        "columns": result.columns,
        "rows": result.rows,
    })
}
