use async_trait::async_trait;
use serde_json::Value;

use crate::domains::conversation::{Conversation, StoredMessage, User};
use crate::domains::memory::{SqlExamplePair, ToolMemorySearchResult};
use crate::domains::query::{ColumnInfo, QueryResult};
use crate::error::Result;

/// Similarity-searchable knowledge and tool-memory store.
///
/// All searches take a precomputed query embedding so callers can embed once
/// and fan out. Results are ordered by descending cosine similarity with ties
/// broken by insertion order. Inserts are atomic per item: payload and
/// embedding land together or not at all.
#[async_trait]
pub trait AgentMemory: Send + Sync {
    async fn add_ddl(&self, items: Vec<(String, Vec<f32>)>) -> Result<()>;
    async fn add_documentation(&self, items: Vec<(String, Vec<f32>)>) -> Result<()>;
    async fn add_sql_examples(&self, items: Vec<(SqlExamplePair, Vec<f32>)>) -> Result<()>;

    /// Wholesale reload support: drop every item in one collection.
    async fn clear_collection(&self, collection: KnowledgeCollection) -> Result<usize>;

    async fn search_ddl(&self, embedding: &[f32], limit: usize) -> Result<Vec<String>>;
    async fn search_documentation(&self, embedding: &[f32], limit: usize) -> Result<Vec<String>>;
    async fn search_sql_examples(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SqlExamplePair>>;

    async fn save_tool_usage(
        &self,
        question: &str,
        tool_name: &str,
        args: Value,
        user_id: Option<&str>,
        success: bool,
        embedding: Vec<f32>,
    ) -> Result<()>;

    /// Ranked records with `success = true`, similarity >= `threshold`
    /// (items below the floor are excluded entirely), optionally filtered by
    /// tool name.
    async fn search_similar_usage(
        &self,
        embedding: &[f32],
        limit: usize,
        threshold: f32,
        tool_name: Option<&str>,
    ) -> Result<Vec<ToolMemorySearchResult>>;

    async fn delete_tool_usage(&self, id: i64) -> Result<usize>;
    async fn delete_tool_usage_by_tool(&self, tool_name: &str) -> Result<usize>;
    /// Delete records created before the unix-seconds cutoff.
    async fn prune_tool_usage(&self, cutoff: i64) -> Result<usize>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnowledgeCollection {
    Ddl,
    Documentation,
    SqlExamples,
}

/// Append-only per-user conversation log. Every read and delete is scoped by
/// the owning user id; access by anyone else fails closed as not-found.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn save_message(
        &self,
        conversation_id: &str,
        user_id: &str,
        role: &str,
        content: &str,
        metadata: Value,
    ) -> Result<()>;

    async fn get_conversation(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Option<Conversation>>;

    /// Conversations for one user, most recently updated first, without
    /// messages.
    async fn list_conversations(&self, user_id: &str, limit: usize) -> Result<Vec<Conversation>>;

    /// Returns true when a conversation was deleted; messages cascade.
    async fn delete_conversation(&self, conversation_id: &str, user_id: &str) -> Result<bool>;

    async fn recent_messages(
        &self,
        conversation_id: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>>;
}

/// The SQL execution collaborator. `run_sql` never raises past its boundary:
/// failures come back inside the result.
#[async_trait]
pub trait SqlRunner: Send + Sync {
    async fn run_sql(&self, sql: &str) -> QueryResult;
    async fn list_tables(&self) -> Result<Vec<String>>;
    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>>;
}

/// Maps request metadata to a stable user identity.
#[async_trait]
pub trait UserResolver: Send + Sync {
    async fn resolve(&self, metadata: &Value) -> Result<User>;
}
