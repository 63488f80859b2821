use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One retrieved question/SQL example. Embeddings for examples are computed
/// over the question text only, never over the SQL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlExamplePair {
    pub question: String,
    pub sql: String,
}

/// The bounded retrieval context assembled for one question, ordered by
/// descending similarity within each collection. Transient; rebuilt per
/// question.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagContext {
    pub ddl: Vec<String>,
    pub documentation: Vec<String>,
    pub sql_examples: Vec<SqlExamplePair>,
}

/// A recorded successful tool invocation, used as a retrieval source for
/// "similar past actions". Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMemoryRecord {
    pub id: i64,
    pub question: String,
    pub tool_name: String,
    pub args: Value,
    pub user_id: Option<String>,
    pub success: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMemorySearchResult {
    pub record: ToolMemoryRecord,
    pub similarity: f32,
    pub rank: usize,
}
