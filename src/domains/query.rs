use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of executing one SQL statement. `error` is populated instead of
/// raising; a failed execution still carries empty columns/rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            error: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Declared shape of one column, as reported by `describe_table`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

/// The uniform response shape for one question. Always structured: an
/// unhandled fault anywhere in the pipeline lands in `error`, never in a panic
/// or a raw propagated exception.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub question: String,
    pub sql: Option<String>,
    pub results: Option<QueryResult>,
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<Value>,
    pub error: Option<String>,
}

impl QueryResponse {
    pub fn empty(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            sql: None,
            results: None,
            explanation: None,
            chart: None,
            insights: None,
            error: None,
        }
    }

    pub fn from_error(question: impl Into<String>, message: impl Into<String>) -> Self {
        let mut response = Self::empty(question);
        response.error = Some(message.into());
        response
    }
}
