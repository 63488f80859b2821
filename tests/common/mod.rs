#![allow(dead_code)]

use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use querypilot::domains::query::{ColumnInfo, QueryResult};
use querypilot::error::Result;
use querypilot::interfaces::providers::{
    ChatRequest, EmbeddingProvider, LlmProvider, LlmTurn,
};
use querypilot::interfaces::stores::SqlRunner;

/// Scripted LLM: pops one queued turn per chat call and records every
/// request for assertions.
pub struct QueueLlmProvider {
    queue: Mutex<VecDeque<LlmTurn>>,
    pub requests: Mutex<Vec<ChatRequest>>,
    pub structured: Value,
}

impl QueueLlmProvider {
    pub fn new(queue: Vec<LlmTurn>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::from(queue)),
            requests: Mutex::new(Vec::new()),
            structured: json!({"ok": true}),
        }
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl LlmProvider for QueueLlmProvider {
    async fn chat(&self, request: ChatRequest) -> Result<LlmTurn> {
        self.requests.lock().await.push(request);
        let mut guard = self.queue.lock().await;
        Ok(guard.pop_front().unwrap_or(LlmTurn::TextReply {
            content: "no answer".to_string(),
        }))
    }

    async fn parse_structured_output(
        &self,
        _prompt: &str,
        _system_prompt: &str,
        _json_schema: Value,
    ) -> Result<Value> {
        Ok(self.structured.clone())
    }
}

/// Deterministic embedder: every text maps to the same fixed vector.
pub struct StaticEmbedder {
    pub vector: Vec<f32>,
}

impl StaticEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(self.vector.clone())
    }
}

/// Scripted runner: records every statement it is asked to run and pops a
/// queued result, defaulting to a one-row success.
pub struct RecordingSqlRunner {
    pub calls: Mutex<Vec<String>>,
    results: Mutex<VecDeque<QueryResult>>,
}

impl RecordingSqlRunner {
    pub fn new(results: Vec<QueryResult>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            results: Mutex::new(VecDeque::from(results)),
        }
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

pub fn one_row_result() -> QueryResult {
    QueryResult {
        columns: vec!["total".to_string()],
        rows: vec![vec![json!(42)]],
        row_count: 1,
        error: None,
    }
}

#[async_trait]
impl SqlRunner for RecordingSqlRunner {
    async fn run_sql(&self, sql: &str) -> QueryResult {
        self.calls.lock().await.push(sql.to_string());
        let mut guard = self.results.lock().await;
        guard.pop_front().unwrap_or_else(one_row_result)
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(vec!["FactInternetSales".to_string()])
    }

    async fn describe_table(&self, _table: &str) -> Result<Vec<ColumnInfo>> {
        Ok(vec![ColumnInfo {
            name: "SalesAmount".to_string(),
            data_type: "REAL".to_string(),
            nullable: true,
            default: None,
        }])
    }
}
