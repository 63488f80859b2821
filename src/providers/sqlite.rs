//! SQLite-backed knowledge, tool-memory and conversation store.
//!
//! All database access runs on the connection's dedicated thread; concurrent
//! callers queue rather than fail. Embeddings are stored as JSON float arrays
//! next to their payload in the same row, so an item is either fully present
//! or absent.

use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::Value;

use crate::domains::conversation::{Conversation, Role, StoredMessage};
use crate::domains::memory::{SqlExamplePair, ToolMemoryRecord, ToolMemorySearchResult};
use crate::error::{QueryPilotError, Result};
use crate::interfaces::stores::{AgentMemory, ConversationStore, KnowledgeCollection};

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS ddl_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content TEXT NOT NULL,
    embedding TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS documentation_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content TEXT NOT NULL,
    embedding TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sql_examples (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    question TEXT NOT NULL,
    sql TEXT NOT NULL,
    embedding TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tool_memory (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    question TEXT NOT NULL,
    tool_name TEXT NOT NULL,
    args TEXT NOT NULL,
    user_id TEXT,
    success INTEGER NOT NULL,
    embedding TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_conversations_user_id ON conversations(user_id);

CREATE TABLE IF NOT EXISTS conversation_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation_id
    ON conversation_messages(conversation_id);
";

#[derive(Clone)]
pub struct SqliteStore {
    conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
    pub async fn open(path: &str) -> Result<Self> {
        ensure_parent_dir(path)?;
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| QueryPilotError::Runtime(e.to_string()))?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| QueryPilotError::Runtime(e.to_string()))?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await
            .map_err(|e| QueryPilotError::Runtime(e.to_string()))
    }

    /// Raw `(id, payload columns..., embedding json)` rows for one knowledge
    /// collection. Ranking happens in [`rank`] after dimension validation.
    async fn load_collection(
        &self,
        collection: KnowledgeCollection,
    ) -> Result<Vec<(i64, Vec<String>, String)>> {
        let query = match collection {
            KnowledgeCollection::Ddl => "SELECT id, content, embedding FROM ddl_items",
            KnowledgeCollection::Documentation => {
                "SELECT id, content, embedding FROM documentation_items"
            }
            KnowledgeCollection::SqlExamples => {
                "SELECT id, question, sql, embedding FROM sql_examples"
            }
        };
        let wide = collection == KnowledgeCollection::SqlExamples;
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(query)?;
                let rows = stmt.query_map([], |row| {
                    let id: i64 = row.get(0)?;
                    if wide {
                        let question: String = row.get(1)?;
                        let sql: String = row.get(2)?;
                        let embedding: String = row.get(3)?;
                        Ok((id, vec![question, sql], embedding))
                    } else {
                        let content: String = row.get(1)?;
                        let embedding: String = row.get(2)?;
                        Ok((id, vec![content], embedding))
                    }
                })?;
                Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(|e| QueryPilotError::Retrieval(e.to_string()))
    }

    /// Reject inserts whose dimension disagrees with what the collection
    /// already holds: mixed embedding spaces silently corrupt ranking.
    async fn expected_dimension(&self, table: &'static str) -> Result<Option<usize>> {
        let query = format!("SELECT embedding FROM {table} ORDER BY id LIMIT 1");
        let existing: Option<String> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&query)?;
                let mut rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                Ok(rows.next().transpose()?)
            })
            .await
            .map_err(|e| QueryPilotError::Retrieval(e.to_string()))?;
        match existing {
            Some(json) => Ok(Some(decode_embedding(&json)?.len())),
            None => Ok(None),
        }
    }

    async fn check_insert_dimensions(
        &self,
        table: &'static str,
        embeddings: &[&Vec<f32>],
    ) -> Result<()> {
        let mut expected = self.expected_dimension(table).await?;
        for embedding in embeddings {
            match expected {
                Some(dim) if dim != embedding.len() => {
                    return Err(QueryPilotError::Retrieval(format!(
                        "embedding dimension {} does not match stored dimension {dim} in {table}",
                        embedding.len()
                    )));
                }
                Some(_) => {}
                None => expected = Some(embedding.len()),
            }
        }
        Ok(())
    }
}

fn ensure_parent_dir(path: &str) -> Result<()> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent).map_err(|e| QueryPilotError::Runtime(e.to_string()))?;
    }
    Ok(())
}

fn now_ts() -> Result<i64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| QueryPilotError::Runtime(e.to_string()))?
        .as_secs() as i64)
}

fn encode_embedding(embedding: &[f32]) -> Result<String> {
    serde_json::to_string(embedding).map_err(|e| QueryPilotError::Serialization(e.to_string()))
}

fn decode_embedding(json: &str) -> Result<Vec<f32>> {
    serde_json::from_str(json).map_err(|e| QueryPilotError::Serialization(e.to_string()))
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Exact top-K: score every row, sort by descending similarity with ties
/// broken by insertion order (rowid), truncate. A stored dimension that does
/// not match the query vector is a hard error, not a silent zero.
fn rank<T>(
    rows: Vec<(i64, T, String)>,
    query: &[f32],
    limit: usize,
) -> Result<Vec<(T, f32)>> {
    let mut scored = Vec::with_capacity(rows.len());
    for (id, payload, embedding_json) in rows {
        let embedding = decode_embedding(&embedding_json)?;
        if embedding.len() != query.len() {
            return Err(QueryPilotError::Retrieval(format!(
                "stored embedding dimension {} does not match query dimension {}",
                embedding.len(),
                query.len()
            )));
        }
        scored.push((id, payload, cosine_similarity(&embedding, query)));
    }
    scored.sort_by(|a, b| {
        b.2.partial_cmp(&a.2)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored.truncate(limit);
    Ok(scored
        .into_iter()
        .map(|(_, payload, similarity)| (payload, similarity))
        .collect())
}

#[async_trait]
impl AgentMemory for SqliteStore {
    async fn add_ddl(&self, items: Vec<(String, Vec<f32>)>) -> Result<()> {
        let embeddings: Vec<&Vec<f32>> = items.iter().map(|(_, e)| e).collect();
        self.check_insert_dimensions("ddl_items", &embeddings).await?;
        let ts = now_ts()?;
        let encoded: Vec<(String, String)> = items
            .iter()
            .map(|(content, embedding)| Ok((content.clone(), encode_embedding(embedding)?)))
            .collect::<Result<_>>()?;
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for (content, embedding) in &encoded {
                    tx.execute(
                        "INSERT INTO ddl_items (content, embedding, created_at) VALUES (?1, ?2, ?3)",
                        rusqlite::params![content, embedding, ts],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|e| QueryPilotError::Retrieval(e.to_string()))
    }

    async fn add_documentation(&self, items: Vec<(String, Vec<f32>)>) -> Result<()> {
        let embeddings: Vec<&Vec<f32>> = items.iter().map(|(_, e)| e).collect();
        self.check_insert_dimensions("documentation_items", &embeddings)
            .await?;
        let ts = now_ts()?;
        let encoded: Vec<(String, String)> = items
            .iter()
            .map(|(content, embedding)| Ok((content.clone(), encode_embedding(embedding)?)))
            .collect::<Result<_>>()?;
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for (content, embedding) in &encoded {
                    tx.execute(
                        "INSERT INTO documentation_items (content, embedding, created_at) \
                         VALUES (?1, ?2, ?3)",
                        rusqlite::params![content, embedding, ts],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|e| QueryPilotError::Retrieval(e.to_string()))
    }

    async fn add_sql_examples(&self, items: Vec<(SqlExamplePair, Vec<f32>)>) -> Result<()> {
        let embeddings: Vec<&Vec<f32>> = items.iter().map(|(_, e)| e).collect();
        self.check_insert_dimensions("sql_examples", &embeddings)
            .await?;
        let ts = now_ts()?;
        let encoded: Vec<(String, String, String)> = items
            .iter()
            .map(|(pair, embedding)| {
                Ok((
                    pair.question.clone(),
                    pair.sql.clone(),
                    encode_embedding(embedding)?,
                ))
            })
            .collect::<Result<_>>()?;
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for (question, sql, embedding) in &encoded {
                    tx.execute(
                        "INSERT INTO sql_examples (question, sql, embedding, created_at) \
                         VALUES (?1, ?2, ?3, ?4)",
                        rusqlite::params![question, sql, embedding, ts],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|e| QueryPilotError::Retrieval(e.to_string()))
    }

    async fn clear_collection(&self, collection: KnowledgeCollection) -> Result<usize> {
        let table = match collection {
            KnowledgeCollection::Ddl => "ddl_items",
            KnowledgeCollection::Documentation => "documentation_items",
            KnowledgeCollection::SqlExamples => "sql_examples",
        };
        let query = format!("DELETE FROM {table}");
        self.conn
            .call(move |conn| Ok(conn.execute(&query, [])?))
            .await
            .map_err(|e| QueryPilotError::Retrieval(e.to_string()))
    }

    async fn search_ddl(&self, embedding: &[f32], limit: usize) -> Result<Vec<String>> {
        let rows = self.load_collection(KnowledgeCollection::Ddl).await?;
        let ranked = rank(rows, embedding, limit)?;
        Ok(ranked
            .into_iter()
            .map(|(mut payload, _)| payload.remove(0))
            .collect())
    }

    async fn search_documentation(&self, embedding: &[f32], limit: usize) -> Result<Vec<String>> {
        let rows = self
            .load_collection(KnowledgeCollection::Documentation)
            .await?;
        let ranked = rank(rows, embedding, limit)?;
        Ok(ranked
            .into_iter()
            .map(|(mut payload, _)| payload.remove(0))
            .collect())
    }

    async fn search_sql_examples(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SqlExamplePair>> {
        let rows = self
            .load_collection(KnowledgeCollection::SqlExamples)
            .await?;
        let ranked = rank(rows, embedding, limit)?;
        Ok(ranked
            .into_iter()
            .map(|(mut payload, _)| {
                let question = payload.remove(0);
                let sql = payload.remove(0);
                SqlExamplePair { question, sql }
            })
            .collect())
    }

    async fn save_tool_usage(
        &self,
        question: &str,
        tool_name: &str,
        args: Value,
        user_id: Option<&str>,
        success: bool,
        embedding: Vec<f32>,
    ) -> Result<()> {
        self.check_insert_dimensions("tool_memory", &[&embedding])
            .await?;
        let ts = now_ts()?;
        let question = question.to_string();
        let tool_name = tool_name.to_string();
        let user_id = user_id.map(|s| s.to_string());
        let args = serde_json::to_string(&args)
            .map_err(|e| QueryPilotError::Serialization(e.to_string()))?;
        let embedding = encode_embedding(&embedding)?;
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO tool_memory \
                     (question, tool_name, args, user_id, success, embedding, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    rusqlite::params![question, tool_name, args, user_id, success, embedding, ts],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| QueryPilotError::Retrieval(e.to_string()))
    }

    async fn search_similar_usage(
        &self,
        embedding: &[f32],
        limit: usize,
        threshold: f32,
        tool_name: Option<&str>,
    ) -> Result<Vec<ToolMemorySearchResult>> {
        let tool_filter = tool_name.map(|s| s.to_string());
        let rows: Vec<(i64, (String, String, String, Option<String>, i64), String)> = self
            .conn
            .call(move |conn| {
                let (query, filter): (&str, Vec<String>) = match &tool_filter {
                    Some(name) => (
                        "SELECT id, question, tool_name, args, user_id, created_at, embedding \
                         FROM tool_memory WHERE success = 1 AND tool_name = ?1",
                        vec![name.clone()],
                    ),
                    None => (
                        "SELECT id, question, tool_name, args, user_id, created_at, embedding \
                         FROM tool_memory WHERE success = 1",
                        Vec::new(),
                    ),
                };
                let mut stmt = conn.prepare(query)?;
                let rows = stmt.query_map(rusqlite::params_from_iter(filter), |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        (
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, Option<String>>(4)?,
                            row.get::<_, i64>(5)?,
                        ),
                        row.get::<_, String>(6)?,
                    ))
                })?;
                Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(|e| QueryPilotError::Retrieval(e.to_string()))?;

        // Rank first, then drop everything under the floor.
        let ranked = rank(
            rows.into_iter()
                .map(|(id, payload, emb)| (id, (id, payload), emb))
                .collect(),
            embedding,
            usize::MAX,
        )?;

        let mut results = Vec::new();
        for ((id, (question, tool_name, args, user_id, created_at)), similarity) in ranked {
            if similarity < threshold {
                continue;
            }
            if results.len() >= limit {
                break;
            }
            let args: Value = serde_json::from_str(&args)
                .map_err(|e| QueryPilotError::Serialization(e.to_string()))?;
            let rank = results.len();
            results.push(ToolMemorySearchResult {
                record: ToolMemoryRecord {
                    id,
                    question,
                    tool_name,
                    args,
                    user_id,
                    success: true,
                    created_at,
                },
                similarity,
                rank,
            });
        }
        Ok(results)
    }

    async fn delete_tool_usage(&self, id: i64) -> Result<usize> {
        self.conn
            .call(move |conn| {
                Ok(conn.execute("DELETE FROM tool_memory WHERE id = ?1", rusqlite::params![id])?)
            })
            .await
            .map_err(|e| QueryPilotError::Retrieval(e.to_string()))
    }

    async fn delete_tool_usage_by_tool(&self, tool_name: &str) -> Result<usize> {
        let tool_name = tool_name.to_string();
        self.conn
            .call(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM tool_memory WHERE tool_name = ?1",
                    rusqlite::params![tool_name],
                )?)
            })
            .await
            .map_err(|e| QueryPilotError::Retrieval(e.to_string()))
    }

    async fn prune_tool_usage(&self, cutoff: i64) -> Result<usize> {
        self.conn
            .call(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM tool_memory WHERE created_at < ?1",
                    rusqlite::params![cutoff],
                )?)
            })
            .await
            .map_err(|e| QueryPilotError::Retrieval(e.to_string()))
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn save_message(
        &self,
        conversation_id: &str,
        user_id: &str,
        role: &str,
        content: &str,
        metadata: Value,
    ) -> Result<()> {
        let ts = now_ts()?;
        let conversation_id = conversation_id.to_string();
        let user_id = user_id.to_string();
        let role = role.to_string();
        let content = content.to_string();
        let metadata = serde_json::to_string(&metadata)
            .map_err(|e| QueryPilotError::Serialization(e.to_string()))?;

        let owned = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let existing_owner: Option<String> = {
                    let mut stmt =
                        tx.prepare("SELECT user_id FROM conversations WHERE id = ?1")?;
                    let mut rows =
                        stmt.query_map(rusqlite::params![conversation_id], |row| row.get(0))?;
                    rows.next().transpose()?
                };
                match existing_owner {
                    Some(owner) if owner != user_id => {
                        tx.rollback()?;
                        return Ok(false);
                    }
                    Some(_) => {
                        tx.execute(
                            "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
                            rusqlite::params![conversation_id, ts],
                        )?;
                    }
                    None => {
                        tx.execute(
                            "INSERT INTO conversations (id, user_id, created_at, updated_at) \
                             VALUES (?1, ?2, ?3, ?3)",
                            rusqlite::params![conversation_id, user_id, ts],
                        )?;
                    }
                }
                tx.execute(
                    "INSERT INTO conversation_messages \
                     (conversation_id, role, content, timestamp, metadata) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![conversation_id, role, content, ts, metadata],
                )?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(|e| QueryPilotError::Runtime(e.to_string()))?;

        if !owned {
            return Err(QueryPilotError::NotFound("conversation".to_string()));
        }
        Ok(())
    }

    async fn get_conversation(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Option<Conversation>> {
        let conversation_id = conversation_id.to_string();
        let user_id = user_id.to_string();
        self.conn
            .call(move |conn| {
                let conversation = {
                    let mut stmt = conn.prepare(
                        "SELECT id, user_id, created_at, updated_at, metadata \
                         FROM conversations WHERE id = ?1 AND user_id = ?2",
                    )?;
                    let mut rows =
                        stmt.query_map(rusqlite::params![conversation_id, user_id], |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, i64>(2)?,
                                row.get::<_, i64>(3)?,
                                row.get::<_, String>(4)?,
                            ))
                        })?;
                    rows.next().transpose()?
                };
                let Some((id, user_id, created_at, updated_at, metadata)) = conversation else {
                    return Ok(None);
                };

                let mut stmt = conn.prepare(
                    "SELECT role, content, timestamp, metadata FROM conversation_messages \
                     WHERE conversation_id = ?1 ORDER BY timestamp ASC, id ASC",
                )?;
                let messages = stmt
                    .query_map(rusqlite::params![id], |row| {
                        Ok(StoredMessage {
                            role: Role::parse(&row.get::<_, String>(0)?),
                            content: row.get(1)?,
                            timestamp: row.get(2)?,
                            metadata: serde_json::from_str(&row.get::<_, String>(3)?)
                                .unwrap_or(Value::Null),
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                Ok(Some(Conversation {
                    id,
                    user_id,
                    messages,
                    created_at,
                    updated_at,
                    metadata: serde_json::from_str(&metadata).unwrap_or(Value::Null),
                }))
            })
            .await
            .map_err(|e| QueryPilotError::Runtime(e.to_string()))
    }

    async fn list_conversations(&self, user_id: &str, limit: usize) -> Result<Vec<Conversation>> {
        let user_id = user_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, created_at, updated_at, metadata FROM conversations \
                     WHERE user_id = ?1 ORDER BY updated_at DESC LIMIT ?2",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![user_id, limit as i64], |row| {
                        Ok(Conversation {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            messages: Vec::new(),
                            created_at: row.get(2)?,
                            updated_at: row.get(3)?,
                            metadata: serde_json::from_str(&row.get::<_, String>(4)?)
                                .unwrap_or(Value::Null),
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(|e| QueryPilotError::Runtime(e.to_string()))
    }

    async fn delete_conversation(&self, conversation_id: &str, user_id: &str) -> Result<bool> {
        let conversation_id = conversation_id.to_string();
        let user_id = user_id.to_string();
        let deleted = self
            .conn
            .call(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM conversations WHERE id = ?1 AND user_id = ?2",
                    rusqlite::params![conversation_id, user_id],
                )?)
            })
            .await
            .map_err(|e| QueryPilotError::Runtime(e.to_string()))?;
        Ok(deleted > 0)
    }

    async fn recent_messages(
        &self,
        conversation_id: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        if self
            .get_conversation_owner(conversation_id)
            .await?
            .as_deref()
            != Some(user_id)
        {
            return Ok(Vec::new());
        }
        let conversation_id = conversation_id.to_string();
        let mut messages = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT role, content, timestamp, metadata FROM conversation_messages \
                     WHERE conversation_id = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![conversation_id, limit as i64], |row| {
                        Ok(StoredMessage {
                            role: Role::parse(&row.get::<_, String>(0)?),
                            content: row.get(1)?,
                            timestamp: row.get(2)?,
                            metadata: serde_json::from_str(&row.get::<_, String>(3)?)
                                .unwrap_or(Value::Null),
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(|e| QueryPilotError::Runtime(e.to_string()))?;
        messages.reverse();
        Ok(messages)
    }
}

impl SqliteStore {
    async fn get_conversation_owner(&self, conversation_id: &str) -> Result<Option<String>> {
        let conversation_id = conversation_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT user_id FROM conversations WHERE id = ?1")?;
                let mut rows =
                    stmt.query_map(rusqlite::params![conversation_id], |row| row.get(0))?;
                Ok(rows.next().transpose()?)
            })
            .await
            .map_err(|e| QueryPilotError::Runtime(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn rank_orders_descending_with_stable_ties() {
        let rows = vec![
            (1, "far", serde_json::to_string(&[0.0f32, 1.0]).unwrap()),
            (2, "near", serde_json::to_string(&[1.0f32, 0.0]).unwrap()),
            (3, "tie", serde_json::to_string(&[0.0f32, 1.0]).unwrap()),
        ];
        let ranked = rank(rows, &[1.0, 0.0], 10).unwrap();
        let names: Vec<&str> = ranked.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["near", "far", "tie"]);
    }

    #[test]
    fn rank_rejects_dimension_mismatch() {
        let rows = vec![(1, "x", serde_json::to_string(&[1.0f32, 0.0, 0.0]).unwrap())];
        let err = rank(rows, &[1.0, 0.0], 10).unwrap_err();
        assert!(matches!(err, QueryPilotError::Retrieval(_)));
    }
}
