//! The question-to-answer pipeline: retrieve context, prompt the model with
//! the `run_sql` tool, execute whichever SQL comes back, self-correct once on
//! an execution error, and write successful interactions into tool memory.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::domains::memory::RagContext;
use crate::domains::query::{QueryResponse, QueryResult};
use crate::error::{QueryPilotError, Result};
use crate::interfaces::providers::{ChatMessage, ChatRequest, LlmProvider, LlmTurn};
use crate::interfaces::stores::SqlRunner;
use crate::interfaces::tools::{tool_schema, Tool};
use crate::services::memory_writer::MemoryWriter;
use crate::services::retriever::ContextRetriever;
use crate::services::with_timeout;
use crate::tools::run_sql::RunSqlTool;

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 2048;
const MAX_PROMPT_EXAMPLES: usize = 3;

const SYSTEM_PROMPT_HEADER: &str = "You are a data analyst assistant. You answer questions \
by generating SQL and executing it with the run_sql tool.

Rules:
- Only generate SELECT queries. If the user asks to insert, update, delete or otherwise \
modify data, reply exactly: I can only execute SELECT queries.
- If the question is not related to the data, reply exactly: I can only answer questions \
related to the data or analysis of the data.
- Answer in the same language the user asked in.
- Base queries only on the tables and columns in the schema below.
- If a query fails, correct it once using the error message. Never retry more than once.";

const CLARIFICATION_MESSAGE: &str = "I could not produce a working query for this question. \
Please rephrase it or add more detail about the data you are looking for.";

/// What one model turn contributed: runnable SQL, or a plain answer.
enum Candidate {
    Sql(String),
    Text(String),
}

pub struct QueryOrchestrator {
    llm: Arc<dyn LlmProvider>,
    retriever: ContextRetriever,
    memory_writer: MemoryWriter,
    run_sql: RunSqlTool,
    timeout: Duration,
}

impl QueryOrchestrator {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        retriever: ContextRetriever,
        memory_writer: MemoryWriter,
        runner: Arc<dyn SqlRunner>,
        timeout: Duration,
    ) -> Self {
        Self {
            llm,
            retriever,
            memory_writer,
            run_sql: RunSqlTool::new(runner),
            timeout,
        }
    }

    /// Answer one question. Never returns an error and never panics: any
    /// fault in the pipeline lands in the response's `error` field.
    pub async fn ask(&self, question: &str, user_id: Option<&str>) -> QueryResponse {
        match self.answer(question, user_id).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "query pipeline failed");
                QueryResponse::from_error(question, e.to_string())
            }
        }
    }

    async fn answer(&self, question: &str, user_id: Option<&str>) -> Result<QueryResponse> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QueryPilotError::Validation(
                "question must not be empty".to_string(),
            ));
        }

        let context = self.retriever.get_context_for_question(question).await?;
        let system_prompt = build_system_prompt(&context);
        let mut messages = vec![ChatMessage::user(format!("Generate SQL for: {question}"))];

        let turn = self.chat(&system_prompt, &messages).await?;
        let candidate = decode_candidate(turn, self.run_sql.name())?;

        let sql = match candidate {
            Candidate::Text(content) => {
                // Refusal or direct answer; nothing to execute.
                let mut response = QueryResponse::empty(question);
                response.explanation = Some(content);
                return Ok(response);
            }
            Candidate::Sql(sql) => sql,
        };

        tracing::info!(%sql, "executing generated query");
        let result = self.execute(&sql).await?;
        if result.is_success() {
            return Ok(self.finish(question, sql, result, user_id).await);
        }

        // One silent self-correction turn carrying the execution error.
        let error = result.error.clone().unwrap_or_default();
        tracing::info!(%error, "query failed, attempting one correction");
        messages.push(ChatMessage::assistant(sql.clone()));
        messages.push(ChatMessage::user(format!(
            "The query failed with error: {error}. Fix the SQL and try again."
        )));

        let turn = self.chat(&system_prompt, &messages).await?;
        let corrected = match decode_candidate(turn, self.run_sql.name())? {
            Candidate::Sql(sql) => sql,
            Candidate::Text(content) => {
                let mut response = QueryResponse::from_error(question, error);
                response.sql = Some(sql);
                response.explanation = Some(content);
                return Ok(response);
            }
        };

        let result = self.execute(&corrected).await?;
        if result.is_success() {
            return Ok(self.finish(question, corrected, result, user_id).await);
        }

        let mut response =
            QueryResponse::from_error(question, result.error.clone().unwrap_or_default());
        response.sql = Some(corrected);
        response.explanation = Some(CLARIFICATION_MESSAGE.to_string());
        Ok(response)
    }

    async fn chat(&self, system_prompt: &str, messages: &[ChatMessage]) -> Result<LlmTurn> {
        let request = ChatRequest {
            system_prompt: system_prompt.to_string(),
            messages: messages.to_vec(),
            tools: vec![tool_schema(&self.run_sql)],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };
        with_timeout(self.timeout, "llm", self.llm.chat(request)).await
    }

    /// Execute through the tool protocol, the same surface the model calls.
    async fn execute(&self, sql: &str) -> Result<QueryResult> {
        let value = self.run_sql.execute(json!({ "sql": sql })).await?;
        serde_json::from_value(value).map_err(|e| QueryPilotError::Serialization(e.to_string()))
    }

    /// Successful execution: record it in tool memory (best-effort) and build
    /// the response.
    async fn finish(
        &self,
        question: &str,
        sql: String,
        result: QueryResult,
        user_id: Option<&str>,
    ) -> QueryResponse {
        if let Err(e) = self
            .memory_writer
            .memorize(
                question,
                self.run_sql.name(),
                json!({ "sql": &sql }),
                user_id,
                true,
            )
            .await
        {
            tracing::warn!(error = %e, "tool memory write-back failed");
        }

        let mut response = QueryResponse::empty(question);
        response.explanation = Some(format!("Returned {} row(s).", result.row_count));
        response.sql = Some(sql);
        response.results = Some(result);
        response
    }
}

fn decode_candidate(turn: LlmTurn, tool_name: &str) -> Result<Candidate> {
    match turn {
        LlmTurn::ToolCall { name, arguments } => {
            if name != tool_name {
                return Err(QueryPilotError::Generation(format!(
                    "model called unknown tool '{name}'"
                )));
            }
            let sql = arguments
                .get("sql")
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    QueryPilotError::Generation(
                        "tool call is missing a 'sql' string argument".to_string(),
                    )
                })?;
            Ok(Candidate::Sql(sql.to_string()))
        }
        LlmTurn::TextReply { content } => match crate::extraction::extract_sql(&content) {
            Some(sql) => Ok(Candidate::Sql(sql)),
            None => Ok(Candidate::Text(content)),
        },
    }
}

/// Interpolate retrieved context into the instructional template: each DDL
/// statement followed by a blank line, bulleted business rules, and at most
/// three example pairs.
fn build_system_prompt(context: &RagContext) -> String {
    let mut prompt = String::from(SYSTEM_PROMPT_HEADER);

    if !context.ddl.is_empty() {
        prompt.push_str("\n\n## DATABASE SCHEMA:\n");
        for ddl in &context.ddl {
            prompt.push_str(ddl);
            prompt.push_str("\n\n");
        }
    }

    if !context.documentation.is_empty() {
        prompt.push_str("\n## BUSINESS RULES:\n");
        for doc in &context.documentation {
            prompt.push_str("- ");
            prompt.push_str(doc);
            prompt.push('\n');
        }
    }

    if !context.sql_examples.is_empty() {
        prompt.push_str("\n## SIMILAR EXAMPLES:\n");
        for example in context.sql_examples.iter().take(MAX_PROMPT_EXAMPLES) {
            prompt.push_str(&format!("Q: {}\nSQL: {}\n\n", example.question, example.sql));
        }
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::memory::SqlExamplePair;
    use serde_json::json;

    fn pair(n: usize) -> SqlExamplePair {
        SqlExamplePair {
            question: format!("q{n}"),
            sql: format!("SELECT {n}"),
        }
    }

    #[test]
    fn prompt_caps_examples_at_three() {
        let context = RagContext {
            ddl: vec!["CREATE TABLE t (a INT)".to_string()],
            documentation: vec!["amounts are in USD".to_string()],
            sql_examples: (0..5).map(pair).collect(),
        };
        let prompt = build_system_prompt(&context);
        assert!(prompt.contains("## DATABASE SCHEMA:"));
        assert!(prompt.contains("- amounts are in USD"));
        assert!(prompt.contains("Q: q2"));
        assert!(!prompt.contains("Q: q3"));
    }

    #[test]
    fn prompt_omits_empty_sections() {
        let prompt = build_system_prompt(&RagContext::default());
        assert!(!prompt.contains("## DATABASE SCHEMA:"));
        assert!(!prompt.contains("## BUSINESS RULES:"));
        assert!(!prompt.contains("## SIMILAR EXAMPLES:"));
    }

    #[test]
    fn candidate_decoding() {
        let turn = LlmTurn::ToolCall {
            name: "run_sql".to_string(),
            arguments: json!({"sql": "SELECT 1"}),
        };
        assert!(matches!(
            decode_candidate(turn, "run_sql").unwrap(),
            Candidate::Sql(sql) if sql == "SELECT 1"
        ));

        let turn = LlmTurn::ToolCall {
            name: "other".to_string(),
            arguments: json!({}),
        };
        assert!(decode_candidate(turn, "run_sql").is_err());

        let turn = LlmTurn::TextReply {
            content: "I can only execute SELECT queries.".to_string(),
        };
        assert!(matches!(
            decode_candidate(turn, "run_sql").unwrap(),
            Candidate::Text(_)
        ));
    }
}
