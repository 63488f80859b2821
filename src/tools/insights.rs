use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;
use crate::interfaces::providers::LlmProvider;
use crate::interfaces::tools::Tool;
use crate::tools::{dataset_prompt, parse_dataset};

const INSIGHTS_SYSTEM_PROMPT: &str = "You are a data analyst. Given a question and a tabular \
result set, summarize what the data shows. Be concrete: cite the values you base each \
finding on, and only recommend actions the data supports.";

/// One structured-output call that narrates a result set: a summary, concrete
/// findings, and recommendations.
pub struct InsightsTool {
    llm: Arc<dyn LlmProvider>,
}

impl InsightsTool {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    fn schema() -> Value {
        json!({
            "title": "result_insights",
            "type": "object",
            "properties": {
                "summary": { "type": "string" },
                "findings": { "type": "array", "items": { "type": "string" } },
                "recommendations": { "type": "array", "items": { "type": "string" } },
            },
            "required": ["summary", "findings", "recommendations"],
            "additionalProperties": false,
        })
    }
}

#[async_trait]
impl Tool for InsightsTool {
    fn name(&self) -> &str {
        "generate_insights"
    }

    fn description(&self) -> &str {
        "Summarize a tabular query result into findings and recommendations."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question": { "type": "string" },
                "columns": { "type": "array", "items": { "type": "string" } },
                "rows": { "type": "array" },
            },
            "required": ["question", "columns", "rows"],
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let dataset = parse_dataset(&params)?;
        let prompt = dataset_prompt(&dataset);
        self.llm
            .parse_structured_output(&prompt, INSIGHTS_SYSTEM_PROMPT, Self::schema())
            .await
    }
}
