use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;
use crate::interfaces::providers::LlmProvider;
use crate::interfaces::tools::Tool;
use crate::tools::{dataset_prompt, parse_dataset};

const CHART_SYSTEM_PROMPT: &str = "You are a data visualization assistant. Given a question \
and a tabular result set, choose the most suitable chart and produce its configuration. \
Prefer bar charts for categorical comparisons, line charts for time series, and pie charts \
only for small part-of-whole breakdowns.";

/// One structured-output call that turns a result set into a chart
/// specification. The dataset is validated locally first.
pub struct ChartTool {
    llm: Arc<dyn LlmProvider>,
}

impl ChartTool {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    fn schema() -> Value {
        json!({
            "title": "chart_specification",
            "type": "object",
            "properties": {
                "chart_type": {
                    "type": "string",
                    "enum": ["bar", "line", "pie", "scatter", "table"],
                },
                "chart_config": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "x_axis": { "type": "string" },
                        "y_axis": { "type": "string" },
                    },
                    "required": ["title", "x_axis", "y_axis"],
                    "additionalProperties": false,
                },
            },
            "required": ["chart_type", "chart_config"],
            "additionalProperties": false,
        })
    }
}

#[async_trait]
impl Tool for ChartTool {
    fn name(&self) -> &str {
        "generate_chart"
    }

    fn description(&self) -> &str {
        "Generate a chart specification for a tabular query result."
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
            .parse_structured_output(&prompt, CHART_SYSTEM_PROMPT, Self::schema())
            .await
    }
}
