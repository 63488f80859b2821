use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{QueryPilotError, Result};
use crate::interfaces::stores::SqlRunner;
use crate::interfaces::tools::Tool;

/// The single tool exposed to the model during query generation. Arguments
/// are exactly `{ "sql": string }`; anything else is rejected before touching
/// the database.
pub struct RunSqlTool {
    runner: Arc<dyn SqlRunner>,
}

impl RunSqlTool {
    pub fn new(runner: Arc<dyn SqlRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Tool for RunSqlTool {
    fn name(&self) -> &str {
        "run_sql"
    }

    fn description(&self) -> &str {
        "Execute a SELECT query against the analytics database and return the result rows."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "The SELECT statement to execute.",
                }
            },
            "required": ["sql"],
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let sql = params
            .get("sql")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                QueryPilotError::Validation(
                    "run_sql requires a non-empty 'sql' string argument".to_string(),
                )
            })?;
        let result = self.runner.run_sql(sql).await;
        serde_json::to_value(result).map_err(|e| QueryPilotError::Serialization(e.to_string()))
    }
}
