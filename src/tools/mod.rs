pub mod chart;
pub mod insights;
pub mod run_sql;

use serde_json::Value;

use crate::error::{QueryPilotError, Result};

/// A result set handed to the chart and insights tools. Parsed and validated
/// locally so malformed input never costs an LLM call.
pub(crate) struct Dataset {
    pub question: String,
    pub columns: Vec<String>,
    pub rows: Vec<Value>,
}

pub(crate) fn parse_dataset(params: &Value) -> Result<Dataset> {
    let question = params
        .get("question")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            QueryPilotError::Validation("a non-empty 'question' string is required".to_string())
        })?
        .to_string();

    let columns: Vec<String> = params
        .get("columns")
        .and_then(|v| v.as_array())
        .map(|cols| {
            cols.iter()
                .filter_map(|c| c.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();
    if columns.is_empty() {
        return Err(QueryPilotError::Validation(
            "'columns' must be a non-empty array of strings".to_string(),
        ));
    }

    let rows = params
        .get("rows")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    if rows.is_empty() {
        return Err(QueryPilotError::Validation(
            "'rows' must be a non-empty array".to_string(),
        ));
    }
    for row in &rows {
        let width = row.as_array().map(|r| r.len());
        if width != Some(columns.len()) {
            return Err(QueryPilotError::Validation(format!(
                "every row must be an array of {} values",
                columns.len()
            )));
        }
    }

    Ok(Dataset {
        question,
        columns,
        rows,
    })
}

const PREVIEW_ROWS: usize = 20;

pub(crate) fn dataset_prompt(dataset: &Dataset) -> String {
    let preview: Vec<String> = dataset
        .rows
        .iter()
        .take(PREVIEW_ROWS)
        .map(|row| row.to_string())
        .collect();
    format!(
        "Question: {}\n\nColumns: {}\n\nRows ({} total, first {} shown):\n{}",
        dataset.question,
        dataset.columns.join(", "),
        dataset.rows.len(),
        preview.len(),
        preview.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_malformed_datasets() {
        assert!(parse_dataset(&json!({})).is_err());
        assert!(parse_dataset(&json!({"question": "q", "columns": [], "rows": [[1]]})).is_err());
        assert!(parse_dataset(&json!({"question": "q", "columns": ["a"], "rows": []})).is_err());
        let ragged = json!({"question": "q", "columns": ["a", "b"], "rows": [[1]]});
        assert!(parse_dataset(&ragged).is_err());
    }

    #[test]
    fn accepts_well_formed_dataset() {
        let params = json!({
            "question": "sales by year",
            "columns": ["year", "total"],
            "rows": [[2023, 10.5], [2024, 12.0]],
        });
        let dataset = parse_dataset(&params).unwrap();
        assert_eq!(dataset.columns, vec!["year", "total"]);
        assert_eq!(dataset.rows.len(), 2);
    }
}
