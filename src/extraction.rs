//! Narrow parsing utilities for pulling structured content out of free-form
//! LLM text. Kept out of orchestration control flow on purpose.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{QueryPilotError, Result};

static SQL_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```sql\s*(.*?)```").expect("static regex"));

/// Best-effort SQL extraction from a text reply, used when the model answers
/// in prose instead of calling the tool. A fenced ```sql block wins; otherwise
/// scan for the first line that starts a SELECT (or WITH) statement and
/// capture through the next `;` (or end of text). Prose that merely mentions
/// SELECT, like the fixed refusal replies, must not match.
pub fn extract_sql(text: &str) -> Option<String> {
    if let Some(caps) = SQL_FENCE.captures(text) {
        let sql = caps.get(1)?.as_str().trim();
        if !sql.is_empty() {
            return Some(sql.to_string());
        }
    }

    let mut lines = Vec::new();
    let mut in_sql = false;
    for line in text.lines() {
        if !in_sql && starts_select_statement(line) {
            in_sql = true;
        }
        if in_sql {
            lines.push(line);
            if line.contains(';') {
                break;
            }
        }
    }
    if lines.is_empty() {
        return None;
    }
    let sql = lines.join("\n").trim().to_string();
    if sql.is_empty() {
        None
    } else {
        Some(sql)
    }
}

fn starts_select_statement(line: &str) -> bool {
    match line.split_whitespace().next() {
        Some(first) => {
            let first = first.to_uppercase();
            first == "SELECT" || first == "WITH"
        }
        None => false,
    }
}

/// Extract a single JSON object from text that may wrap it in a code fence or
/// surround it with prose: take the first `{` through the matching last `}`.
pub fn extract_json_object(text: &str) -> Result<Value> {
    let start = text
        .find('{')
        .ok_or_else(|| QueryPilotError::Serialization("no JSON object in text".to_string()))?;
    let end = text
        .rfind('}')
        .ok_or_else(|| QueryPilotError::Serialization("unterminated JSON object".to_string()))?;
    if end < start {
        return Err(QueryPilotError::Serialization(
            "unterminated JSON object".to_string(),
        ));
    }
    serde_json::from_str(&text[start..=end])
        .map_err(|e| QueryPilotError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_fenced_sql() {
        let text = "Here you go:\n```sql\nSELECT * FROM t;\n```\nDone.";
        assert_eq!(extract_sql(text).unwrap(), "SELECT * FROM t;");
    }

    #[test]
    fn extracts_bare_select_through_semicolon() {
        let text = "The query is:\nSELECT a,\n  b\nFROM t;\nand that is all";
        assert_eq!(extract_sql(text).unwrap(), "SELECT a,\n  b\nFROM t;");
    }

    #[test]
    fn no_sql_yields_none() {
        assert!(extract_sql("I can only answer questions about the data.").is_none());
        assert!(extract_sql("").is_none());
    }

    #[test]
    fn prose_mentioning_select_is_not_sql() {
        assert!(extract_sql("I can only execute SELECT queries.").is_none());
        assert!(extract_sql("Try a SELECT statement instead of an UPDATE.").is_none());
    }

    #[test]
    fn cte_statement_is_extracted() {
        let text = "Use a CTE:\nWITH s AS (SELECT a FROM t)\nSELECT * FROM s;";
        assert_eq!(
            extract_sql(text).unwrap(),
            "WITH s AS (SELECT a FROM t)\nSELECT * FROM s;"
        );
    }

    #[test]
    fn json_object_from_fence_and_prose() {
        let fenced = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json_object(fenced).unwrap(), json!({"a": 1}));
        let prefixed = "Sure! {\"a\": {\"b\": 2}} hope that helps";
        assert_eq!(
            extract_json_object(prefixed).unwrap(),
            json!({"a": {"b": 2}})
        );
        assert!(extract_json_object("no braces here").is_err());
        assert!(extract_json_object("} {").is_err());
    }
}
