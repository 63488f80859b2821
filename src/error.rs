use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryPilotError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("retrieval error: {0}")]
    Retrieval(String),
    #[error("generation error: {0}")]
    Generation(String),
    #[error("execution error: {0}")]
    Execution(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, QueryPilotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_variant_prefixes() {
        let err = QueryPilotError::Retrieval("dim mismatch".to_string());
        assert!(format!("{err}").contains("retrieval error"));
        let err = QueryPilotError::NotFound("conversation".to_string());
        assert!(format!("{err}").starts_with("not found"));
    }
}
