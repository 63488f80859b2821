use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{QueryPilotError, Result};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub embedding_model: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasourceConfig {
    pub path: Option<String>,
    pub row_limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemoryConfig {
    pub path: Option<String>,
    pub similarity_threshold: Option<f32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub openai: Option<OpenAiConfig>,
    pub datasource: Option<DatasourceConfig>,
    pub memory: Option<MemoryConfig>,
    pub server: Option<ServerConfig>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| QueryPilotError::Config(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| QueryPilotError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Fill the api key from the environment when the file leaves it out.
    pub fn resolve_env(mut self) -> Self {
        let openai = self.openai.get_or_insert_with(|| OpenAiConfig {
            api_key: None,
            model: None,
            embedding_model: None,
            base_url: None,
        });
        if openai.api_key.is_none() {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                if !key.is_empty() {
                    openai.api_key = Some(key);
                }
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_minimal_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "openai": {{ "api_key": "sk-test" }},
                "datasource": {{ "path": "data/analytics.db", "row_limit": 50 }}
            }}"#
        )
        .unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.openai.unwrap().api_key.unwrap(), "sk-test");
        assert_eq!(config.datasource.unwrap().row_limit, Some(50));
        assert!(config.memory.is_none());
    }

    #[test]
    fn rejects_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(QueryPilotError::Config(_))
        ));
    }
}
