use async_trait::async_trait;
use serde_json::Value;

use crate::domains::conversation::User;
use crate::error::Result;
use crate::interfaces::stores::UserResolver;

pub const ANONYMOUS_USER: &str = "anonymous";

/// Resolves the caller from a `user_id` metadata key, defaulting to a shared
/// anonymous identity when the key is absent or blank.
#[derive(Debug, Clone, Default)]
pub struct MetadataUserResolver;

#[async_trait]
impl UserResolver for MetadataUserResolver {
    async fn resolve(&self, metadata: &Value) -> Result<User> {
        let id = metadata
            .get("user_id")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(ANONYMOUS_USER);
        Ok(User { id: id.to_string() })
    }
}
