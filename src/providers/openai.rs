use async_trait::async_trait;
use serde_json::Value;

use async_openai::{
    config::OpenAIConfig,
    types::{
        chat::{
            ChatCompletionMessageToolCalls, ChatCompletionRequestAssistantMessageArgs,
            ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
            ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
            ChatCompletionTool, ChatCompletionTools, CreateChatCompletionRequestArgs,
            FunctionObject, ResponseFormat, ResponseFormatJsonSchema,
        },
        embeddings::{CreateEmbeddingRequestArgs, EmbeddingInput},
    },
    Client,
};

use crate::error::{QueryPilotError, Result};
use crate::extraction::extract_json_object;
use crate::interfaces::providers::{
    ChatMessage, ChatRequest, EmbeddingProvider, LlmProvider, LlmTurn,
};

#[derive(Clone)]
pub struct OpenAiProvider {
    model: String,
    embedding_model: String,
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    pub fn new(
        api_key: String,
        model: Option<String>,
        embedding_model: Option<String>,
        base_url: Option<String>,
    ) -> Self {
        let model = model.unwrap_or_else(|| "gpt-4o".to_string());
        let embedding_model =
            embedding_model.unwrap_or_else(|| "text-embedding-3-small".to_string());
        let base_url = base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        Self {
            model,
            embedding_model,
            client: Client::with_config(config),
        }
    }

    fn build_system_message(system_prompt: &str) -> Result<Option<ChatCompletionRequestMessage>> {
        if system_prompt.is_empty() {
            return Ok(None);
        }
        let message = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()
            .map_err(|e| QueryPilotError::Runtime(e.to_string()))?;
        Ok(Some(ChatCompletionRequestMessage::System(message)))
    }

    fn build_turn_message(turn: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
        match turn.role.as_str() {
            "assistant" => {
                let message = ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.content.clone())
                    .build()
                    .map_err(|e| QueryPilotError::Runtime(e.to_string()))?;
                Ok(ChatCompletionRequestMessage::Assistant(message))
            }
            _ => {
                let message = ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Text(
                        turn.content.clone(),
                    ))
                    .build()
                    .map_err(|e| QueryPilotError::Runtime(e.to_string()))?;
                Ok(ChatCompletionRequestMessage::User(message))
            }
        }
    }

    fn convert_tools(tools: &[Value]) -> Vec<ChatCompletionTools> {
        tools
            .iter()
            .filter_map(|tool| {
                let tool_type = tool
                    .get("type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("function");
                if tool_type != "function" {
                    return None;
                }
                let function_obj = tool.get("function").cloned().unwrap_or_else(|| tool.clone());
                let name = function_obj.get("name")?.as_str()?.to_string();
                let description = function_obj
                    .get("description")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string());
                let parameters = function_obj.get("parameters").cloned();
                let function = FunctionObject {
                    name,
                    description,
                    parameters,
                    strict: None,
                };
                Some(ChatCompletionTools::Function(ChatCompletionTool {
                    function,
                }))
            })
            .collect()
    }

    /// Decode the first choice into a tagged turn. A structured tool call wins
    /// over content; argument strings that are not valid JSON fall back to a
    /// fenced-object scan before giving up.
    fn decode_turn(
        response: &async_openai::types::chat::CreateChatCompletionResponse,
    ) -> Result<LlmTurn> {
        let choice = response
            .choices
            .first()
            .ok_or_else(|| QueryPilotError::Generation("no choices returned".to_string()))?;
        let message = &choice.message;

        if let Some(tool_calls) = &message.tool_calls {
            for call in tool_calls {
                if let ChatCompletionMessageToolCalls::Function(function_call) = call {
                    let name = function_call.function.name.clone();
                    let raw = function_call.function.arguments.as_str();
                    let arguments = match serde_json::from_str(raw) {
                        Ok(value) => value,
                        Err(_) => extract_json_object(raw).map_err(|_| {
                            QueryPilotError::Generation(format!(
                                "tool call '{name}' carried malformed JSON arguments"
                            ))
                        })?,
                    };
                    return Ok(LlmTurn::ToolCall { name, arguments });
                }
            }
        }

        Ok(LlmTurn::TextReply {
            content: message.content.clone().unwrap_or_default(),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(&self, request: ChatRequest) -> Result<LlmTurn> {
        let mut messages = Vec::new();
        if let Some(system) = Self::build_system_message(&request.system_prompt)? {
            messages.push(system);
        }
        for turn in &request.messages {
            messages.push(Self::build_turn_message(turn)?);
        }

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(self.model.clone());
        builder.messages(messages);
        builder.temperature(request.temperature);
        builder.max_completion_tokens(request.max_tokens);

        let tools = Self::convert_tools(&request.tools);
        if !tools.is_empty() {
            builder.tools(tools);
        }

        let chat_request = builder
            .build()
            .map_err(|e| QueryPilotError::Runtime(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| QueryPilotError::Http(e.to_string()))?;

        Self::decode_turn(&response)
    }

    async fn parse_structured_output(
        &self,
        prompt: &str,
        system_prompt: &str,
        json_schema: Value,
    ) -> Result<Value> {
        let mut messages = Vec::new();
        if let Some(system) = Self::build_system_message(system_prompt)? {
            messages.push(system);
        }
        messages.push(Self::build_turn_message(&ChatMessage::user(prompt))?);

        let name = json_schema
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("structured_output")
            .to_string();
        let response_format = ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                name,
                description: None,
                schema: Some(json_schema),
                strict: Some(true),
            },
        };

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(self.model.clone());
        builder.messages(messages);
        builder.response_format(response_format);

        let request = builder
            .build()
            .map_err(|e| QueryPilotError::Runtime(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| QueryPilotError::Http(e.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();
        serde_json::from_str(&content).map_err(|e| QueryPilotError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(self.embedding_model.clone())
            .input(EmbeddingInput::String(text.to_string()))
            .build()
            .map_err(|e| QueryPilotError::Runtime(e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| QueryPilotError::Http(e.to_string()))?;

        response
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| QueryPilotError::Retrieval("no embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = CreateEmbeddingRequestArgs::default()
            .model(self.embedding_model.clone())
            .input(EmbeddingInput::StringArray(texts.to_vec()))
            .build()
            .map_err(|e| QueryPilotError::Runtime(e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| QueryPilotError::Http(e.to_string()))?;

        Ok(response
            .data
            .into_iter()
            .map(|item| item.embedding)
            .collect())
    }
}
