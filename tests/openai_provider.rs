use httpmock::Method::POST;
use httpmock::MockServer;
use serde_json::json;

use querypilot::interfaces::providers::{
    ChatMessage, ChatRequest, EmbeddingProvider, LlmProvider, LlmTurn,
};
use querypilot::providers::openai::OpenAiProvider;

fn provider(server: &MockServer) -> OpenAiProvider {
    OpenAiProvider::new(
        "key".to_string(),
        Some("gpt-4o-mini".to_string()),
        Some("text-embedding-3-small".to_string()),
        Some(server.base_url()),
    )
}

fn chat_request() -> ChatRequest {
    ChatRequest {
        system_prompt: "sys".to_string(),
        messages: vec![ChatMessage::user("Generate SQL for: total sales")],
        tools: vec![json!({
            "type": "function",
            "function": {"name": "run_sql", "description": "run", "parameters": {"type": "object"}}
        })],
        temperature: 0.3,
        max_tokens: 2048,
    }
}

#[tokio::test]
async fn chat_decodes_tool_calls() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "created": 1,
                "model": "gpt-4o-mini",
                "choices": [{
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "type": "function",
                            "id": "call_1",
                            "function": {
                                "name": "run_sql",
                                "arguments": "{\"sql\":\"SELECT 1\"}"
                            }
                        }]
                    },
                    "finish_reason": "tool_calls"
                }]
            }));
        })
        .await;

    let turn = provider(&server).chat(chat_request()).await.unwrap();
    match turn {
        LlmTurn::ToolCall { name, arguments } => {
            assert_eq!(name, "run_sql");
            assert_eq!(arguments, json!({"sql": "SELECT 1"}));
        }
        other => panic!("expected tool call, got {other:?}"),
    }
    mock.assert_hits(1);
}

#[tokio::test]
async fn chat_decodes_text_replies() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({
                "id": "chatcmpl-2",
                "object": "chat.completion",
                "created": 1,
                "model": "gpt-4o-mini",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "I can only execute SELECT queries."},
                    "finish_reason": "stop"
                }]
            }));
        })
        .await;

    let turn = provider(&server).chat(chat_request()).await.unwrap();
    match turn {
        LlmTurn::TextReply { content } => {
            assert_eq!(content, "I can only execute SELECT queries.")
        }
        other => panic!("expected text reply, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_tool_arguments_are_a_generation_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({
                "id": "chatcmpl-3",
                "object": "chat.completion",
                "created": 1,
                "model": "gpt-4o-mini",
                "choices": [{
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "type": "function",
                            "id": "call_1",
                            "function": {"name": "run_sql", "arguments": "not json at all"}
                        }]
                    },
                    "finish_reason": "tool_calls"
                }]
            }));
        })
        .await;

    let err = provider(&server).chat(chat_request()).await.unwrap_err();
    assert!(err.to_string().contains("malformed JSON arguments"));
}

#[tokio::test]
async fn embeddings_round_trip() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/embeddings");
            then.status(200).json_body(json!({
                "object": "list",
                "model": "text-embedding-3-small",
                "data": [
                    {"object": "embedding", "index": 0, "embedding": [0.1, 0.2, 0.3]}
                ],
                "usage": {"prompt_tokens": 3, "total_tokens": 3}
            }));
        })
        .await;

    let embedding = provider(&server).embed("total sales").await.unwrap();
    assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
    mock.assert_hits(1);
}

#[tokio::test]
async fn transport_failures_surface_as_http_errors() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(500).json_body(json!({"error": {"message": "boom"}}));
        })
        .await;

    let err = provider(&server).chat(chat_request()).await.unwrap_err();
    assert!(err.to_string().starts_with("http error"));
}
