//! HTTP surface over the client facade.

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::QueryPilot;
use crate::error::{QueryPilotError, Result};

#[derive(Clone)]
pub struct AppState {
    pub pilot: Arc<QueryPilot>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
    conversation_id: Option<String>,
    #[serde(default)]
    chart: bool,
    #[serde(default)]
    insights: bool,
}

#[derive(Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/query", post(query))
        .route("/api/tables", get(tables))
        .route("/api/schema/:table", get(schema))
        .route("/api/conversations", get(list_conversations))
        .route(
            "/api/conversations/:id",
            get(get_conversation).delete(delete_conversation),
        )
        .with_state(state)
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "querypilot",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn resolve_user(state: &AppState, headers: &HeaderMap) -> String {
    let metadata = match headers.get("x-user-id").and_then(|v| v.to_str().ok()) {
        Some(id) => json!({ "user_id": id }),
        None => json!({}),
    };
    match state.pilot.resolve_user(&metadata).await {
        Ok(user) => user.id,
        Err(_) => "anonymous".to_string(),
    }
}

async fn query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<QueryRequest>,
) -> impl IntoResponse {
    let user_id = resolve_user(&state, &headers).await;
    let mut response = state.pilot.ask(&payload.question, Some(&user_id)).await;

    if payload.chart {
        if let Some(results) = &response.results {
            match state.pilot.generate_chart(&payload.question, results).await {
                Ok(chart) => response.chart = Some(chart),
                Err(e) => tracing::warn!(error = %e, "chart generation failed"),
            }
        }
    }
    if payload.insights {
        if let Some(results) = &response.results {
            match state
                .pilot
                .generate_insights(&payload.question, results)
                .await
            {
                Ok(insights) => response.insights = Some(insights),
                Err(e) => tracing::warn!(error = %e, "insights generation failed"),
            }
        }
    }

    // Best-effort conversation log; the answer is already in hand.
    if let Some(conversation_id) = &payload.conversation_id {
        let reply = response
            .explanation
            .clone()
            .or_else(|| response.sql.clone())
            .or_else(|| response.error.clone())
            .unwrap_or_default();
        let save = async {
            state
                .pilot
                .save_message(conversation_id, &user_id, "user", &payload.question, json!({}))
                .await?;
            state
                .pilot
                .save_message(
                    conversation_id,
                    &user_id,
                    "assistant",
                    &reply,
                    json!({ "sql": response.sql }),
                )
                .await
        };
        if let Err(e) = save.await {
            tracing::warn!(error = %e, "conversation logging failed");
        }
    }

    (StatusCode::OK, Json(response)).into_response()
}

async fn tables(State(state): State<AppState>) -> impl IntoResponse {
    match state.pilot.list_tables().await {
        Ok(tables) => (StatusCode::OK, Json(json!({ "tables": tables }))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn schema(State(state): State<AppState>, Path(table): Path<String>) -> impl IntoResponse {
    match state.pilot.describe_table(&table).await {
        Ok(columns) => (
            StatusCode::OK,
            Json(json!({ "table": table, "columns": columns })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn list_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let user_id = resolve_user(&state, &headers).await;
    let limit = query.limit.unwrap_or(20);
    match state.pilot.list_conversations(&user_id, limit).await {
        Ok(conversations) => (
            StatusCode::OK,
            Json(json!({ "conversations": conversations })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let user_id = resolve_user(&state, &headers).await;
    match state.pilot.get_conversation(&id, &user_id).await {
        Ok(Some(conversation)) => (StatusCode::OK, Json(conversation)).into_response(),
        Ok(None) => error_response(QueryPilotError::NotFound(format!("conversation {id}"))),
        Err(e) => error_response(e),
    }
}

async fn delete_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let user_id = resolve_user(&state, &headers).await;
    match state.pilot.delete_conversation(&id, &user_id).await {
        Ok(true) => (StatusCode::OK, Json(json!({ "deleted": true }))).into_response(),
        Ok(false) => error_response(QueryPilotError::NotFound(format!("conversation {id}"))),
        Err(e) => error_response(e),
    }
}

fn error_response(error: QueryPilotError) -> Response {
    let status = match &error {
        QueryPilotError::NotFound(_) => StatusCode::NOT_FOUND,
        QueryPilotError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

pub async fn run(host: &str, port: u16, pilot: Arc<QueryPilot>) -> Result<()> {
    run_with_shutdown(host, port, pilot, futures::future::pending::<()>()).await
}

pub async fn run_with_shutdown<F>(
    host: &str,
    port: u16,
    pilot: Arc<QueryPilot>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(AppState { pilot });
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| QueryPilotError::Runtime(e.to_string()))?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| QueryPilotError::Runtime(e.to_string()))?;
    Ok(())
}
