use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use rag_qa_core::{QueryError, QueryOptions, QueryPipeline, RetrievalError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<QueryPipeline>,
}

#[derive(Debug, Deserialize)]
pub struct AskParams {
    #[serde(default)]
    q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<QueryError> for ApiError {
    fn from(error: QueryError) -> Self {
        let status = match &error {
            QueryError::Retrieval(RetrievalError::IndexNotFound { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            QueryError::Retrieval(RetrievalError::EmptyQuery)
            | QueryError::Retrieval(RetrievalError::InvalidTopK(_)) => StatusCode::BAD_REQUEST,
            QueryError::Generation(_) => StatusCode::BAD_GATEWAY,
            QueryError::Retrieval(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: error.to_string(),
        }
    }
}

pub fn app_router(pipeline: Arc<QueryPipeline>) -> Router {
    Router::new()
        .route("/ask", get(ask))
        .route("/health", get(health))
        .with_state(AppState { pipeline })
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(addr: &str, pipeline: Arc<QueryPipeline>) -> anyhow::Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid listen address {addr}"))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("rag-qa listening on http://{}", addr);
    axum::serve(listener, app_router(pipeline)).await?;
    Ok(())
}

async fn ask(
    State(state): State<AppState>,
    Query(params): Query<AskParams>,
) -> Result<Json<AskResponse>, ApiError> {
    let query = params.q.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(ApiError {
            status: StatusCode::BAD_REQUEST,
            message: "query parameter `q` is required".to_string(),
        });
    }

    let answer = state
        .pipeline
        .answer(&query, &QueryOptions::default())
        .await
        .map_err(|err| {
            error!(error = %err, "ask failed");
            ApiError::from(err)
        })?;

    Ok(Json(AskResponse {
        answer: answer.text,
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "index_present": state.pipeline.retriever().index_present(),
    }))
}
