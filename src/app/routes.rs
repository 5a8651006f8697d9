use crate::adapters::{OpenRouterAdapter, RemoveBgAdapter};
use crate::config::{ProviderKind, ServiceConfig};
use crate::core::orchestrator::Orchestrator;
use crate::domain::model::CutoutPayload;
use crate::domain::ports::ProviderAdapter;
use crate::utils::error::CutoutError;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

/// 各路由共用的狀態，只包含不可變的 Orchestrator
#[derive(Clone)]
pub struct AppState {
    pub generative: Arc<Orchestrator<OpenRouterAdapter>>,
    pub segmentation: Arc<Orchestrator<RemoveBgAdapter>>,
    pub default_provider: ProviderKind,
}

impl AppState {
    pub fn from_config(config: &ServiceConfig) -> Self {
        // reqwest::Client 本身無狀態，可安全共用連線池
        let client = reqwest::Client::new();
        let timeout = config.pipeline.timeout();

        Self {
            generative: Arc::new(Orchestrator::new(
                OpenRouterAdapter::with_client(config.generative.clone(), client.clone()),
                timeout,
            )),
            segmentation: Arc::new(Orchestrator::new(
                RemoveBgAdapter::with_client(config.segmentation.clone(), client),
                timeout,
            )),
            default_provider: config.pipeline.default_provider,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/removebg-gemini", post(remove_with_generative))
        .route("/api/removebg", post(remove_with_segmentation))
        .route("/api/cutout", post(remove_with_default))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn remove_with_generative(
    State(state): State<AppState>,
    payload: Result<Json<CutoutPayload>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => run_pipeline(state.generative.clone(), payload).await,
        Err(rejection) => rejection_response(rejection),
    }
}

async fn remove_with_segmentation(
    State(state): State<AppState>,
    payload: Result<Json<CutoutPayload>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => run_pipeline(state.segmentation.clone(), payload).await,
        Err(rejection) => rejection_response(rejection),
    }
}

async fn remove_with_default(
    State(state): State<AppState>,
    payload: Result<Json<CutoutPayload>, JsonRejection>,
) -> Response {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return rejection_response(rejection),
    };

    match state.default_provider {
        ProviderKind::Generative => run_pipeline(state.generative.clone(), payload).await,
        ProviderKind::Segmentation => run_pipeline(state.segmentation.clone(), payload).await,
    }
}

/// 在獨立 task 中執行，panic 也只會變成 500
async fn run_pipeline<A>(orchestrator: Arc<Orchestrator<A>>, payload: CutoutPayload) -> Response
where
    A: ProviderAdapter + 'static,
{
    let outcome =
        tokio::spawn(async move { orchestrator.remove_background(payload).await }).await;

    match outcome {
        Ok(Ok(result)) => (StatusCode::OK, Json(result)).into_response(),
        Ok(Err(err)) => error_response(&err),
        Err(join_error) => error_response(&CutoutError::internal(format!(
            "pipeline task aborted: {}",
            join_error
        ))),
    }
}

fn rejection_response(rejection: JsonRejection) -> Response {
    tracing::debug!("Rejected request body: {}", rejection.body_text());
    error_response(&CutoutError::validation("Invalid request body"))
}

pub fn error_response(err: &CutoutError) -> Response {
    let body = match err.error_code() {
        Some(code) => json!({ "error": err.public_message(), "code": code }),
        None if err.is_internal() => {
            tracing::error!("❌ Background removal failed: {}", err);
            json!({ "error": err.public_message(), "success": false })
        }
        None => json!({ "error": err.public_message() }),
    };

    (err.status_code(), Json(body)).into_response()
}
