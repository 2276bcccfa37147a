//! # External surface
//!
//! The OpenAI-compatible routes: `POST /v1/chat/completions` (buffered or
//! SSE), `GET /v1/models`, and `GET /health`.

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::response::{IntoResponse, Json, Response};
use axum::Extension;
use bytes::Bytes;
use futures::StreamExt;
use serde::Serialize;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::warn;

use manifold_auth::{AuthMode, Principal};
use manifold_core::messages::ModelInfo;
use manifold_core::{ChatRequest, GatewayError};
use manifold_gateway::pipeline::GatewayStream;

use crate::error::ApiError;
use crate::state::AppState;
use crate::stats::RequestCounts;
use crate::wiring;

/// `GET /health` response body.
#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    uptime: u64,
    requests: RequestCounts,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let body = HealthBody {
        status: "ok",
        uptime: state.stats.uptime_secs(),
        requests: state.stats.counts(),
    };
    Json(serde_json::to_value(body).unwrap_or_default())
}

/// `GET /v1/models` — aggregates model listings across every registered
/// adapter. Adapters that fail to list are logged and skipped.
pub async fn list_models(State(state): State<AppState>) -> Json<serde_json::Value> {
    let adapters = state.gateway.registry().adapters();
    let listings = futures::future::join_all(adapters.iter().map(|adapter| async move {
        (adapter.provider_id().to_string(), adapter.list_models().await)
    }))
    .await;

    let mut data: Vec<ModelInfo> = Vec::new();
    for (provider, listing) in listings {
        match listing {
            Ok(models) => data.extend(models),
            Err(e) => warn!(provider, error = %e, "model listing failed"),
        }
    }

    Json(serde_json::json!({"object": "list", "data": data}))
}

/// `POST /v1/chat/completions`
pub async fn chat_completions(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, ApiError> {
    let request: ChatRequest = serde_json::from_value(body)
        .map_err(|e| GatewayError::invalid_request(format!("malformed request body: {e}")))?;
    request.validate()?;

    // Dropping the handler (client disconnect) cancels in-flight work.
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    if request.is_streaming() {
        let stream = open_stream(&state, &principal, &request, cancel).await?;
        Ok(sse_response(stream, guard))
    } else {
        let response = match principal.mode {
            AuthMode::Passthrough => passthrough_chat(&principal, &request).await?,
            _ => state.gateway.chat_completion(&request, 0, cancel).await?,
        };
        Ok(Json(response).into_response())
    }
}

/// Resolve the chunk stream for a streaming request.
async fn open_stream(
    state: &AppState,
    principal: &Principal,
    request: &ChatRequest,
    cancel: CancellationToken,
) -> Result<GatewayStream, GatewayError> {
    match principal.mode {
        AuthMode::Passthrough => {
            let adapter = passthrough_target(principal)?;
            let inner = adapter.chat_stream(request).await.map_err(GatewayError::from)?;
            Ok(Box::pin(inner.map(|item| item.map_err(GatewayError::from))))
        }
        _ => state.gateway.stream_chat_completion(request, cancel).await,
    }
}

/// Execute a buffered passthrough completion with the caller's own key.
async fn passthrough_chat(
    principal: &Principal,
    request: &ChatRequest,
) -> Result<manifold_core::ChatResponse, GatewayError> {
    let adapter = passthrough_target(principal)?;
    adapter.chat(request).await.map_err(GatewayError::from)
}

fn passthrough_target(
    principal: &Principal,
) -> Result<std::sync::Arc<dyn manifold_llm::ChatAdapter>, GatewayError> {
    let provider = principal.target_provider.as_deref().ok_or_else(|| {
        GatewayError::invalid_request("passthrough mode requires the X-Provider header")
    })?;
    let key = principal
        .provider_api_key
        .as_deref()
        .ok_or_else(|| GatewayError::authentication("passthrough mode requires a bearer key"))?;
    wiring::passthrough_adapter(provider, key).ok_or_else(|| {
        GatewayError::invalid_request(format!("unknown passthrough provider '{provider}'"))
    })
}

/// Wrap a chunk stream as an SSE response.
///
/// Frames are `data: <json>\n\n`; the final frame is `data: [DONE]\n\n`.
/// A mid-stream error becomes one error frame and terminates the stream —
/// already-delivered output is not revoked. The cancellation guard rides
/// inside the body stream so dropping the response aborts upstream work.
fn sse_response(stream: GatewayStream, guard: DropGuard) -> Response {
    let body = async_stream::stream! {
        let _guard = guard;
        let mut stream = std::pin::pin!(stream);
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    let json = serde_json::to_string(&chunk).unwrap_or_default();
                    yield Ok::<Bytes, std::convert::Infallible>(Bytes::from(format!("data: {json}\n\n")));
                }
                Err(e) => {
                    let json = serde_json::to_string(&e.to_envelope()).unwrap_or_default();
                    yield Ok(Bytes::from(format!("data: {json}\n\n")));
                    return;
                }
            }
        }
        yield Ok(Bytes::from("data: [DONE]\n\n"));
    };

    Response::builder()
        .header(CONTENT_TYPE, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .header(CONNECTION, "keep-alive")
        .body(Body::from_stream(body))
        .unwrap_or_else(|_| axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
