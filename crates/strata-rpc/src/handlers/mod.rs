//! JSON-RPC request handlers, split by domain.

mod catalog;
mod sessions;
mod shared;

use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error};

// ============================================================================
// JSON-RPC types
// ============================================================================

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
            id,
        }
    }
}

/// JSON-RPC method-not-found code.
const METHOD_NOT_FOUND: i32 = -32601;

// ============================================================================
// Endpoints
// ============================================================================

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Main JSON-RPC handler.
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let method = request.method.as_str();
    let params = request.params.unwrap_or(Value::Object(Default::default()));
    let id = request.id;

    debug!("RPC call: {}({:?})", method, params);

    let response = match dispatch_method(&state, method, &params).await {
        Some(Ok(value)) => JsonRpcResponse::success(id, value),
        Some(Err(e)) => {
            error!("RPC error for {}: {}", method, e);
            JsonRpcResponse::error(id, e.to_rpc_error_code(), e.to_string())
        }
        None => JsonRpcResponse::error(
            id,
            METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
        ),
    };
    (StatusCode::OK, Json(response))
}

// ============================================================================
// Method dispatcher
// ============================================================================

/// Dispatch a method call. `None` when the method does not exist.
async fn dispatch_method(
    state: &AppState,
    method: &str,
    params: &Value,
) -> Option<strata_core::Result<Value>> {
    let result = match method {
        // Status
        "health_check" => Ok(json!({"status": "ok"})),

        // Stateless catalog queries
        "list_toolkits" => catalog::list_toolkits(state, params).await,
        "get_category_meta" => catalog::get_category_meta(state, params).await,
        "list_categories" => catalog::list_categories(state).await,
        "list_subcategory_options" => catalog::list_subcategory_options(state, params).await,
        "resolve_image" => catalog::resolve_image(state, params),

        // Cache maintenance
        "cache_stats" => catalog::cache_stats(state),
        "clear_cache" => catalog::clear_cache(state),

        // Sessions
        "open_session" => sessions::open_session(state, params).await,
        "update_session" => sessions::update_session(state, params).await,
        "session_view" => sessions::session_view(state, params).await,
        "refetch_session" => sessions::refetch_session(state, params).await,
        "close_session" => sessions::close_session(state, params).await,

        _ => return None,
    };
    Some(result)
}
