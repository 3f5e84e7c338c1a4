//! 路由定义

use axum::{
    Extension, Json, Router,
    http::{Method, Uri},
    middleware,
    routing::{any, get},
};
use httptables_shared::observability::middleware::{http_tracing, request_id, RequestId};
use serde_json::{json, Value};

use crate::middleware::{attach_rules, policy_filter};
use crate::state::AppState;

/// 构建网关路由
///
/// `/health` 不经过策略过滤，其余路径先过滤再交给回显处理器。
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", any(echo))
        .route("/{*path}", any(echo))
        .route_layer(middleware::from_fn_with_state(state.clone(), policy_filter))
        .route_layer(middleware::from_fn_with_state(state, attach_rules))
        .route("/health", get(health))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(http_tracing))
}

async fn health() -> &'static str {
    "OK"
}

/// 回显通过过滤的请求
async fn echo(method: Method, uri: Uri, Extension(id): Extension<RequestId>) -> Json<Value> {
    Json(json!({
        "accepted": true,
        "method": method.as_str(),
        "url": uri.to_string(),
        "request_id": id.as_str(),
    }))
}
