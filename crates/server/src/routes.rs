use axum::{
    extract::Path,
    middleware,
    routing::get,
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use common::types::{DefaultValue, Health};
use service::defaults::DefaultsMap;

use crate::interceptor::{self, DefaultsState, RequestDefaults};

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// Full active defaults snapshot. Empty object if the scope was never
/// populated (cannot happen behind the interceptor, but the accessor
/// contract holds regardless).
async fn list_defaults(defaults: RequestDefaults) -> Json<DefaultsMap> {
    Json(defaults.snapshot().cloned().unwrap_or_default())
}

/// Single default lookup; a missing key yields an empty-string value,
/// never an error status.
async fn get_default(Path(key): Path<String>, defaults: RequestDefaults) -> Json<DefaultValue> {
    let value = defaults.get(&key);
    Json(DefaultValue { key, value })
}

/// Build the full application router. The defaults interceptor wraps
/// only the `/api` routes; `/health` stays outside it.
pub fn build_router(state: DefaultsState, cors: CorsLayer) -> Router {
    let public = Router::new().route("/health", get(health));

    let api = Router::new()
        .route("/api/defaults", get(list_defaults))
        .route("/api/defaults/:key", get(get_default))
        .route_layer(middleware::from_fn_with_state(
            state,
            interceptor::load_defaults,
        ));

    public
        .merge(api)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                // 每次请求创建 span，包含方法和路径等，日志级别为 INFO
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                // 响应返回时打点，包含状态码与耗时
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
