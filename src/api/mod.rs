use std::{sync::Arc, time::Instant};

use axum::{
    extract::{Request, State},
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, ORIGIN, VARY,
        },
        HeaderMap, HeaderValue, Method, StatusCode,
    },
    middleware::{from_fn, from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tracing::Level;
use utoipa::OpenApi;
use uuid::Uuid;

use crate::{app_state::AppState, error::AppError};

pub mod chain_api;
pub mod response;
pub mod transfer_api;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Relay Transfer API",
        version = "0.1.0",
        description = "Native-currency distribution through a chain of single-use wallets"
    ),
    paths(
        transfer_api::transfer,
        chain_api::list_chains,
        chain_api::get_chain,
        chain_api::healthz,
    ),
    components(schemas(
        crate::service::request_validator::TransferPayload,
        crate::service::batch_reporter::BatchResponse,
        crate::service::batch_reporter::TransactionRecord,
        chain_api::ChainSummary,
        chain_api::Healthz,
    )),
    tags(
        (name = "transfer", description = "中继转账"),
        (name = "chains", description = "链目录"),
        (name = "health", description = "健康检查"),
    )
)]
pub struct ApiDoc;

/// 请求追踪ID（注入到请求扩展中）
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        // 兼容旧客户端的路径
        .route("/transfer", post(transfer_api::transfer))
        .route("/api/v1/transfer", post(transfer_api::transfer))
        .route("/api/v1/chains", get(chain_api::list_chains))
        .route("/api/v1/chains/:chain_id", get(chain_api::get_chain))
        .route("/healthz", get(chain_api::healthz))
        .merge(utoipa_swagger_ui::SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .fallback(not_found)
        // 安全与观测中间件（自上而下依次进入）
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(set_request_id))
                .layer(from_fn(trace_log))
                .layer(from_fn_with_state(state.clone(), cors)),
        )
        .with_state(state)
}

async fn not_found(req: Request) -> AppError {
    let err = AppError::not_found(format!("No route for {} {}", req.method(), req.uri().path()));
    match req.extensions().get::<RequestId>() {
        Some(RequestId(id)) => err.with_trace_id(id.clone()),
        None => err,
    }
}

/// 计算 Access-Control-Allow-Origin：
/// 配置为 "*" 时放行所有来源；否则仅回显逗号分隔白名单中的来源
fn allowed_origin(allow_origins: &str, origin: Option<&str>) -> Option<HeaderValue> {
    if allow_origins.trim() == "*" {
        return Some(HeaderValue::from_static("*"));
    }

    let origin = origin?;
    allow_origins
        .split(',')
        .any(|allowed| allowed.trim() == origin)
        .then(|| HeaderValue::from_str(origin).ok())
        .flatten()
}

fn apply_cors_headers(headers: &mut HeaderMap, allow: Option<HeaderValue>) {
    if let Some(value) = allow {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
        headers.insert(VARY, HeaderValue::from_static("Origin"));
    }
}

/// CORS：预检请求直接应答，其余请求在响应上补充 CORS 头
async fn cors(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let origin = req
        .headers()
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let allow = allowed_origin(&state.config.server.cors_allow_origin, origin.as_deref());

    if req.method() == Method::OPTIONS {
        let requested_headers = req
            .headers()
            .get("access-control-request-headers")
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("Content-Type"));

        let mut resp = StatusCode::NO_CONTENT.into_response();
        let headers = resp.headers_mut();
        apply_cors_headers(headers, allow);
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET,POST,OPTIONS"),
        );
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested_headers);
        headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("600"));
        return resp;
    }

    let mut resp = next.run(req).await;
    apply_cors_headers(resp.headers_mut(), allow);
    resp
}

async fn set_request_id(mut req: Request, next: Next) -> Response {
    let req_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    req.extensions_mut().insert(RequestId(req_id.clone()));
    if let Ok(value) = HeaderValue::from_str(&req_id) {
        req.headers_mut().insert("x-request-id", value);
    }

    let mut resp = next.run(req).await;
    resp.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&req_id).unwrap_or(HeaderValue::from_static("gen-failed")),
    );
    resp
}

async fn trace_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let req_id = req
        .headers()
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let resp = next.run(req).await;
    let status = resp.status();
    let elapsed = start.elapsed().as_millis();
    tracing::event!(Level::INFO, request_id=%req_id, method=%method, path=%path, status=%status.as_u16(), elapsed_ms=%elapsed, "http_request");
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_origin_wildcard() {
        assert_eq!(
            allowed_origin("*", Some("https://evil.example")),
            Some(HeaderValue::from_static("*"))
        );
        assert_eq!(allowed_origin("*", None), Some(HeaderValue::from_static("*")));
    }

    #[test]
    fn test_allowed_origin_list() {
        let allow = "https://app.example.com, http://localhost:8080";
        assert_eq!(
            allowed_origin(allow, Some("http://localhost:8080")),
            Some(HeaderValue::from_static("http://localhost:8080"))
        );
        assert_eq!(allowed_origin(allow, Some("https://other.example")), None);
        assert_eq!(allowed_origin(allow, None), None);
    }

    #[test]
    fn test_openapi_lists_transfer() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/transfer"));
        assert!(doc.paths.paths.contains_key("/healthz"));
    }
}
