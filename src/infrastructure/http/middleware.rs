//! HTTP Middleware
//!
//! HTTP 状态码错误日志中间件

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};

/// HTTP 状态码错误日志中间件
///
/// 状态码为 4xx 或 5xx 时记录日志，附带处理耗时。
/// 控制命令被拒绝时状态码仍为 200，这类错误在 `ApiError::into_response()` 中记录
pub async fn error_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            elapsed_ms,
            "HTTP server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            elapsed_ms,
            "HTTP client error"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Method, Request as HttpRequest, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use tower::util::ServiceExt;

    fn create_test_router() -> Router {
        Router::new()
            .route("/api/ping", get(|| async { "OK" }))
            .route(
                "/api/playback/commands",
                post(|Json(_): Json<serde_json::Value>| async { StatusCode::NO_CONTENT }),
            )
            .route(
                "/api/broken",
                get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
            )
            .layer(axum::middleware::from_fn(error_logging_middleware))
    }

    async fn status_of(method: Method, uri: &str, body: &'static str) -> StatusCode {
        let request = HttpRequest::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        create_test_router().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        assert_eq!(status_of(Method::GET, "/api/ping", "").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_client_errors_pass_through() {
        assert_eq!(
            status_of(Method::GET, "/api/unknown", "").await,
            StatusCode::NOT_FOUND
        );
        // 非法 JSON 由 axum 拒绝
        assert!(status_of(Method::POST, "/api/playback/commands", "{")
            .await
            .is_client_error());
    }

    #[tokio::test]
    async fn test_server_error_passes_through() {
        assert_eq!(
            status_of(Method::GET, "/api/broken", "").await,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
