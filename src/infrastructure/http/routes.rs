//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping                 GET   健康检查
//! - /api/playback             GET   当前播放状态与可用动作
//! - /api/playback/commands    POST  执行控制命令
//! - /api/playback/actions     GET   当前可用动作
//! - /api/signals              POST  注入宿主平台中断信号
//! - /api/cache/chapters       POST  写入离线章节缓存
//! - /ws/playback              WS    状态与事件推送，接收控制命令

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api", api_routes())
        .route("/ws/playback", get(handlers::playback_websocket_handler))
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/playback", playback_routes())
        .route("/signals", post(handlers::inject_signal))
        .route("/cache/chapters", post(handlers::cache_chapter))
}

/// Playback 路由
fn playback_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::get_playback))
        .route("/commands", post(handlers::execute_command))
        .route("/actions", get(handlers::get_actions))
}
