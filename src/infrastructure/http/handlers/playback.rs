//! Playback Handlers

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::commands::ControlCommand;
use crate::application::services::MediaAction;
use crate::infrastructure::http::dto::{ApiResponse, PlaybackView};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 当前播放状态
pub async fn get_playback(State(state): State<Arc<AppState>>) -> Json<ApiResponse<PlaybackView>> {
    Json(ApiResponse::success(state.presenter.snapshot().into()))
}

/// 当前可用动作
pub async fn get_actions(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Vec<MediaAction>>> {
    Json(ApiResponse::success(state.presenter.actions()))
}

/// 执行控制命令，返回执行后的状态
///
/// Request: `{"command": "seek", "index": 3}`
pub async fn execute_command(
    State(state): State<Arc<AppState>>,
    Json(command): Json<ControlCommand>,
) -> Result<Json<ApiResponse<PlaybackView>>, ApiError> {
    let snapshot = state.presenter.dispatch(command).await?;
    Ok(Json(ApiResponse::success(snapshot.into())))
}
