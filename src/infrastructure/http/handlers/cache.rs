//! Offline Cache Handler

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::ApplicationError;
use crate::infrastructure::http::dto::{ApiResponse, CacheChapterRequest, Empty};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 写入离线章节（供下载子系统使用）
pub async fn cache_chapter(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CacheChapterRequest>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    let cache = state
        .offline_cache
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("offline cache is disabled".to_string()))?;

    if req.chapter.work_id.is_empty() || req.chapter.chapter_id.is_empty() {
        return Err(ApplicationError::validation("chapter requires work_id and chapter_id").into());
    }

    cache
        .put(&req.chapter, req.raw_text)
        .await
        .map_err(ApplicationError::from)?;

    tracing::info!(
        work_id = %req.chapter.work_id,
        chapter_id = %req.chapter.chapter_id,
        "Chapter stored in offline cache"
    );
    Ok(Json(ApiResponse::ok()))
}
