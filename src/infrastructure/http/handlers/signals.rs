//! Interruption Signal Handler

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::ports::InterruptionSignal;
use crate::infrastructure::http::dto::{ApiResponse, Empty};
use crate::infrastructure::http::state::AppState;

/// 宿主平台桥接层转发的中断信号
///
/// Request: `{"signal": "telephony", "state": "ringing"}`
pub async fn inject_signal(
    State(state): State<Arc<AppState>>,
    Json(signal): Json<InterruptionSignal>,
) -> Json<ApiResponse<Empty>> {
    state.signals.dispatch(signal);
    Json(ApiResponse::ok())
}
