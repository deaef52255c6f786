//! WebSocket Handler
//!
//! 连接后先推送一次当前状态，之后转发：
//! - 状态变化（watch）
//! - 离散事件（broadcast，不含 StateChanged，避免重复）
//!
//! 客户端发送的文本帧按 ControlCommand JSON 解析并执行

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::application::commands::ControlCommand;
use crate::infrastructure::events::EngineEvent;
use crate::infrastructure::http::dto::PlaybackView;
use crate::infrastructure::http::state::AppState;

/// 推送给客户端的消息
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
enum OutgoingMessage {
    State(PlaybackView),
    Event(EngineEvent),
    CommandRejected { command: String, error: String },
}

impl OutgoingMessage {
    fn to_message(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(json) => Some(Message::Text(json)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize WebSocket message");
                None
            }
        }
    }
}

/// Playback WebSocket 连接处理
pub async fn playback_websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_playback_socket(socket, state))
}

async fn handle_playback_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (out_tx, mut out_rx) = tokio::sync::mpsc::unbounded_channel::<OutgoingMessage>();

    let mut snapshot_rx = state.presenter.watch();
    let mut event_rx = state.presenter.subscribe();

    tracing::info!("Playback WebSocket connected");

    // 推送任务：状态、事件、命令拒绝
    let mut forward_task = tokio::spawn(async move {
        let initial = snapshot_rx.borrow_and_update().clone();
        if let Some(msg) = OutgoingMessage::State(initial.into()).to_message() {
            if sender.send(msg).await.is_err() {
                return;
            }
        }

        loop {
            let outgoing = tokio::select! {
                changed = snapshot_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = snapshot_rx.borrow_and_update().clone();
                    OutgoingMessage::State(snapshot.into())
                }
                event = event_rx.recv() => match event {
                    Ok(EngineEvent::StateChanged(_)) => continue,
                    Ok(event) => OutgoingMessage::Event(event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "WebSocket event stream lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                Some(reply) = out_rx.recv() => reply,
            };

            let Some(msg) = outgoing.to_message() else {
                continue;
            };
            if let Err(e) = sender.send(msg).await {
                tracing::debug!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    // 接收任务：控制命令
    let presenter = state.presenter.clone();
    let mut receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let command: ControlCommand = match serde_json::from_str(&text) {
                        Ok(command) => command,
                        Err(e) => {
                            let _ = out_tx.send(OutgoingMessage::CommandRejected {
                                command: text,
                                error: e.to_string(),
                            });
                            continue;
                        }
                    };
                    let name = command.name();
                    if let Err(e) = presenter.dispatch(command).await {
                        let _ = out_tx.send(OutgoingMessage::CommandRejected {
                            command: name.to_string(),
                            error: e.to_string(),
                        });
                    }
                }
                Ok(Message::Close(_)) => {
                    tracing::info!("Playback WebSocket closed by client");
                    break;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Playback WebSocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    // 等待任一任务完成
    tokio::select! {
        _ = &mut forward_task => receive_task.abort(),
        _ = &mut receive_task => forward_task.abort(),
    }

    tracing::info!("Playback WebSocket disconnected");
}
