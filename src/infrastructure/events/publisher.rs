//! Event Publisher Implementation
//!
//! 播放状态推送：
//! - 快照通过 watch 通道发布（只保留最新值，变化时才推送）
//! - 离散事件通过 broadcast 通道发布

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use crate::domain::playback::{PlaybackSnapshot, StopReason};

/// 播放事件类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum EngineEvent {
    /// 状态变化
    StateChanged(PlaybackSnapshot),
    /// 会话结束（每个会话恰好一次）
    SessionCompleted { session_id: u64, reason: StopReason },
    /// 章节加载完成并开始播放
    ChapterLoaded {
        work_id: String,
        chapter_index: usize,
        chapter_title: String,
    },
    /// 作品最后一章播放完毕
    WorkFinished { work_id: String },
    /// 可恢复错误
    Error { kind: String, message: String },
}

/// 事件发布器
pub struct EventPublisher {
    snapshot_tx: watch::Sender<PlaybackSnapshot>,
    event_tx: broadcast::Sender<EngineEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(PlaybackSnapshot::default());
        let (event_tx, _) = broadcast::channel(100);
        Self {
            snapshot_tx,
            event_tx,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 当前快照
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// 订阅快照变化
    pub fn watch(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// 订阅离散事件
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// 发布快照，与上一次相同时不推送
    ///
    /// 返回是否发生了变化
    pub fn publish_snapshot(&self, snapshot: PlaybackSnapshot) -> bool {
        let changed = self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot.clone();
                true
            }
        });
        if changed {
            self.publish(EngineEvent::StateChanged(snapshot));
        }
        changed
    }

    /// 发布会话结束事件
    pub fn publish_session_completed(&self, session_id: u64, reason: StopReason) {
        self.publish(EngineEvent::SessionCompleted { session_id, reason });
    }

    /// 发布章节加载事件
    pub fn publish_chapter_loaded(&self, work_id: &str, chapter_index: usize, chapter_title: &str) {
        self.publish(EngineEvent::ChapterLoaded {
            work_id: work_id.to_string(),
            chapter_index,
            chapter_title: chapter_title.to_string(),
        });
    }

    /// 发布作品播放完毕事件
    pub fn publish_work_finished(&self, work_id: &str) {
        self.publish(EngineEvent::WorkFinished {
            work_id: work_id.to_string(),
        });
    }

    /// 发布错误事件
    pub fn publish_error(&self, kind: &str, message: &str) {
        self.publish(EngineEvent::Error {
            kind: kind.to_string(),
            message: message.to_string(),
        });
    }

    fn publish(&self, event: EngineEvent) {
        if let Err(e) = self.event_tx.send(event) {
            tracing::trace!(error = %e, "Failed to publish event (no receivers)");
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
