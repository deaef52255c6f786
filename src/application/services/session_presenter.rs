//! Session Presenter - 控制面边界
//!
//! 把引擎状态镜像给外部控制面（锁屏、耳机线控、远程客户端），
//! 并把它们的命令送入引擎命令队列

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use crate::application::commands::{ControlCommand, EngineHandle};
use crate::application::error::ApplicationError;
use crate::domain::playback::{PlaybackSnapshot, PlaybackStatus};
use crate::infrastructure::events::{EngineEvent, EventPublisher};

/// 媒体会话动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaAction {
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    Seek,
    NextChapter,
    PreviousChapter,
    SetRate,
    SetSleepTimer,
    CancelSleepTimer,
}

/// 当前状态下有意义的动作
pub fn available_actions(snapshot: &PlaybackSnapshot) -> Vec<MediaAction> {
    let mut actions = Vec::new();
    match snapshot.status {
        PlaybackStatus::Playing => actions.push(MediaAction::Pause),
        PlaybackStatus::Paused => actions.push(MediaAction::Play),
        PlaybackStatus::Stopped => {
            actions.push(MediaAction::Play);
            actions.push(MediaAction::SetRate);
            return actions;
        }
    }
    actions.push(MediaAction::Stop);

    let index = snapshot.segment_index.unwrap_or(0);
    if index > 0 {
        actions.push(MediaAction::Previous);
    }
    if index + 1 < snapshot.total_segments {
        actions.push(MediaAction::Next);
    }
    actions.push(MediaAction::Seek);
    if snapshot.has_previous {
        actions.push(MediaAction::PreviousChapter);
    }
    if snapshot.has_next {
        actions.push(MediaAction::NextChapter);
    }
    actions.push(MediaAction::SetRate);
    actions.push(MediaAction::SetSleepTimer);
    if snapshot.sleep_timer_remaining.is_some() {
        actions.push(MediaAction::CancelSleepTimer);
    }
    actions
}

#[derive(Clone)]
pub struct SessionPresenter {
    engine: EngineHandle,
    publisher: Arc<EventPublisher>,
}

impl SessionPresenter {
    pub fn new(engine: EngineHandle, publisher: Arc<EventPublisher>) -> Self {
        Self { engine, publisher }
    }

    /// 执行控制命令，返回执行后的快照
    pub async fn dispatch(&self, command: ControlCommand) -> Result<PlaybackSnapshot, ApplicationError> {
        let name = command.name();
        self.engine.control(command).await.inspect_err(|e| {
            tracing::debug!(command = name, error = %e, "Control command rejected");
        })?;
        Ok(self.publisher.snapshot())
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.publisher.snapshot()
    }

    pub fn actions(&self) -> Vec<MediaAction> {
        available_actions(&self.publisher.snapshot())
    }

    pub fn watch(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.publisher.watch()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.publisher.subscribe()
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing(index: usize, total: usize) -> PlaybackSnapshot {
        PlaybackSnapshot {
            status: PlaybackStatus::Playing,
            segment_index: Some(index),
            total_segments: total,
            has_next: true,
            ..PlaybackSnapshot::default()
        }
    }

    #[test]
    fn test_actions_at_first_segment() {
        let actions = available_actions(&playing(0, 3));
        assert!(actions.contains(&MediaAction::Pause));
        assert!(actions.contains(&MediaAction::Next));
        assert!(actions.contains(&MediaAction::NextChapter));
        assert!(!actions.contains(&MediaAction::Previous));
        assert!(!actions.contains(&MediaAction::PreviousChapter));
        assert!(!actions.contains(&MediaAction::CancelSleepTimer));
    }

    #[test]
    fn test_actions_at_last_segment_with_timer() {
        let mut snapshot = playing(2, 3);
        snapshot.status = PlaybackStatus::Paused;
        snapshot.sleep_timer_remaining = Some(5);

        let actions = available_actions(&snapshot);
        assert!(actions.contains(&MediaAction::Play));
        assert!(actions.contains(&MediaAction::Previous));
        assert!(!actions.contains(&MediaAction::Next));
        assert!(actions.contains(&MediaAction::CancelSleepTimer));
    }

    #[test]
    fn test_actions_when_stopped() {
        let actions = available_actions(&PlaybackSnapshot::default());
        assert_eq!(actions, vec![MediaAction::Play, MediaAction::SetRate]);
    }
}
