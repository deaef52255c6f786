//! Control Commands - 控制面命令
//!
//! 锁屏、耳机线控、HTTP/WebSocket 客户端等外部控制面发出的命令

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::domain::playback::{PlaybackError, SegmentStore, StopReason};

/// 外部控制命令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    PlayPause,
    Pause,
    Resume,
    Stop,
    Next,
    Previous,
    Seek {
        index: usize,
    },
    SetRate {
        rate: f32,
    },
    SetSleepTimer {
        minutes: u32,
    },
    CancelSleepTimer,
    /// 打开作品并从指定位置开始播放
    OpenWork {
        work_id: String,
        #[serde(default)]
        chapter_index: usize,
        #[serde(default)]
        segment_index: usize,
    },
    OpenChapter {
        chapter_index: usize,
        #[serde(default)]
        segment_index: usize,
    },
    NextChapter,
    PreviousChapter,
    /// 从内容源重新获取当前章节，保持位置
    Reload,
}

impl ControlCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ControlCommand::PlayPause => "play_pause",
            ControlCommand::Pause => "pause",
            ControlCommand::Resume => "resume",
            ControlCommand::Stop => "stop",
            ControlCommand::Next => "next",
            ControlCommand::Previous => "previous",
            ControlCommand::Seek { .. } => "seek",
            ControlCommand::SetRate { .. } => "set_rate",
            ControlCommand::SetSleepTimer { .. } => "set_sleep_timer",
            ControlCommand::CancelSleepTimer => "cancel_sleep_timer",
            ControlCommand::OpenWork { .. } => "open_work",
            ControlCommand::OpenChapter { .. } => "open_chapter",
            ControlCommand::NextChapter => "next_chapter",
            ControlCommand::PreviousChapter => "previous_chapter",
            ControlCommand::Reload => "reload",
        }
    }
}

/// 引擎命令（进入单一写者任务的全部输入）
#[derive(Debug)]
pub enum EngineCommand {
    Control(ControlCommand),
    /// 直接以给定内容开始播放
    Start {
        content: SegmentStore,
        start_index: usize,
    },
    UpdateContent {
        content: SegmentStore,
        keep_position: bool,
    },
    /// 以指定原因停止（中断协调器、关闭流程）
    StopWith(StopReason),
    Shutdown,
}

pub type CommandReply = oneshot::Sender<Result<(), PlaybackError>>;

/// 命令 + 可选的结果回执
#[derive(Debug)]
pub struct EngineRequest {
    pub command: EngineCommand,
    pub reply: Option<CommandReply>,
}
