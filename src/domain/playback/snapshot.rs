//! Playback Context - 状态快照
//!
//! 对外广播的只读视图，每次状态变化时推送

use serde::{Deserialize, Serialize};

use super::{PlaybackStatus, SegmentStore};

/// 最近一次错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
}

/// 播放状态快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub status: PlaybackStatus,
    /// 会话序号，每次 start 递增
    pub session_id: u64,
    pub work_id: Option<String>,
    pub work_title: Option<String>,
    pub chapter_title: Option<String>,
    /// 未加载内容时为 None
    pub segment_index: Option<usize>,
    pub total_segments: usize,
    pub chapter_index: Option<usize>,
    pub total_chapters: usize,
    pub has_next: bool,
    pub has_previous: bool,
    pub rate: f32,
    /// 睡眠定时器剩余分钟数
    pub sleep_timer_remaining: Option<u32>,
    pub last_error: Option<ErrorInfo>,
    /// 进入 PLAYING 的累计次数，进程内观察者据此识别中间的恢复
    #[serde(skip)]
    pub play_epoch: u64,
}

impl PlaybackSnapshot {
    pub(crate) fn describe(
        status: PlaybackStatus,
        session_id: u64,
        content: Option<(&SegmentStore, usize)>,
        rate: f32,
        sleep_timer_remaining: Option<u32>,
        last_error: Option<ErrorInfo>,
    ) -> Self {
        let mut snapshot = Self {
            status,
            session_id,
            rate,
            sleep_timer_remaining,
            last_error,
            ..Self::default()
        };
        if let Some((store, index)) = content {
            snapshot.work_id = Some(store.work_id().to_string());
            snapshot.work_title = Some(store.work_title().to_string());
            snapshot.chapter_title = Some(store.chapter_title().to_string());
            snapshot.segment_index = Some(index);
            snapshot.total_segments = store.len();
            snapshot.chapter_index = Some(store.chapter_index());
            snapshot.total_chapters = store.total_chapters();
            snapshot.has_next = store.has_next();
            snapshot.has_previous = store.has_previous();
        }
        snapshot
    }
}
