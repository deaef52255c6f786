//! Playback Context - 播放限界上下文
//!
//! 职责:
//! - 章节片段集合（SegmentStore）与作品目录
//! - 播放状态、请求令牌、语速等值对象
//! - 对外广播的状态快照

mod entities;
mod errors;
mod snapshot;
mod value_objects;

pub use entities::{ChapterRef, PrefetchSlot, Segment, SegmentStore, WorkOutline};
pub use errors::PlaybackError;
pub use snapshot::{ErrorInfo, PlaybackSnapshot};
pub use value_objects::{PlaybackStatus, RequestToken, ResumePoint, SpeechRate, StopReason};
