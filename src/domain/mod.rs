//! Domain Layer - 领域层
//!
//! 包含:
//! - Playback Context: 分段朗读播放
//! - 文本分割器: 章节原文 → 可朗读片段

pub mod playback;

mod text_segmenter;

pub use text_segmenter::{parse_segments, strip_markup, SegmentConfig, DEFAULT_MIN_CHARS};
