//! Playback Context - Entities

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::PlaybackError;

/// 可朗读片段 - 最小合成单位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub text: String,
    /// 朗读结束后的停顿（毫秒）
    pub pause_after_ms: u32,
}

impl Segment {
    pub fn new(text: impl Into<String>, pause_after_ms: u32) -> Self {
        Self {
            text: text.into(),
            pause_after_ms,
        }
    }
}

/// 章节引用（内容源定位信息）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChapterRef {
    pub work_id: String,
    pub chapter_id: String,
    #[serde(default)]
    pub title: String,
    /// 章节在作品目录中的序号（从 0 开始）
    #[serde(default)]
    pub index: usize,
    /// 内容源内部定位（URL 路径或文件名）
    #[serde(default)]
    pub location: String,
}

/// 作品目录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOutline {
    pub work_id: String,
    pub title: String,
    pub chapters: Vec<ChapterRef>,
}

impl WorkOutline {
    pub fn total_chapters(&self) -> usize {
        self.chapters.len()
    }

    pub fn chapter(&self, index: usize) -> Result<&ChapterRef, PlaybackError> {
        self.chapters
            .get(index)
            .ok_or(PlaybackError::ChapterOutOfRange {
                index,
                total: self.chapters.len(),
            })
    }
}

/// 章节片段集合
///
/// 不变量:
/// - segments 非空
/// - 构造后不可变；导航会产生新的 SegmentStore
///
/// 片段以 `Arc<[Segment]>` 共享，克隆开销与片段数量无关
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentStore {
    work_id: String,
    work_title: String,
    chapter_id: String,
    chapter_title: String,
    segments: Arc<[Segment]>,
    chapter_index: usize,
    total_chapters: usize,
}

impl SegmentStore {
    pub fn new(
        outline: &WorkOutline,
        chapter_index: usize,
        segments: Vec<Segment>,
    ) -> Result<Self, PlaybackError> {
        let chapter = outline.chapter(chapter_index)?;
        if segments.is_empty() {
            return Err(PlaybackError::EmptyContent(chapter.chapter_id.clone()));
        }
        Ok(Self {
            work_id: outline.work_id.clone(),
            work_title: outline.title.clone(),
            chapter_id: chapter.chapter_id.clone(),
            chapter_title: chapter.title.clone(),
            segments: segments.into(),
            chapter_index,
            total_chapters: outline.total_chapters(),
        })
    }

    pub fn work_id(&self) -> &str {
        &self.work_id
    }

    pub fn work_title(&self) -> &str {
        &self.work_title
    }

    pub fn chapter_id(&self) -> &str {
        &self.chapter_id
    }

    pub fn chapter_title(&self) -> &str {
        &self.chapter_title
    }

    pub fn chapter_index(&self) -> usize {
        self.chapter_index
    }

    pub fn total_chapters(&self) -> usize {
        self.total_chapters
    }

    pub fn has_next(&self) -> bool {
        self.chapter_index + 1 < self.total_chapters
    }

    pub fn has_previous(&self) -> bool {
        self.chapter_index > 0
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// 构造保证非空，保留以满足 clippy::len_without_is_empty
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn last_index(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }

    /// 将索引限制在 `[0, len - 1]`
    pub fn clamp_index(&self, index: usize) -> usize {
        index.min(self.last_index())
    }
}

/// 预取槽：至多缓存一个"当前章节 + 1"的 SegmentStore
#[derive(Debug, Clone)]
pub struct PrefetchSlot {
    pub chapter_index: usize,
    pub content: SegmentStore,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outline(chapters: usize) -> WorkOutline {
        WorkOutline {
            work_id: "w1".to_string(),
            title: "作品".to_string(),
            chapters: (0..chapters)
                .map(|i| ChapterRef {
                    work_id: "w1".to_string(),
                    chapter_id: format!("c{}", i),
                    title: format!("第{}章", i + 1),
                    index: i,
                    location: format!("c{}.txt", i),
                })
                .collect(),
        }
    }

    #[test]
    fn test_store_rejects_empty_segments() {
        let err = SegmentStore::new(&outline(2), 0, Vec::new()).unwrap_err();
        assert_eq!(err, PlaybackError::EmptyContent("c0".to_string()));
    }

    #[test]
    fn test_store_rejects_out_of_range_chapter() {
        let err = SegmentStore::new(&outline(2), 5, vec![Segment::new("a", 0)]).unwrap_err();
        assert_eq!(err, PlaybackError::ChapterOutOfRange { index: 5, total: 2 });
    }

    #[test]
    fn test_navigation_flags_and_clamp() {
        let segments = vec![Segment::new("a", 0), Segment::new("b", 0)];
        let first = SegmentStore::new(&outline(3), 0, segments.clone()).unwrap();
        assert!(first.has_next());
        assert!(!first.has_previous());

        let last = SegmentStore::new(&outline(3), 2, segments).unwrap();
        assert!(!last.has_next());
        assert!(last.has_previous());
        assert_eq!(last.clamp_index(10), 1);
        assert_eq!(last.chapter_title(), "第3章");
    }
}
