//! Content Adapter - 章节内容源实现

mod file_content_source;
mod http_content_source;

pub use file_content_source::FileContentSource;
pub use http_content_source::{HttpContentSource, HttpContentSourceConfig};

use serde::Deserialize;

use crate::domain::playback::{ChapterRef, WorkOutline};

/// 内容源返回的目录条目，序号与作品 ID 由目录位置补全
#[derive(Debug, Clone, Deserialize)]
struct ChapterListing {
    #[serde(alias = "chapter_id")]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default, alias = "file")]
    location: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OutlineListing {
    #[serde(default)]
    title: String,
    #[serde(default)]
    chapters: Vec<ChapterListing>,
}

impl OutlineListing {
    fn into_outline(self, work_id: &str) -> WorkOutline {
        let chapters = self
            .chapters
            .into_iter()
            .enumerate()
            .map(|(index, c)| ChapterRef {
                work_id: work_id.to_string(),
                location: if c.location.is_empty() {
                    c.id.clone()
                } else {
                    c.location
                },
                chapter_id: c.id,
                title: c.title,
                index,
            })
            .collect();
        WorkOutline {
            work_id: work_id.to_string(),
            title: self.title,
            chapters,
        }
    }
}
