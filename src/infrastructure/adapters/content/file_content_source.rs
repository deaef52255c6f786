//! File Content Source - 本地目录内容源
//!
//! 目录结构:
//! ```text
//! {root}/{work_id}/outline.toml
//! {root}/{work_id}/{chapter file}
//! ```
//!
//! outline.toml:
//! ```toml
//! title = "作品名"
//!
//! [[chapters]]
//! id = "c1"
//! title = "第一章"
//! file = "001.txt"
//! ```

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use super::OutlineListing;
use crate::application::ports::{ContentSourceError, ContentSourcePort};
use crate::domain::playback::{ChapterRef, WorkOutline};

const OUTLINE_FILE: &str = "outline.toml";

/// 本地文件内容源
pub struct FileContentSource {
    root: PathBuf,
}

impl FileContentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        tracing::info!(root = %root.display(), "FileContentSource initialized");
        Self { root }
    }

    /// 拼接路径，拒绝跳出根目录的片段
    fn resolve(&self, parts: &[&str]) -> Result<PathBuf, ContentSourceError> {
        let mut path = self.root.clone();
        for part in parts {
            let relative = Path::new(part);
            let safe = !part.is_empty()
                && relative
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)));
            if !safe {
                return Err(ContentSourceError::NotFound(format!(
                    "invalid path component: {}",
                    part
                )));
            }
            path.push(relative);
        }
        Ok(path)
    }

    async fn read(&self, path: &Path) -> Result<String, ContentSourceError> {
        tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ContentSourceError::NotFound(path.display().to_string())
            } else {
                ContentSourceError::IoError(e.to_string())
            }
        })
    }
}

#[async_trait]
impl ContentSourcePort for FileContentSource {
    async fn fetch_outline(&self, work_id: &str) -> Result<WorkOutline, ContentSourceError> {
        let path = self.resolve(&[work_id, OUTLINE_FILE])?;
        let raw = self.read(&path).await?;
        let listing: OutlineListing = toml::from_str(&raw)
            .map_err(|e| ContentSourceError::InvalidResponse(format!("{}: {}", path.display(), e)))?;
        Ok(listing.into_outline(work_id))
    }

    async fn fetch(&self, chapter: &ChapterRef) -> Result<String, ContentSourceError> {
        let path = self.resolve(&[&chapter.work_id, &chapter.location])?;
        tracing::debug!(path = %path.display(), "Reading chapter file");
        self.read(&path).await
    }
}
