//! HTTP Content Source - 远程章节内容源
//!
//! 外部 API:
//! GET {base_url}/api/works/{work_id}
//!   Response: {"title": "...", "chapters": [{"id": "c1", "title": "...", "location": "..."}]}
//! GET {base_url}/api/works/{work_id}/chapters/{location}
//!   Response: 章节原文（text/plain 或 text/html）
//!
//! `location` 为绝对 URL 时直接请求

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::OutlineListing;
use crate::application::ports::{ContentSourceError, ContentSourcePort};
use crate::domain::playback::{ChapterRef, WorkOutline};

/// HTTP 内容源配置
#[derive(Debug, Clone)]
pub struct HttpContentSourceConfig {
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpContentSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8100".to_string(),
            timeout_secs: 15,
        }
    }
}

impl HttpContentSourceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// HTTP 内容源
pub struct HttpContentSource {
    client: Client,
    config: HttpContentSourceConfig,
}

impl HttpContentSource {
    pub fn new(config: HttpContentSourceConfig) -> Result<Self, ContentSourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ContentSourceError::NetworkError(e.to_string()))?;

        tracing::info!(base_url = %config.base_url, "HttpContentSource initialized");
        Ok(Self { client, config })
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn outline_url(&self, work_id: &str) -> String {
        format!("{}/api/works/{}", self.base(), work_id)
    }

    fn chapter_url(&self, chapter: &ChapterRef) -> String {
        let location = &chapter.location;
        if location.starts_with("http://") || location.starts_with("https://") {
            return location.clone();
        }
        format!(
            "{}/api/works/{}/chapters/{}",
            self.base(),
            chapter.work_id,
            location.trim_start_matches('/')
        )
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, ContentSourceError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ContentSourceError::Timeout
            } else if e.is_connect() {
                ContentSourceError::NetworkError(format!("Cannot connect to content service: {}", e))
            } else {
                ContentSourceError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ContentSourceError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ContentSourceError::InvalidResponse(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl ContentSourcePort for HttpContentSource {
    async fn fetch_outline(&self, work_id: &str) -> Result<WorkOutline, ContentSourceError> {
        let url = self.outline_url(work_id);
        tracing::debug!(url = %url, "Fetching work outline");

        let listing: OutlineListing = self
            .get(&url)
            .await?
            .json()
            .await
            .map_err(|e| ContentSourceError::InvalidResponse(e.to_string()))?;
        Ok(listing.into_outline(work_id))
    }

    async fn fetch(&self, chapter: &ChapterRef) -> Result<String, ContentSourceError> {
        let url = self.chapter_url(chapter);
        tracing::debug!(url = %url, chapter_index = chapter.index, "Fetching chapter");

        self.get(&url)
            .await?
            .text()
            .await
            .map_err(|e| ContentSourceError::InvalidResponse(format!("Failed to read chapter: {}", e)))
    }
}
