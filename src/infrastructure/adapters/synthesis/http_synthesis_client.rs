//! HTTP Synthesis Client - 调用外部语音合成服务
//!
//! 实现 SynthesisPort，通过 HTTP 驱动外部朗读服务
//!
//! 外部 API:
//! POST {base_url}/api/speak  {"token": 1, "text": "...", "pauseAfterMs": 350, "rate": 1.0}
//!   朗读结束后返回 200
//! POST {base_url}/api/stop
//! POST {base_url}/api/rate   {"rate": 1.0}

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tokio::task::AbortHandle;

use crate::application::ports::{
    CompletionSender, SpeakRequest, SynthesisCompletion, SynthesisError, SynthesisOutcome,
    SynthesisPort,
};
use crate::domain::playback::{RequestToken, SpeechRate};

/// 朗读请求体 (JSON)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeakHttpRequest {
    token: u64,
    text: String,
    pause_after_ms: u32,
    rate: f32,
}

#[derive(Debug, Serialize)]
struct RateHttpRequest {
    rate: f32,
}

/// HTTP 合成客户端配置
#[derive(Debug, Clone)]
pub struct HttpSynthesisClientConfig {
    /// 合成服务基础 URL
    pub base_url: String,
    /// 单个片段的超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpSynthesisClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 60,
        }
    }
}

impl HttpSynthesisClientConfig {
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

struct InFlight {
    token: RequestToken,
    task: AbortHandle,
}

/// HTTP 合成客户端
///
/// `speak` 在后台任务中发出请求，响应返回即视为朗读完成
pub struct HttpSynthesisClient {
    client: Client,
    config: Arc<HttpSynthesisClientConfig>,
    completions: CompletionSender,
    current: Mutex<Option<InFlight>>,
}

impl HttpSynthesisClient {
    pub fn new(
        config: HttpSynthesisClientConfig,
        completions: CompletionSender,
    ) -> Result<Self, SynthesisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SynthesisError::NetworkError(e.to_string()))?;

        tracing::info!(base_url = %config.base_url, "HttpSynthesisClient initialized");
        Ok(Self {
            client,
            config: Arc::new(config),
            completions,
            current: Mutex::new(None),
        })
    }

    fn url(config: &HttpSynthesisClientConfig, path: &str) -> String {
        format!("{}{}", config.base_url.trim_end_matches('/'), path)
    }

    async fn post_speak(
        client: &Client,
        config: &HttpSynthesisClientConfig,
        body: &SpeakHttpRequest,
    ) -> Result<(), SynthesisError> {
        let response = client
            .post(Self::url(config, "/api/speak"))
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SynthesisError::ServiceError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }
        Ok(())
    }

    /// 发出不关心结果的控制请求
    fn fire(&self, path: &'static str, rate: Option<f32>) {
        let client = self.client.clone();
        let url = Self::url(&self.config, path);
        tokio::spawn(async move {
            let request = client.post(&url);
            let request = match rate {
                Some(rate) => request.json(&RateHttpRequest { rate }),
                None => request,
            };
            if let Err(e) = request.send().await {
                tracing::debug!(url = %url, error = %e, "Synthesis control request failed");
            }
        });
    }

    fn take_current(&self) -> Option<InFlight> {
        self.current.lock().ok().and_then(|mut c| c.take())
    }
}

fn map_reqwest_error(e: reqwest::Error) -> SynthesisError {
    if e.is_timeout() {
        SynthesisError::Timeout
    } else if e.is_connect() {
        SynthesisError::NetworkError(format!("Cannot connect to synthesis service: {}", e))
    } else {
        SynthesisError::NetworkError(e.to_string())
    }
}

impl SynthesisPort for HttpSynthesisClient {
    fn speak(&self, request: SpeakRequest) {
        if let Some(previous) = self.take_current() {
            previous.task.abort();
        }

        let token = request.token;
        let body = SpeakHttpRequest {
            token: token.value(),
            text: request.text,
            pause_after_ms: request.pause_after_ms,
            rate: request.rate.value(),
        };
        let client = self.client.clone();
        let config = Arc::clone(&self.config);
        let completions = self.completions.clone();

        tracing::debug!(
            token = %token,
            text_len = body.text.len(),
            "Sending speak request"
        );

        let task = tokio::spawn(async move {
            let outcome = match Self::post_speak(&client, &config, &body).await {
                Ok(()) => SynthesisOutcome::Completed,
                Err(e) => {
                    tracing::warn!(token = %token, code = e.code(), error = %e, "Speak request failed");
                    SynthesisOutcome::Failed(e.code())
                }
            };
            let _ = completions.send(SynthesisCompletion { token, outcome });
        });

        if let Ok(mut current) = self.current.lock() {
            *current = Some(InFlight {
                token,
                task: task.abort_handle(),
            });
        }
    }

    fn stop(&self) {
        if let Some(InFlight { token, task }) = self.take_current() {
            if !task.is_finished() {
                task.abort();
                let _ = self.completions.send(SynthesisCompletion {
                    token,
                    outcome: SynthesisOutcome::Interrupted,
                });
            }
        }
        self.fire("/api/stop", None);
    }

    fn set_rate(&self, rate: SpeechRate) {
        self.fire("/api/rate", Some(rate.value()));
    }
}
