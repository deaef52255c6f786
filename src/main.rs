//! Tingshu - 分段朗读播放服务
//!
//! 组装根：配置 → 适配器 → EngineWorker → InterruptionCoordinator → HTTP 控制面

use std::sync::Arc;

use tingshu::application::commands::{EngineCommand, EngineHandle};
use tingshu::application::ports::{
    completion_channel, ContentSourcePort, OfflineCachePort, SynthesisPort,
};
use tingshu::application::services::{InterruptionCoordinator, LoaderSettings};
use tingshu::application::{PlaybackEngine, SessionPresenter};
use tingshu::config::{load_config, print_config, AppConfig, ContentBackend, SynthesisBackend};
use tingshu::domain::playback::SpeechRate;
use tingshu::infrastructure::adapters::{
    AudioFocusArbiter, FileContentSource, HttpContentSource, HttpContentSourceConfig,
    HttpSynthesisClient, HttpSynthesisClientConfig, PlatformSignals, SimulatedSynthesizer,
    SimulatedSynthesizerConfig, WakeLock,
};
use tingshu::infrastructure::events::EventPublisher;
use tingshu::infrastructure::http::{AppState, HttpServer, ServerConfig};
use tingshu::infrastructure::memory::MemoryChapterCache;
use tingshu::infrastructure::persistence::sled::{SledCacheConfig, SledOfflineCache};
use tingshu::infrastructure::worker::{EngineWorker, EngineWorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!(
        "{},tingshu={},tower_http=debug",
        config.log.level, config.log.level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    tracing::info!("Tingshu - 分段朗读播放服务");
    print_config(&config);

    let publisher = EventPublisher::new().arc();
    let (completions, completion_rx) = completion_channel();

    // 语音合成后端
    let synthesis: Arc<dyn SynthesisPort> = match config.synthesis.backend {
        SynthesisBackend::Simulated => Arc::new(SimulatedSynthesizer::new(
            SimulatedSynthesizerConfig {
                ms_per_char: config.synthesis.ms_per_char,
                default_rate: config.synthesis.default_rate,
            },
            completions,
        )),
        SynthesisBackend::Http => Arc::new(HttpSynthesisClient::new(
            HttpSynthesisClientConfig::new(&config.synthesis.url)
                .with_timeout(config.synthesis.timeout_secs),
            completions,
        )?),
    };

    // 音频独占资源与平台信号
    let focus = Arc::new(AudioFocusArbiter::new());
    let signals = PlatformSignals::new(focus.clone());

    let source = create_content_source(&config)?;
    let offline_cache = create_offline_cache(&config).await?;

    // 播放引擎与 Worker
    let engine = PlaybackEngine::new(
        synthesis,
        focus,
        Arc::new(WakeLock::new()),
        publisher.clone(),
        SpeechRate::new(config.synthesis.default_rate)?,
    );
    let (handle, commands) = EngineHandle::channel(config.playback.command_buffer);
    let worker = EngineWorker::new(
        engine,
        commands,
        completion_rx,
        source,
        offline_cache.clone(),
        publisher.clone(),
        EngineWorkerConfig {
            auto_advance: config.playback.auto_advance,
            loader: LoaderSettings {
                segment: (&config.segment).into(),
                prefetch: config.playback.prefetch,
            },
        },
    );
    let worker_task = tokio::spawn(worker.run());

    // 中断协调器
    let coordinator = InterruptionCoordinator::spawn(
        handle.clone(),
        publisher.watch(),
        &signals.sources(),
        config.playback.resume_settle(),
    );

    // 创建 HTTP 服务器
    let server_config = ServerConfig::new(&config.server.host, config.server.port);
    let state = AppState::new(
        SessionPresenter::new(handle.clone(), publisher),
        signals,
        offline_cache,
    );
    let server = HttpServer::new(server_config, state);

    tracing::info!("Starting HTTP server...");

    // 启动服务器（带优雅关闭）
    server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
            tracing::info!("Received shutdown signal");
        })
        .await?;

    coordinator.shutdown().await;
    if let Err(e) = handle.execute(EngineCommand::Shutdown).await {
        tracing::warn!(error = %e, "Engine already stopped");
    }
    worker_task.await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

fn create_content_source(config: &AppConfig) -> anyhow::Result<Arc<dyn ContentSourcePort>> {
    let source: Arc<dyn ContentSourcePort> = match config.content.backend {
        ContentBackend::Http => Arc::new(HttpContentSource::new(
            HttpContentSourceConfig::new(&config.content.url)
                .with_timeout(config.content.timeout_secs),
        )?),
        ContentBackend::File => Arc::new(FileContentSource::new(&config.content.dir)),
    };
    Ok(source)
}

/// 持久缓存之前叠加内存缓存；未启用时返回 None
async fn create_offline_cache(
    config: &AppConfig,
) -> anyhow::Result<Option<Arc<dyn OfflineCachePort>>> {
    if !config.cache.enabled {
        return Ok(None);
    }

    // 确保数据目录存在
    if let Some(parent) = std::path::Path::new(&config.cache.db_path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let sled_cache = SledOfflineCache::new(&SledCacheConfig {
        db_path: config.cache.db_path.clone(),
        max_size_bytes: config.cache.max_size_bytes(),
    })?;
    let cache: Arc<dyn OfflineCachePort> =
        MemoryChapterCache::layered(config.cache.memory_capacity, sled_cache.arc()).arc();
    Ok(Some(cache))
}
