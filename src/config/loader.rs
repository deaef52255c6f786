//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, ContentBackend, SynthesisBackend};
use crate::domain::playback::SpeechRate;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `TINGSHU_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `TINGSHU_SERVER__PORT=8080`
/// - `TINGSHU_CONTENT__BACKEND=file`
/// - `TINGSHU_SYNTHESIS__URL=http://tts-server:8000`
/// - `TINGSHU_PLAYBACK__RESUME_SETTLE_MS=800`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5070)?
        .set_default("content.backend", "http")?
        .set_default("content.url", "http://localhost:8100")?
        .set_default("content.dir", "data/works")?
        .set_default("content.timeout_secs", 15)?
        .set_default("synthesis.backend", "simulated")?
        .set_default("synthesis.url", "http://localhost:8000")?
        .set_default("synthesis.timeout_secs", 60)?
        .set_default("synthesis.default_rate", 1.0)?
        .set_default("synthesis.ms_per_char", 180)?
        .set_default("cache.enabled", true)?
        .set_default("cache.db_path", "data/chapters.sled")?
        .set_default("cache.max_size_mb", 256)?
        .set_default("cache.memory_capacity", 8)?
        .set_default("playback.resume_settle_ms", 500)?
        .set_default("playback.auto_advance", true)?
        .set_default("playback.prefetch", true)?
        .set_default("playback.command_buffer", 64)?
        .set_default("log.level", "info")?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        // 搜索默认配置文件
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 注意: 环境变量名会被转换为小写
    builder = builder.add_source(
        Environment::with_prefix("TINGSHU")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    // 4. 构建配置
    let config = builder.build()?;

    // 5. 反序列化为 AppConfig
    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    // 6. 验证配置
    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    match config.content.backend {
        ContentBackend::Http if config.content.url.is_empty() => {
            return Err(ConfigError::ValidationError(
                "Content URL cannot be empty for the http backend".to_string(),
            ));
        }
        ContentBackend::File if config.content.dir.as_os_str().is_empty() => {
            return Err(ConfigError::ValidationError(
                "Content directory cannot be empty for the file backend".to_string(),
            ));
        }
        _ => {}
    }

    if config.synthesis.backend == SynthesisBackend::Http && config.synthesis.url.is_empty() {
        return Err(ConfigError::ValidationError(
            "Synthesis URL cannot be empty for the http backend".to_string(),
        ));
    }

    SpeechRate::new(config.synthesis.default_rate)
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

    if config.cache.memory_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "Cache memory capacity must be at least 1".to_string(),
        ));
    }

    if config.cache.enabled && config.cache.db_path.is_empty() {
        return Err(ConfigError::ValidationError(
            "Cache database path cannot be empty when the cache is enabled".to_string(),
        ));
    }

    if config.playback.command_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "Command buffer cannot be 0".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);
    match config.content.backend {
        ContentBackend::Http => tracing::info!("Content: http {}", config.content.url),
        ContentBackend::File => tracing::info!("Content: file {:?}", config.content.dir),
    }
    match config.synthesis.backend {
        SynthesisBackend::Http => tracing::info!("Synthesis: http {}", config.synthesis.url),
        SynthesisBackend::Simulated => tracing::info!(
            "Synthesis: simulated ({}ms/char)",
            config.synthesis.ms_per_char
        ),
    }
    tracing::info!("Default Rate: {}", config.synthesis.default_rate);
    tracing::info!("Cache Enabled: {}", config.cache.enabled);
    if config.cache.enabled {
        tracing::info!("Cache Database: {}", config.cache.db_path);
        tracing::info!("Cache Memory Capacity: {}", config.cache.memory_capacity);
    }
    tracing::info!("Auto Advance: {}", config.playback.auto_advance);
    tracing::info!("Prefetch: {}", config.playback.prefetch);
    tracing::info!("Resume Settle: {}ms", config.playback.resume_settle_ms);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
