//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（内容源、离线缓存、语音合成、音频资源、中断信号）
//! - commands: 控制命令与引擎命令队列
//! - services: 播放引擎、内容加载、中断协调、睡眠定时器、控制面边界
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;
pub mod services;

pub use commands::{ControlCommand, EngineCommand, EngineHandle, EngineRequest};
pub use error::ApplicationError;
pub use services::{ContentLoader, PlaybackEngine, SessionPresenter};
