//! 应用层 - 命令
//!
//! 所有写操作都以命令形式进入引擎的单一写者任务

mod control_commands;
mod engine_handle;

pub use control_commands::{CommandReply, ControlCommand, EngineCommand, EngineRequest};
pub use engine_handle::EngineHandle;
