//! Engine Handle - 引擎命令队列的发送端
//!
//! 可克隆；命令按发送顺序处理

use tokio::sync::{mpsc, oneshot};

use super::control_commands::{ControlCommand, EngineCommand, EngineRequest};
use crate::application::error::ApplicationError;

#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// 创建有界命令队列
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<EngineRequest>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }

    /// 发送命令，不等待结果
    pub async fn send(&self, command: EngineCommand) -> Result<(), ApplicationError> {
        self.tx
            .send(EngineRequest {
                command,
                reply: None,
            })
            .await
            .map_err(|_| ApplicationError::EngineUnavailable)
    }

    /// 发送命令并等待处理结果
    ///
    /// 内容加载类命令在加载完成（或失败）后才返回
    pub async fn execute(&self, command: EngineCommand) -> Result<(), ApplicationError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest {
                command,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| ApplicationError::EngineUnavailable)?;

        reply_rx
            .await
            .map_err(|_| ApplicationError::EngineUnavailable)?
            .map_err(ApplicationError::from)
    }

    pub async fn control(&self, command: ControlCommand) -> Result<(), ApplicationError> {
        self.execute(EngineCommand::Control(command)).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
