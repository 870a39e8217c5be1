use std::time::Duration;

use crate::entity::EntityKind;
use crate::validation::ValidationReport;

/// 字段同步错误
///
/// 所有错误在控制器边界被转换为状态迁移，不会向视图层抛出。
#[derive(Debug, Clone, thiserror::Error)]
pub enum FieldSyncError {
    /// 服务端校验拒绝（结构化原因）
    #[error("Validation rejected: {0}")]
    Rejected(ValidationReport),

    /// 传输层错误（网络/后端不可用）
    #[error("Transport error: {0}")]
    Transport(String),

    /// 请求超时，按传输错误处理
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// 可选值列表拉取失败（非致命）
    #[error("Options unavailable for {kind}.{column}: {message}")]
    OptionsUnavailable {
        kind: EntityKind,
        column: String,
        message: String,
    },

    /// 配置错误
    #[error("Config error: {0}")]
    Config(String),

    /// 运行时错误（任务 join 失败等）
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl FieldSyncError {
    /// 是否为校验拒绝
    pub fn is_rejection(&self) -> bool {
        matches!(self, FieldSyncError::Rejected(_))
    }

    /// 是否为传输层失败（超时视同传输失败）
    pub fn is_transport(&self) -> bool {
        matches!(self, FieldSyncError::Transport(_) | FieldSyncError::Timeout(_))
    }

    /// 面向用户的提示文本
    ///
    /// 校验拒绝原样展示每条原因；传输失败只给出通用提示。
    pub fn user_message(&self) -> String {
        match self {
            FieldSyncError::Rejected(report) => report.messages().join("\n"),
            FieldSyncError::Transport(_) | FieldSyncError::Timeout(_) => {
                "Unable to save changes. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for FieldSyncError {
    fn from(error: serde_json::Error) -> Self {
        FieldSyncError::Config(error.to_string())
    }
}

impl From<tokio::task::JoinError> for FieldSyncError {
    fn from(error: tokio::task::JoinError) -> Self {
        FieldSyncError::Runtime(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FieldSyncError>;
