//! 外部协作方接口
//!
//! 后端 RPC 的实现不在本 crate 内，这里只约定调用/应答契约：
//! - 持久化网关：按实体种类提交整条记录的更新
//! - 去重值提供方：为下拉字段提供已有取值
//! - 失败上报：所有被捕获的错误最终都会交给它

use async_trait::async_trait;
use tracing::warn;

use crate::entity::EntityKind;
use crate::error::{FieldSyncError, Result};
use crate::validation::UpdateReply;

/// 持久化网关（后端实体更新 RPC）
///
/// `Err` 表示传输层失败（含网关自身超时）；校验拒绝通过
/// [`UpdateReply::report`] 返回。核心对每次编辑只调用一次，不做重试。
#[async_trait]
pub trait PersistenceGateway<E>: Send + Sync {
    async fn update(&self, entity: E) -> Result<UpdateReply<E>>;
}

/// 去重值提供方，尽力而为
#[async_trait]
pub trait DistinctValueProvider: Send + Sync {
    async fn list_distinct_values(&self, kind: EntityKind, column: &str) -> Result<Vec<String>>;
}

/// 失败上报（日志/遥测）
pub trait FailureReporter: Send + Sync {
    fn report(&self, context: &str, error: &FieldSyncError);
}

/// 默认上报：写 tracing 日志
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFailureReporter;

impl FailureReporter for TracingFailureReporter {
    fn report(&self, context: &str, error: &FieldSyncError) {
        warn!(context, error = %error, "⚠️ field sync failure");
    }
}
