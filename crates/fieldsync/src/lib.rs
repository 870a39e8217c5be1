//! fieldsync - 远端权威记录的可编辑字段同步
//!
//! 每个行内编辑器（作品集/机构/投稿上的枚举字段，书籍正文前后附文等文本面板）
//! 都需要协调三方同时变化的状态：父级传下来的权威实体、本地草稿、
//! 以及可能成功/失败/被服务端校验拒绝的在途保存请求。本 crate 提供：
//!
//! - 🔁 [`FieldSyncController`]：单字段状态机，乐观更新 + 结算 + 回滚
//! - ⏱️ [`DebounceCoalescer`]：静默期合并，文本输入不再每次按键都保存
//! - 📋 [`OptionCache`]：下拉字段的候选值缓存
//! - 🧩 [`SelectFieldEditor`] / [`TextFieldEditor`]：视图绑定
//! - 📣 [`EventManager`]：保存成功/回滚的变更通知
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use fieldsync::model::{fields, Collection};
//! use fieldsync::{
//!     EntityId, FieldRole, FieldSyncConfig, FieldSyncController, PersistenceGateway, Result,
//!     UpdateReply,
//! };
//!
//! struct CollectionRpc;
//!
//! #[async_trait]
//! impl PersistenceGateway<Collection> for CollectionRpc {
//!     async fn update(&self, entity: Collection) -> Result<UpdateReply<Collection>> {
//!         // 调用后端 update_collection
//!         Ok(UpdateReply::accepted(entity))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = FieldSyncConfig::from_json_str(r#"{"request_timeout_ms": 10000}"#)?;
//!     let collection = Collection {
//!         id: EntityId(7),
//!         title: "Night Poems".into(),
//!         collection_type: "novel".into(),
//!         status: "draft".into(),
//!     };
//!
//!     let controller = FieldSyncController::new(collection, fields::COLLECTION_TYPE, Arc::new(CollectionRpc))
//!         .with_config(&config, FieldRole::Select);
//!
//!     if let Some(handle) = controller.submit_edit("memoir".to_string()) {
//!         // 乐观更新已生效
//!         assert_eq!(controller.current_value(), "memoir");
//!         handle.settled().await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
pub mod debounce;
pub mod editor;
pub mod entity;
pub mod error;
pub mod events;
pub mod gateway;
pub mod model;
pub mod options;
pub mod validation;

pub use config::{EditPolicy, FieldRole, FieldSyncConfig, FieldSyncConfigBuilder};
pub use controller::{
    ControllerSnapshot, EditHandle, EditTicket, FieldSyncController, RequestSeq, Settlement,
    SyncPhase,
};
pub use debounce::DebounceCoalescer;
pub use editor::{SelectFieldEditor, TextFieldEditor};
pub use entity::{Entity, EntityId, EntityKind, FieldAccessor, FieldBinding};
pub use error::{FieldSyncError, Result};
pub use events::{EventManager, EventStats, FieldSyncEvent};
pub use gateway::{DistinctValueProvider, FailureReporter, PersistenceGateway, TracingFailureReporter};
pub use options::{OptionCache, OptionCacheStats, OptionKey};
pub use validation::{
    IssueSeverity, SeverityPresenter, UpdateReply, ValidationIssue, ValidationOutcome,
    ValidationPresenter, ValidationReport,
};
