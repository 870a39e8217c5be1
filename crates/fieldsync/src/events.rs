//! 事件系统 - 字段同步结果的变更通知
//!
//! 控制器结算后通过 [`EventManager`] 广播：
//! - 保存成功：携带服务端确认后的实体，兄弟字段/父级据此刷新
//! - 编辑回滚：携带失败原因，视图据此弹出非阻塞提示
//!
//! 过期响应只写 debug 日志，不产生事件。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::FieldSyncConfig;
use crate::entity::{EntityId, EntityKind};
use crate::error::FieldSyncError;

/// 字段同步事件
#[derive(Debug, Clone)]
pub enum FieldSyncEvent<E> {
    /// 保存成功，权威实体已更新
    EntityUpdated {
        kind: EntityKind,
        entity_id: EntityId,
        field: String,
        entity: E,
        timestamp: i64,
    },
    /// 保存失败（校验拒绝或传输错误），草稿已回滚
    EditReverted {
        kind: EntityKind,
        entity_id: EntityId,
        field: String,
        error: FieldSyncError,
        timestamp: i64,
    },
}

impl<E> FieldSyncEvent<E> {
    pub fn event_type(&self) -> &'static str {
        match self {
            FieldSyncEvent::EntityUpdated { .. } => "entity_updated",
            FieldSyncEvent::EditReverted { .. } => "edit_reverted",
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            FieldSyncEvent::EntityUpdated { timestamp, .. }
            | FieldSyncEvent::EditReverted { timestamp, .. } => *timestamp,
        }
    }

    pub fn entity_id(&self) -> EntityId {
        match self {
            FieldSyncEvent::EntityUpdated { entity_id, .. }
            | FieldSyncEvent::EditReverted { entity_id, .. } => *entity_id,
        }
    }

    pub fn field(&self) -> &str {
        match self {
            FieldSyncEvent::EntityUpdated { field, .. }
            | FieldSyncEvent::EditReverted { field, .. } => field,
        }
    }
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// 事件统计信息
#[derive(Debug, Clone, Default)]
pub struct EventStats {
    /// 总事件数
    pub total_events: u64,
    /// 按类型分组的事件数
    pub events_by_type: HashMap<String, u64>,
    /// 最后事件时间（毫秒）
    pub last_event_time: Option<i64>,
}

type EventListener<E> = Box<dyn Fn(&FieldSyncEvent<E>) + Send + Sync>;

/// 事件管理器
///
/// 同一实体的多个字段控制器可以共享一个管理器，视图订阅后即可看到
/// 任一字段保存后的最新记录。
pub struct EventManager<E> {
    sender: broadcast::Sender<FieldSyncEvent<E>>,
    listeners: RwLock<HashMap<String, Vec<EventListener<E>>>>,
    stats: RwLock<EventStats>,
}

impl<E: Clone + Send + 'static> EventManager<E> {
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity);
        Arc::new(Self {
            sender,
            listeners: RwLock::new(HashMap::new()),
            stats: RwLock::new(EventStats::default()),
        })
    }

    /// 按配置的通道容量创建
    pub fn from_config(config: &FieldSyncConfig) -> Arc<Self> {
        Self::new(config.event_channel_capacity)
    }

    /// 发布事件
    pub fn emit(&self, event: FieldSyncEvent<E>) {
        debug!("Emitting event: {}", event.event_type());

        {
            let mut stats = self.stats.write();
            stats.total_events += 1;
            *stats
                .events_by_type
                .entry(event.event_type().to_string())
                .or_insert(0) += 1;
            stats.last_event_time = Some(event.timestamp());
        }

        // 无订阅者时 send 失败属正常场景
        if let Err(e) = self.sender.send(event.clone()) {
            debug!("Failed to broadcast event (no active receivers): {}", e);
        }

        let listeners = self.listeners.read();
        if let Some(typed) = listeners.get(event.event_type()) {
            for listener in typed {
                listener(&event);
            }
        }
        if let Some(general) = listeners.get("*") {
            for listener in general {
                listener(&event);
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FieldSyncEvent<E>> {
        self.sender.subscribe()
    }

    /// 添加监听器，`event_type` 为 `"*"` 时接收所有事件
    pub fn add_listener<F>(&self, event_type: &str, listener: F)
    where
        F: Fn(&FieldSyncEvent<E>) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .entry(event_type.to_string())
            .or_default()
            .push(Box::new(listener));
    }

    pub fn stats(&self) -> EventStats {
        self.stats.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn updated(id: u64) -> FieldSyncEvent<&'static str> {
        FieldSyncEvent::EntityUpdated {
            kind: EntityKind::Collection,
            entity_id: EntityId(id),
            field: "type".into(),
            entity: "collection",
            timestamp: now_millis(),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let manager = EventManager::new(8);
        let mut rx = manager.subscribe();

        manager.emit(updated(7));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "entity_updated");
        assert_eq!(event.entity_id(), EntityId(7));
        assert_eq!(event.field(), "type");
    }

    #[test]
    fn listeners_and_stats() {
        let manager = EventManager::new(8);
        let typed = Arc::new(AtomicUsize::new(0));
        let general = Arc::new(AtomicUsize::new(0));

        let typed_clone = typed.clone();
        manager.add_listener("edit_reverted", move |_| {
            typed_clone.fetch_add(1, Ordering::SeqCst);
        });
        let general_clone = general.clone();
        manager.add_listener("*", move |_| {
            general_clone.fetch_add(1, Ordering::SeqCst);
        });

        manager.emit(updated(1));
        manager.emit(FieldSyncEvent::EditReverted {
            kind: EntityKind::Collection,
            entity_id: EntityId(1),
            field: "type".into(),
            error: FieldSyncError::Transport("offline".into()),
            timestamp: now_millis(),
        });

        assert_eq!(typed.load(Ordering::SeqCst), 1);
        assert_eq!(general.load(Ordering::SeqCst), 2);

        let stats = manager.stats();
        assert_eq!(stats.total_events, 2);
        assert_eq!(stats.events_by_type.get("entity_updated"), Some(&1));
        assert!(stats.last_event_time.is_some());
    }
}
