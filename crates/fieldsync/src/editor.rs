//! 视图绑定：下拉字段编辑器与文本字段编辑器
//!
//! 两者都只是控制器的薄封装，负责把界面动作翻译成控制器调用：
//! - 下拉字段：挂载时加载可选值；有请求在途时禁用，一次只允许一个写入
//! - 文本字段：每次按键同步更新本地显示值，保存经防抖合并后发出

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::EditPolicy;
use crate::controller::{EditHandle, FieldSyncController, Settlement};
use crate::debounce::DebounceCoalescer;
use crate::entity::{Entity, FieldBinding};
use crate::error::Result;
use crate::options::{OptionCache, OptionKey};

/// 下拉字段编辑器
pub struct SelectFieldEditor<E: Entity, B: FieldBinding<E, Value = String>> {
    controller: FieldSyncController<E, B>,
    key: OptionKey,
    options: Vec<String>,
}

impl<E: Entity, B: FieldBinding<E, Value = String>> SelectFieldEditor<E, B> {
    /// 挂载：加载该字段的可选值（失败时为空，不影响编辑）
    pub async fn mount(controller: FieldSyncController<E, B>, cache: &OptionCache) -> Self {
        let key = OptionKey::new(E::kind(), controller.field());
        let options = cache.load(&key).await;
        Self {
            controller,
            key,
            options,
        }
    }

    pub fn controller(&self) -> &FieldSyncController<E, B> {
        &self.controller
    }

    pub fn option_key(&self) -> &OptionKey {
        &self.key
    }

    /// 展示用候选项；当前值不在列表中时追加到末尾
    pub fn options(&self) -> Vec<String> {
        let current = self.controller.current_value();
        let mut options = self.options.clone();
        if !current.is_empty() && !options.contains(&current) {
            options.push(current);
        }
        options
    }

    pub fn current_value(&self) -> String {
        self.controller.current_value()
    }

    /// 有请求在途时控件禁用
    pub fn is_disabled(&self) -> bool {
        self.controller.is_pending()
    }

    /// 用户选择了某个值（或输入了自由值）
    pub fn select(&self, value: impl Into<String>) -> Option<EditHandle> {
        if self.is_disabled() {
            return None;
        }
        self.controller.submit_edit(value.into())
    }

    pub fn sync_external(&self, entity: E) {
        self.controller.sync_external(entity);
    }

    /// 卸载，返回卸载时是否仍有请求在途
    pub fn unmount(self) -> bool {
        self.controller.dispose()
    }
}

/// 文本字段编辑器
pub struct TextFieldEditor<E: Entity, B: FieldBinding<E, Value = String>> {
    controller: FieldSyncController<E, B>,
    coalescer: DebounceCoalescer<String, E>,
    last_save: Arc<Mutex<Option<EditHandle>>>,
}

impl<E: Entity, B: FieldBinding<E, Value = String>> TextFieldEditor<E, B> {
    /// 文本字段总是使用取代策略：在途期间发出的防抖保存必须签发新请求
    pub fn new(controller: FieldSyncController<E, B>, quiet_period: Duration) -> Self {
        let controller = if controller.policy() == EditPolicy::Supersede {
            controller
        } else {
            debug!(field = controller.field(), "text editor forces supersede policy");
            controller.with_policy(EditPolicy::Supersede)
        };
        let last_save = Arc::new(Mutex::new(None));
        let sink_controller = controller.clone();
        let sink_last_save = last_save.clone();
        let coalescer = DebounceCoalescer::new(quiet_period, move |value: String, context: E| {
            *sink_last_save.lock() = sink_controller.submit_edit_against(value, &context);
        });
        Self {
            controller,
            coalescer,
            last_save,
        }
    }

    pub fn controller(&self) -> &FieldSyncController<E, B> {
        &self.controller
    }

    pub fn current_value(&self) -> String {
        self.controller.current_value()
    }

    /// 有未发出的防抖保存或在途请求
    pub fn is_saving(&self) -> bool {
        self.coalescer.is_scheduled() || self.controller.is_pending()
    }

    /// 一次按键：立即更新显示值，保存交给防抖合并器
    pub fn input(&self, text: impl Into<String>) {
        let text = text.into();
        self.controller.set_local_draft(text.clone());
        self.coalescer.schedule(text, self.controller.entity());
    }

    /// 失焦：立即发出待保存的内容
    pub fn blur(&self) -> bool {
        self.coalescer.flush()
    }

    /// 等待最近一次发出的保存结算，没有则返回 None
    pub async fn wait_saved(&self) -> Result<Option<Settlement>> {
        let handle = self.last_save.lock().take();
        match handle {
            Some(handle) => Ok(Some(handle.settled().await?)),
            None => Ok(None),
        }
    }

    /// 父级传入新的权威实体；切换到其他记录时丢弃尚未发出的保存
    pub fn sync_external(&self, entity: E) {
        if entity.id() != self.controller.entity_id() {
            self.coalescer.cancel();
        }
        self.controller.sync_external(entity);
    }

    /// 卸载：丢弃尚未发出的保存并销毁控制器
    pub fn unmount(self) -> bool {
        self.coalescer.cancel();
        self.controller.dispose()
    }
}
