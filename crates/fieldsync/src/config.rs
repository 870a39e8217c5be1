//! 字段同步配置
//!
//! 可通过 builder 构造，也可从 JSON 加载（宿主应用的设置文件）。

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FieldSyncError, Result};

/// 编辑进行中再次提交时的处理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditPolicy {
    /// 有请求在途时忽略新的编辑（下拉类字段，视图同时禁用控件）
    #[default]
    Exclusive,
    /// 新的编辑逻辑上取代在途请求，旧响应到达时作为过期结果丢弃（文本类字段）
    Supersede,
}

/// 字段编辑器类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// 下拉/枚举类字段
    Select,
    /// 自由文本字段（经防抖合并后保存）
    Text,
}

/// 字段同步配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSyncConfig {
    /// 文本字段防抖静默期（毫秒）
    pub text_debounce_ms: u64,
    /// 单次持久化请求超时（毫秒），None 表示交给网关自行处理
    pub request_timeout_ms: Option<u64>,
    /// 下拉类字段的编辑策略
    pub select_policy: EditPolicy,
    /// 文本类字段的编辑策略
    pub text_policy: EditPolicy,
    /// 事件广播通道容量
    pub event_channel_capacity: usize,
}

impl Default for FieldSyncConfig {
    fn default() -> Self {
        Self {
            text_debounce_ms: 500,
            request_timeout_ms: None,
            select_policy: EditPolicy::Exclusive,
            text_policy: EditPolicy::Supersede,
            event_channel_capacity: 64,
        }
    }
}

impl FieldSyncConfig {
    pub fn builder() -> FieldSyncConfigBuilder {
        FieldSyncConfigBuilder::new()
    }

    /// 从 JSON 加载并校验，缺省字段取默认值
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: FieldSyncConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.text_debounce_ms == 0 {
            return Err(FieldSyncError::Config(
                "text_debounce_ms must be greater than zero".to_string(),
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(FieldSyncError::Config(
                "event_channel_capacity must be greater than zero".to_string(),
            ));
        }
        if self.text_policy == EditPolicy::Exclusive {
            return Err(FieldSyncError::Config(
                "text_policy must be supersede".to_string(),
            ));
        }
        if self.request_timeout_ms == Some(0) {
            return Err(FieldSyncError::Config(
                "request_timeout_ms must be greater than zero when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn text_debounce(&self) -> Duration {
        Duration::from_millis(self.text_debounce_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn policy_for(&self, role: FieldRole) -> EditPolicy {
        match role {
            FieldRole::Select => self.select_policy,
            FieldRole::Text => self.text_policy,
        }
    }
}

pub struct FieldSyncConfigBuilder {
    config: FieldSyncConfig,
}

impl FieldSyncConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: FieldSyncConfig::default(),
        }
    }

    pub fn text_debounce(mut self, quiet_period: Duration) -> Self {
        self.config.text_debounce_ms = quiet_period.as_millis() as u64;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn select_policy(mut self, policy: EditPolicy) -> Self {
        self.config.select_policy = policy;
        self
    }

    pub fn text_policy(mut self, policy: EditPolicy) -> Self {
        self.config.text_policy = policy;
        self
    }

    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.event_channel_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<FieldSyncConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for FieldSyncConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn defaults() {
        let config = FieldSyncConfig::default();
        assert_eq!(config.text_debounce(), Duration::from_millis(500));
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.select_policy, EditPolicy::Exclusive);
        assert_eq!(config.text_policy, EditPolicy::Supersede);
        assert_eq!(config.policy_for(FieldRole::Select), EditPolicy::Exclusive);
        assert_eq!(config.policy_for(FieldRole::Text), EditPolicy::Supersede);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = assert_ok!(FieldSyncConfig::from_json_str(
            r#"{"text_debounce_ms": 250, "request_timeout_ms": 8000}"#
        ));
        assert_eq!(config.text_debounce_ms, 250);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(8)));
        assert_eq!(config.event_channel_capacity, 64);
    }

    #[test]
    fn policies_use_snake_case() {
        let config = FieldSyncConfig::from_json_str(r#"{"select_policy": "supersede"}"#).unwrap();
        assert_eq!(config.select_policy, EditPolicy::Supersede);
    }

    #[test]
    fn zero_debounce_is_rejected() {
        let err = assert_err!(FieldSyncConfig::from_json_str(r#"{"text_debounce_ms": 0}"#));
        assert!(matches!(err, FieldSyncError::Config(_)));

        let err = assert_err!(FieldSyncConfig::builder().event_channel_capacity(0).build());
        assert!(matches!(err, FieldSyncError::Config(_)));

        let config = assert_ok!(FieldSyncConfig::builder()
            .text_debounce(Duration::from_millis(300))
            .request_timeout(Duration::from_secs(10))
            .select_policy(EditPolicy::Supersede)
            .build());
        assert_eq!(config.text_debounce_ms, 300);
        assert_eq!(config.request_timeout_ms, Some(10_000));
        assert_eq!(config.policy_for(FieldRole::Select), EditPolicy::Supersede);
    }

    #[test]
    fn exclusive_text_policy_is_rejected() {
        let err = assert_err!(FieldSyncConfig::from_json_str(r#"{"text_policy": "exclusive"}"#));
        assert!(matches!(err, FieldSyncError::Config(_)));
        assert_eq!(EditPolicy::default(), EditPolicy::Exclusive);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = FieldSyncConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, FieldSyncError::Config(_)));
    }
}
