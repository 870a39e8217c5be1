//! 下拉字段可选值缓存
//!
//! 每个 (实体种类, 列) 只拉取一次，作为展示用的候选项；后端同样接受
//! 不在列表中的自由输入，所以这里不做校验。拉取失败不致命：返回空列表、
//! 上报失败，且不缓存失败结果，下次挂载时重试。

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::entity::EntityKind;
use crate::error::{FieldSyncError, Result};
use crate::gateway::{DistinctValueProvider, FailureReporter, TracingFailureReporter};

/// 缓存键：字段身份
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OptionKey {
    pub kind: EntityKind,
    pub column: String,
}

impl OptionKey {
    pub fn new(kind: EntityKind, column: impl Into<String>) -> Self {
        Self {
            kind,
            column: column.into(),
        }
    }
}

/// 缓存统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionCacheStats {
    pub loaded_keys: usize,
    pub total_options: usize,
}

/// 去除空白项并按首次出现顺序去重
pub fn normalize_options(values: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

pub struct OptionCache {
    entries: Mutex<HashMap<OptionKey, Arc<OnceCell<Vec<String>>>>>,
    provider: Arc<dyn DistinctValueProvider>,
    reporter: Arc<dyn FailureReporter>,
}

impl OptionCache {
    pub fn new(provider: Arc<dyn DistinctValueProvider>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            provider,
            reporter: Arc::new(TracingFailureReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    fn cell(&self, key: &OptionKey) -> Arc<OnceCell<Vec<String>>> {
        self.entries
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    async fn fetch(&self, key: &OptionKey) -> Result<Vec<String>> {
        let values = self
            .provider
            .list_distinct_values(key.kind, &key.column)
            .await
            .map_err(|e| FieldSyncError::OptionsUnavailable {
                kind: key.kind,
                column: key.column.clone(),
                message: e.to_string(),
            })?;
        let options = normalize_options(values);
        info!(kind = %key.kind, column = %key.column, count = options.len(), "options loaded");
        Ok(options)
    }

    /// 加载可选值（已缓存则直接返回）；失败时返回空列表
    ///
    /// 同一键的并发加载共享一次拉取。
    pub async fn load(&self, key: &OptionKey) -> Vec<String> {
        let cell = self.cell(key);
        match cell.get_or_try_init(|| self.fetch(key)).await {
            Ok(options) => options.clone(),
            Err(error) => {
                self.reporter.report("options", &error);
                Vec::new()
            }
        }
    }

    /// 仅查缓存，不触发拉取
    pub fn get(&self, key: &OptionKey) -> Option<Vec<String>> {
        let entries = self.entries.lock();
        entries.get(key).and_then(|cell| cell.get().cloned())
    }

    /// 可选值 + 当前值（当前值不在列表中时追加到末尾）
    pub async fn options_including(&self, key: &OptionKey, current: &str) -> Vec<String> {
        let mut options = self.load(key).await;
        let current = current.trim();
        if !current.is_empty() && !options.iter().any(|o| o == current) {
            options.push(current.to_string());
        }
        options
    }

    /// 并发预加载多个键，返回成功加载（含已缓存）的键数
    pub async fn preload(&self, keys: &[OptionKey]) -> usize {
        let results = join_all(keys.iter().map(|key| async move {
            self.load(key).await;
            self.get(key).is_some()
        }))
        .await;
        results.into_iter().filter(|loaded| *loaded).count()
    }

    /// 失效某个键，下次加载重新拉取
    pub fn invalidate(&self, key: &OptionKey) {
        if self.entries.lock().remove(key).is_some() {
            debug!(kind = %key.kind, column = %key.column, "options invalidated");
        }
    }

    pub fn stats(&self) -> OptionCacheStats {
        let entries = self.entries.lock();
        let mut stats = OptionCacheStats::default();
        for options in entries.values().filter_map(|cell| cell.get()) {
            stats.loaded_keys += 1;
            stats.total_options += options.len();
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::{RecordingReporter, StaticValueProvider};

    fn type_key() -> OptionKey {
        OptionKey::new(EntityKind::Collection, "type")
    }

    #[test]
    fn normalize_keeps_first_seen_order() {
        let values = vec!["novel", " memoir", "", "novel", "essay ", "memoir"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(normalize_options(values), vec!["novel", "memoir", "essay"]);
    }

    #[tokio::test]
    async fn loads_once_per_field() {
        let provider = Arc::new(StaticValueProvider::default().with(
            EntityKind::Collection,
            "type",
            &["novel", "memoir"],
        ));
        let cache = OptionCache::new(provider.clone());

        assert_eq!(cache.load(&type_key()).await, vec!["novel", "memoir"]);
        assert_eq!(cache.load(&type_key()).await, vec!["novel", "memoir"]);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(
            cache.stats(),
            OptionCacheStats {
                loaded_keys: 1,
                total_options: 2
            }
        );
    }

    #[tokio::test]
    async fn failure_is_reported_and_retried_later() {
        let provider = Arc::new(StaticValueProvider::failing());
        let reporter = Arc::new(RecordingReporter::default());
        let cache = OptionCache::new(provider.clone()).with_reporter(reporter.clone());

        assert!(cache.load(&type_key()).await.is_empty());
        assert!(cache.get(&type_key()).is_none());
        assert_eq!(reporter.count(), 1);
        assert!(matches!(
            reporter.reports.lock()[0].1,
            FieldSyncError::OptionsUnavailable { kind: EntityKind::Collection, .. }
        ));

        cache.load(&type_key()).await;
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn current_value_is_appended_when_missing() {
        let provider = Arc::new(StaticValueProvider::default().with(
            EntityKind::Collection,
            "type",
            &["novel"],
        ));
        let cache = OptionCache::new(provider);

        assert_eq!(
            cache.options_including(&type_key(), "zine").await,
            vec!["novel", "zine"]
        );
        assert_eq!(cache.options_including(&type_key(), "novel").await, vec!["novel"]);
        assert_eq!(cache.options_including(&type_key(), "").await, vec!["novel"]);
    }

    #[tokio::test]
    async fn preload_and_invalidate() {
        let provider = Arc::new(
            StaticValueProvider::default()
                .with(EntityKind::Collection, "type", &["novel"])
                .with(EntityKind::Submission, "status", &["sent", "accepted"]),
        );
        let cache = OptionCache::new(provider.clone());
        let keys = [type_key(), OptionKey::new(EntityKind::Submission, "status")];

        assert_eq!(cache.preload(&keys).await, 2);
        assert_eq!(cache.stats().total_options, 3);

        cache.invalidate(&type_key());
        assert!(cache.get(&type_key()).is_none());
        cache.load(&type_key()).await;
        assert_eq!(provider.call_count(), 3);
    }
}
