//! 防抖合并器
//!
//! 在静默期内连续调用 `schedule` 只保留最后一次的 (值, 上下文)，
//! 静默期结束后调用 sink 恰好一次。用于文本字段：避免每次按键都发起一次保存。
//!
//! 单槽语义：任何时刻最多一个待触发调用；新的调用连同其上下文整体取代旧调用。
//! `cancel` 直接丢弃待触发调用（不是触发后再忽略）。

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

type Sink<V, C> = Arc<dyn Fn(V, C) + Send + Sync>;

struct Scheduled<V, C> {
    generation: u64,
    value: V,
    context: C,
    cancel: CancellationToken,
}

struct Slot<V, C> {
    generation: u64,
    pending: Option<Scheduled<V, C>>,
}

impl<V, C> Slot<V, C> {
    /// 取出与 generation 匹配的待触发调用
    fn take_if_current(&mut self, generation: u64) -> Option<Scheduled<V, C>> {
        match &self.pending {
            Some(scheduled) if scheduled.generation == generation => self.pending.take(),
            _ => None,
        }
    }
}

/// 防抖合并器
///
/// `schedule` 会在当前 tokio 运行时上创建定时任务，必须在运行时内调用。
pub struct DebounceCoalescer<V, C> {
    quiet_period: Duration,
    sink: Sink<V, C>,
    slot: Arc<Mutex<Slot<V, C>>>,
}

impl<V, C> DebounceCoalescer<V, C>
where
    V: Send + 'static,
    C: Send + 'static,
{
    pub fn new<F>(quiet_period: Duration, sink: F) -> Self
    where
        F: Fn(V, C) + Send + Sync + 'static,
    {
        Self {
            quiet_period,
            sink: Arc::new(sink),
            slot: Arc::new(Mutex::new(Slot {
                generation: 0,
                pending: None,
            })),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// 安排一次调用并重置静默期计时
    pub fn schedule(&self, value: V, context: C) {
        let token = CancellationToken::new();
        let generation = {
            let mut slot = self.slot.lock();
            if let Some(previous) = slot.pending.take() {
                previous.cancel.cancel();
            }
            slot.generation += 1;
            slot.pending = Some(Scheduled {
                generation: slot.generation,
                value,
                context,
                cancel: token.clone(),
            });
            slot.generation
        };

        let slot = self.slot.clone();
        let sink = self.sink.clone();
        let quiet_period = self.quiet_period;

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(quiet_period) => {
                    let due = slot.lock().take_if_current(generation);
                    if let Some(call) = due {
                        debug!(generation, "debounce quiet period elapsed, firing");
                        sink(call.value, call.context);
                    }
                }
            }
        });
    }

    /// 立即触发待触发调用（例如文本框失焦），返回是否有调用被触发
    pub fn flush(&self) -> bool {
        let due = self.slot.lock().pending.take();
        match due {
            Some(call) => {
                call.cancel.cancel();
                (self.sink)(call.value, call.context);
                true
            }
            None => false,
        }
    }

    /// 丢弃待触发调用，返回是否有调用被丢弃
    pub fn cancel(&self) -> bool {
        let discarded = self.slot.lock().pending.take();
        match discarded {
            Some(call) => {
                call.cancel.cancel();
                debug!(generation = call.generation, "debounced call discarded");
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.slot.lock().pending.is_some()
    }
}

impl<V, C> Drop for DebounceCoalescer<V, C> {
    fn drop(&mut self) {
        if let Some(call) = self.slot.lock().pending.take() {
            call.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, Instant};

    type Calls = Arc<Mutex<Vec<(&'static str, u32, Instant)>>>;

    fn recording(quiet_ms: u64) -> (DebounceCoalescer<&'static str, u32>, Calls) {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let sink_calls = calls.clone();
        let coalescer = DebounceCoalescer::new(Duration::from_millis(quiet_ms), move |value, context| {
            sink_calls.lock().push((value, context, Instant::now()));
        });
        (coalescer, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_into_one_trailing_call() {
        let start = Instant::now();
        let (coalescer, calls) = recording(500);

        coalescer.schedule("v1", 1);
        sleep(Duration::from_millis(100)).await;
        coalescer.schedule("v2", 2);

        sleep(Duration::from_millis(499)).await;
        assert!(calls.lock().is_empty());
        assert!(coalescer.is_scheduled());

        sleep(Duration::from_millis(2)).await;
        let calls = calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "v2");
        // 上下文与实际发送的值成对
        assert_eq!(calls[0].1, 2);
        let fired_at = calls[0].2.duration_since(start);
        assert!(fired_at >= Duration::from_millis(600) && fired_at <= Duration::from_millis(601));
        assert!(!coalescer.is_scheduled());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_scheduled_call() {
        let (coalescer, calls) = recording(500);

        coalescer.schedule("draft", 1);
        sleep(Duration::from_millis(200)).await;
        assert!(coalescer.cancel());

        sleep(Duration::from_secs(2)).await;
        assert!(calls.lock().is_empty());
        assert!(!coalescer.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_fires_immediately_and_only_once() {
        let (coalescer, calls) = recording(500);

        coalescer.schedule("typed", 3);
        sleep(Duration::from_millis(50)).await;
        assert!(coalescer.flush());
        assert_eq!(calls.lock().len(), 1);

        sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.lock().len(), 1);
        assert!(!coalescer.flush());
    }

    #[tokio::test(start_paused = true)]
    async fn separated_calls_fire_separately() {
        let (coalescer, calls) = recording(500);

        coalescer.schedule("first", 1);
        sleep(Duration::from_millis(600)).await;
        coalescer.schedule("second", 2);
        sleep(Duration::from_millis(600)).await;

        let values: Vec<_> = calls.lock().iter().map(|(v, c, _)| (*v, *c)).collect();
        assert_eq!(values, vec![("first", 1), ("second", 2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_coalescer_discards_pending_call() {
        let (coalescer, calls) = recording(500);

        coalescer.schedule("unsaved", 1);
        drop(coalescer);

        sleep(Duration::from_secs(1)).await;
        assert!(calls.lock().is_empty());
    }
}
