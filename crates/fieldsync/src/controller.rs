//! 字段同步控制器
//!
//! 每个 (实体, 字段) 一个实例，协调三方状态：
//! - 父级传入的权威实体（可能随时被外部刷新）
//! - 本地草稿（界面显示值）
//! - 在途的持久化请求（可能成功、失败或被服务端校验拒绝）
//!
//! 状态机：
//!
//! ```text
//!   Idle ──begin_edit──▶ Editing ──Accepted──▶ Idle  (权威值更新，广播新实体)
//!                           │
//!                           └──Rejected/传输错误──▶ Idle  (草稿回滚到权威值)
//! ```
//!
//! 外部事件：实体切换在任何状态下立即重置草稿并使在途请求作废；
//! 同一实体的权威值变化在 Idle 时立即同步，在 Editing 时暂存到结算时处理：
//! 保存成功则以在途请求的结果为准（暂存值仅作参考，等下一次外部同步覆盖），
//! 保存失败则暂存值成为新的基线。
//!
//! 网络层不取消请求，"取消"只发生在结算层：控制器销毁后或请求被新请求
//! 取代后到达的响应一律作为过期结果丢弃。

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{EditPolicy, FieldRole, FieldSyncConfig};
use crate::entity::{Entity, EntityId, EntityKind, FieldBinding};
use crate::error::{FieldSyncError, Result};
use crate::events::{now_millis, EventManager, FieldSyncEvent};
use crate::gateway::{FailureReporter, PersistenceGateway, TracingFailureReporter};
use crate::validation::{SeverityPresenter, ValidationOutcome, ValidationPresenter};

const DEFAULT_EVENT_CAPACITY: usize = 64;

/// 请求序号，每个控制器内单调递增
pub type RequestSeq = u64;

/// 控制器所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Editing,
}

/// 一次结算的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// 服务端已接受
    Accepted,
    /// 被拒绝或传输失败，草稿已回滚
    Reverted,
    /// 过期响应（控制器已销毁，或请求已被取代），已丢弃
    Stale,
}

/// 已被接受的编辑意图：乐观更新已生效，等待持久化
#[derive(Debug, Clone)]
pub struct EditTicket<E, V> {
    seq: RequestSeq,
    entity_id: EntityId,
    proposed: V,
    entity: E,
}

impl<E, V> EditTicket<E, V> {
    pub fn seq(&self) -> RequestSeq {
        self.seq
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    pub fn proposed(&self) -> &V {
        &self.proposed
    }

    /// 将要提交给网关的整条记录
    pub fn entity(&self) -> &E {
        &self.entity
    }
}

/// 后台持久化任务句柄
pub struct EditHandle {
    seq: RequestSeq,
    task: JoinHandle<Settlement>,
}

impl EditHandle {
    pub fn seq(&self) -> RequestSeq {
        self.seq
    }

    /// 等待结算完成
    pub async fn settled(self) -> Result<Settlement> {
        Ok(self.task.await?)
    }
}

/// 控制器状态快照（供视图渲染与调试）
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSnapshot<V> {
    pub entity_id: EntityId,
    pub draft: V,
    pub authoritative: V,
    pub phase: SyncPhase,
    pub disposed: bool,
}

struct PendingRequest<V> {
    seq: RequestSeq,
    proposed: V,
}

struct ControllerState<E, V> {
    entity: E,
    authoritative: V,
    draft: V,
    pending: Option<PendingRequest<V>>,
    queued_external: Option<E>,
    next_seq: RequestSeq,
    disposed: bool,
}

/// 字段同步控制器
///
/// 克隆开销很小，所有克隆共享同一份状态。
pub struct FieldSyncController<E: Entity, B: FieldBinding<E>> {
    state: Arc<Mutex<ControllerState<E, B::Value>>>,
    binding: Arc<B>,
    gateway: Arc<dyn PersistenceGateway<E>>,
    presenter: Arc<dyn ValidationPresenter>,
    reporter: Arc<dyn FailureReporter>,
    events: Arc<EventManager<E>>,
    policy: EditPolicy,
    request_timeout: Option<Duration>,
}

impl<E: Entity, B: FieldBinding<E>> Clone for FieldSyncController<E, B> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            binding: self.binding.clone(),
            gateway: self.gateway.clone(),
            presenter: self.presenter.clone(),
            reporter: self.reporter.clone(),
            events: self.events.clone(),
            policy: self.policy,
            request_timeout: self.request_timeout,
        }
    }
}

impl<E: Entity, B: FieldBinding<E>> FieldSyncController<E, B> {
    /// 为 (实体, 字段) 创建控制器，初始为 Idle，草稿等于权威值
    pub fn new(entity: E, binding: B, gateway: Arc<dyn PersistenceGateway<E>>) -> Self {
        let authoritative = binding.read(&entity);
        Self {
            state: Arc::new(Mutex::new(ControllerState {
                entity,
                draft: authoritative.clone(),
                authoritative,
                pending: None,
                queued_external: None,
                next_seq: 1,
                disposed: false,
            })),
            binding: Arc::new(binding),
            gateway,
            presenter: Arc::new(SeverityPresenter),
            reporter: Arc::new(TracingFailureReporter),
            events: EventManager::new(DEFAULT_EVENT_CAPACITY),
            policy: EditPolicy::Exclusive,
            request_timeout: None,
        }
    }

    pub fn with_policy(mut self, policy: EditPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_presenter(mut self, presenter: Arc<dyn ValidationPresenter>) -> Self {
        self.presenter = presenter;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// 共享事件管理器（同一记录的多个字段控制器共用一个）
    pub fn with_events(mut self, events: Arc<EventManager<E>>) -> Self {
        self.events = events;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// 按配置设置编辑策略与请求超时
    pub fn with_config(self, config: &FieldSyncConfig, role: FieldRole) -> Self {
        self.with_policy(config.policy_for(role))
            .with_request_timeout(config.request_timeout())
    }

    pub fn kind(&self) -> EntityKind {
        E::kind()
    }

    pub fn field(&self) -> &str {
        self.binding.field()
    }

    pub fn policy(&self) -> EditPolicy {
        self.policy
    }

    /// 当前显示值（草稿）
    pub fn current_value(&self) -> B::Value {
        self.state.lock().draft.clone()
    }

    /// 最近一次确认已持久化的值
    pub fn authoritative_value(&self) -> B::Value {
        self.state.lock().authoritative.clone()
    }

    /// 是否有在途请求；视图据此禁用编辑控件
    pub fn is_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    /// 草稿与权威值不一致且无在途请求（文本输入尚未保存）
    pub fn is_dirty(&self) -> bool {
        let state = self.state.lock();
        state.pending.is_none() && state.draft != state.authoritative
    }

    pub fn phase(&self) -> SyncPhase {
        if self.is_pending() {
            SyncPhase::Editing
        } else {
            SyncPhase::Idle
        }
    }

    pub fn entity(&self) -> E {
        self.state.lock().entity.clone()
    }

    pub fn entity_id(&self) -> EntityId {
        self.state.lock().entity.id()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    pub fn snapshot(&self) -> ControllerSnapshot<B::Value> {
        let state = self.state.lock();
        ControllerSnapshot {
            entity_id: state.entity.id(),
            draft: state.draft.clone(),
            authoritative: state.authoritative.clone(),
            phase: if state.pending.is_some() {
                SyncPhase::Editing
            } else {
                SyncPhase::Idle
            },
            disposed: state.disposed,
        }
    }

    pub fn events(&self) -> &Arc<EventManager<E>> {
        &self.events
    }

    /// 订阅变更通知
    pub fn subscribe(&self) -> broadcast::Receiver<FieldSyncEvent<E>> {
        self.events.subscribe()
    }

    /// 仅更新本地草稿，不触发持久化（文本逐字输入）
    pub fn set_local_draft(&self, value: B::Value) {
        let mut state = self.state.lock();
        if state.disposed {
            return;
        }
        state.draft = value;
    }

    /// 基于当前权威实体发起编辑（同步部分：乐观更新 + 签发请求）
    ///
    /// 返回 None 表示无需持久化：值未变化、已销毁，或独占策略下已有请求在途。
    ///
    /// 取代策略下，有请求在途时"值未变化"比较的是在途请求的目标值而非
    /// 权威值：在途期间改回权威值同样会签发新请求。
    pub fn begin_edit(&self, value: B::Value) -> Option<EditTicket<E, B::Value>> {
        let base = self.state.lock().entity.clone();
        self.begin_edit_against(value, &base)
    }

    /// 基于指定的实体快照发起编辑
    ///
    /// 防抖保存使用发起时的快照；快照与当前绑定的实体不一致时丢弃。
    pub fn begin_edit_against(&self, value: B::Value, base: &E) -> Option<EditTicket<E, B::Value>> {
        let mut state = self.state.lock();
        let entity_id = state.entity.id();

        if state.disposed {
            debug!(kind = %E::kind(), entity_id = %entity_id, field = self.field(), "edit ignored: controller disposed");
            return None;
        }
        if base.id() != entity_id {
            debug!(
                kind = %E::kind(),
                entity_id = %entity_id,
                context_id = %base.id(),
                field = self.field(),
                "edit ignored: context belongs to another entity"
            );
            return None;
        }

        let in_flight = state
            .pending
            .as_ref()
            .map(|pending| (pending.seq, pending.proposed == value));
        match (in_flight, self.policy) {
            (Some((pending_seq, _)), EditPolicy::Exclusive) => {
                debug!(
                    kind = %E::kind(),
                    entity_id = %entity_id,
                    field = self.field(),
                    seq = pending_seq,
                    "edit ignored: request already in flight"
                );
                return None;
            }
            (Some((_, same_target)), EditPolicy::Supersede) => {
                if same_target {
                    return None;
                }
            }
            (None, _) => {
                if state.authoritative == value {
                    state.draft = value;
                    return None;
                }
            }
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        if let Some(superseded) = state.pending.take() {
            debug!(
                kind = %E::kind(),
                entity_id = %entity_id,
                field = self.field(),
                superseded = superseded.seq,
                seq,
                "in-flight request superseded"
            );
        }
        state.draft = value.clone();
        state.pending = Some(PendingRequest {
            seq,
            proposed: value.clone(),
        });
        drop(state);

        debug!(kind = %E::kind(), entity_id = %entity_id, field = self.field(), seq, value = ?value, "optimistic edit");
        Some(EditTicket {
            seq,
            entity_id,
            entity: self.binding.apply(base, value.clone()),
            proposed: value,
        })
    }

    /// 发起编辑并在后台持久化
    ///
    /// 必须在 tokio 运行时内调用。返回 None 的情况同 [`Self::begin_edit`]。
    pub fn submit_edit(&self, value: B::Value) -> Option<EditHandle> {
        let ticket = self.begin_edit(value)?;
        Some(self.spawn_persist(ticket))
    }

    /// 基于指定快照发起编辑并在后台持久化（防抖合并器的 sink 使用）
    pub fn submit_edit_against(&self, value: B::Value, base: &E) -> Option<EditHandle> {
        let ticket = self.begin_edit_against(value, base)?;
        Some(self.spawn_persist(ticket))
    }

    fn spawn_persist(&self, ticket: EditTicket<E, B::Value>) -> EditHandle {
        let seq = ticket.seq;
        let controller = self.clone();
        let task = tokio::spawn(async move { controller.persist(ticket).await });
        EditHandle { seq, task }
    }

    /// 调用网关并结算（异步部分）
    pub async fn persist(&self, ticket: EditTicket<E, B::Value>) -> Settlement {
        let seq = ticket.seq;
        let call = self.gateway.update(ticket.entity);
        let result = match self.request_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(FieldSyncError::Timeout(timeout)),
            },
            None => call.await,
        };
        let outcome =
            result.map(|reply| ValidationOutcome::classify(reply, self.presenter.as_ref()));
        self.reconcile(seq, outcome)
    }

    /// 应用持久化结果
    ///
    /// 只有与当前在途请求序号一致的第一次调用生效；重复或迟到的结果返回
    /// [`Settlement::Stale`]，不改变任何状态。
    pub fn reconcile(&self, seq: RequestSeq, outcome: Result<ValidationOutcome<E>>) -> Settlement {
        let mut state = self.state.lock();
        let entity_id = state.entity.id();

        if state.disposed {
            debug!(kind = %E::kind(), entity_id = %entity_id, field = self.field(), seq, "stale response discarded: controller disposed");
            return Settlement::Stale;
        }
        let pending = match state.pending.take() {
            Some(pending) if pending.seq == seq => pending,
            other => {
                state.pending = other;
                debug!(kind = %E::kind(), entity_id = %entity_id, field = self.field(), seq, "stale response discarded: request superseded");
                return Settlement::Stale;
            }
        };
        let queued = state.queued_external.take();

        let error = match outcome {
            Ok(ValidationOutcome::Accepted(entity)) => {
                if queued.is_some() {
                    debug!(
                        kind = %E::kind(),
                        entity_id = %entity_id,
                        field = self.field(),
                        seq,
                        "queued external update dropped, in-flight completion wins"
                    );
                }
                state.authoritative = self.binding.read(&entity);
                state.entity = entity.clone();
                // 草稿仍是本次提交的值时以服务端确认值为准（可能被规范化）
                if state.draft == pending.proposed {
                    state.draft = state.authoritative.clone();
                }
                drop(state);

                info!(kind = %E::kind(), entity_id = %entity_id, field = self.field(), seq, value = ?pending.proposed, "✅ field saved");
                self.events.emit(FieldSyncEvent::EntityUpdated {
                    kind: E::kind(),
                    entity_id,
                    field: self.field().to_string(),
                    entity,
                    timestamp: now_millis(),
                });
                return Settlement::Accepted;
            }
            Ok(ValidationOutcome::Rejected(report)) => FieldSyncError::Rejected(report),
            Err(error) => error,
        };

        if let Some(external) = queued {
            state.authoritative = self.binding.read(&external);
            state.entity = external;
        }
        // 草稿已越过被拒绝的值（后续按键待保存）时保留草稿
        if state.draft == pending.proposed {
            state.draft = state.authoritative.clone();
        }
        drop(state);

        warn!(
            kind = %E::kind(),
            entity_id = %entity_id,
            field = self.field(),
            seq,
            value = ?pending.proposed,
            error = %error,
            "⚠️ field edit reverted"
        );
        self.reporter.report(self.field(), &error);
        self.events.emit(FieldSyncEvent::EditReverted {
            kind: E::kind(),
            entity_id,
            field: self.field().to_string(),
            error,
            timestamp: now_millis(),
        });
        Settlement::Reverted
    }

    /// 父级传入新的权威实体
    ///
    /// 实体切换：立即重置草稿，在途请求作废。同一实体：Idle 时权威值变化
    /// 即同步草稿；Editing 时暂存，结算时处理。
    pub fn sync_external(&self, entity: E) {
        let mut state = self.state.lock();
        if state.disposed {
            return;
        }

        let current_id = state.entity.id();
        if entity.id() != current_id {
            let superseded = state.pending.take();
            state.queued_external = None;
            state.authoritative = self.binding.read(&entity);
            state.draft = state.authoritative.clone();
            debug!(
                kind = %E::kind(),
                from = %current_id,
                to = %entity.id(),
                field = self.field(),
                superseded = ?superseded.map(|p| p.seq),
                "entity switched, draft reset"
            );
            state.entity = entity;
            return;
        }

        if state.pending.is_some() {
            debug!(kind = %E::kind(), entity_id = %current_id, field = self.field(), "external update queued until settle");
            state.queued_external = Some(entity);
            return;
        }

        let value = self.binding.read(&entity);
        if value != state.authoritative {
            debug!(kind = %E::kind(), entity_id = %current_id, field = self.field(), "authoritative value changed externally, draft resynced");
            state.draft = value.clone();
        }
        state.authoritative = value;
        state.entity = entity;
    }

    /// 销毁控制器（视图卸载）；之后到达的结果一律丢弃
    ///
    /// 返回销毁时是否仍有请求在途。
    pub fn dispose(&self) -> bool {
        let mut state = self.state.lock();
        state.disposed = true;
        state.queued_external = None;
        let in_flight = state.pending.take().is_some();
        debug!(kind = %E::kind(), entity_id = %state.entity.id(), field = self.field(), in_flight, "controller disposed");
        in_flight
    }
}
