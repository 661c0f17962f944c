//! 存储抽象层
//! Storage abstraction layer
//!
//! 定义了与共享数据存储交互的 [`Store`] 接口。所有跨进程的正确性都来自
//! 这里每个方法的单文档原子条件更新语义：两个 worker 绝不可能租到同一个
//! 尝试，队列的在途额度也绝不会透支。
//! Defines the [`Store`] interface to the shared datastore. All cross-process
//! correctness derives from the single-document atomic conditional-update
//! semantics of each method here: two workers can never lease the same
//! attempt, and a queue's in-flight budget can never be overdrawn.

use crate::error::Result;
use crate::models::{
  Account, Application, Attempt, AttemptStatus, Id, ListParams, ListResult, Queue, Task,
  TaskAdvance,
};
use async_trait::async_trait;
use chrono::Utc;

pub mod constants;

/// 当前时间（UNIX 纳秒）
/// Current time (UNIX nanoseconds)
pub fn now_ns() -> i64 {
  Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// 当前时间（UNIX 秒）
/// Current time (UNIX seconds)
pub fn now_s() -> i64 {
  Utc::now().timestamp()
}

/// 数据存储接口
/// Datastore interface
///
/// 每个方法对应一次原子操作。传输层故障映射为 [`crate::Error::Store`]，
/// 调用方视为"跳过本轮"而非任务状态变化。
/// Each method is one atomic operation. Transport failures map to
/// [`crate::Error::Store`], which callers treat as "skip this tick" rather
/// than a task-state change.
///
/// 生产后端需要的唯一索引：applications、queues、tasks 各自的
/// (account, application, name) 组合；attempts 还需要
/// {status, reserved, deleted}（租约扫描）与 {account, application, task}
/// （历史查询）两个普通索引。
/// Unique indexes a production backend needs: the (account, application,
/// name) tuples of applications, queues and tasks; attempts additionally
/// want non-unique indexes on {status, reserved, deleted} (the lease scan)
/// and {account, application, task} (history queries).
#[async_trait]
pub trait Store: Send + Sync {
  /// 探测连接
  /// Probe the connection
  async fn ping(&self) -> Result<()>;

  // === 账户 / Accounts ===

  async fn insert_account(&self, account: &Account) -> Result<()>;

  async fn get_account(&self, id: &Id) -> Result<Option<Account>>;

  /// 仅更新显示名称
  /// Update the display name only
  async fn rename_account(&self, id: &Id, name: Option<String>) -> Result<Option<Account>>;

  async fn authenticate_account(&self, id: &Id, key: &str) -> Result<bool>;

  /// 软删除账户，并在同一趟内向下传播到应用、队列、任务与尝试
  /// Tombstone the account and propagate downward to applications, queues,
  /// tasks and attempts in one pass
  async fn delete_account(&self, id: &Id) -> Result<()>;

  async fn list_accounts(&self, lp: &ListParams) -> Result<ListResult<Account>>;

  // === 应用 / Applications ===

  async fn insert_application(&self, application: &Application) -> Result<()>;

  async fn get_application(&self, account: &Id, name: &str) -> Result<Option<Application>>;

  /// 软删除应用及其队列、任务与尝试
  /// Tombstone the application with its queues, tasks and attempts
  async fn delete_application(&self, account: &Id, name: &str) -> Result<()>;

  async fn list_applications(
    &self,
    account: &Id,
    lp: &ListParams,
  ) -> Result<ListResult<Application>>;

  // === 队列 / Queues ===

  /// 创建队列；若 (account, application, name) 已存在则替换其重试模板与
  /// 在途上限（可用额度按在途数量重新校准），返回存储中的队列
  /// Create a queue; when (account, application, name) already exists,
  /// replace its retry template and in-flight cap (the available budget is
  /// re-based against the current in-flight count) and return the stored queue
  async fn upsert_queue(&self, queue: &Queue) -> Result<Queue>;

  async fn get_queue(&self, account: &Id, application: &str, name: &str)
    -> Result<Option<Queue>>;

  async fn get_queue_by_id(&self, id: &Id) -> Result<Option<Queue>>;

  /// 软删除队列及其任务与尝试
  /// Tombstone the queue with its tasks and attempts
  async fn delete_queue(&self, account: &Id, application: &str, name: &str) -> Result<()>;

  /// 软删除应用下除 default 外的所有队列及其任务与尝试
  /// Tombstone all non-default queues of an application with their tasks
  /// and attempts
  async fn delete_queues(&self, account: &Id, application: &str) -> Result<()>;

  async fn list_queues(
    &self,
    account: &Id,
    application: &str,
    lp: &ListParams,
  ) -> Result<ListResult<Queue>>;

  /// 为尝试占用一个在途额度，返回队列是否已满
  /// Claim an in-flight slot for the attempt, returning whether the queue is full
  ///
  /// 幂等：已在途的尝试直接返回未满。条件更新保证额度不为负。
  /// Idempotent: an attempt already in flight reports not-full. The
  /// conditional update guarantees the budget never goes negative.
  async fn enqueue_in_flight(&self, queue_id: &Id, attempt_id: &Id) -> Result<bool>;

  /// 释放尝试占用的在途额度；不在途时为无操作
  /// Release the attempt's in-flight slot; a no-op when not in flight
  async fn dequeue_in_flight(&self, queue_id: &Id, attempt_id: &Id) -> Result<()>;

  // === 任务 / Tasks ===

  /// 创建任务；若 (account, application, name) 已存在则替换其定义
  /// （保留 ID 与计数器），返回存储中的任务
  /// Create a task; when (account, application, name) already exists,
  /// replace its definition (id and counters are kept) and return the
  /// stored task
  async fn upsert_task(&self, task: &Task) -> Result<Task>;

  async fn get_task(&self, account: &Id, application: &str, name: &str) -> Result<Option<Task>>;

  /// 与 [`Store::get_task`] 不同，墓碑记录也会返回：推进状态机需要把
  /// 在途的完成应用到已软删除的任务上
  /// Unlike [`Store::get_task`] this returns tombstoned rows too: the
  /// advance machine must apply in-flight completions to soft-deleted tasks
  async fn get_task_by_id(&self, id: &Id) -> Result<Option<Task>>;

  /// 软删除任务及其尝试
  /// Tombstone the task with its attempts
  async fn delete_task(&self, account: &Id, application: &str, name: &str) -> Result<()>;

  /// 软删除应用下的所有任务及其尝试
  /// Tombstone all tasks of an application with their attempts
  async fn delete_tasks(&self, account: &Id, application: &str) -> Result<()>;

  async fn list_tasks(
    &self,
    account: &Id,
    application: &str,
    lp: &ListParams,
  ) -> Result<ListResult<Task>>;

  /// 应用一次推进更新（见 [`TaskAdvance`]），返回更新后的任务
  /// Apply one advance update (see [`TaskAdvance`]), returning the updated task
  async fn apply_task_advance(&self, task_id: &Id, advance: &TaskAdvance)
    -> Result<Option<Task>>;

  /// 当任务的 current_attempt 仍为给定值时，置 `attempt_queued = true`
  /// Set `attempt_queued = true` while the task's current_attempt still
  /// matches the given id
  ///
  /// 返回是否发生了更新。
  /// Returns whether an update happened.
  async fn set_attempt_queued(&self, task_id: &Id, current_attempt: &Id) -> Result<bool>;

  /// 为任务指定新的 current_attempt（完整性循环使用）
  /// Assign a fresh current_attempt to the task (used by the integrity loop)
  async fn assign_current_attempt(
    &self,
    task_id: &Id,
    current_attempt: &Id,
    attempt_updated: i64,
  ) -> Result<()>;

  /// 立即触发任务：置 `at`、激活并指定新的 current_attempt
  /// Fire the task now: set `at`, activate, and assign a new current_attempt
  async fn force_task_fire(&self, task_id: &Id, current_attempt: &Id, at: i64)
    -> Result<Option<Task>>;

  /// 活跃、未删除、`attempt_queued == false` 且 `attempt_updated` 早于
  /// 给定时刻的任务
  /// Active, non-deleted tasks with `attempt_queued == false` whose
  /// `attempt_updated` is older than the cutoff
  async fn stale_unqueued_tasks(&self, cutoff: i64, limit: usize) -> Result<Vec<Task>>;

  // === 尝试 / Attempts ===

  /// 插入尝试；同 ID 已存在时为无操作（完整性循环可安全重建）
  /// Insert an attempt; a no-op when the id already exists (the integrity
  /// loop may safely recreate)
  async fn insert_attempt(&self, attempt: &Attempt) -> Result<()>;

  async fn get_attempt(&self, id: &Id) -> Result<Option<Attempt>>;

  /// 列出一个任务的尝试历史，支持 `status` 过滤器
  /// List a task's attempt history, honouring a `status` filter
  async fn list_attempts(
    &self,
    account: &Id,
    application: &str,
    task: &str,
    lp: &ListParams,
  ) -> Result<ListResult<Attempt>>;

  /// 软删除任务的全部待执行尝试，返回是否有记录被标记
  /// Tombstone all pending attempts of a task, returning whether any
  /// record was marked
  async fn delete_pending_attempts(&self, task_id: &Id) -> Result<bool>;

  /// 租约抢占：原子地找到一个到期的尝试并续上 `ttr` 秒的租约
  /// Lease grab: atomically find one due attempt and stamp a `ttr`-second lease
  ///
  /// 匹配 `{status ∈ {pending, running}, reserved < now, deleted = false,
  /// queue_id ∉ excluded}` 中 `reserved` 最小者，置
  /// `reserved = now + ttr`、`status = running` 并返回更新后的记录。
  /// Matches the lowest `reserved` among `{status ∈ {pending, running},
  /// reserved < now, deleted = false, queue_id ∉ excluded}`, sets
  /// `reserved = now + ttr` and `status = running`, and returns the updated
  /// record.
  async fn reserve_next_attempt(&self, ttr: i64, excluded_queues: &[Id])
    -> Result<Option<Attempt>>;

  /// 将租约延长到 `now + seconds`
  /// Extend the lease to `now + seconds`
  async fn touch_attempt(&self, id: &Id, seconds: i64) -> Result<()>;

  /// 写入终态：`finished`、状态、状态码与说明，返回更新后的记录
  /// Write the terminal state: `finished`, status, code and message,
  /// returning the updated record
  async fn finish_attempt(
    &self,
    id: &Id,
    status: AttemptStatus,
    status_code: i32,
    status_message: &str,
  ) -> Result<Option<Attempt>>;

  /// 标记结果已应用到所属任务
  /// Mark the outcome as applied to the parent task
  async fn ack_attempt(&self, id: &Id) -> Result<()>;

  /// 已完成但尚未应用到任务、且完成时间早于给定时刻的尝试
  /// Terminal attempts not yet applied to their task whose completion is
  /// older than the cutoff
  async fn unacked_attempts(&self, cutoff: i64, limit: usize) -> Result<Vec<Attempt>>;

  /// 物理删除完成时间早于 `now - older_than` 秒的尝试，返回删除数量
  /// Remove attempts finished more than `older_than` seconds ago,
  /// returning how many were removed
  async fn clean_finished_attempts(&self, older_than: i64) -> Result<usize>;

  /// 已软删除的尝试
  /// Tombstoned attempts
  async fn deleted_attempts(&self, limit: usize) -> Result<Vec<Attempt>>;

  /// 物理删除一条尝试
  /// Physically remove one attempt
  async fn remove_attempt(&self, id: &Id) -> Result<()>;

  /// 物理删除所有软删除的任务、队列、应用与账户（子先父后）
  /// Physically remove all tombstoned tasks, queues, applications and
  /// accounts (children first)
  async fn purge_deleted(&self) -> Result<()>;
}
