//! 内存存储实现
//! Memory store implementation
//!
//! 使用内存数据结构实现全部 [`Store`] 操作，不依赖任何外部服务。
//! Implements every [`Store`] operation on in-memory data structures
//! without any external service dependencies.
//!
//! 所有五个集合都放在同一把 `RwLock` 后面，因此每个方法天然就是一次
//! 原子条件更新，与生产环境文档存储的单文档隔离语义一致。
//! All five collections sit behind one `RwLock`, so each method is
//! naturally one atomic conditional update, matching the per-document
//! isolation of the production document store.

use crate::base::{now_ns, now_s, Store};
use crate::error::Result;
use crate::models::{
  Account, Application, Attempt, AttemptStatus, Id, ListParams, ListResult, Queue, Task,
  TaskAdvance,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// 内存中的五个集合
/// The five in-memory collections
#[derive(Default)]
pub struct MemoryState {
  pub accounts: HashMap<Id, Account>,
  pub applications: HashMap<Id, Application>,
  pub queues: HashMap<Id, Queue>,
  pub tasks: HashMap<Id, Task>,
  pub attempts: HashMap<Id, Attempt>,
}

/// 内存存储
/// Memory store
#[derive(Default)]
pub struct MemoryStore {
  state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
  /// 创建空的内存存储
  /// Create an empty memory store
  pub fn new() -> Self {
    Self::default()
  }
}

fn newest_first<T, F: Fn(&T) -> &Id>(mut items: Vec<T>, id: F) -> Vec<T> {
  items.sort_by(|a, b| id(b).cmp(id(a)));
  items
}

#[async_trait]
impl Store for MemoryStore {
  async fn ping(&self) -> Result<()> {
    Ok(())
  }

  // === 账户 / Accounts ===

  async fn insert_account(&self, account: &Account) -> Result<()> {
    let mut state = self.state.write().await;
    state.accounts.insert(account.id.clone(), account.clone());
    Ok(())
  }

  async fn get_account(&self, id: &Id) -> Result<Option<Account>> {
    let state = self.state.read().await;
    Ok(state.accounts.get(id).filter(|a| !a.deleted).cloned())
  }

  async fn rename_account(&self, id: &Id, name: Option<String>) -> Result<Option<Account>> {
    let mut state = self.state.write().await;
    let Some(account) = state.accounts.get_mut(id).filter(|a| !a.deleted) else {
      return Ok(None);
    };
    if name.is_some() {
      account.name = name;
    }
    Ok(Some(account.clone()))
  }

  async fn authenticate_account(&self, id: &Id, key: &str) -> Result<bool> {
    let state = self.state.read().await;
    Ok(
      state
        .accounts
        .get(id)
        .filter(|a| !a.deleted)
        .is_some_and(|a| a.key == key),
    )
  }

  async fn delete_account(&self, id: &Id) -> Result<()> {
    let mut state = self.state.write().await;
    if let Some(account) = state.accounts.get_mut(id) {
      account.deleted = true;
    }
    for application in state.applications.values_mut() {
      if application.account == *id {
        application.deleted = true;
      }
    }
    for queue in state.queues.values_mut() {
      if queue.account == *id {
        queue.deleted = true;
      }
    }
    for task in state.tasks.values_mut() {
      if task.account == *id {
        task.deleted = true;
      }
    }
    for attempt in state.attempts.values_mut() {
      if attempt.account == *id {
        attempt.deleted = true;
      }
    }
    Ok(())
  }

  async fn list_accounts(&self, lp: &ListParams) -> Result<ListResult<Account>> {
    let state = self.state.read().await;
    let items: Vec<Account> = state
      .accounts
      .values()
      .filter(|a| !a.deleted)
      .cloned()
      .collect();
    Ok(ListResult::paginate(newest_first(items, |a| &a.id), lp))
  }

  // === 应用 / Applications ===

  async fn insert_application(&self, application: &Application) -> Result<()> {
    let mut state = self.state.write().await;
    state
      .applications
      .insert(application.id.clone(), application.clone());
    Ok(())
  }

  async fn get_application(&self, account: &Id, name: &str) -> Result<Option<Application>> {
    let state = self.state.read().await;
    Ok(
      state
        .applications
        .values()
        .find(|a| !a.deleted && a.account == *account && a.name == name)
        .cloned(),
    )
  }

  async fn delete_application(&self, account: &Id, name: &str) -> Result<()> {
    let mut state = self.state.write().await;
    for application in state.applications.values_mut() {
      if application.account == *account && application.name == name {
        application.deleted = true;
      }
    }
    for queue in state.queues.values_mut() {
      if queue.account == *account && queue.application == name {
        queue.deleted = true;
      }
    }
    for task in state.tasks.values_mut() {
      if task.account == *account && task.application == name {
        task.deleted = true;
      }
    }
    for attempt in state.attempts.values_mut() {
      if attempt.account == *account && attempt.application == name {
        attempt.deleted = true;
      }
    }
    Ok(())
  }

  async fn list_applications(
    &self,
    account: &Id,
    lp: &ListParams,
  ) -> Result<ListResult<Application>> {
    let state = self.state.read().await;
    let items: Vec<Application> = state
      .applications
      .values()
      .filter(|a| !a.deleted && a.account == *account)
      .cloned()
      .collect();
    Ok(ListResult::paginate(newest_first(items, |a| &a.id), lp))
  }

  // === 队列 / Queues ===

  async fn upsert_queue(&self, queue: &Queue) -> Result<Queue> {
    let mut state = self.state.write().await;
    let existing = state
      .queues
      .values()
      .find(|q| {
        !q.deleted
          && q.account == queue.account
          && q.application == queue.application
          && q.name == queue.name
      })
      .map(|q| q.id.clone());
    match existing.and_then(|id| state.queues.get_mut(&id)) {
      Some(stored) => {
        stored.retry = queue.retry.clone();
        stored.max_in_flight = queue.max_in_flight;
        let in_flight = stored.attempts_in_flight.len() as u32;
        stored.available_in_flight = stored.max_in_flight.saturating_sub(in_flight);
        Ok(stored.clone())
      }
      None => {
        state.queues.insert(queue.id.clone(), queue.clone());
        Ok(queue.clone())
      }
    }
  }

  async fn get_queue(
    &self,
    account: &Id,
    application: &str,
    name: &str,
  ) -> Result<Option<Queue>> {
    let state = self.state.read().await;
    Ok(
      state
        .queues
        .values()
        .find(|q| {
          !q.deleted && q.account == *account && q.application == application && q.name == name
        })
        .cloned(),
    )
  }

  async fn get_queue_by_id(&self, id: &Id) -> Result<Option<Queue>> {
    let state = self.state.read().await;
    Ok(state.queues.get(id).filter(|q| !q.deleted).cloned())
  }

  async fn delete_queue(&self, account: &Id, application: &str, name: &str) -> Result<()> {
    let mut state = self.state.write().await;
    for queue in state.queues.values_mut() {
      if queue.account == *account && queue.application == application && queue.name == name {
        queue.deleted = true;
      }
    }
    for task in state.tasks.values_mut() {
      if task.account == *account && task.application == application && task.queue == name {
        task.deleted = true;
      }
    }
    for attempt in state.attempts.values_mut() {
      if attempt.account == *account && attempt.application == application && attempt.queue == name
      {
        attempt.deleted = true;
      }
    }
    Ok(())
  }

  async fn delete_queues(&self, account: &Id, application: &str) -> Result<()> {
    let mut state = self.state.write().await;
    let mut names = Vec::new();
    for queue in state.queues.values_mut() {
      if queue.account == *account
        && queue.application == application
        && queue.name != crate::base::constants::DEFAULT_QUEUE_NAME
      {
        queue.deleted = true;
        names.push(queue.name.clone());
      }
    }
    for task in state.tasks.values_mut() {
      if task.account == *account
        && task.application == application
        && names.contains(&task.queue)
      {
        task.deleted = true;
      }
    }
    for attempt in state.attempts.values_mut() {
      if attempt.account == *account
        && attempt.application == application
        && names.contains(&attempt.queue)
      {
        attempt.deleted = true;
      }
    }
    Ok(())
  }

  async fn list_queues(
    &self,
    account: &Id,
    application: &str,
    lp: &ListParams,
  ) -> Result<ListResult<Queue>> {
    let state = self.state.read().await;
    let items: Vec<Queue> = state
      .queues
      .values()
      .filter(|q| !q.deleted && q.account == *account && q.application == application)
      .cloned()
      .collect();
    Ok(ListResult::paginate(newest_first(items, |q| &q.id), lp))
  }

  async fn enqueue_in_flight(&self, queue_id: &Id, attempt_id: &Id) -> Result<bool> {
    let mut state = self.state.write().await;
    let Some(queue) = state.queues.get_mut(queue_id) else {
      // No queue, no slot.
      return Ok(true);
    };
    if queue.attempts_in_flight.contains(attempt_id) {
      return Ok(false);
    }
    if queue.available_in_flight == 0 {
      return Ok(true);
    }
    queue.available_in_flight -= 1;
    queue.attempts_in_flight.push(attempt_id.clone());
    Ok(false)
  }

  async fn dequeue_in_flight(&self, queue_id: &Id, attempt_id: &Id) -> Result<()> {
    let mut state = self.state.write().await;
    if let Some(queue) = state.queues.get_mut(queue_id) {
      if let Some(pos) = queue.attempts_in_flight.iter().position(|id| id == attempt_id) {
        queue.attempts_in_flight.remove(pos);
        queue.available_in_flight = (queue.available_in_flight + 1).min(queue.max_in_flight);
      }
    }
    Ok(())
  }

  // === 任务 / Tasks ===

  async fn upsert_task(&self, task: &Task) -> Result<Task> {
    let mut state = self.state.write().await;
    let existing = state
      .tasks
      .values()
      .find(|t| {
        !t.deleted
          && t.account == task.account
          && t.application == task.application
          && t.name == task.name
      })
      .map(|t| t.id.clone());
    match existing.and_then(|id| state.tasks.get_mut(&id)) {
      Some(stored) => {
        stored.url = task.url.clone();
        stored.method = task.method.clone();
        stored.headers = task.headers.clone();
        stored.payload = task.payload.clone();
        stored.auth = task.auth.clone();
        stored.schedule = task.schedule.clone();
        stored.at = task.at;
        stored.active = task.active;
        stored.retry = task.retry.clone();
        stored.queue = task.queue.clone();
        stored.queue_id = task.queue_id.clone();
        stored.current_attempt = task.current_attempt.clone();
        stored.attempt_queued = task.attempt_queued;
        stored.attempt_updated = task.attempt_updated;
        Ok(stored.clone())
      }
      None => {
        state.tasks.insert(task.id.clone(), task.clone());
        Ok(task.clone())
      }
    }
  }

  async fn get_task(&self, account: &Id, application: &str, name: &str) -> Result<Option<Task>> {
    let state = self.state.read().await;
    Ok(
      state
        .tasks
        .values()
        .find(|t| {
          !t.deleted && t.account == *account && t.application == application && t.name == name
        })
        .cloned(),
    )
  }

  async fn get_task_by_id(&self, id: &Id) -> Result<Option<Task>> {
    let state = self.state.read().await;
    Ok(state.tasks.get(id).cloned())
  }

  async fn delete_task(&self, account: &Id, application: &str, name: &str) -> Result<()> {
    let mut state = self.state.write().await;
    let mut task_ids = Vec::new();
    for task in state.tasks.values_mut() {
      if task.account == *account && task.application == application && task.name == name {
        task.deleted = true;
        task_ids.push(task.id.clone());
      }
    }
    for attempt in state.attempts.values_mut() {
      if task_ids.contains(&attempt.task_id) {
        attempt.deleted = true;
      }
    }
    Ok(())
  }

  async fn delete_tasks(&self, account: &Id, application: &str) -> Result<()> {
    let mut state = self.state.write().await;
    for task in state.tasks.values_mut() {
      if task.account == *account && task.application == application {
        task.deleted = true;
      }
    }
    for attempt in state.attempts.values_mut() {
      if attempt.account == *account && attempt.application == application {
        attempt.deleted = true;
      }
    }
    Ok(())
  }

  async fn list_tasks(
    &self,
    account: &Id,
    application: &str,
    lp: &ListParams,
  ) -> Result<ListResult<Task>> {
    let state = self.state.read().await;
    let items: Vec<Task> = state
      .tasks
      .values()
      .filter(|t| !t.deleted && t.account == *account && t.application == application)
      .cloned()
      .collect();
    Ok(ListResult::paginate(newest_first(items, |t| &t.id), lp))
  }

  async fn apply_task_advance(
    &self,
    task_id: &Id,
    advance: &TaskAdvance,
  ) -> Result<Option<Task>> {
    let mut state = self.state.write().await;
    let Some(task) = state.tasks.get_mut(task_id) else {
      return Ok(None);
    };
    task.status = advance.status;
    task.executed = advance.executed;
    task.at = advance.at;
    task.active = advance.at > 0;
    task.current_attempt = Some(advance.current_attempt.clone());
    task.attempt_queued = false;
    task.attempt_updated = advance.attempt_updated;
    task.executions += 1;
    if advance.error {
      task.errors += 1;
      task.last_error = advance.executed;
    } else {
      task.last_success = advance.executed;
    }
    let attempts = task.retry.attempts as i64 + advance.retry_attempts;
    task.retry.attempts = attempts.max(0) as u32;
    Ok(Some(task.clone()))
  }

  async fn set_attempt_queued(&self, task_id: &Id, current_attempt: &Id) -> Result<bool> {
    let mut state = self.state.write().await;
    let Some(task) = state
      .tasks
      .get_mut(task_id)
      .filter(|t| t.current_attempt.as_ref() == Some(current_attempt))
    else {
      return Ok(false);
    };
    task.attempt_queued = true;
    task.attempt_updated = now_ns();
    Ok(true)
  }

  async fn assign_current_attempt(
    &self,
    task_id: &Id,
    current_attempt: &Id,
    attempt_updated: i64,
  ) -> Result<()> {
    let mut state = self.state.write().await;
    if let Some(task) = state.tasks.get_mut(task_id) {
      task.current_attempt = Some(current_attempt.clone());
      task.attempt_queued = false;
      task.attempt_updated = attempt_updated;
    }
    Ok(())
  }

  async fn force_task_fire(
    &self,
    task_id: &Id,
    current_attempt: &Id,
    at: i64,
  ) -> Result<Option<Task>> {
    let mut state = self.state.write().await;
    let Some(task) = state.tasks.get_mut(task_id).filter(|t| !t.deleted) else {
      return Ok(None);
    };
    task.at = at;
    task.active = true;
    task.current_attempt = Some(current_attempt.clone());
    task.attempt_queued = false;
    task.attempt_updated = at;
    Ok(Some(task.clone()))
  }

  async fn stale_unqueued_tasks(&self, cutoff: i64, limit: usize) -> Result<Vec<Task>> {
    let state = self.state.read().await;
    let items: Vec<Task> = state
      .tasks
      .values()
      .filter(|t| t.active && !t.deleted && !t.attempt_queued && t.attempt_updated <= cutoff)
      .take(limit)
      .cloned()
      .collect();
    Ok(items)
  }

  // === 尝试 / Attempts ===

  async fn insert_attempt(&self, attempt: &Attempt) -> Result<()> {
    let mut state = self.state.write().await;
    state
      .attempts
      .entry(attempt.id.clone())
      .or_insert_with(|| attempt.clone());
    Ok(())
  }

  async fn get_attempt(&self, id: &Id) -> Result<Option<Attempt>> {
    let state = self.state.read().await;
    Ok(state.attempts.get(id).filter(|a| !a.deleted).cloned())
  }

  async fn list_attempts(
    &self,
    account: &Id,
    application: &str,
    task: &str,
    lp: &ListParams,
  ) -> Result<ListResult<Attempt>> {
    let state = self.state.read().await;
    let status = lp
      .filters
      .get("status")
      .and_then(|s| s.parse::<AttemptStatus>().ok());
    let items: Vec<Attempt> = state
      .attempts
      .values()
      .filter(|a| {
        !a.deleted
          && a.account == *account
          && a.application == application
          && a.task == task
          && status.map_or(true, |s| a.status == s)
      })
      .cloned()
      .collect();
    Ok(ListResult::paginate(newest_first(items, |a| &a.id), lp))
  }

  async fn delete_pending_attempts(&self, task_id: &Id) -> Result<bool> {
    let mut state = self.state.write().await;
    let mut any = false;
    for attempt in state.attempts.values_mut() {
      if attempt.task_id == *task_id && attempt.status == AttemptStatus::Pending && !attempt.deleted
      {
        attempt.deleted = true;
        any = true;
      }
    }
    Ok(any)
  }

  async fn reserve_next_attempt(
    &self,
    ttr: i64,
    excluded_queues: &[Id],
  ) -> Result<Option<Attempt>> {
    let mut state = self.state.write().await;
    let now = now_ns();
    let candidate = state
      .attempts
      .values_mut()
      .filter(|a| {
        !a.deleted
          && matches!(a.status, AttemptStatus::Pending | AttemptStatus::Running)
          && a.reserved < now
          && !excluded_queues.contains(&a.queue_id)
      })
      .min_by(|a, b| (a.reserved, &a.id).cmp(&(b.reserved, &b.id)));
    let Some(attempt) = candidate else {
      return Ok(None);
    };
    attempt.reserved = now + ttr * NANOS_PER_SEC;
    attempt.status = AttemptStatus::Running;
    Ok(Some(attempt.clone()))
  }

  async fn touch_attempt(&self, id: &Id, seconds: i64) -> Result<()> {
    let mut state = self.state.write().await;
    if let Some(attempt) = state.attempts.get_mut(id) {
      attempt.reserved = now_ns() + seconds * NANOS_PER_SEC;
    }
    Ok(())
  }

  async fn finish_attempt(
    &self,
    id: &Id,
    status: AttemptStatus,
    status_code: i32,
    status_message: &str,
  ) -> Result<Option<Attempt>> {
    let mut state = self.state.write().await;
    let Some(attempt) = state.attempts.get_mut(id) else {
      return Ok(None);
    };
    attempt.finished = now_s();
    attempt.status = status;
    attempt.status_code = status_code;
    attempt.status_message = status_message.to_string();
    Ok(Some(attempt.clone()))
  }

  async fn ack_attempt(&self, id: &Id) -> Result<()> {
    let mut state = self.state.write().await;
    if let Some(attempt) = state.attempts.get_mut(id) {
      attempt.acked = true;
    }
    Ok(())
  }

  async fn unacked_attempts(&self, cutoff: i64, limit: usize) -> Result<Vec<Attempt>> {
    let state = self.state.read().await;
    let items: Vec<Attempt> = state
      .attempts
      .values()
      .filter(|a| {
        !a.deleted && a.status.is_terminal() && !a.acked && a.finished > 0 && a.finished <= cutoff
      })
      .take(limit)
      .cloned()
      .collect();
    Ok(items)
  }

  async fn clean_finished_attempts(&self, older_than: i64) -> Result<usize> {
    let mut state = self.state.write().await;
    let cutoff = now_s() - older_than;
    let before = state.attempts.len();
    state
      .attempts
      .retain(|_, a| !(a.finished > 0 && a.finished <= cutoff));
    Ok(before - state.attempts.len())
  }

  async fn deleted_attempts(&self, limit: usize) -> Result<Vec<Attempt>> {
    let state = self.state.read().await;
    let items: Vec<Attempt> = state
      .attempts
      .values()
      .filter(|a| a.deleted)
      .take(limit)
      .cloned()
      .collect();
    Ok(items)
  }

  async fn remove_attempt(&self, id: &Id) -> Result<()> {
    let mut state = self.state.write().await;
    state.attempts.remove(id);
    Ok(())
  }

  async fn purge_deleted(&self) -> Result<()> {
    let mut state = self.state.write().await;
    state.tasks.retain(|_, t| !t.deleted);
    state.queues.retain(|_, q| !q.deleted);
    state.applications.retain(|_, a| !a.deleted);
    state.accounts.retain(|_, a| !a.deleted);
    Ok(())
  }
}
