//! 入站操作层
//! Inbound operation surface
//!
//! HTTP 门面调用的全部操作：账户、应用、队列与任务的增删查，尝试历史的
//! 读取，以及立即触发任务。每个操作组合若干次存储原子调用；门面本身
//! （路由、认证、序列化）在别处实现。
//! Every operation the HTTP façade calls: account, application, queue and
//! task CRUD, attempt history reads, and firing a task immediately. Each
//! operation composes a few atomic store calls; the façade itself (routing,
//! auth, serialization) lives elsewhere.

use crate::base::constants::{DEFAULT_APPLICATION_NAME, DEFAULT_QUEUE_NAME};
use crate::base::{now_ns, Store};
use crate::error::{Error, Result};
use crate::models::{
  schedule, Account, Application, Attempt, HttpAuth, Id, ListParams, ListResult, Queue, Retry,
  Task, TaskStatus,
};
use std::collections::HashMap;
use std::sync::Arc;

/// 新任务的描述；未设置的字段取默认值
/// Description of a new task; unset fields take defaults
#[derive(Debug, Clone, Default)]
pub struct NewTask {
  pub name: String,
  pub url: String,
  /// 默认 POST；请求体只对 POST 保留
  /// Defaults to POST; the payload is only kept for POST
  pub method: String,
  pub headers: HashMap<String, String>,
  pub payload: String,
  pub auth: HttpAuth,
  /// cron 表达式；为空表示立即执行一次
  /// Cron spec; empty fires once, now
  pub schedule: String,
  /// 不设置时采用队列的重试模板
  /// Falls back to the queue's retry template when unset
  pub retry: Option<Retry>,
  /// 不设置时使用 default 队列
  /// Uses the default queue when unset
  pub queue: String,
}

/// 操作入口，包装共享存储
/// Operation entry point wrapping the shared store
#[derive(Clone)]
pub struct Manager {
  store: Arc<dyn Store>,
}

impl Manager {
  /// 创建 Manager
  /// Create a Manager
  pub fn new(store: Arc<dyn Store>) -> Self {
    Self { store }
  }

  // === 账户 / Accounts ===

  /// 创建账户，同时准备好 default 应用与 default 队列
  /// Create an account along with its default application and queue
  pub async fn new_account(&self, name: Option<String>) -> Result<Account> {
    let account = Account::new(name);
    self.store.insert_account(&account).await?;
    let application = Application::new(account.id.clone(), DEFAULT_APPLICATION_NAME);
    self.store.insert_application(&application).await?;
    let queue = Queue::new(
      account.id.clone(),
      DEFAULT_APPLICATION_NAME,
      DEFAULT_QUEUE_NAME,
      None,
      0,
    );
    self.store.upsert_queue(&queue).await?;
    Ok(account)
  }

  pub async fn get_account(&self, id: &Id) -> Result<Account> {
    self
      .store
      .get_account(id)
      .await?
      .ok_or_else(|| Error::not_found("account"))
  }

  pub async fn update_account(&self, id: &Id, name: Option<String>) -> Result<Account> {
    self
      .store
      .rename_account(id, name)
      .await?
      .ok_or_else(|| Error::not_found("account"))
  }

  pub async fn authenticate_account(&self, id: &Id, key: &str) -> Result<bool> {
    self.store.authenticate_account(id, key).await
  }

  pub async fn delete_account(&self, id: &Id) -> Result<()> {
    self.store.delete_account(id).await
  }

  pub async fn list_accounts(&self, lp: &ListParams) -> Result<ListResult<Account>> {
    self.store.list_accounts(lp).await
  }

  // === 应用 / Applications ===

  /// 创建应用；default 为保留名称
  /// Create an application; "default" is reserved
  pub async fn new_application(&self, account: &Id, name: &str) -> Result<Application> {
    if name == DEFAULT_APPLICATION_NAME {
      return Err(Error::reserved("application", name));
    }
    if let Some(existing) = self.store.get_application(account, name).await? {
      return Ok(existing);
    }
    let application = Application::new(account.clone(), name);
    self.store.insert_application(&application).await?;
    // Every application starts with a default queue.
    let queue = Queue::new(account.clone(), name, DEFAULT_QUEUE_NAME, None, 0);
    self.store.upsert_queue(&queue).await?;
    Ok(application)
  }

  pub async fn get_application(&self, account: &Id, name: &str) -> Result<Application> {
    self
      .store
      .get_application(account, name)
      .await?
      .ok_or_else(|| Error::not_found("application"))
  }

  /// 删除应用及其全部子记录；default 不可删除
  /// Delete an application with everything under it; "default" is protected
  pub async fn delete_application(&self, account: &Id, name: &str) -> Result<()> {
    if name == DEFAULT_APPLICATION_NAME {
      return Err(Error::reserved("application", name));
    }
    self.store.delete_application(account, name).await
  }

  pub async fn list_applications(
    &self,
    account: &Id,
    lp: &ListParams,
  ) -> Result<ListResult<Application>> {
    self.store.list_applications(account, lp).await
  }

  // === 队列 / Queues ===

  /// 创建或重定义队列
  /// Create or redefine a queue
  pub async fn new_queue(
    &self,
    account: &Id,
    application: &str,
    name: &str,
    retry: Option<Retry>,
    max_in_flight: u32,
  ) -> Result<Queue> {
    if self.store.get_application(account, application).await?.is_none() {
      return Err(Error::not_found("application"));
    }
    let queue = Queue::new(account.clone(), application, name, retry, max_in_flight);
    self.store.upsert_queue(&queue).await
  }

  pub async fn get_queue(&self, account: &Id, application: &str, name: &str) -> Result<Queue> {
    self
      .store
      .get_queue(account, application, name)
      .await?
      .ok_or_else(|| Error::not_found("queue"))
  }

  /// 删除队列及其任务与尝试；default 不可删除
  /// Delete a queue with its tasks and attempts; "default" is protected
  pub async fn delete_queue(&self, account: &Id, application: &str, name: &str) -> Result<()> {
    if name == DEFAULT_QUEUE_NAME {
      return Err(Error::reserved("queue", name));
    }
    self.store.delete_queue(account, application, name).await
  }

  /// 删除应用下除 default 外的所有队列
  /// Delete every non-default queue of an application
  pub async fn delete_queues(&self, account: &Id, application: &str) -> Result<()> {
    self.store.delete_queues(account, application).await
  }

  pub async fn list_queues(
    &self,
    account: &Id,
    application: &str,
    lp: &ListParams,
  ) -> Result<ListResult<Queue>> {
    self.store.list_queues(account, application, lp).await
  }

  // === 任务 / Tasks ===

  /// 注册（或重定义）一个任务并播种它的第一次尝试
  /// Register (or redefine) a task and seed its first attempt
  pub async fn new_task(&self, account: &Id, application: &str, spec: NewTask) -> Result<Task> {
    if self.store.get_application(account, application).await?.is_none() {
      return Err(Error::not_found("application"));
    }

    let queue_name = if spec.queue.is_empty() {
      DEFAULT_QUEUE_NAME.to_string()
    } else {
      spec.queue.clone()
    };
    let queue = match self.store.get_queue(account, application, &queue_name).await? {
      Some(queue) => queue,
      None if queue_name == DEFAULT_QUEUE_NAME => {
        let queue = Queue::new(account.clone(), application, DEFAULT_QUEUE_NAME, None, 0);
        self.store.upsert_queue(&queue).await?
      }
      None => return Err(Error::not_found("queue")),
    };

    let method = if spec.method.is_empty() {
      "POST".to_string()
    } else {
      spec.method.to_uppercase()
    };
    let payload = if method == "POST" {
      spec.payload
    } else {
      String::new()
    };
    let at = if spec.schedule.is_empty() {
      now_ns()
    } else {
      schedule::next_fire(&spec.schedule, chrono::Utc::now())?
    };
    let retry = match spec.retry {
      Some(mut retry) => {
        retry.set_default();
        retry
      }
      None => queue.retry.clone(),
    };

    let current = Id::new();
    let task = Task {
      id: Id::new(),
      account: account.clone(),
      application: application.to_string(),
      name: spec.name,
      url: spec.url,
      method,
      headers: spec.headers,
      payload,
      auth: spec.auth,
      schedule: spec.schedule,
      at,
      active: at > 0,
      status: TaskStatus::Pending,
      retry,
      current_attempt: Some(current.clone()),
      attempt_queued: false,
      attempt_updated: now_ns(),
      executed: 0,
      executions: 0,
      errors: 0,
      last_success: 0,
      last_error: 0,
      queue: queue.name.clone(),
      queue_id: queue.id.clone(),
      deleted: false,
    };
    let stored = self.store.upsert_task(&task).await?;
    // A redefined task's stale pending attempts must not fire.
    self.store.delete_pending_attempts(&stored.id).await?;
    if stored.active && stored.at > 0 {
      let attempt = Attempt::from_task(&stored, current);
      self.store.insert_attempt(&attempt).await?;
      self.store.set_attempt_queued(&stored.id, &attempt.id).await?;
    }
    Ok(stored)
  }

  pub async fn get_task(&self, account: &Id, application: &str, name: &str) -> Result<Task> {
    self
      .store
      .get_task(account, application, name)
      .await?
      .ok_or_else(|| Error::not_found("task"))
  }

  pub async fn delete_task(&self, account: &Id, application: &str, name: &str) -> Result<()> {
    self.store.delete_task(account, application, name).await
  }

  pub async fn delete_tasks(&self, account: &Id, application: &str) -> Result<()> {
    self.store.delete_tasks(account, application).await
  }

  pub async fn list_tasks(
    &self,
    account: &Id,
    application: &str,
    lp: &ListParams,
  ) -> Result<ListResult<Task>> {
    self.store.list_tasks(account, application, lp).await
  }

  /// 立即触发一个任务：作废待执行的尝试，换上一个此刻到期的新尝试
  /// Fire a task now: void its pending attempts and put a fresh attempt,
  /// due immediately, in their place
  pub async fn force_attempt_for_task(
    &self,
    account: &Id,
    application: &str,
    name: &str,
  ) -> Result<Attempt> {
    let task = self.get_task(account, application, name).await?;
    self.store.delete_pending_attempts(&task.id).await?;
    let current = Id::new();
    let fired = self
      .store
      .force_task_fire(&task.id, &current, now_ns())
      .await?
      .ok_or_else(|| Error::not_found("task"))?;
    let attempt = Attempt::from_task(&fired, current);
    self.store.insert_attempt(&attempt).await?;
    self.store.set_attempt_queued(&fired.id, &attempt.id).await?;
    Ok(attempt)
  }

  // === 尝试 / Attempts ===

  pub async fn get_attempt(&self, id: &Id) -> Result<Attempt> {
    self
      .store
      .get_attempt(id)
      .await?
      .ok_or_else(|| Error::not_found("attempt"))
  }

  pub async fn get_attempts(
    &self,
    account: &Id,
    application: &str,
    task: &str,
    lp: &ListParams,
  ) -> Result<ListResult<Attempt>> {
    self.store.list_attempts(account, application, task, lp).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::memdb::MemoryStore;

  fn manager() -> Manager {
    Manager::new(Arc::new(MemoryStore::new()))
  }

  fn ping_task(name: &str) -> NewTask {
    NewTask {
      name: name.to_string(),
      url: "http://example.com/hook".to_string(),
      ..NewTask::default()
    }
  }

  #[tokio::test]
  async fn test_new_account_prepares_defaults() {
    let m = manager();
    let account = m.new_account(Some("acme".to_string())).await.unwrap();
    assert!(m
      .get_application(&account.id, DEFAULT_APPLICATION_NAME)
      .await
      .is_ok());
    let queue = m
      .get_queue(&account.id, DEFAULT_APPLICATION_NAME, DEFAULT_QUEUE_NAME)
      .await
      .unwrap();
    assert_eq!(queue.max_in_flight, 10);
    assert!(m
      .authenticate_account(&account.id, &account.key)
      .await
      .unwrap());
    assert!(!m.authenticate_account(&account.id, "wrong").await.unwrap());
  }

  #[tokio::test]
  async fn test_reserved_names() {
    let m = manager();
    let account = m.new_account(None).await.unwrap();
    assert!(matches!(
      m.new_application(&account.id, "default").await,
      Err(Error::Reserved { .. })
    ));
    assert!(matches!(
      m.delete_application(&account.id, "default").await,
      Err(Error::Reserved { .. })
    ));
    assert!(matches!(
      m.delete_queue(&account.id, "default", "default").await,
      Err(Error::Reserved { .. })
    ));
  }

  #[tokio::test]
  async fn test_new_task_seeds_attempt() {
    let m = manager();
    let account = m.new_account(None).await.unwrap();
    let task = m
      .new_task(&account.id, "default", ping_task("ping"))
      .await
      .unwrap();
    assert_eq!(task.method, "POST");
    assert!(task.active);
    assert_eq!(task.queue, "default");
    assert_eq!(task.retry.max_attempts, 10);

    let stored = m.get_task(&account.id, "default", "ping").await.unwrap();
    assert!(stored.attempt_queued);
    let current = stored.current_attempt.clone().unwrap();
    let attempt = m.get_attempt(&current).await.unwrap();
    assert_eq!(attempt.task_id, stored.id);
    assert_eq!(attempt.at, stored.at);
  }

  #[tokio::test]
  async fn test_new_task_drops_payload_for_get() {
    let m = manager();
    let account = m.new_account(None).await.unwrap();
    let mut spec = ping_task("ping");
    spec.method = "get".to_string();
    spec.payload = "ignored".to_string();
    let task = m.new_task(&account.id, "default", spec).await.unwrap();
    assert_eq!(task.method, "GET");
    assert!(task.payload.is_empty());
  }

  #[tokio::test]
  async fn test_new_task_invalid_schedule() {
    let m = manager();
    let account = m.new_account(None).await.unwrap();
    let mut spec = ping_task("ping");
    spec.schedule = "not a cron spec".to_string();
    assert!(matches!(
      m.new_task(&account.id, "default", spec).await,
      Err(Error::Schedule { .. })
    ));
  }

  #[tokio::test]
  async fn test_new_task_unknown_queue() {
    let m = manager();
    let account = m.new_account(None).await.unwrap();
    let mut spec = ping_task("ping");
    spec.queue = "missing".to_string();
    assert!(matches!(
      m.new_task(&account.id, "default", spec).await,
      Err(Error::NotFound { kind: "queue" })
    ));
  }

  #[tokio::test]
  async fn test_redefining_task_voids_pending_attempts() {
    let m = manager();
    let account = m.new_account(None).await.unwrap();
    let first = m
      .new_task(&account.id, "default", ping_task("ping"))
      .await
      .unwrap();
    let first_attempt = first.current_attempt.clone().unwrap();

    let second = m
      .new_task(&account.id, "default", ping_task("ping"))
      .await
      .unwrap();
    assert_eq!(second.id, first.id);
    assert_ne!(second.current_attempt, first.current_attempt);
    // The original seed attempt was tombstoned.
    assert!(m.get_attempt(&first_attempt).await.is_err());
  }

  #[tokio::test]
  async fn test_force_attempt_for_task() {
    let m = manager();
    let account = m.new_account(None).await.unwrap();
    let mut spec = ping_task("nightly");
    spec.schedule = "0 3 * * *".to_string();
    let task = m.new_task(&account.id, "default", spec).await.unwrap();
    let scheduled_at = task.at;

    let attempt = m
      .force_attempt_for_task(&account.id, "default", "nightly")
      .await
      .unwrap();
    assert!(attempt.at < scheduled_at);
    let task = m.get_task(&account.id, "default", "nightly").await.unwrap();
    assert_eq!(task.current_attempt, Some(attempt.id.clone()));
    assert!(task.attempt_queued);

    let lp = ListParams::default();
    let attempts = m
      .get_attempts(&account.id, "default", "nightly", &lp)
      .await
      .unwrap();
    // The forced attempt replaced the scheduled one.
    assert_eq!(attempts.total, 1);
  }
}
