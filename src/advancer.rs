//! 任务推进状态机
//! Task advance state machine
//!
//! 一次尝试进入终态后，决定任务的下一次触发时间（按计划重复、按退避
//! 重试或停止），通过一次原子更新应用到任务，随后为下一次触发播种新的
//! 尝试记录并确认本次尝试。
//! After an attempt reaches a terminal state, decides the task's next
//! firing (recur per schedule, retry with backoff, or stop), applies it to
//! the task in one atomic update, then seeds the attempt record of the
//! next firing and acks the completed one.
//!
//! 幂等性：已确认的尝试直接无操作；非最新的尝试（任务在别处被强制触发
//! 后才落地的旧重试）不会铸造新的 current_attempt，也不会播种尝试。
//! Idempotence: an acked attempt is a no-op; a stale attempt (an old retry
//! landing after the task was force-fired elsewhere) neither mints a new
//! current_attempt nor seeds an attempt.

use crate::base::{now_ns, now_s, Store};
use crate::error::{Error, Result};
use crate::models::{schedule, Attempt, AttemptStatus, Id, TaskAdvance, TaskStatus};
use std::sync::Arc;

/// 将一次已完成的尝试应用到所属任务，返回播种出的下一次尝试
/// Apply one completed attempt to its parent task, returning the seeded
/// next attempt if any
pub async fn advance(store: &Arc<dyn Store>, attempt: &Attempt) -> Result<Option<Attempt>> {
  if attempt.acked || !attempt.status.is_terminal() {
    return Ok(None);
  }
  let Some(task) = store.get_task_by_id(&attempt.task_id).await? else {
    // The task is gone, nothing left to apply the outcome to.
    store.ack_attempt(&attempt.id).await?;
    return Ok(None);
  };

  let now = chrono::Utc::now();
  let now_ns = now_ns();
  let now_s = now_s();

  let mut next_at: i64 = 0;
  if task.active && !task.schedule.is_empty() {
    match schedule::next_fire(&task.schedule, now) {
      Ok(at) => next_at = at,
      Err(e) => {
        // Validated at creation; an unparsable spec here only stops the recurrence.
        tracing::warn!(task = %task.id, error = %e, "cron schedule no longer parses");
      }
    }
  }

  let mut status = match attempt.status {
    AttemptStatus::Success => TaskStatus::Success,
    AttemptStatus::Error => TaskStatus::Error,
    _ => return Ok(None),
  };
  let error = attempt.status == AttemptStatus::Error;
  let mut retry_attempts: i64 = 1;
  if error {
    let mut retry = task.retry.clone();
    match retry.next_attempt(now_ns) {
      Ok(at) => {
        next_at = at;
        status = TaskStatus::Retrying;
      }
      Err(Error::MaxAttemptsExceeded) => {
        // Out of retries: the schedule's next firing, or nothing, stands.
      }
      Err(e) => return Err(e),
    }
  } else {
    retry_attempts = -(task.retry.attempts as i64);
  }

  let latest = task.current_attempt.as_ref() == Some(&attempt.id);
  let current_attempt = if latest {
    Id::new()
  } else {
    task.current_attempt.clone().unwrap_or_default()
  };

  let update = TaskAdvance {
    status,
    at: next_at,
    executed: now_s,
    current_attempt: current_attempt.clone(),
    attempt_updated: now_ns,
    error,
    retry_attempts,
  };
  let Some(updated) = store.apply_task_advance(&task.id, &update).await? else {
    store.ack_attempt(&attempt.id).await?;
    return Ok(None);
  };

  let mut next = None;
  if latest && updated.active && updated.at > 0 && !updated.deleted {
    let seeded = Attempt::from_task(&updated, current_attempt);
    store.insert_attempt(&seeded).await?;
    store.set_attempt_queued(&updated.id, &seeded.id).await?;
    next = Some(seeded);
  }
  store.ack_attempt(&attempt.id).await?;
  Ok(next)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::base::constants::DEFAULT_QUEUE_NAME;
  use crate::memdb::MemoryStore;
  use crate::models::{Account, HttpAuth, ListParams, Queue, Retry, Task};
  use std::collections::HashMap;

  struct Fixture {
    store: Arc<dyn Store>,
    task: Task,
    attempt: Attempt,
  }

  async fn fixture(cron: &str, retry: Retry) -> Fixture {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let account = Account::new(None);
    store.insert_account(&account).await.unwrap();
    let queue = Queue::new(
      account.id.clone(),
      "default",
      DEFAULT_QUEUE_NAME,
      None,
      0,
    );
    let queue = store.upsert_queue(&queue).await.unwrap();
    let current = Id::new();
    let task = Task {
      id: Id::new(),
      account: account.id.clone(),
      application: "default".to_string(),
      name: "ping".to_string(),
      url: "http://example.com/hook".to_string(),
      method: "POST".to_string(),
      headers: HashMap::new(),
      payload: String::new(),
      auth: HttpAuth::default(),
      schedule: cron.to_string(),
      at: now_ns(),
      active: true,
      status: TaskStatus::Pending,
      retry,
      current_attempt: Some(current.clone()),
      attempt_queued: true,
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
    let task = store.upsert_task(&task).await.unwrap();
    let mut attempt = Attempt::from_task(&task, current);
    store.insert_attempt(&attempt).await.unwrap();
    attempt = store
      .finish_attempt(&attempt.id, AttemptStatus::Success, 200, "200 OK")
      .await
      .unwrap()
      .unwrap();
    Fixture {
      store,
      task,
      attempt,
    }
  }

  fn three_tries() -> Retry {
    Retry {
      attempts: 0,
      max_attempts: 3,
      factor: 2.0,
      min: 1,
      max: 10,
    }
  }

  #[tokio::test]
  async fn test_one_shot_success_completes() {
    let f = fixture("", three_tries()).await;
    let next = advance(&f.store, &f.attempt).await.unwrap();
    assert!(next.is_none());

    let task = f.store.get_task_by_id(&f.task.id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Success);
    assert!(!task.active);
    assert_eq!(task.at, 0);
    assert_eq!(task.executions, 1);
    assert!(task.last_success > 0);
    // A fresh current attempt was minted but nothing queued.
    assert_ne!(task.current_attempt, Some(f.attempt.id.clone()));
    assert!(!task.attempt_queued);

    let acked = f.store.get_attempt(&f.attempt.id).await.unwrap().unwrap();
    assert!(acked.acked);
  }

  #[tokio::test]
  async fn test_scheduled_success_seeds_next_attempt() {
    let f = fixture("*/1 * * * *", three_tries()).await;
    let next = advance(&f.store, &f.attempt).await.unwrap().unwrap();

    let task = f.store.get_task_by_id(&f.task.id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Success);
    assert!(task.active);
    assert!(task.at > now_ns());
    assert_eq!(task.current_attempt, Some(next.id.clone()));
    assert!(task.attempt_queued);
    assert_eq!(next.at, task.at);
    assert_eq!(next.status, AttemptStatus::Pending);
  }

  #[tokio::test]
  async fn test_error_schedules_retry() {
    let f = fixture("", three_tries()).await;
    let attempt = f
      .store
      .finish_attempt(&f.attempt.id, AttemptStatus::Error, 503, "503 Service Unavailable")
      .await
      .unwrap()
      .unwrap();
    let next = advance(&f.store, &attempt).await.unwrap().unwrap();

    let task = f.store.get_task_by_id(&f.task.id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Retrying);
    assert!(task.active);
    assert!(task.at > now_ns());
    assert_eq!(task.errors, 1);
    assert_eq!(task.retry.attempts, 1);
    assert!(task.last_error > 0);
    assert_eq!(next.at, task.at);
  }

  #[tokio::test]
  async fn test_error_exhausts_retries_and_deactivates() {
    let mut retry = three_tries();
    retry.attempts = 2;
    let f = fixture("", retry).await;
    let attempt = f
      .store
      .finish_attempt(&f.attempt.id, AttemptStatus::Error, 0, "connection refused")
      .await
      .unwrap()
      .unwrap();
    let next = advance(&f.store, &attempt).await.unwrap();
    assert!(next.is_none());

    let task = f.store.get_task_by_id(&f.task.id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Error);
    assert!(!task.active);
    assert_eq!(task.at, 0);
  }

  #[tokio::test]
  async fn test_error_exhausted_falls_back_to_schedule() {
    let mut retry = three_tries();
    retry.attempts = 2;
    let f = fixture("*/1 * * * *", retry).await;
    let attempt = f
      .store
      .finish_attempt(&f.attempt.id, AttemptStatus::Error, 500, "500 Internal Server Error")
      .await
      .unwrap()
      .unwrap();
    let next = advance(&f.store, &attempt).await.unwrap().unwrap();

    let task = f.store.get_task_by_id(&f.task.id).await.unwrap().unwrap();
    // Out of retries, but the recurrence carries on.
    assert_eq!(task.status, TaskStatus::Error);
    assert!(task.active);
    assert_eq!(next.at, task.at);
  }

  #[tokio::test]
  async fn test_replay_after_ack_is_noop() {
    let f = fixture("", three_tries()).await;
    advance(&f.store, &f.attempt).await.unwrap();
    let task_before = f.store.get_task_by_id(&f.task.id).await.unwrap().unwrap();

    let acked = f.store.get_attempt(&f.attempt.id).await.unwrap().unwrap();
    let next = advance(&f.store, &acked).await.unwrap();
    assert!(next.is_none());
    let task_after = f.store.get_task_by_id(&f.task.id).await.unwrap().unwrap();
    assert_eq!(task_after.executions, task_before.executions);
    assert_eq!(task_after.current_attempt, task_before.current_attempt);
  }

  #[tokio::test]
  async fn test_stale_attempt_does_not_mint_current() {
    let f = fixture("*/1 * * * *", three_tries()).await;
    // The task was force-fired elsewhere: current_attempt moved on.
    let forced = Id::new();
    f.store
      .force_task_fire(&f.task.id, &forced, now_ns())
      .await
      .unwrap();

    let next = advance(&f.store, &f.attempt).await.unwrap();
    assert!(next.is_none());
    let task = f.store.get_task_by_id(&f.task.id).await.unwrap().unwrap();
    // The stale completion kept the forced id in place.
    assert_eq!(task.current_attempt, Some(forced));
    assert_eq!(task.executions, 1);
  }

  #[tokio::test]
  async fn test_deleted_task_is_not_resurrected() {
    let f = fixture("*/1 * * * *", three_tries()).await;
    f.store
      .delete_task(&f.task.account, "default", &f.task.name)
      .await
      .unwrap();
    // The in-flight completion still lands.
    let next = advance(&f.store, &f.attempt).await.unwrap();
    assert!(next.is_none());

    let lp = ListParams::default();
    let attempts = f
      .store
      .list_attempts(&f.task.account, "default", &f.task.name, &lp)
      .await
      .unwrap();
    // No new attempt rows appeared for the tombstoned task.
    assert_eq!(attempts.total, 0);
    let acked = f.store.get_attempt(&f.attempt.id).await.unwrap();
    assert!(acked.is_none());
  }
}
