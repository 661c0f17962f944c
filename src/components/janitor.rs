//! 清理循环
//! Janitor loop
//!
//! 定期回收两类垃圾：超过保留期的已完成尝试，以及软删除的记录（先尝试、
//! 后任务、队列、应用、账户，子先父后）。删除一条尝试前必须先把它从队列
//! 的在途集合中移除，否则会永久占用一个额度。
//! Periodically reclaims two kinds of garbage: finished attempts past
//! their retention, and tombstoned records (attempts first, then tasks,
//! queues, applications, accounts, children before parents). An attempt
//! must leave its queue's in-flight set before removal or it would pin a
//! slot forever.

use crate::base::constants::MAINTENANCE_INTERVAL_SECS;
use crate::base::Store;
use crate::components::ComponentLifecycle;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 清理循环配置
/// Janitor configuration
#[derive(Debug, Clone)]
pub struct JanitorConfig {
  /// 执行周期
  /// Cadence
  pub interval: Duration,
  /// 已完成尝试的保留时长（秒）
  /// Retention of finished attempts (seconds)
  pub retention: i64,
  /// 每轮处理的记录数上限
  /// Per-tick batch size
  pub batch: usize,
}

impl Default for JanitorConfig {
  fn default() -> Self {
    Self {
      interval: Duration::from_secs(MAINTENANCE_INTERVAL_SECS),
      retention: 168 * 3600,
      batch: 100,
    }
  }
}

/// 清理循环
/// Janitor loop
pub struct Janitor {
  store: Arc<dyn Store>,
  config: JanitorConfig,
  cancel: CancellationToken,
}

impl Janitor {
  /// 创建清理循环
  /// Create a janitor
  pub fn new(store: Arc<dyn Store>, config: JanitorConfig) -> Self {
    Self {
      store,
      config,
      cancel: CancellationToken::new(),
    }
  }

  /// 启动循环
  /// Start the loop
  pub fn start(self: Arc<Self>) -> JoinHandle<()> {
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(self.config.interval);
      loop {
        tokio::select! {
          _ = self.cancel.cancelled() => {
            tracing::debug!("janitor shutting down");
            break;
          }
          _ = interval.tick() => {
            if let Err(e) = self.run_once().await {
              tracing::warn!(error = %e, "janitor pass skipped");
            }
          }
        }
      }
    })
  }

  /// 执行一轮清理
  /// Run one cleanup pass
  pub async fn run_once(&self) -> Result<()> {
    let removed = self
      .store
      .clean_finished_attempts(self.config.retention)
      .await?;
    if removed > 0 {
      tracing::debug!(removed, "cleaned finished attempts");
    }
    for attempt in self.store.deleted_attempts(self.config.batch).await? {
      self
        .store
        .dequeue_in_flight(&attempt.queue_id, &attempt.id)
        .await?;
      self.store.remove_attempt(&attempt.id).await?;
    }
    self.store.purge_deleted().await?;
    Ok(())
  }

  /// 请求停止
  /// Request a stop
  pub fn shutdown(&self) {
    self.cancel.cancel();
  }

  /// 是否已停止
  /// Whether stopped
  pub fn is_done(&self) -> bool {
    self.cancel.is_cancelled()
  }
}

impl ComponentLifecycle for Janitor {
  fn start(self: Arc<Self>) -> JoinHandle<()> {
    Janitor::start(self)
  }

  fn shutdown(&self) {
    Janitor::shutdown(self)
  }

  fn is_done(&self) -> bool {
    Janitor::is_done(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::manager::{Manager, NewTask};
  use crate::memdb::MemoryStore;
  use crate::models::AttemptStatus;

  fn immediate() -> JanitorConfig {
    JanitorConfig {
      interval: Duration::from_millis(10),
      retention: 0,
      batch: 100,
    }
  }

  #[tokio::test]
  async fn test_removes_finished_and_deleted() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let manager = Manager::new(Arc::clone(&store));
    let account = manager.new_account(None).await.unwrap();
    for name in ["done", "gone"] {
      manager
        .new_task(
          &account.id,
          "default",
          NewTask {
            name: name.to_string(),
            url: "http://example.com/hook".to_string(),
            ..NewTask::default()
          },
        )
        .await
        .unwrap();
    }
    let done = manager
      .get_task(&account.id, "default", "done")
      .await
      .unwrap();
    let done_attempt = done.current_attempt.clone().unwrap();
    store
      .finish_attempt(&done_attempt, AttemptStatus::Success, 200, "200 OK")
      .await
      .unwrap();
    let gone = manager
      .get_task(&account.id, "default", "gone")
      .await
      .unwrap();
    let gone_attempt = gone.current_attempt.clone().unwrap();
    // The in-flight slot must come back when a tombstoned attempt goes.
    store
      .enqueue_in_flight(&gone.queue_id, &gone_attempt)
      .await
      .unwrap();
    manager
      .delete_task(&account.id, "default", "gone")
      .await
      .unwrap();

    let janitor = Janitor::new(Arc::clone(&store), immediate());
    janitor.run_once().await.unwrap();

    // Both attempts are physically gone.
    assert!(store.get_attempt(&done_attempt).await.unwrap().is_none());
    assert!(store.get_attempt(&gone_attempt).await.unwrap().is_none());
    let queue = store.get_queue_by_id(&gone.queue_id).await.unwrap().unwrap();
    assert_eq!(queue.available_in_flight, queue.max_in_flight);
    // The tombstoned task is purged, the live one survives.
    assert!(store.get_task_by_id(&gone.id).await.unwrap().is_none());
    assert!(store.get_task_by_id(&done.id).await.unwrap().is_some());
  }

  #[tokio::test]
  async fn test_retention_keeps_young_attempts() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let manager = Manager::new(Arc::clone(&store));
    let account = manager.new_account(None).await.unwrap();
    let task = manager
      .new_task(
        &account.id,
        "default",
        NewTask {
          name: "ping".to_string(),
          url: "http://example.com/hook".to_string(),
          ..NewTask::default()
        },
      )
      .await
      .unwrap();
    let attempt = task.current_attempt.clone().unwrap();
    store
      .finish_attempt(&attempt, AttemptStatus::Success, 200, "200 OK")
      .await
      .unwrap();

    let config = JanitorConfig {
      retention: 3600,
      ..immediate()
    };
    let janitor = Janitor::new(Arc::clone(&store), config);
    janitor.run_once().await.unwrap();
    assert!(store.get_attempt(&attempt).await.unwrap().is_some());
  }

  #[tokio::test]
  async fn test_lifecycle() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let janitor = Arc::new(Janitor::new(store, immediate()));
    assert!(!janitor.is_done());
    let handle = janitor.clone().start();
    janitor.shutdown();
    assert!(janitor.is_done());
    handle.await.unwrap();
  }
}
