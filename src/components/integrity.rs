//! 完整性循环
//! Integrity loop
//!
//! 兜底恢复两类搁浅状态：`attempt_queued` 标志陈旧的任务（worker 在插入
//! 尝试与翻转标志之间崩溃）与已完成但未确认的尝试（worker 在写入终态与
//! 确认之间崩溃）。
//! Safety net for two kinds of stranded state: tasks with a stale
//! `attempt_queued` flag (a worker died between inserting the attempt and
//! flipping the flag) and finished-but-unacked attempts (a worker died
//! between the status write and the ack).

use crate::advancer;
use crate::base::constants::{INTEGRITY_WINDOW_SECS, MAINTENANCE_INTERVAL_SECS};
use crate::base::{now_ns, now_s, Store};
use crate::components::ComponentLifecycle;
use crate::error::Result;
use crate::models::{Attempt, Id};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// 完整性循环配置
/// Integrity loop configuration
#[derive(Debug, Clone)]
pub struct IntegrityConfig {
  /// 执行周期
  /// Cadence
  pub interval: Duration,
  /// 陈旧窗口（秒）：多久没有动静才算搁浅
  /// Staleness window (seconds): how long before state counts as stranded
  pub window: i64,
  /// 每轮处理的记录数上限
  /// Per-tick batch size
  pub batch: usize,
}

impl Default for IntegrityConfig {
  fn default() -> Self {
    Self {
      interval: Duration::from_secs(MAINTENANCE_INTERVAL_SECS),
      window: INTEGRITY_WINDOW_SECS,
      batch: 100,
    }
  }
}

/// 完整性循环
/// Integrity loop
pub struct IntegrityLoop {
  store: Arc<dyn Store>,
  config: IntegrityConfig,
  cancel: CancellationToken,
}

impl IntegrityLoop {
  /// 创建完整性循环
  /// Create an integrity loop
  pub fn new(store: Arc<dyn Store>, config: IntegrityConfig) -> Self {
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
            tracing::debug!("integrity loop shutting down");
            break;
          }
          _ = interval.tick() => {
            if let Err(e) = self.run_once().await {
              tracing::warn!(error = %e, "integrity pass skipped");
            }
          }
        }
      }
    })
  }

  /// 执行一轮恢复
  /// Run one recovery pass
  pub async fn run_once(&self) -> Result<()> {
    self.requeue_stale_tasks().await?;
    self.reapply_unacked_attempts().await?;
    Ok(())
  }

  /// 为 `attempt_queued` 陈旧的任务重建缺失的尝试记录
  /// Recreate missing attempt records for tasks with a stale
  /// `attempt_queued` flag
  async fn requeue_stale_tasks(&self) -> Result<()> {
    let now = now_ns();
    let cutoff = now - self.config.window * NANOS_PER_SEC;
    for task in self.store.stale_unqueued_tasks(cutoff, self.config.batch).await? {
      match &task.current_attempt {
        Some(current) => {
          if self.store.get_attempt(current).await?.is_none() {
            let attempt = Attempt::from_task(&task, current.clone());
            self.store.insert_attempt(&attempt).await?;
            tracing::info!(task = %task.id, attempt = %current, "recreated missing attempt");
          }
          self.store.set_attempt_queued(&task.id, current).await?;
        }
        None => {
          // Assign an id now, the next pass creates the record.
          self
            .store
            .assign_current_attempt(&task.id, &Id::new(), now)
            .await?;
          tracing::info!(task = %task.id, "assigned missing current attempt");
        }
      }
    }
    Ok(())
  }

  /// 对已完成但未确认的尝试重放任务推进
  /// Replay the task advance for finished-but-unacked attempts
  async fn reapply_unacked_attempts(&self) -> Result<()> {
    let cutoff = now_s() - self.config.window;
    for attempt in self.store.unacked_attempts(cutoff, self.config.batch).await? {
      match advancer::advance(&self.store, &attempt).await {
        Ok(_) => {
          tracing::info!(attempt = %attempt.id, "recovered unacked attempt");
        }
        Err(e) => {
          tracing::warn!(attempt = %attempt.id, error = %e, "could not recover attempt");
        }
      }
    }
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

impl ComponentLifecycle for IntegrityLoop {
  fn start(self: Arc<Self>) -> JoinHandle<()> {
    IntegrityLoop::start(self)
  }

  fn shutdown(&self) {
    IntegrityLoop::shutdown(self)
  }

  fn is_done(&self) -> bool {
    IntegrityLoop::is_done(self)
  }
}
