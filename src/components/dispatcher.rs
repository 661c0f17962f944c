//! 分发器
//! Dispatcher
//!
//! 调度引擎的核心循环：通过两道计数闸门（querier 许可与 worker 许可）
//! 从存储租用到期的尝试，交给 worker 执行。worker 许可必须先于租约获取，
//! 否则租到的尝试可能没有执行能力，白白延长它的保留时间。
//! The core loop of the scheduling engine: behind two counted gates
//! (querier permits and worker permits), it leases due attempts from the
//! store and hands them to workers. The worker permit must be reserved
//! before the lease is attempted, otherwise a leased attempt could sit
//! without capacity to execute, needlessly extending its reservation.
//!
//! 每个 worker 与一个续租任务成对运行，两者由一个完成信号协调；租约在
//! 整个执行期间每 `touch_interval` 秒被延长一次。
//! Each worker runs paired with a touch task, the two coordinated by one
//! completion signal; the lease is extended every `touch_interval` seconds
//! for as long as the execution lasts.

use crate::advancer;
use crate::base::Store;
use crate::config::Config;
use crate::error::Result;
use crate::executor::Executor;
use crate::models::{Attempt, Id};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 分发器
/// Dispatcher
pub struct Dispatcher {
  store: Arc<dyn Store>,
  executor: Arc<Executor>,
  querier_sem: Arc<Semaphore>,
  worker_sem: Arc<Semaphore>,
  max_worker: usize,
  touch_interval: u64,
  cancel: CancellationToken,
  active_workers: Arc<AtomicUsize>,
}

impl Dispatcher {
  /// 创建分发器
  /// Create a dispatcher
  pub fn new(store: Arc<dyn Store>, executor: Executor, config: &Config) -> Self {
    Self {
      store,
      executor: Arc::new(executor),
      querier_sem: Arc::new(Semaphore::new(config.max_store_query.max(1))),
      worker_sem: Arc::new(Semaphore::new(config.max_http_request.max(1))),
      max_worker: config.max_http_request.max(1),
      touch_interval: config.touch_interval.max(1),
      cancel: CancellationToken::new(),
      active_workers: Arc::new(AtomicUsize::new(0)),
    }
  }

  /// 当前正在执行的 worker 数
  /// Number of workers currently executing
  pub fn active_workers(&self) -> usize {
    self.active_workers.load(Ordering::Relaxed)
  }

  /// 启动分发循环
  /// Start the dispatch loop
  pub fn start(self: Arc<Self>) -> JoinHandle<()> {
    tokio::spawn(async move {
      loop {
        let querier_permit = tokio::select! {
          _ = self.cancel.cancelled() => break,
          permit = self.querier_sem.clone().acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => break,
          },
        };
        tokio::spawn(Arc::clone(&self).query(querier_permit));
      }
      tracing::debug!("dispatcher loop exited");
    })
  }

  /// 一次查询：持 querier 许可，先占 worker 许可再尝试租约
  /// One query: holding the querier permit, claim a worker permit before
  /// attempting the lease
  async fn query(self: Arc<Self>, querier_permit: OwnedSemaphorePermit) {
    let worker_permit = tokio::select! {
      _ = self.cancel.cancelled() => return,
      permit = self.worker_sem.clone().acquire_owned() => match permit {
        Ok(permit) => permit,
        Err(_) => return,
      },
    };
    match self.lease_next().await {
      Ok(Some(attempt)) => {
        drop(querier_permit);
        self.active_workers.fetch_add(1, Ordering::Relaxed);
        tokio::spawn(Arc::clone(&self).worker(attempt, worker_permit));
        return;
      }
      Ok(None) => {
        drop(worker_permit);
      }
      Err(e) if e.is_transient() => {
        tracing::warn!(error = %e, "lease scan skipped");
        drop(worker_permit);
      }
      Err(e) => {
        tracing::error!(error = %e, "lease scan failed");
        drop(worker_permit);
      }
    }
    // Nothing due (or an error): brief pause to avoid hot-looping.
    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(querier_permit);
  }

  /// 外层租约扫描：满的队列在本轮被排除，下一次调用从干净集合开始
  /// Outer lease scan: full queues are excluded for this scan only, the
  /// next call starts from a clean set
  pub(crate) async fn lease_next(&self) -> Result<Option<Attempt>> {
    let ttr = (self.touch_interval * 2) as i64;
    let mut excluded: Vec<Id> = Vec::new();
    loop {
      let Some(attempt) = self.store.reserve_next_attempt(ttr, &excluded).await? else {
        return Ok(None);
      };
      let full = self
        .store
        .enqueue_in_flight(&attempt.queue_id, &attempt.id)
        .await?;
      if !full {
        tracing::debug!(attempt = %attempt.id, queue = %attempt.queue, "attempt leased");
        return Ok(Some(attempt));
      }
      tracing::debug!(queue = %attempt.queue, "queue full");
      excluded.push(attempt.queue_id.clone());
    }
  }

  /// 执行一个已租用并通过准入的尝试
  /// Execute one leased and admitted attempt
  async fn worker(self: Arc<Self>, attempt: Attempt, permit: OwnedSemaphorePermit) {
    let _permit = permit;
    let (done_tx, mut done_rx) = oneshot::channel::<()>();
    let toucher = {
      let store = Arc::clone(&self.store);
      let id = attempt.id.clone();
      let touch_interval = self.touch_interval;
      tokio::spawn(async move {
        loop {
          tokio::select! {
            _ = &mut done_rx => break,
            _ = tokio::time::sleep(Duration::from_secs(touch_interval)) => {
              if let Err(e) = store.touch_attempt(&id, (touch_interval * 2) as i64).await {
                tracing::warn!(attempt = %id, error = %e, "touch failed");
              }
            }
          }
        }
      })
    };

    let outcome = self.executor.execute(&attempt).await;

    // The slot is released before the terminal status lands: dying in
    // between re-runs the call after the lease lapses, with the slot
    // correctly free.
    if let Err(e) = self
      .store
      .dequeue_in_flight(&attempt.queue_id, &attempt.id)
      .await
    {
      tracing::warn!(attempt = %attempt.id, error = %e, "dequeue failed");
    }
    let finished = self
      .store
      .finish_attempt(
        &attempt.id,
        outcome.status,
        outcome.status_code,
        &outcome.status_message,
      )
      .await;
    let _ = done_tx.send(());
    let _ = toucher.await;

    match finished {
      Ok(Some(finished)) => {
        if let Err(e) = advancer::advance(&self.store, &finished).await {
          // The integrity loop re-advances unacked attempts later.
          tracing::warn!(attempt = %finished.id, error = %e, "task advance failed");
        }
      }
      Ok(None) => {
        tracing::warn!(attempt = %attempt.id, "attempt vanished before its status write");
      }
      Err(e) => {
        tracing::warn!(attempt = %attempt.id, error = %e, "status write failed, lease will lapse");
      }
    }
    self.active_workers.fetch_sub(1, Ordering::Relaxed);
  }

  /// 关闭：停止租新的尝试，等所有在途 worker 结束
  /// Shutdown: stop leasing, wait for every in-flight worker to finish
  pub async fn shutdown(&self) {
    self.cancel.cancel();
    let _ = self.worker_sem.acquire_many(self.max_worker as u32).await;
    tracing::debug!("all workers finished");
  }

  /// 是否已请求停止
  /// Whether a stop was requested
  pub fn is_done(&self) -> bool {
    self.cancel.is_cancelled()
  }
}
