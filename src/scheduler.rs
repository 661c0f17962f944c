//! 调度器装配
//! Scheduler assembly
//!
//! 把分发器、完整性循环与清理循环装配到一个存储之上。可以在任意多个
//! 进程里各跑一个调度器，它们通过共享存储协作；崩溃的实例不会丢任务，
//! 它租下的尝试在租约过期后被其他实例接走。
//! Assembles the dispatcher, the integrity loop and the janitor over one
//! store. Any number of processes may each run a scheduler; they cooperate
//! through the shared store, and a crashed instance loses nothing — its
//! leased attempts are picked up by others once the leases lapse.

use crate::base::Store;
use crate::components::dispatcher::Dispatcher;
use crate::components::integrity::{IntegrityConfig, IntegrityLoop};
use crate::components::janitor::{Janitor, JanitorConfig};
use crate::components::ComponentLifecycle;
use crate::config::Config;
use crate::error::Result;
use crate::executor::Executor;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// 调度器：一个进程内的完整调度引擎
/// Scheduler: the complete scheduling engine of one process
pub struct Scheduler {
  dispatcher: Arc<Dispatcher>,
  loops: Vec<Arc<dyn ComponentLifecycle + Send + Sync>>,
  handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
  /// 创建调度器
  /// Create a scheduler
  pub fn new(store: Arc<dyn Store>, config: &Config) -> Result<Self> {
    let executor = Executor::new(config.http_timeout())?;
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&store), executor, config));
    let integrity = Arc::new(IntegrityLoop::new(
      Arc::clone(&store),
      IntegrityConfig::default(),
    ));
    let janitor = Arc::new(Janitor::new(
      store,
      JanitorConfig {
        retention: config.finished_retention_secs(),
        ..JanitorConfig::default()
      },
    ));
    Ok(Self {
      dispatcher,
      loops: vec![
        integrity as Arc<dyn ComponentLifecycle + Send + Sync>,
        janitor as Arc<dyn ComponentLifecycle + Send + Sync>,
      ],
      handles: Vec::new(),
    })
  }

  /// 启动全部组件
  /// Start every component
  pub fn start(&mut self) {
    self.handles.push(Arc::clone(&self.dispatcher).start());
    for component in &self.loops {
      self.handles.push(Arc::clone(component).start());
    }
    tracing::info!("scheduler started");
  }

  /// 当前正在执行的 worker 数
  /// Number of workers currently executing
  pub fn active_workers(&self) -> usize {
    self.dispatcher.active_workers()
  }

  /// 优雅关闭：不再租新尝试，在途的 worker 跑完当前尝试
  /// Graceful shutdown: no new leases, in-flight workers finish their
  /// current attempt
  pub async fn shutdown(&mut self) {
    self.dispatcher.shutdown().await;
    for component in &self.loops {
      component.shutdown();
    }
    for handle in self.handles.drain(..) {
      let _ = handle.await;
    }
    tracing::info!("scheduler stopped");
  }
}
