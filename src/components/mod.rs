//! 后台组件
//! Background components
//!
//! 调度引擎的常驻部分：分发器（租约 + worker 池）、完整性循环与清理循环。
//! The resident parts of the scheduling engine: the dispatcher (leases +
//! worker pool), the integrity loop and the janitor.

use std::sync::Arc;
use tokio::task::JoinHandle;

pub mod dispatcher;
pub mod integrity;
pub mod janitor;

/// 组件生命周期管理接口
/// Component lifecycle management interface
///
/// 统一的启动、关闭与状态检查。实现者：[`integrity::IntegrityLoop`]、
/// [`janitor::Janitor`]。[`dispatcher::Dispatcher`] 没有实现此 trait，
/// 因为它的关闭是异步的（要等所有 worker 结束）。
/// Uniform start, shutdown and state check. Implementors:
/// [`integrity::IntegrityLoop`], [`janitor::Janitor`].
/// [`dispatcher::Dispatcher`] does not implement this trait because its
/// shutdown is async (it waits for all workers to finish).
pub trait ComponentLifecycle {
  /// 启动组件的后台任务
  /// Start the component's background task
  fn start(self: Arc<Self>) -> JoinHandle<()>;

  /// 请求组件停止
  /// Request the component to stop
  fn shutdown(&self);

  /// 组件是否已经停止
  /// Whether the component has stopped
  fn is_done(&self) -> bool;
}
