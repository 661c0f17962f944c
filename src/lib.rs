//! # Hookd
//!
//! 持久化的多租户 webhook 调度器
//! Durable multi-tenant webhook scheduler
//!
//! 租户注册 HTTP 回调（"任务"），一次性定时或 cron 周期触发；服务在到期
//! 时刻发起调用，限制每个队列的并行在途数量，失败后按指数退避重试，并为
//! 每次调用留下可查询的"尝试"记录。
//! Tenants register HTTP call-outs ("tasks") with a one-shot time or a
//! cron recurrence; the service fires each call when due, caps per-queue
//! in-flight concurrency, retries failures with exponential backoff, and
//! leaves a queryable "attempt" record of every call.
//!
//! ## 特性
//! ## Features
//!
//! - 至少一次投递：worker 崩溃后租约过期，别的实例接着执行
//!   - At-least-once delivery: leases lapse after a crash and another
//!     instance takes over
//! - 跨进程协作：任意多个调度器实例通过共享存储竞争，无需互相感知
//!   - Fleet cooperation: any number of scheduler instances contend
//!     through the shared store, unaware of each other
//! - 每队列在途上限：准入闸门由存储里的原子条件更新守护
//!   - Per-queue in-flight caps guarded by atomic conditional updates in
//!     the store
//! - 指数退避重试与 cron 周期调度
//!   - Exponential-backoff retries and cron recurrences
//! - 后台完整性与清理循环回收一切搁浅状态
//!   - Background integrity and janitor loops recover all stranded state
//!
//! ## 快速开始
//! ## Quick Start
//!
//! ```rust,no_run
//! use hookd::{Config, Manager, MemoryStore, NewTask, Scheduler, Store};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> hookd::Result<()> {
//!   // 存储是唯一的共享状态；生产环境换成文档存储后端
//!   // The store is the only shared state; swap in the document-store
//!   // backend in production
//!   let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
//!
//!   let config = Config::new().max_http_request(20).touch_interval(5);
//!   let mut scheduler = Scheduler::new(Arc::clone(&store), &config)?;
//!   scheduler.start();
//!
//!   // 注册一个每五分钟触发的任务
//!   // Register a task firing every five minutes
//!   let manager = Manager::new(store);
//!   let account = manager.new_account(None).await?;
//!   manager
//!     .new_task(
//!       &account.id,
//!       "default",
//!       NewTask {
//!         name: "ping".to_string(),
//!         url: "https://example.com/hook".to_string(),
//!         schedule: "*/5 * * * *".to_string(),
//!         ..NewTask::default()
//!       },
//!     )
//!     .await?;
//!
//!   scheduler.shutdown().await;
//!   Ok(())
//! }
//! ```

pub mod advancer;
pub mod base;
pub mod components;
pub mod config;
pub mod error;
pub mod executor;
pub mod manager;
pub mod memdb;
pub mod models;
pub mod scheduler;

pub use base::Store;
pub use config::Config;
pub use error::{Error, Result};
pub use manager::{Manager, NewTask};
pub use memdb::MemoryStore;
pub use scheduler::Scheduler;
