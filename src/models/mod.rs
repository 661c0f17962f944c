//! 数据模型
//! Data models
//!
//! 五个持久化集合（账户、应用、队列、任务、尝试）以及它们的附属类型。
//! The five persisted collections (accounts, applications, queues, tasks,
//! attempts) and their supporting types.
//!
//! 所有权链：Account 拥有 Application，Application 拥有 Queue 与 Task，
//! Task 拥有 Attempt。删除都是软删除并向下传播，由清理循环稍后回收。
//! Ownership chain: an Account owns Applications, an Application owns
//! Queues and Tasks, a Task owns Attempts. Deletes are soft and propagate
//! downward; the cleaner reclaims tombstones later.

pub mod account;
pub mod application;
pub mod attempt;
pub mod http_auth;
pub mod id;
pub mod list;
pub mod queue;
pub mod retry;
pub mod schedule;
pub mod task;

pub use account::Account;
pub use application::Application;
pub use attempt::{Attempt, AttemptStatus};
pub use http_auth::HttpAuth;
pub use id::Id;
pub use list::{ListParams, ListResult};
pub use queue::Queue;
pub use retry::Retry;
pub use task::{Task, TaskAdvance, TaskStatus};
