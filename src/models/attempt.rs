//! 尝试：一次计划中的 HTTP 调用及其结果
//! Attempts: one scheduled HTTP call and its outcome

use crate::models::{HttpAuth, Id, Task};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 尝试状态
/// Attempt status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
  Pending,
  Running,
  Success,
  Error,
}

impl AttemptStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Running => "running",
      Self::Success => "success",
      Self::Error => "error",
    }
  }

  /// 是否为终态
  /// Whether the status is terminal
  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Success | Self::Error)
  }
}

impl std::str::FromStr for AttemptStatus {
  type Err = ();

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s {
      "pending" => Ok(Self::Pending),
      "running" => Ok(Self::Running),
      "success" => Ok(Self::Success),
      "error" => Ok(Self::Error),
      _ => Err(()),
    }
  }
}

/// 一次必须执行的 HTTP 请求的持久化记录
/// Persistent record of one HTTP request that must be performed
///
/// 除调度字段外都是任务在排期时刻的快照，任务随后的修改不影响已排期的尝试。
/// Everything besides the scheduling fields is a snapshot of the task at
/// schedule time; later task edits do not affect an already scheduled attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
  /// 尝试 ID
  /// Attempt id
  pub id: Id,
  /// 所属账户 ID
  /// Owning account id
  pub account: Id,
  /// 所属应用名称
  /// Parent application name
  pub application: String,
  /// 所属任务名称
  /// Parent task name
  pub task: String,
  /// 所属任务 ID
  /// Parent task id
  pub task_id: Id,
  /// 所属队列名称
  /// Parent queue name
  pub queue: String,
  /// 所属队列 ID
  /// Parent queue id
  pub queue_id: Id,
  /// 请求的 URL
  /// Request URL
  pub url: String,
  /// HTTP 方法
  /// HTTP method
  pub method: String,
  /// 附加的 HTTP 头
  /// Additional HTTP headers
  #[serde(default)]
  pub headers: HashMap<String, String>,
  /// POST 的请求体
  /// POSTed body
  #[serde(default)]
  pub payload: String,
  /// Basic 认证凭据
  /// Basic auth credentials
  #[serde(default)]
  pub auth: HttpAuth,
  /// 应当执行请求的时间（UNIX 纳秒）
  /// When the request is due (UNIX nanoseconds)
  pub at: i64,
  /// 租约到期时间（UNIX 纳秒）；过期后可被任何 worker 认领
  /// Lease expiry (UNIX nanoseconds); reclaimable by any worker once past
  pub reserved: i64,
  /// 当前状态
  /// Current status
  pub status: AttemptStatus,
  /// 完成时间（UNIX 秒）
  /// Completion time (UNIX seconds)
  #[serde(default)]
  pub finished: i64,
  /// HTTP 状态码，传输错误时为 0
  /// HTTP status code, 0 on transport errors
  #[serde(default)]
  pub status_code: i32,
  /// 人类可读的状态说明
  /// Human readable status message
  #[serde(default)]
  pub status_message: String,
  /// 结果是否已经应用到所属任务
  /// Whether the outcome has been applied to the parent task
  #[serde(default)]
  pub acked: bool,
  /// 软删除标记
  /// Soft-delete tombstone
  #[serde(default)]
  pub deleted: bool,
}

impl Attempt {
  /// 以给定 ID 从任务快照出一次新的尝试
  /// Snapshot a new attempt from a task under the given id
  pub fn from_task(task: &Task, id: Id) -> Self {
    Self {
      id,
      account: task.account.clone(),
      application: task.application.clone(),
      task: task.name.clone(),
      task_id: task.id.clone(),
      queue: task.queue.clone(),
      queue_id: task.queue_id.clone(),
      url: task.url.clone(),
      method: task.method.clone(),
      headers: task.headers.clone(),
      payload: task.payload.clone(),
      auth: task.auth.clone(),
      at: task.at,
      reserved: task.at,
      status: AttemptStatus::Pending,
      finished: 0,
      status_code: 0,
      status_message: String::new(),
      acked: false,
      deleted: false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_terminal() {
    assert!(AttemptStatus::Success.is_terminal());
    assert!(AttemptStatus::Error.is_terminal());
    assert!(!AttemptStatus::Pending.is_terminal());
    assert!(!AttemptStatus::Running.is_terminal());
  }

  #[test]
  fn test_status_parse() {
    assert_eq!("running".parse(), Ok(AttemptStatus::Running));
    assert!("unknown".parse::<AttemptStatus>().is_err());
  }
}
