//! 任务：一个一次性或周期性的 webhook
//! Tasks: a one-shot or recurring webhook

use crate::models::{HttpAuth, Id, Retry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 任务状态
/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
  Pending,
  Retrying,
  Canceled,
  Success,
  Error,
}

impl TaskStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Retrying => "retrying",
      Self::Canceled => "canceled",
      Self::Success => "success",
      Self::Error => "error",
    }
  }
}

/// 一个已注册的 webhook 任务
/// A registered webhook task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
  /// 任务 ID
  /// Task id
  pub id: Id,
  /// 所属账户 ID
  /// Owning account id
  pub account: Id,
  /// 所属应用名称
  /// Parent application name
  pub application: String,
  /// 任务名称，在应用内唯一
  /// Task name, unique within the application
  pub name: String,
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
  /// cron 表达式，为空表示一次性任务
  /// Cron spec, empty for one-shot tasks
  #[serde(default)]
  pub schedule: String,
  /// 下一次触发时间（UNIX 纳秒），0 表示不再触发
  /// Next firing time (UNIX nanoseconds), 0 when no firing is due
  pub at: i64,
  /// 是否仍会触发；不变式 `active == (at > 0)`
  /// Whether the task still fires; invariant `active == (at > 0)`
  pub active: bool,
  /// 最近一次完成所报告的状态
  /// Status reported by the latest completion
  pub status: TaskStatus,
  /// 重试策略与当前重试计数
  /// Retry policy and the live retry counter
  pub retry: Retry,
  /// 应当代表下一次触发的尝试记录 ID
  /// Id of the attempt record that should represent the next firing
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub current_attempt: Option<Id>,
  /// 该尝试记录是否已经真正创建
  /// Whether that attempt record has actually been created
  #[serde(default)]
  pub attempt_queued: bool,
  /// 上述两个字段最近一次变更的时间（UNIX 纳秒）
  /// Last mutation time of the two fields above (UNIX nanoseconds)
  #[serde(default)]
  pub attempt_updated: i64,
  /// 最近一次执行的时间（UNIX 秒）
  /// Last execution time (UNIX seconds)
  #[serde(default)]
  pub executed: i64,
  /// 已执行的尝试总数
  /// Total number of executed attempts
  #[serde(default)]
  pub executions: u64,
  /// 失败的尝试总数
  /// Total number of failed attempts
  #[serde(default)]
  pub errors: u64,
  /// 最近一次成功的时间（UNIX 秒）
  /// Last success time (UNIX seconds)
  #[serde(default)]
  pub last_success: i64,
  /// 最近一次失败的时间（UNIX 秒）
  /// Last error time (UNIX seconds)
  #[serde(default)]
  pub last_error: i64,
  /// 所属队列名称
  /// Parent queue name
  pub queue: String,
  /// 所属队列 ID
  /// Parent queue id
  pub queue_id: Id,
  /// 软删除标记
  /// Soft-delete tombstone
  #[serde(default)]
  pub deleted: bool,
}

impl Task {
  /// 任务的错误率，0 到 100
  /// Error rate of the task, 0 to 100
  pub fn error_rate(&self) -> u64 {
    if self.executions == 0 {
      return 0;
    }
    self.errors * 100 / self.executions
  }
}

/// 一次尝试完成后对任务应用的原子更新
/// The atomic task update applied after one attempt completes
///
/// 除这里列出的字段外，更新总是隐含 `attempt_queued = false`、
/// `executions += 1`，并按 `error` 与 `retry_attempts` 调整计数器。
/// Besides the fields listed here the update always implies
/// `attempt_queued = false`, `executions += 1`, and the counter adjustments
/// described by `error` and `retry_attempts`.
#[derive(Debug, Clone)]
pub struct TaskAdvance {
  /// 新的任务状态
  /// New task status
  pub status: TaskStatus,
  /// 下一次触发时间（UNIX 纳秒），0 表示停止
  /// Next firing time (UNIX nanoseconds), 0 to deactivate
  pub at: i64,
  /// 本次执行时间（UNIX 秒）
  /// Execution time (UNIX seconds)
  pub executed: i64,
  /// 新的 current_attempt
  /// New current attempt id
  pub current_attempt: Id,
  /// attempt_updated 的新值（UNIX 纳秒）
  /// New attempt_updated value (UNIX nanoseconds)
  pub attempt_updated: i64,
  /// 本次完成是否为失败（递增 errors 并记录 last_error）
  /// Whether the completion failed (bumps errors and last_error)
  pub error: bool,
  /// retry.attempts 的增量：失败 +1，成功时重置为 0
  /// Delta on retry.attempts: +1 on failure, reset to 0 on success
  pub retry_attempts: i64,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_error_rate() {
    let mut task = Task {
      id: Id::new(),
      account: Id::new(),
      application: "default".to_string(),
      name: "ping".to_string(),
      url: "http://example.com".to_string(),
      method: "POST".to_string(),
      headers: HashMap::new(),
      payload: String::new(),
      auth: HttpAuth::default(),
      schedule: String::new(),
      at: 0,
      active: false,
      status: TaskStatus::Pending,
      retry: Retry::default(),
      current_attempt: None,
      attempt_queued: false,
      attempt_updated: 0,
      executed: 0,
      executions: 0,
      errors: 0,
      last_success: 0,
      last_error: 0,
      queue: "default".to_string(),
      queue_id: Id::new(),
      deleted: false,
    };
    assert_eq!(task.error_rate(), 0);
    task.executions = 4;
    task.errors = 1;
    assert_eq!(task.error_rate(), 25);
  }
}
