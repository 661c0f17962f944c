//! 队列：应用内的并发域
//! Queues: per-application concurrency domains

use crate::base::constants::DEFAULT_MAX_IN_FLIGHT;
use crate::models::{Id, Retry};
use serde::{Deserialize, Serialize};

/// 一个队列，限定其中尝试的最大并行在途数量
/// A queue bounding how many of its attempts may be in flight at once
///
/// 不变式：`available_in_flight + attempts_in_flight.len() == max_in_flight`
/// （静止时），且每个尝试 ID 在 `attempts_in_flight` 中至多出现一次。
/// Invariant: `available_in_flight + attempts_in_flight.len() == max_in_flight`
/// at quiescence, and each attempt id appears at most once in `attempts_in_flight`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Queue {
  /// 队列 ID
  /// Queue id
  pub id: Id,
  /// 所属账户 ID
  /// Owning account id
  pub account: Id,
  /// 所属应用名称
  /// Parent application name
  pub application: String,
  /// 队列名称，在应用内唯一
  /// Queue name, unique within the application
  pub name: String,
  /// 应用于本队列任务的重试策略模板
  /// Retry template applied to this queue's tasks
  pub retry: Retry,
  /// 最大并行在途数量
  /// Maximum number of attempts in flight
  pub max_in_flight: u32,
  /// 剩余可用的在途额度
  /// Remaining in-flight slots
  pub available_in_flight: u32,
  /// 当前占用额度的尝试 ID 集合
  /// Attempt ids currently occupying slots
  #[serde(default)]
  pub attempts_in_flight: Vec<Id>,
  /// 软删除标记
  /// Soft-delete tombstone
  #[serde(default)]
  pub deleted: bool,
}

impl Queue {
  /// 创建新队列；零值的 `max_in_flight` 与重试字段取默认值
  /// Create a new queue; zero `max_in_flight` and retry fields take defaults
  pub fn new(
    account: Id,
    application: impl Into<String>,
    name: impl Into<String>,
    retry: Option<Retry>,
    max_in_flight: u32,
  ) -> Self {
    let mut retry = retry.unwrap_or_default();
    retry.set_default();
    let max_in_flight = if max_in_flight == 0 {
      DEFAULT_MAX_IN_FLIGHT
    } else {
      max_in_flight
    };
    Self {
      id: Id::new(),
      account,
      application: application.into(),
      name: name.into(),
      retry,
      max_in_flight,
      available_in_flight: max_in_flight,
      attempts_in_flight: Vec::new(),
      deleted: false,
    }
  }

  /// 当前在途数量
  /// Current number of attempts in flight
  pub fn in_flight(&self) -> usize {
    self.attempts_in_flight.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_new_queue_defaults() {
    let queue = Queue::new(Id::new(), "default", "mailers", None, 0);
    assert_eq!(queue.max_in_flight, DEFAULT_MAX_IN_FLIGHT);
    assert_eq!(queue.available_in_flight, DEFAULT_MAX_IN_FLIGHT);
    assert_eq!(queue.retry.max_attempts, 10);
    assert_eq!(queue.in_flight(), 0);
  }

  #[test]
  fn test_new_queue_explicit() {
    let retry = Retry {
      max_attempts: 3,
      ..Retry::default()
    };
    let queue = Queue::new(Id::new(), "default", "mailers", Some(retry), 2);
    assert_eq!(queue.max_in_flight, 2);
    assert_eq!(queue.retry.max_attempts, 3);
    assert_eq!(queue.retry.min, 10);
  }
}
