//! 重试策略
//! Retry policy
//!
//! 指数退避加抖动：每次失败后的间隔为 `min * factor^attempts`，
//! 上限为 `max`，再叠加最多 20% 的随机抖动。
//! Exponential backoff with jitter: the delay after each failure is
//! `min * factor^attempts`, clamped to `max`, plus up to 20% random jitter.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: f64 = 1e9;

/// 重试策略参数与当前计数
/// Retry policy parameters and the live counter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Retry {
  /// 当前已经重试的次数
  /// Number of retries performed so far
  #[serde(default)]
  pub attempts: u32,
  /// 最大重试次数
  /// Maximum number of retries
  #[serde(default)]
  pub max_attempts: u32,
  /// 间隔增长因子
  /// Growth factor between delays
  #[serde(default)]
  pub factor: f64,
  /// 最小间隔（秒）
  /// Minimum delay (seconds)
  #[serde(default)]
  pub min: u32,
  /// 最大间隔（秒）
  /// Maximum delay (seconds)
  #[serde(default)]
  pub max: u32,
}

impl Retry {
  /// 为未设置（零值）的字段填充默认值
  /// Fill defaults for unset (zero) fields
  pub fn set_default(&mut self) {
    if self.max_attempts == 0 {
      self.max_attempts = 10;
    }
    if self.factor == 0.0 {
      self.factor = 2.0;
    }
    if self.min == 0 {
      self.min = 10;
    }
    if self.max == 0 {
      self.max = 300;
    }
  }

  /// 计算下一次重试的时间（UNIX 纳秒）
  /// Compute the time of the next retry (UNIX nanoseconds)
  ///
  /// 超出最大重试次数时返回 [`Error::MaxAttemptsExceeded`]。
  /// Returns [`Error::MaxAttemptsExceeded`] once the cap is reached.
  pub fn next_attempt(&mut self, now: i64) -> Result<i64> {
    if self.max_attempts > 0 && self.attempts + 1 >= self.max_attempts {
      return Err(Error::MaxAttemptsExceeded);
    }
    let min = f64::from(self.min);
    let max = f64::from(self.max);
    let mut next = min * self.factor.powi(self.attempts as i32);
    if next > max {
      next = max;
    }
    // Up to 20% of the interval, uniformly.
    next += rand::random::<f64>() * next / 5.0;
    self.attempts += 1;
    Ok(now + (next * NANOS_PER_SEC) as i64)
  }
}
