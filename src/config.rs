//! 配置模块
//! Configuration module
//!
//! 启动时一次性读取的调度器配置
//! Scheduler configuration, read once at startup

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 调度器配置
/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
  /// 数据存储连接 URI
  /// Datastore connection URI
  #[serde(default = "default_store_uri")]
  pub store_uri: String,
  /// 并行查询数据存储的数量（querier 许可数）
  /// Number of parallel datastore queries (querier permits)
  #[serde(default = "default_max_store_query")]
  pub max_store_query: usize,
  /// 并行执行 HTTP 请求的数量（worker 许可数）
  /// Number of parallel HTTP requests (worker permits)
  #[serde(default = "default_max_http_request")]
  pub max_http_request: usize,
  /// 续租周期（秒）；租约时长为它的两倍
  /// Touch cadence (seconds); leases last twice this
  #[serde(default = "default_touch_interval")]
  pub touch_interval: u64,
  /// 已完成尝试的保留时长（小时）
  /// Retention of finished attempts (hours)
  #[serde(default = "default_clean_finished_attempts")]
  pub clean_finished_attempts: u64,
  /// 管理员密码，交给认证中间件使用
  /// Admin password, consumed by the auth middleware
  #[serde(default = "default_admin_password")]
  pub admin_password: String,
}

fn default_store_uri() -> String {
  "localhost/hookd".to_string()
}

fn default_max_store_query() -> usize {
  1
}

fn default_max_http_request() -> usize {
  20
}

fn default_touch_interval() -> u64 {
  5
}

fn default_clean_finished_attempts() -> u64 {
  168
}

fn default_admin_password() -> String {
  "admin".to_string()
}

impl Default for Config {
  fn default() -> Self {
    Self {
      store_uri: default_store_uri(),
      max_store_query: default_max_store_query(),
      max_http_request: default_max_http_request(),
      touch_interval: default_touch_interval(),
      clean_finished_attempts: default_clean_finished_attempts(),
      admin_password: default_admin_password(),
    }
  }
}

impl Config {
  /// 创建默认配置
  /// Create the default configuration
  pub fn new() -> Self {
    Self::default()
  }

  /// 设置数据存储 URI
  /// Set the datastore URI
  pub fn store_uri(mut self, uri: impl Into<String>) -> Self {
    self.store_uri = uri.into();
    self
  }

  /// 设置 querier 许可数
  /// Set the querier permit count
  pub fn max_store_query(mut self, n: usize) -> Self {
    self.max_store_query = n.max(1);
    self
  }

  /// 设置 worker 许可数
  /// Set the worker permit count
  pub fn max_http_request(mut self, n: usize) -> Self {
    self.max_http_request = n.max(1);
    self
  }

  /// 设置续租周期（秒）
  /// Set the touch cadence (seconds)
  pub fn touch_interval(mut self, seconds: u64) -> Self {
    self.touch_interval = seconds.max(1);
    self
  }

  /// 设置已完成尝试的保留时长（小时）
  /// Set the finished-attempt retention (hours)
  pub fn clean_finished_attempts(mut self, hours: u64) -> Self {
    self.clean_finished_attempts = hours;
    self
  }

  /// 租约时长：续租周期的两倍
  /// Lease duration: twice the touch cadence
  pub fn ttr(&self) -> i64 {
    (self.touch_interval * 2) as i64
  }

  /// 出站 HTTP 请求的超时，与租约时长对齐
  /// Outbound HTTP timeout, aligned with the lease duration
  pub fn http_timeout(&self) -> Duration {
    Duration::from_secs(self.touch_interval * 2)
  }

  /// 已完成尝试的保留时长（秒）
  /// Finished-attempt retention (seconds)
  pub fn finished_retention_secs(&self) -> i64 {
    (self.clean_finished_attempts * 3600) as i64
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.store_uri, "localhost/hookd");
    assert_eq!(config.max_store_query, 1);
    assert_eq!(config.max_http_request, 20);
    assert_eq!(config.touch_interval, 5);
    assert_eq!(config.clean_finished_attempts, 168);
    assert_eq!(config.admin_password, "admin");
    assert_eq!(config.ttr(), 10);
  }

  #[test]
  fn test_builders_clamp() {
    let config = Config::new()
      .max_store_query(0)
      .max_http_request(0)
      .touch_interval(0);
    assert_eq!(config.max_store_query, 1);
    assert_eq!(config.max_http_request, 1);
    assert_eq!(config.touch_interval, 1);
  }

  #[test]
  fn test_retention() {
    let config = Config::new().clean_finished_attempts(1);
    assert_eq!(config.finished_retention_secs(), 3600);
  }
}
