//! 错误处理模块
//! Error handling module
//!
//! 定义了 Hookd 库中使用的各种错误类型
//! Defines the error types used throughout the Hookd library

use thiserror::Error;

/// Hookd 库的结果类型
/// Result type for the Hookd library
pub type Result<T> = std::result::Result<T, Error>;

/// Hookd 错误类型
/// Hookd error type
#[derive(Error, Debug)]
pub enum Error {
  /// 数据存储传输层错误，调用方应跳过本轮重试
  /// Datastore transport error, callers should skip this tick and retry later
  #[error("datastore error: {0}")]
  Store(String),

  /// HTTP 客户端构建错误
  /// HTTP client construction error
  #[error("HTTP client error: {0}")]
  Http(#[from] reqwest::Error),

  /// 无效的 cron 表达式
  /// Invalid cron schedule expression
  #[error("invalid cron schedule {spec:?}: {message}")]
  Schedule { spec: String, message: String },

  /// 重试次数已达上限，通知推进状态机停止重试
  /// Maximum retries reached, signals the advance machine to stop retrying
  #[error("maximum number of attempts exceeded")]
  MaxAttemptsExceeded,

  /// 记录未找到
  /// Record not found
  #[error("{kind} not found")]
  NotFound { kind: &'static str },

  /// 保留名称，禁止创建或删除
  /// Reserved name, cannot be created or deleted
  #[error("the {kind} name {name:?} is reserved")]
  Reserved { kind: &'static str, name: String },

  /// 配置错误
  /// Configuration error
  #[error("configuration error: {message}")]
  Config { message: String },
}

impl Error {
  /// 创建数据存储错误
  /// Create a datastore error
  pub fn store<S: Into<String>>(message: S) -> Self {
    Self::Store(message.into())
  }

  /// 创建配置错误
  /// Create a configuration error
  pub fn config<S: Into<String>>(message: S) -> Self {
    Self::Config {
      message: message.into(),
    }
  }

  /// 创建 cron 表达式错误
  /// Create a cron schedule error
  pub fn schedule<S: Into<String>, M: Into<String>>(spec: S, message: M) -> Self {
    Self::Schedule {
      spec: spec.into(),
      message: message.into(),
    }
  }

  /// 创建未找到错误
  /// Create a not-found error
  pub fn not_found(kind: &'static str) -> Self {
    Self::NotFound { kind }
  }

  /// 创建保留名称错误
  /// Create a reserved-name error
  pub fn reserved<S: Into<String>>(kind: &'static str, name: S) -> Self {
    Self::Reserved {
      kind,
      name: name.into(),
    }
  }

  /// 检查是否为瞬时错误（数据存储会话问题，下一轮重试即可）
  /// Check whether the error is transient (a datastore session problem, retry next tick)
  pub fn is_transient(&self) -> bool {
    matches!(self, Error::Store(_))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_error_creation() {
    let err = Error::store("connection reset");
    assert!(matches!(err, Error::Store(_)));

    let err = Error::config("bad uri");
    assert!(matches!(err, Error::Config { .. }));

    let err = Error::reserved("queue", "default");
    assert_eq!(
      err.to_string(),
      "the queue name \"default\" is reserved"
    );
  }

  #[test]
  fn test_error_transient() {
    assert!(Error::store("not master").is_transient());
    assert!(!Error::MaxAttemptsExceeded.is_transient());
    assert!(!Error::not_found("task").is_transient());
  }
}
