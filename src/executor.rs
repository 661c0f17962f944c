//! 尝试执行器
//! Attempt executor
//!
//! 负责真正执行一次尝试的 HTTP 请求并给结果分类。传输层失败不是引擎
//! 错误，而是要记录到尝试上的结果（状态码 0）。
//! Performs the actual HTTP request of one attempt and classifies the
//! result. Transport failures are not engine errors but outcomes to be
//! recorded on the attempt (status code 0).

use crate::base::constants::{
  HEADER_ACCOUNT, HEADER_APPLICATION, HEADER_ATTEMPT_ID, HEADER_QUEUE, HEADER_TASK_NAME,
  TEST_SLEEP_SECS, TEST_URL_PREFIX, USER_AGENT,
};
use crate::error::Result;
use crate::models::{Attempt, AttemptStatus};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

/// 一次执行的分类结果
/// Classified result of one execution
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
  pub status: AttemptStatus,
  pub status_code: i32,
  pub status_message: String,
}

impl AttemptOutcome {
  fn error(message: String) -> Self {
    Self {
      status: AttemptStatus::Error,
      status_code: 0,
      status_message: message,
    }
  }
}

/// 尝试执行器，持有一个带超时的共享 HTTP 客户端
/// Attempt executor holding one shared HTTP client with a timeout
///
/// 超时与租约时长（2 × touch_interval）对齐，请求不会比它的租约活得更久。
/// The timeout aligns with the lease duration (2 × touch_interval), so a
/// request never outlives its lease.
pub struct Executor {
  client: reqwest::Client,
}

impl Executor {
  /// 创建执行器
  /// Create an executor
  pub fn new(timeout: Duration) -> Result<Self> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { client })
  }

  /// 执行一次尝试
  /// Execute one attempt
  pub async fn execute(&self, attempt: &Attempt) -> AttemptOutcome {
    if attempt.url.starts_with(TEST_URL_PREFIX) {
      tracing::debug!(url = %attempt.url, "test attempt starting");
      tokio::time::sleep(Duration::from_secs(TEST_SLEEP_SECS)).await;
      tracing::debug!(url = %attempt.url, "test attempt done");
      return AttemptOutcome {
        status: AttemptStatus::Success,
        status_code: 200,
        status_message: "Test attempt".to_string(),
      };
    }

    let method = match reqwest::Method::from_bytes(attempt.method.as_bytes()) {
      Ok(method) => method,
      Err(e) => return AttemptOutcome::error(e.to_string()),
    };

    let mut request = self
      .client
      .request(method.clone(), attempt.url.as_str())
      .headers(build_headers(attempt));
    if method == reqwest::Method::POST && !attempt.payload.is_empty() {
      request = request.body(attempt.payload.clone());
    }
    if !attempt.auth.is_empty() {
      request = request.basic_auth(&attempt.auth.username, Some(&attempt.auth.password));
    }

    let outcome = match request.send().await {
      Ok(response) => {
        let status_code = i32::from(response.status().as_u16());
        let status_message = match response.status().canonical_reason() {
          Some(reason) => format!("{status_code} {reason}"),
          None => status_code.to_string(),
        };
        let status = if status_code == 200 {
          AttemptStatus::Success
        } else {
          AttemptStatus::Error
        };
        AttemptOutcome {
          status,
          status_code,
          status_message,
        }
      }
      Err(e) => AttemptOutcome::error(e.to_string()),
    };
    tracing::debug!(
      attempt = %attempt.id,
      method = %attempt.method,
      url = %attempt.url,
      code = outcome.status_code,
      status = outcome.status.as_str(),
      "attempt executed"
    );
    outcome
  }
}

fn build_headers(attempt: &Attempt) -> HeaderMap {
  let mut headers = HeaderMap::new();
  headers.insert(reqwest::header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
  let diagnostics = [
    (HEADER_ACCOUNT, attempt.account.as_str()),
    (HEADER_APPLICATION, attempt.application.as_str()),
    (HEADER_QUEUE, attempt.queue.as_str()),
    (HEADER_TASK_NAME, attempt.task.as_str()),
    (HEADER_ATTEMPT_ID, attempt.id.as_str()),
  ];
  for (name, value) in diagnostics {
    if let Ok(value) = HeaderValue::from_str(value) {
      headers.insert(name, value);
    }
  }
  headers.insert(
    reqwest::header::CONTENT_TYPE,
    HeaderValue::from_static(content_type(&attempt.method, &attempt.payload)),
  );
  // Caller-provided headers override the derived ones.
  for (name, value) in &attempt.headers {
    match (
      HeaderName::from_bytes(name.as_bytes()),
      HeaderValue::from_str(value),
    ) {
      (Ok(name), Ok(value)) => {
        headers.insert(name, value);
      }
      _ => {
        tracing::warn!(attempt = %attempt.id, header = %name, "skipping invalid header");
      }
    }
  }
  headers
}

/// POST 且第一个字节为 `{` 时按 JSON 发送，否则按纯文本
/// JSON when POSTing a payload whose first byte is `{`, plain text otherwise
fn content_type(method: &str, payload: &str) -> &'static str {
  if method == "POST" && payload.as_bytes().first() == Some(&b'{') {
    "application/json"
  } else {
    "text/plain"
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{HttpAuth, Id};
  use std::collections::HashMap;

  #[test]
  fn test_content_type() {
    assert_eq!(content_type("POST", "{\"a\":1}"), "application/json");
    assert_eq!(content_type("POST", "plain"), "text/plain");
    assert_eq!(content_type("POST", ""), "text/plain");
    assert_eq!(content_type("GET", "{\"a\":1}"), "text/plain");
  }

  fn make_attempt(method: &str) -> Attempt {
    Attempt {
      id: Id::new(),
      account: Id::new(),
      application: "default".to_string(),
      task: "ping".to_string(),
      task_id: Id::new(),
      queue: "default".to_string(),
      queue_id: Id::new(),
      url: "http://127.0.0.1:1/hook".to_string(),
      method: method.to_string(),
      headers: HashMap::new(),
      payload: String::new(),
      auth: HttpAuth::default(),
      at: 0,
      reserved: 0,
      status: AttemptStatus::Running,
      finished: 0,
      status_code: 0,
      status_message: String::new(),
      acked: false,
      deleted: false,
    }
  }

  #[test]
  fn test_build_headers() {
    let mut attempt = make_attempt("POST");
    attempt.payload = "{\"a\":1}".to_string();
    attempt
      .headers
      .insert("Content-Type".to_string(), "text/csv".to_string());
    attempt
      .headers
      .insert("X-Custom".to_string(), "yes".to_string());

    let headers = build_headers(&attempt);
    assert_eq!(headers.get(reqwest::header::USER_AGENT).unwrap(), "Hooky");
    // The caller override wins.
    assert_eq!(headers.get(reqwest::header::CONTENT_TYPE).unwrap(), "text/csv");
    assert_eq!(headers.get("X-Custom").unwrap(), "yes");
    assert_eq!(
      headers.get(HEADER_ATTEMPT_ID).unwrap(),
      attempt.id.as_str()
    );
  }

  #[tokio::test]
  async fn test_invalid_method_is_an_outcome() {
    let executor = Executor::new(Duration::from_secs(1)).unwrap();
    let outcome = executor.execute(&make_attempt("NOT A METHOD")).await;
    assert_eq!(outcome.status, AttemptStatus::Error);
    assert_eq!(outcome.status_code, 0);
  }

  #[tokio::test]
  async fn test_connection_refused_is_an_outcome() {
    let executor = Executor::new(Duration::from_secs(2)).unwrap();
    let outcome = executor.execute(&make_attempt("GET")).await;
    assert_eq!(outcome.status, AttemptStatus::Error);
    assert_eq!(outcome.status_code, 0);
    assert!(!outcome.status_message.is_empty());
  }
}
