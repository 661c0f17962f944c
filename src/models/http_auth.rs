//! HTTP Basic 认证凭据
//! HTTP Basic authentication credentials

use serde::{Deserialize, Serialize};

/// 附加到出站请求的 Basic 认证信息
/// Basic auth credentials attached to outbound requests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpAuth {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub username: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub password: String,
}

impl HttpAuth {
  /// 是否未配置任何凭据
  /// Whether no credentials are configured
  pub fn is_empty(&self) -> bool {
    self.username.is_empty() && self.password.is_empty()
  }
}
