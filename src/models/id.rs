//! 记录标识符
//! Record identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 不透明的记录 ID
/// Opaque record id
///
/// 按时间有序生成，因此按 ID 降序排列即为最新优先。
/// Generated time-ordered, so sorting by id descending yields newest first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
  /// 生成一个新的 ID
  /// Generate a new id
  pub fn new() -> Self {
    Id(Uuid::now_v7().simple().to_string())
  }

  /// 以字符串形式访问
  /// Access as a string
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl Default for Id {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for Id {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for Id {
  fn from(value: &str) -> Self {
    Id(value.to_string())
  }
}
