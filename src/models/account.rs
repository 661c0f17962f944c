//! 租户账户
//! Tenant accounts

use crate::models::Id;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// 访问服务的账户，租户树的根
/// An account accessing the service, the root of a tenant tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
  /// 账户 ID
  /// Account id
  pub id: Id,
  /// 显示名称
  /// Display name
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  /// 用于认证账户 ID 的密钥
  /// Secret key authenticating the account id
  pub key: String,
  /// 软删除标记
  /// Soft-delete tombstone
  #[serde(default)]
  pub deleted: bool,
}

impl Account {
  /// 创建新账户并生成密钥
  /// Create a new account with a generated key
  pub fn new(name: Option<String>) -> Self {
    Self {
      id: Id::new(),
      name,
      key: rand_key(32),
      deleted: false,
    }
  }
}

fn rand_key(n: usize) -> String {
  rand::rng()
    .sample_iter(&Alphanumeric)
    .take(n)
    .map(char::from)
    .collect()
}
