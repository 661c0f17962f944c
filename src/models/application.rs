//! 应用：账户内的命名空间
//! Applications: namespaces within an account

use crate::models::Id;
use serde::{Deserialize, Serialize};

/// 账户下的一个应用，队列与任务的命名空间
/// An application under an account, the namespace for queues and tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
  /// 应用 ID
  /// Application id
  pub id: Id,
  /// 所属账户 ID
  /// Owning account id
  pub account: Id,
  /// 应用名称，在账户内唯一
  /// Application name, unique within the account
  pub name: String,
  /// 软删除标记
  /// Soft-delete tombstone
  #[serde(default)]
  pub deleted: bool,
}

impl Application {
  /// 创建新应用
  /// Create a new application
  pub fn new(account: Id, name: impl Into<String>) -> Self {
    Self {
      id: Id::new(),
      account,
      name: name.into(),
      deleted: false,
    }
  }
}
