//! 集合列表的分页参数与结果
//! Pagination parameters and results for collection listings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 分页参数
/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListParams {
  /// 页码，从 1 开始
  /// Page number, starting at 1
  pub page: usize,
  /// 每页数量
  /// Items per page
  pub limit: usize,
  /// 可选的字段过滤器
  /// Optional field filters
  #[serde(default)]
  pub filters: HashMap<String, String>,
}

impl Default for ListParams {
  fn default() -> Self {
    Self {
      page: 1,
      limit: 20,
      filters: HashMap::new(),
    }
  }
}

/// 分页结果
/// Pagination result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResult<T> {
  pub list: Vec<T>,
  pub has_more: bool,
  pub total: usize,
  pub count: usize,
  pub page: usize,
  pub pages: usize,
}

impl<T> ListResult<T> {
  /// 对一个已经按期望顺序排列的集合进行分页
  /// Paginate a collection already sorted in the expected order
  pub fn paginate(items: Vec<T>, lp: &ListParams) -> Self {
    let limit = lp.limit.max(1);
    let total = items.len();
    let pages = total.div_ceil(limit);
    let page = lp.page.max(1).min(pages.max(1));
    let skip = limit * (page - 1);
    let list: Vec<T> = items.into_iter().skip(skip).take(limit).collect();
    let count = list.len();
    Self {
      list,
      has_more: total > count + skip,
      total,
      count,
      page,
      pages,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_paginate() {
    let lp = ListParams {
      page: 1,
      limit: 2,
      filters: HashMap::new(),
    };
    let lr = ListResult::paginate(vec![1, 2, 3, 4, 5], &lp);
    assert_eq!(lr.list, vec![1, 2]);
    assert!(lr.has_more);
    assert_eq!(lr.total, 5);
    assert_eq!(lr.pages, 3);

    let lp = ListParams {
      page: 3,
      limit: 2,
      filters: HashMap::new(),
    };
    let lr = ListResult::paginate(vec![1, 2, 3, 4, 5], &lp);
    assert_eq!(lr.list, vec![5]);
    assert!(!lr.has_more);
    assert_eq!(lr.count, 1);
  }

  #[test]
  fn test_paginate_page_out_of_range() {
    let lp = ListParams {
      page: 9,
      limit: 2,
      filters: HashMap::new(),
    };
    let lr = ListResult::paginate(vec![1, 2, 3], &lp);
    // Clamped to the last page.
    assert_eq!(lr.page, 2);
    assert_eq!(lr.list, vec![3]);
  }

  #[test]
  fn test_paginate_empty() {
    let lr = ListResult::<i32>::paginate(vec![], &ListParams::default());
    assert_eq!(lr.total, 0);
    assert_eq!(lr.pages, 0);
    assert!(!lr.has_more);
  }
}
