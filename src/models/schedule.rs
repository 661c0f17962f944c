//! Cron 表达式解析与下一次触发时间计算
//! Cron expression parsing and next-fire computation

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;

/// 计算 cron 表达式在 `after` 之后（严格大于）的下一次触发时间（UNIX 纳秒，UTC）
/// Compute the next firing of a cron spec strictly after `after` (UNIX nanoseconds, UTC)
///
/// 接受标准的五字段表达式（分 时 日 月 星期）。
/// Accepts the standard five-field form (minute hour day month weekday).
pub fn next_fire(spec: &str, after: DateTime<Utc>) -> Result<i64> {
  let schedule = parse(spec)?;
  let next = schedule
    .after(&after)
    .next()
    .ok_or_else(|| Error::schedule(spec, "no upcoming firing"))?;
  next
    .timestamp_nanos_opt()
    .ok_or_else(|| Error::schedule(spec, "firing out of timestamp range"))
}

/// 校验 cron 表达式是否合法
/// Validate a cron spec
pub fn validate(spec: &str) -> Result<()> {
  parse(spec).map(|_| ())
}

fn parse(spec: &str) -> Result<Schedule> {
  // The parser wants a seconds field, the public format does not carry one.
  let fields = spec.split_whitespace().count();
  let normalized = if fields == 5 {
    format!("0 {spec}")
  } else {
    spec.to_string()
  };
  Schedule::from_str(&normalized).map_err(|e| Error::schedule(spec, e.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_next_fire_every_minute() {
    let after = Utc.with_ymd_and_hms(2021, 6, 1, 12, 30, 15).unwrap();
    let next = next_fire("*/1 * * * *", after).unwrap();
    let expected = Utc.with_ymd_and_hms(2021, 6, 1, 12, 31, 0).unwrap();
    assert_eq!(next, expected.timestamp_nanos_opt().unwrap());
  }

  #[test]
  fn test_next_fire_strictly_after() {
    let on_the_minute = Utc.with_ymd_and_hms(2021, 6, 1, 12, 30, 0).unwrap();
    let next = next_fire("*/1 * * * *", on_the_minute).unwrap();
    let expected = Utc.with_ymd_and_hms(2021, 6, 1, 12, 31, 0).unwrap();
    assert_eq!(next, expected.timestamp_nanos_opt().unwrap());
  }

  #[test]
  fn test_next_fire_daily() {
    let after = Utc.with_ymd_and_hms(2021, 6, 1, 12, 30, 0).unwrap();
    let next = next_fire("15 8 * * *", after).unwrap();
    let expected = Utc.with_ymd_and_hms(2021, 6, 2, 8, 15, 0).unwrap();
    assert_eq!(next, expected.timestamp_nanos_opt().unwrap());
  }

  #[test]
  fn test_invalid_spec() {
    assert!(validate("not a cron spec").is_err());
    assert!(validate("61 * * * *").is_err());
    assert!(validate("*/1 * * * *").is_ok());
  }
}
