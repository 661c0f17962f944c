//! 常量定义
//! Constant definitions

/// 出站请求使用的 User-Agent
/// User-Agent sent on outbound requests
pub const USER_AGENT: &str = "Hooky";

/// 出站请求携带的诊断头
/// Diagnostic headers carried on outbound requests
pub const HEADER_ACCOUNT: &str = "X-Hooky-Account";
pub const HEADER_APPLICATION: &str = "X-Hooky-Application";
pub const HEADER_QUEUE: &str = "X-Hooky-Queue";
pub const HEADER_TASK_NAME: &str = "X-Hooky-Task-Name";
pub const HEADER_ATTEMPT_ID: &str = "X-Hooky-Attempt-ID";

/// 默认应用与队列名称（保留名称，不可删除）
/// Default application and queue names (reserved, cannot be deleted)
pub const DEFAULT_APPLICATION_NAME: &str = "default";
pub const DEFAULT_QUEUE_NAME: &str = "default";

/// 队列默认的最大并行在途数量
/// Default maximum number of in-flight attempts per queue
pub const DEFAULT_MAX_IN_FLIGHT: u32 = 10;

/// 完整性窗口：任务的 attempt_queued 标志允许的最大陈旧时间（秒）
/// Integrity window: how long a task's attempt_queued flag may stay stale (seconds)
pub const INTEGRITY_WINDOW_SECS: i64 = 180;

/// 后台维护循环的执行周期（秒）
/// Cadence of the background maintenance loops (seconds)
pub const MAINTENANCE_INTERVAL_SECS: u64 = 60;

/// 测试哨兵 URL 前缀：不发起请求，休眠后返回成功
/// Test sentinel URL prefix: no request is made, sleep then report success
pub const TEST_URL_PREFIX: &str = "test://";

/// 测试哨兵的休眠时长（秒）
/// Sleep duration of the test sentinel (seconds)
pub const TEST_SLEEP_SECS: u64 = 10;
