// ==========================================
// 进度计划引擎 - 日志系统初始化
// ==========================================
// tracing + tracing-subscriber，级别由 RUST_LOG 控制
// SCHEDULE_ENGINE_LOG_FORMAT=json 时输出结构化 JSON
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 日志格式环境变量
pub const LOG_FORMAT_ENV: &str = "SCHEDULE_ENGINE_LOG_FORMAT";

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn json_requested() -> bool {
    std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器（默认: info）
///   例如: RUST_LOG=schedule_engine=debug,tower_http=info
/// - SCHEDULE_ENGINE_LOG_FORMAT: `json` 输出结构化日志
///
/// # 示例
/// ```no_run
/// use schedule_engine::logging;
/// logging::init();
/// ```
pub fn init() {
    let builder = fmt()
        .with_env_filter(default_filter())
        .with_target(true)
        .with_line_number(true);

    // 重复初始化时忽略（测试/嵌入场景）
    let _ = if json_requested() {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.try_init()
    };
}

/// 初始化测试环境的日志系统
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
