//! 日志初始化

use tracing_subscriber::EnvFilter;

/// 初始化全局日志
///
/// 优先使用 `RUST_LOG`；未设置时根据 `VERBOSE_LOGGING` 选择 debug 或 info。
/// 重复调用是安全的（测试中会多次调用）。
pub fn init() {
    let verbose = std::env::var("VERBOSE_LOGGING")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);
    let default_level = if verbose { "debug" } else { "info" };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
