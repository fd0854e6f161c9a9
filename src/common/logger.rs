//! 日志配置模块
//! 用于管理日志输出

use super::setting::Settings;

/// 初始化日志的基础功能
/// 日志级别取自 settings 的 env.log_level，重复调用时直接返回
pub fn init_logger() {
    // 检查是否已经初始化
    if log::max_level() != log::LevelFilter::Off {
        return;
    }

    let level = parse_level(Settings::get().env.log_level.as_str());
    let result = pretty_env_logger::formatted_builder()
        .target(pretty_env_logger::env_logger::Target::Stdout)
        .filter_level(level)
        .try_init();

    if result.is_ok() {
        log::debug!("logger initialized, level: {}", level);
    }
}

fn parse_level(level: &str) -> log::LevelFilter {
    match level {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    }
}

/// 带 TAG 输出到日志的宏，支持 trace debug info warn error
#[macro_export]
macro_rules! warn {
    ($tag:expr, $($arg:tt)*) => ({
        log::warn!("[{}] {}", $tag, format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! error {
    ($tag:expr, $($arg:tt)*) => ({
        log::error!("[{}] {}", $tag, format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! info {
    ($tag:expr, $($arg:tt)*) => ({
        log::info!("[{}] {}", $tag, format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! debug {
    ($tag:expr, $($arg:tt)*) => ({
        log::debug!("[{}] {}", $tag, format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! trace {
    ($tag:expr, $($arg:tt)*) => ({
        log::trace!("[{}] {}", $tag, format_args!($($arg)*));
    })
}
