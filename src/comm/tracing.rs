use anyhow::Result;
use chrono::{Datelike, Timelike};
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, EnvFilter};

/// 日志时间格式：`YYYY-MM-DD:HH:MM:SS:cc`（cc 为百分之一秒）
struct LogTimer;

impl fmt::time::FormatTime for LogTimer {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = chrono::Local::now();
        write!(
            w,
            "{:04}-{:02}-{:02}:{:02}:{:02}:{:02}:{:02}",
            now.year(),
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            now.timestamp_subsec_millis() / 10
        )
    }
}

/// 构建日志过滤器，存储客户端的噪声日志压到 warn
/// Build the filter; noisy HTTP client crates are capped at warn
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(format!("{},reqwest=warn,hyper=warn", level))
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn"))
}

/// 初始化全局日志订阅者 / Install the global tracing subscriber
///
/// 重复调用是安全的，已安装时静默忽略
/// Safe to call more than once; later calls are ignored
pub fn init_tracing(level: &str) -> Result<()> {
    LogTracer::init().ok();
    fmt::SubscriberBuilder::default()
        .with_env_filter(build_filter(level))
        .with_timer(LogTimer)
        .compact()
        .with_target(false)
        .try_init()
        .ok();
    Ok(())
}
