//! 日志初始化
//!
//! 日志只写 stderr。标准输出留给进度行和被测函数的输出。

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// `RUST_LOG` 未设置时的过滤规则：本 crate 用 info，依赖只看 warn
pub const DEFAULT_FILTER: &str = "fntest=info,warn";

/// 初始化日志，默认过滤规则见 [`DEFAULT_FILTER`]
///
/// - `RUST_LOG=fntest=debug fntest test --all` 可以看到跳过原因和迟到的完成信号
/// - `RUST_LOG=fntest::runner=trace fntest test users/create`
pub fn init_logger() {
    if try_init_logger().is_err() {
        tracing::debug!("Global subscriber already set, keeping it");
    }
}

/// 同 [`init_logger`]，已经设置过全局 subscriber 时返回错误（嵌入到其他程序时使用）
pub fn try_init_logger() -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init()
}
