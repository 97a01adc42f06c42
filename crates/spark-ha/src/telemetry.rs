//! 进程级日志安装入口。
//!
//! 解析器、客户端与生命周期容器只通过 `tracing` 宏发出事件；宿主进程在启动时调用一次
//! [`install`]，以 `fmt + EnvFilter` 组合输出这些事件。库本身从不隐式安装订阅者。

use std::sync::OnceLock;

use thiserror::Error;
use tracing::{dispatcher, subscriber::SetGlobalDefaultError};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt};

static INSTALL_STATE: OnceLock<InstallState> = OnceLock::new();

/// 首次安装的结局；之后的调用据此给出同样的答复。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum InstallState {
    Installed,
    ForeignSubscriber,
}

/// 安装日志订阅者的失败原因。
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// 本模块已经安装过订阅者。
    #[error("spark-ha telemetry has already been installed")]
    AlreadyInstalled,

    /// 进程中已有其他全局订阅者。
    #[error("a global tracing subscriber was set by someone else")]
    SubscriberAlreadySet,

    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] SetGlobalDefaultError),
}

/// 安装全局 `fmt` 订阅者，过滤规则取自 `RUST_LOG`，缺省为 `info`。
///
/// # 教案式说明
/// - **契约（What）**：重复调用返回 [`TelemetryError::AlreadyInstalled`]；外部已设置订阅者时返回
///   [`TelemetryError::SubscriberAlreadySet`]；
/// - **风险（Trade-offs）**：全局订阅者一经设置无法撤销，测试中应改用 `tracing-test`。
pub fn install() -> Result<(), TelemetryError> {
    // `get_or_init` 只让一个调用执行安装，并发的其余调用等它结束后读取结局。
    let mut first = None;
    let state = INSTALL_STATE.get_or_init(|| {
        let outcome = install_subscriber();
        let state = match outcome {
            Ok(()) => InstallState::Installed,
            Err(_) => InstallState::ForeignSubscriber,
        };
        first = Some(outcome);
        state
    });

    match (first, state) {
        (Some(outcome), _) => outcome,
        (None, InstallState::Installed) => Err(TelemetryError::AlreadyInstalled),
        (None, InstallState::ForeignSubscriber) => Err(TelemetryError::SubscriberAlreadySet),
    }
}

fn install_subscriber() -> Result<(), TelemetryError> {
    if dispatcher::has_been_set() {
        return Err(TelemetryError::SubscriberAlreadySet);
    }

    let subscriber = tracing_subscriber::registry()
        .with(build_env_filter())
        .with(tracing_subscriber::fmt::layer().with_target(true));
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
