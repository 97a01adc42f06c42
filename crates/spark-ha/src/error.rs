//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义复制层主节点客户端在构造、使用与生命周期托管过程中的全部错误语义；
//! - 区分“客户端使用期故障”（[`ComError`]）与“解析器/装配期故障”（[`HaError`]），
//!   前者由异常处理器观察，后者直接返回给 `instantiate` 的调用方。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 `thiserror::Error`，满足 `Send + Sync + 'static`；
//! - [`ComError::IllegalProtocolVersion`] 是唯一被协议解析器识别为“版本不匹配”的载体，
//!   其余变体对解析器而言均为未分类故障。

use std::{borrow::Cow, time::Duration};

use thiserror::Error;

use crate::{lifecycle::LifeState, store::StoreId};

/// 生命周期组件在启动/停止时返回的错误原因。
pub type ComponentError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 使用主节点客户端时产生的通信故障。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - `IllegalProtocolVersion` 携带客户端假定的应用协议号 `assumed` 与主节点实际运行的 `actual`；
///   - 其他变体表示与协议版本无关的失败，解析器不会对其作出反应；
/// - **执行 (How)**：客户端在失败路径上先把错误交给已挂载的处理器观察，再原样返回给调用方。
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ComError {
    /// 主节点拒绝了客户端使用的协议版本。
    #[error(
        "illegal protocol version: client assumed application protocol {assumed}, master runs {actual}: {message}"
    )]
    IllegalProtocolVersion {
        assumed: u8,
        actual: u8,
        message: String,
    },

    /// 从节点与主节点不属于同一逻辑存储。
    #[error("store id mismatch: local store {expected}, master store {actual}")]
    StoreIdMismatch { expected: StoreId, actual: StoreId },

    /// 连接建立或读写失败。
    #[error("transport failure: {detail}")]
    Transport { detail: String },

    /// 请求在读超时内未得到响应。
    #[error("`{operation}` timed out after {after:?}")]
    Timeout {
        operation: Cow<'static, str>,
        after: Duration,
    },

    /// 客户端尚未随生命周期容器启动。
    #[error("master client for `{endpoint}` is not started")]
    NotStarted { endpoint: String },

    /// 主节点已换届，请求携带的纪元过期。
    #[error("master rejected request from stale epoch {epoch}")]
    InvalidEpoch { epoch: u64 },

    /// 主节点以业务错误码拒绝了请求。
    #[error("master rejected request with `{code}`: {message}")]
    Remote { code: String, message: String },
}

impl ComError {
    /// 构造协议版本不匹配错误。
    pub fn illegal_protocol_version(assumed: u8, actual: u8, message: impl Into<String>) -> Self {
        ComError::IllegalProtocolVersion {
            assumed,
            actual,
            message: message.into(),
        }
    }

    /// 构造传输层错误。
    pub fn transport(detail: impl Into<String>) -> Self {
        ComError::Transport {
            detail: detail.into(),
        }
    }
}

/// 解析器与客户端装配阶段的错误域。
///
/// # 教案式说明
/// - **契约 (What)**：`instantiate` 从不为版本不匹配返回错误；这里只包含工厂构造失败、
///   生命周期注册失败以及版本表/配置校验失败，均原样传播给调用方；
/// - **风险 (Trade-offs)**：`Lifecycle` 变体包裹的启动失败意味着客户端已被停止且未留在容器中。
#[derive(Debug, Error)]
pub enum HaError {
    /// 工厂拒绝了不合法的主节点地址。
    #[error("invalid master endpoint `{address}:{port}`: {reason}")]
    InvalidEndpoint {
        address: String,
        port: u16,
        reason: &'static str,
    },

    /// 向生命周期容器注册或启动客户端失败。
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// 自定义版本表违反了“应用协议号严格递增”等约束。
    #[error("invalid protocol version table: {reason}")]
    InvalidProtocolTable { reason: String },

    /// 客户端调优参数非法。
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// 生命周期容器的错误。
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// 组件启动失败；容器已经把它停止并移出。
    #[error("failed to start `{component}`: {source}")]
    StartFailed {
        component: String,
        #[source]
        source: ComponentError,
    },

    /// 停止阶段有组件失败；其余组件仍然被尝试停止。
    #[error("failed to stop {} component(s), first: `{}`", .failures.len(), first_failure(.failures))]
    StopFailed { failures: Vec<StopFailure> },

    /// 容器已进入终止态，不再接受注册或启动。
    #[error("life support has already been shut down")]
    AlreadyShutdown,

    /// 另一次启动或停止尚未结束。
    #[error("life support is busy: {state:?}")]
    InTransition { state: LifeState },
}

/// 单个组件的停止失败记录。
#[derive(Debug)]
pub struct StopFailure {
    pub component: String,
    pub source: ComponentError,
}

fn first_failure(failures: &[StopFailure]) -> &str {
    failures
        .first()
        .map(|failure| failure.component.as_str())
        .unwrap_or("<none>")
}

/// 客户端调优参数的解析/校验错误。
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML 文本无法解析。
    #[error("failed to parse client settings: {0}")]
    Parse(#[from] toml::de::Error),

    /// 数值参数必须为正。
    #[error("`{field}` must be greater than zero")]
    NonPositive { field: &'static str },
}
