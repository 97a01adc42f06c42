//! # spark-ha
//!
//! ## 定位与职责（Why）
//! - 高可用复制层中，从节点通过版本专属的主节点客户端与主节点通信；集群滚动升级期间，
//!   主节点可能运行比从节点更旧的协议版本；
//! - 本 crate 提供协议自适应的 [`MasterClientResolver`]：乐观地以最新协议版本创建客户端，
//!   观察到主节点报告的版本不匹配后，把此后创建的客户端单调降级到主节点能理解的版本。
//!
//! ## 架构嵌入（Where）
//! - `protocol` 模块维护不可变的有序协议版本表；
//! - `client` 模块定义客户端能力契约、版本专属客户端与外部协作者 trait；
//! - `classifier`/`handler`/`selection` 三个模块组成“失败 → 分类 → 单调降级”的反馈回路；
//! - `lifecycle` 模块提供作用域化的生命周期容器，客户端的启停与调用方的容器绑定；
//! - `telemetry` 模块为宿主进程提供一次性的 `tracing` 订阅者安装入口。
//!
//! ## 并发模型（Trade-offs）
//! - 选择状态是单个原子下标，降级为无锁的原子取最小，`instantiate` 只做一次 `Acquire` 读取；
//! - 异常处理器在客户端的调用线程上同步执行，必须保持轻量。

/// 失败分类：识别协议版本不匹配信号。
pub mod classifier;

/// 主节点客户端契约、版本专属实现与外部协作者。
///
/// - **契约定位 (What)**：版本集合是封闭的，新增版本需同时登记到协议版本表；
/// - **扩展指引 (How)**：传输、解包与指标均通过 trait 注入，测试可替换为内存实现。
pub mod client;

pub mod config;

/// 错误类型集中声明处。
///
/// - **意图说明 (Why)**：区分客户端使用期的通信故障与解析器装配期的错误；
/// - **风险提示 (Trade-offs)**：只有 `ComError::IllegalProtocolVersion` 会驱动降级，其余故障原样传播。
pub mod error;

pub mod handler;
pub mod lifecycle;
pub mod protocol;
pub mod resolver;
pub mod selection;
pub mod store;
pub mod telemetry;

pub use classifier::{Classification, MismatchSignal, ProtocolMismatchSource, classify};
pub use client::{
    ClientContext, MasterClient, MasterClient210, MasterClient214, MasterEndpoint,
    MasterRequest, MasterResponse, RequestType,
};
pub use config::ClientSettings;
pub use error::{ComError, ComponentError, ConfigError, HaError, LifecycleError, StopFailure};
pub use handler::{
    ClientHandlerBinder, ComExceptionHandler, CompositeHandler, DowngradeDecision,
    DowngradeHandler, HandlerBinder, InvalidEpochHandler,
};
pub use lifecycle::{LifeState, LifeSupport, Lifecycle};
pub use protocol::{
    ClientFactory, INTERNAL_PROTOCOL_VERSION, ProtocolVersion, ProtocolVersionEntry,
    ProtocolVersionTable,
};
pub use resolver::{MasterClientResolver, MasterClientResolverBuilder};
pub use selection::{IndexChange, ProtocolSelection};
pub use store::StoreId;
