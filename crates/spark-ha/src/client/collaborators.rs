//! # 外部协作者契约
//!
//! ## 定位（Where）
//! - 这些 trait 描述主节点客户端依赖、但不属于协议解析核心的外部组件：
//!   响应解包、集群成员控制、线格式传输与指标上报；
//! - 解析器只持有并透传它们，从不调用其中的方法；调用者是各版本客户端与异常处理器。
//!
//! ## 契约（What）
//! - 所有实现必须 `Send + Sync`，客户端会在多个线程上并发调用；
//! - 线格式的编码/解码完全封装在 [`MasterTransport`] 实现中，客户端只传递协议版本。

use crate::{
    client::{MasterEndpoint, MasterRequest, MasterResponse, RequestType},
    config::ClientSettings,
    error::ComError,
    protocol::ProtocolVersion,
};

/// 把主节点响应中的事务流应用到本地存储。
pub trait ResponseUnpacker: Send + Sync + 'static {
    /// 解包并应用一条响应；失败将作为客户端调用失败返回。
    fn unpack(&self, response: &MasterResponse) -> Result<(), ComError>;
}

/// 集群客户端句柄。
pub trait ClusterClient: Send + Sync + 'static {
    /// 请求集群重新选举主节点。
    fn request_elections(&self);
}

/// 集群成员可用性句柄。
pub trait ClusterMemberAvailability: Send + Sync + 'static {
    /// 宣告本成员在 `role` 角色上不可用。
    fn member_is_unavailable(&self, role: &str);
}

/// 主节点通信的传输层。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - `connect` 针对给定端点与协议版本建立连接，`settings` 中的超时、通道数与分块大小由实现解释；
///   - 返回的连接归调用它的客户端独占，客户端停止时调用 [`MasterConnection::close`]；
/// - **风险 (Trade-offs)**：`connect` 可能阻塞在网络 I/O 上，只会在生命周期启动阶段被调用，
///   不会出现在 `instantiate` 的版本选择路径中。
pub trait MasterTransport: Send + Sync + 'static {
    fn connect(
        &self,
        endpoint: &MasterEndpoint,
        protocol: ProtocolVersion,
        settings: &ClientSettings,
    ) -> Result<Box<dyn MasterConnection>, ComError>;
}

/// 一条到主节点的活动连接。
pub trait MasterConnection: Send + Sync + 'static {
    /// 发送请求并等待响应。
    fn send(&self, request: &MasterRequest) -> Result<MasterResponse, ComError>;

    /// 关闭连接；重复调用必须是幂等的。
    fn close(&self);
}

/// 客户端请求结果的指标出口。
pub trait MetricsSink: Send + Sync + 'static {
    fn request_completed(&self, endpoint: &MasterEndpoint, request_type: RequestType);

    fn request_failed(&self, endpoint: &MasterEndpoint, request_type: RequestType, error: &ComError);
}

/// 丢弃所有指标的默认实现。
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn request_completed(&self, _endpoint: &MasterEndpoint, _request_type: RequestType) {}

    fn request_failed(
        &self,
        _endpoint: &MasterEndpoint,
        _request_type: RequestType,
        _error: &ComError,
    ) {
    }
}

/// 不执行任何集群操作的句柄，供不参与选举的部署与测试使用。
#[derive(Clone, Copy, Debug, Default)]
pub struct DetachedCluster;

impl ClusterClient for DetachedCluster {
    fn request_elections(&self) {}
}

impl ClusterMemberAvailability for DetachedCluster {
    fn member_is_unavailable(&self, _role: &str) {}
}
