//! # client 模块说明
//!
//! ## 设计定位（Why）
//! - 定义所有版本专属主节点客户端共同满足的能力契约 [`MasterClient`]；
//! - 版本集合是封闭的：每个受支持的协议版本对应一个客户端类型，并通过
//!   [`ProtocolVersionEntry`](crate::protocol::ProtocolVersionEntry) 登记工厂，解析器按表查找而非继承分派。
//!
//! ## 契约边界（What）
//! - 客户端同时是 [`Lifecycle`] 组件：启动时经 [`MasterTransport`](collaborators::MasterTransport)
//!   建立连接，停止时关闭连接；
//! - 客户端的任何失败都会先交给已挂载的 [`ComExceptionHandler`] 观察，再原样返回给调用方。

pub mod collaborators;
mod core;
mod versions;

use std::{fmt, sync::Arc, time::Duration};

use bytes::Bytes;

use crate::{
    config::ClientSettings,
    error::{ComError, HaError},
    handler::ComExceptionHandler,
    lifecycle::Lifecycle,
    protocol::ProtocolVersion,
    store::StoreId,
};

use self::collaborators::{MasterTransport, ResponseUnpacker};

pub use self::core::MasterClientCore;
pub use self::versions::{MasterClient210, MasterClient214};

/// 主节点客户端能力契约。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - `protocol_version` 在客户端生命周期内固定，不随解析器后续降级而改变；
///   - `call` 仅在客户端随容器启动后可用，否则返回 [`ComError::NotStarted`]；
///   - `set_com_exception_handler` 替换失败观察者，观察者不会改变返回给调用方的错误。
pub trait MasterClient: Lifecycle + fmt::Debug {
    fn protocol_version(&self) -> ProtocolVersion;

    /// 发行版本标签，例如 `"2.1.4"`。
    fn release(&self) -> &'static str;

    fn endpoint(&self) -> &MasterEndpoint;

    fn store_id(&self) -> StoreId;

    fn is_started(&self) -> bool;

    fn set_com_exception_handler(&self, handler: Arc<dyn ComExceptionHandler>);

    /// 向主节点发起一次远程调用。
    fn call(&self, request_type: RequestType, payload: Bytes) -> Result<MasterResponse, ComError>;
}

/// 已校验的主节点地址。
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct MasterEndpoint {
    address: String,
    port: u16,
}

impl MasterEndpoint {
    /// 校验并构造地址：`address` 不得为空白，`port` 不得为 0。
    pub fn new(address: &str, port: u16) -> Result<Self, HaError> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(HaError::InvalidEndpoint {
                address: address.to_owned(),
                port,
                reason: "address must not be blank",
            });
        }
        if port == 0 {
            return Err(HaError::InvalidEndpoint {
                address: address.to_owned(),
                port,
                reason: "port must be non-zero",
            });
        }
        Ok(Self {
            address: trimmed.to_owned(),
            port,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for MasterEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// 从节点可以向主节点发起的请求类型。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RequestType {
    AllocateIds,
    CreateRelationshipType,
    CreatePropertyKey,
    CreateLabel,
    NewLockSession,
    AcquireSharedLock,
    AcquireExclusiveLock,
    EndLockSession,
    Commit,
    PullUpdates,
    Handshake,
    CopyStore,
}

impl RequestType {
    /// 锁请求使用锁读超时，其余请求使用普通读超时。
    pub fn is_lock_request(self) -> bool {
        matches!(
            self,
            RequestType::AcquireSharedLock | RequestType::AcquireExclusiveLock
        )
    }
}

/// 发往主节点的一次请求，由客户端填充协议版本、存储标识与超时。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MasterRequest {
    request_type: RequestType,
    protocol: ProtocolVersion,
    store_id: StoreId,
    payload: Bytes,
    timeout: Duration,
}

impl MasterRequest {
    pub(crate) fn new(
        request_type: RequestType,
        protocol: ProtocolVersion,
        store_id: StoreId,
        payload: Bytes,
        timeout: Duration,
    ) -> Self {
        Self {
            request_type,
            protocol,
            store_id,
            payload,
            timeout,
        }
    }

    pub fn request_type(&self) -> RequestType {
        self.request_type
    }

    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    pub fn store_id(&self) -> StoreId {
        self.store_id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// 本次请求允许的最长等待时间。
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// 主节点响应：主节点所属存储与待解包的事务流。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MasterResponse {
    store_id: StoreId,
    payload: Bytes,
}

impl MasterResponse {
    pub fn new(store_id: StoreId, payload: Bytes) -> Self {
        Self { store_id, payload }
    }

    pub fn store_id(&self) -> StoreId {
        self.store_id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

/// 解析器透传给每个客户端工厂的共享参数与协作者。
#[derive(Clone)]
pub struct ClientContext {
    settings: ClientSettings,
    response_unpacker: Arc<dyn ResponseUnpacker>,
    transport: Arc<dyn MasterTransport>,
}

impl ClientContext {
    pub fn new(
        settings: ClientSettings,
        response_unpacker: Arc<dyn ResponseUnpacker>,
        transport: Arc<dyn MasterTransport>,
    ) -> Self {
        Self {
            settings,
            response_unpacker,
            transport,
        }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub(crate) fn response_unpacker(&self) -> &Arc<dyn ResponseUnpacker> {
        &self.response_unpacker
    }

    pub(crate) fn transport(&self) -> &Arc<dyn MasterTransport> {
        &self.transport
    }
}

impl fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
