use std::{fmt, sync::Arc, time::Duration};

use arc_swap::ArcSwapOption;
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::{
    client::{
        ClientContext, MasterEndpoint, MasterRequest, MasterResponse, RequestType,
        collaborators::{MasterConnection, MetricsSink},
    },
    config::ClientSettings,
    error::ComError,
    handler::ComExceptionHandler,
    protocol::ProtocolVersion,
    store::StoreId,
};

/// 各版本客户端共享的连接、调用与失败观察逻辑。
///
/// # 教案式说明
/// - **意图 (Why)**：版本专属客户端之间唯一的差异是协议版本与发行标签，
///   连接管理、超时选择、存储校验与异常观察全部收敛到这里；
/// - **契约 (What)**：
///   - 处理器槽位可在任意线程替换，读取路径不加锁；
///   - 每个失败都会先交给处理器，再原样返回；处理器不会吞掉或改写错误；
/// - **风险 (Trade-offs)**：连接槽位由互斥锁保护，但握手在锁外完成；
///   并发 `start` 可能各自握手一次，多出的连接会被立即关闭。
pub struct MasterClientCore {
    endpoint: MasterEndpoint,
    protocol: ProtocolVersion,
    release: &'static str,
    store_id: StoreId,
    metrics: Arc<dyn MetricsSink>,
    context: ClientContext,
    handler: ArcSwapOption<AttachedHandler>,
    connection: Mutex<Option<Arc<dyn MasterConnection>>>,
}

/// `ArcSwap` 只能承载定长类型，用一层包装保存 trait 对象。
struct AttachedHandler(Arc<dyn ComExceptionHandler>);

impl MasterClientCore {
    pub fn new(
        endpoint: MasterEndpoint,
        protocol: ProtocolVersion,
        release: &'static str,
        store_id: StoreId,
        metrics: Arc<dyn MetricsSink>,
        context: &ClientContext,
    ) -> Self {
        Self {
            endpoint,
            protocol,
            release,
            store_id,
            metrics,
            context: context.clone(),
            handler: ArcSwapOption::empty(),
            connection: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &MasterEndpoint {
        &self.endpoint
    }

    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    pub fn release(&self) -> &'static str {
        self.release
    }

    pub fn store_id(&self) -> StoreId {
        self.store_id
    }

    pub fn settings(&self) -> &ClientSettings {
        self.context.settings()
    }

    pub fn is_started(&self) -> bool {
        self.connection.lock().is_some()
    }

    /// 替换失败观察者。
    pub fn set_handler(&self, handler: Arc<dyn ComExceptionHandler>) {
        self.handler.store(Some(Arc::new(AttachedHandler(handler))));
    }

    /// 把失败交给当前处理器观察，并原样交还给调用方。
    pub fn observe(&self, error: ComError) -> ComError {
        match self.handler.load_full() {
            Some(attached) => attached.0.handle(&error),
            None => trace!(endpoint = %self.endpoint, error = %error, "no handler attached"),
        }
        error
    }

    /// 建立到主节点的连接；已连接时直接返回。
    ///
    /// 握手在锁外进行；并发的两次握手都成功时保留先写入的连接，关闭另一条。
    pub fn connect(&self) -> Result<(), ComError> {
        if self.is_started() {
            return Ok(());
        }

        let connection: Arc<dyn MasterConnection> = match self
            .context
            .transport()
            .connect(&self.endpoint, self.protocol, self.context.settings())
        {
            Ok(connection) => Arc::from(connection),
            Err(err) => {
                warn!(endpoint = %self.endpoint, protocol = %self.protocol, error = %err, "master client failed to connect");
                return Err(self.observe(err));
            }
        };

        let mut slot = self.connection.lock();
        if slot.is_some() {
            drop(slot);
            connection.close();
            debug!(endpoint = %self.endpoint, "concurrent connect already installed a connection, closing duplicate");
            return Ok(());
        }
        *slot = Some(connection);
        drop(slot);
        debug!(
            endpoint = %self.endpoint,
            protocol = %self.protocol,
            release = self.release,
            "master client connected"
        );
        Ok(())
    }

    /// 关闭连接；未连接时什么也不做。
    pub fn disconnect(&self) {
        let connection = self.connection.lock().take();
        if let Some(connection) = connection {
            connection.close();
            debug!(endpoint = %self.endpoint, release = self.release, "master client disconnected");
        }
    }

    pub fn call(&self, request_type: RequestType, payload: Bytes) -> Result<MasterResponse, ComError> {
        let connection = self.connection.lock().clone();
        let Some(connection) = connection else {
            let err = ComError::NotStarted {
                endpoint: self.endpoint.to_string(),
            };
            self.metrics.request_failed(&self.endpoint, request_type, &err);
            return Err(self.observe(err));
        };

        let request = MasterRequest::new(
            request_type,
            self.protocol,
            self.store_id,
            payload,
            self.timeout_for(request_type),
        );
        match connection
            .send(&request)
            .and_then(|response| self.accept(response))
        {
            Ok(response) => {
                self.metrics.request_completed(&self.endpoint, request_type);
                Ok(response)
            }
            Err(err) => {
                self.metrics.request_failed(&self.endpoint, request_type, &err);
                debug!(
                    endpoint = %self.endpoint,
                    request = ?request_type,
                    protocol = %self.protocol,
                    error = %err,
                    "master request failed"
                );
                Err(self.observe(err))
            }
        }
    }

    fn timeout_for(&self, request_type: RequestType) -> Duration {
        if request_type.is_lock_request() {
            self.context.settings().lock_read_timeout()
        } else {
            self.context.settings().read_timeout()
        }
    }

    fn accept(&self, response: MasterResponse) -> Result<MasterResponse, ComError> {
        if response.store_id() != self.store_id {
            return Err(ComError::StoreIdMismatch {
                expected: self.store_id,
                actual: response.store_id(),
            });
        }
        self.context.response_unpacker().unpack(&response)?;
        Ok(response)
    }
}

impl fmt::Debug for MasterClientCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterClientCore")
            .field("endpoint", &self.endpoint)
            .field("protocol", &self.protocol)
            .field("release", &self.release)
            .field("store_id", &self.store_id)
            .field("started", &self.is_started())
            .field("handler_attached", &self.handler.load().is_some())
            .finish_non_exhaustive()
    }
}
