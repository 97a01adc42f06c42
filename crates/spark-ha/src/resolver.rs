//! # MasterClientResolver：协议自适应的主节点客户端解析器
//!
//! ## 核心意图（Why）
//! - 从节点在滚动升级期间可能面对运行旧版本的主节点；解析器乐观地从最新协议版本开始，
//!   一旦观察到主节点报告的版本不匹配，就把此后创建的客户端降到主节点能理解的版本；
//! - 降级由客户端失败驱动，而不是预先握手，正常路径上没有额外往返。
//!
//! ## 行为契约（What）
//! - [`MasterClientResolver::instantiate`] 在调用时读取选择并构造对应版本的客户端，
//!   先挂载异常处理器，再注册进调用方的 [`LifeSupport`]；
//! - 选择只降不升；已创建的客户端保持原版本；
//! - 解析器实例在多线程间共享，`instantiate` 与降级可以任意并发。
//!
//! ## 风险提示（Trade-offs）
//! - 主节点比表中所有版本都旧时，选择停在最旧条目，此后的客户端仍然无法与其通信；
//!   该情形以 `warn` 级日志报告。

use std::{fmt, sync::Arc, time::Duration};

use tracing::debug;

use crate::{
    client::{
        ClientContext, MasterClient,
        collaborators::{
            ClusterClient, ClusterMemberAvailability, DetachedCluster, MasterTransport,
            MetricsSink, ResponseUnpacker,
        },
    },
    config::ClientSettings,
    error::HaError,
    handler::{
        ClientHandlerBinder, ComExceptionHandler, CompositeHandler, DowngradeHandler,
        HandlerBinder, InvalidEpochHandler,
    },
    lifecycle::{LifeSupport, Lifecycle},
    protocol::{ProtocolVersion, ProtocolVersionTable},
    selection::ProtocolSelection,
    store::StoreId,
};

/// 协议自适应的主节点客户端解析器。
pub struct MasterClientResolver {
    table: ProtocolVersionTable,
    selection: Arc<ProtocolSelection>,
    context: ClientContext,
    cluster_client: Arc<dyn ClusterClient>,
    member_availability: Arc<dyn ClusterMemberAvailability>,
    binder: Arc<dyn HandlerBinder>,
}

impl MasterClientResolver {
    /// 以标准版本表与默认挂载方式构造解析器。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：四个调优参数原样透传给每个客户端工厂，任一为零时返回
    ///   [`HaError::Config`]；初始选择为版本表中的最新条目；
    /// - **风险 (Trade-offs)**：需要替换版本表或挂载方式时使用 [`MasterClientResolver::builder`]。
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        response_unpacker: Arc<dyn ResponseUnpacker>,
        cluster_client: Arc<dyn ClusterClient>,
        member_availability: Arc<dyn ClusterMemberAvailability>,
        transport: Arc<dyn MasterTransport>,
        read_timeout: Duration,
        lock_read_timeout: Duration,
        max_concurrent_channels_per_client: u32,
        chunk_size: u32,
    ) -> Result<Self, HaError> {
        let settings = ClientSettings::new(
            read_timeout,
            lock_read_timeout,
            max_concurrent_channels_per_client,
            chunk_size,
        )?;
        Ok(Self::builder(response_unpacker, transport)
            .cluster(cluster_client, member_availability)
            .settings(settings)
            .build())
    }

    pub fn builder(
        response_unpacker: Arc<dyn ResponseUnpacker>,
        transport: Arc<dyn MasterTransport>,
    ) -> MasterClientResolverBuilder {
        MasterClientResolverBuilder::new(response_unpacker, transport)
    }

    /// 以当前选择的协议版本创建客户端并托管到 `life`。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：
    ///   - **前置条件**：`address` 非空白、`port` 非零，否则返回 [`HaError::InvalidEndpoint`]；
    ///   - **后置条件**：返回的客户端已挂载异常处理器并注册进 `life`；若 `life` 已启动，
    ///     客户端也已启动；
    ///   - 若注册时启动失败，客户端已被停止且不在 `life` 中，错误以 [`HaError::Lifecycle`] 返回；
    /// - **执行 (How)**：
    ///   1. 读取选择下标（`Acquire`），在版本表上取条目；
    ///   2. 调用条目工厂构造客户端；
    ///   3. 经 [`HandlerBinder`] 挂载默认处理器，使启动期的失败同样能驱动降级；
    ///   4. 向上转型为 [`Lifecycle`] 并注册。
    pub fn instantiate(
        &self,
        address: &str,
        port: u16,
        metrics: Arc<dyn MetricsSink>,
        store_id: StoreId,
        life: &LifeSupport,
    ) -> Result<Arc<dyn MasterClient>, HaError> {
        let index = self.selection.current();
        let entry = self.table.entry(index);
        let client = entry.build(address, port, metrics, store_id, &self.context)?;

        self.add_com_exception_handler(client.as_ref(), self.default_handler());

        let component: Arc<dyn Lifecycle> = client.clone();
        life.register(component)?;

        debug!(
            endpoint = %client.endpoint(),
            protocol = %entry.protocol(),
            release = entry.release(),
            "instantiated master client"
        );
        Ok(client)
    }

    /// 把 `handler` 挂载到 `client` 上。
    pub fn add_com_exception_handler(
        &self,
        client: &dyn MasterClient,
        handler: Arc<dyn ComExceptionHandler>,
    ) {
        self.binder.bind(client, handler);
    }

    /// 与本解析器共享选择状态的降级处理器。
    pub fn downgrade_handler(&self) -> DowngradeHandler {
        DowngradeHandler::new(self.table.clone(), Arc::clone(&self.selection))
    }

    /// 下一次 `instantiate` 将使用的协议版本。
    pub fn current_protocol(&self) -> ProtocolVersion {
        self.table.entry(self.selection.current()).protocol()
    }

    pub fn current_index(&self) -> usize {
        self.selection.current()
    }

    pub fn table(&self) -> &ProtocolVersionTable {
        &self.table
    }

    pub fn settings(&self) -> &ClientSettings {
        self.context.settings()
    }

    fn default_handler(&self) -> Arc<dyn ComExceptionHandler> {
        Arc::new(
            CompositeHandler::new()
                .with(Arc::new(self.downgrade_handler()))
                .with(Arc::new(InvalidEpochHandler::new(
                    Arc::clone(&self.cluster_client),
                    Arc::clone(&self.member_availability),
                ))),
        )
    }
}

impl fmt::Debug for MasterClientResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterClientResolver")
            .field("current", &self.current_protocol())
            .field("index", &self.selection.current())
            .field("versions", &self.table.len())
            .field("settings", self.context.settings())
            .finish_non_exhaustive()
    }
}

/// [`MasterClientResolver`] 的构造器。
///
/// 未显式提供的部分使用默认值：不参与选举的集群句柄、默认调优参数、标准版本表、
/// 直接调用客户端的挂载方式。
pub struct MasterClientResolverBuilder {
    response_unpacker: Arc<dyn ResponseUnpacker>,
    transport: Arc<dyn MasterTransport>,
    cluster_client: Arc<dyn ClusterClient>,
    member_availability: Arc<dyn ClusterMemberAvailability>,
    settings: ClientSettings,
    table: ProtocolVersionTable,
    binder: Arc<dyn HandlerBinder>,
}

impl MasterClientResolverBuilder {
    fn new(
        response_unpacker: Arc<dyn ResponseUnpacker>,
        transport: Arc<dyn MasterTransport>,
    ) -> Self {
        Self {
            response_unpacker,
            transport,
            cluster_client: Arc::new(DetachedCluster),
            member_availability: Arc::new(DetachedCluster),
            settings: ClientSettings::default(),
            table: ProtocolVersionTable::standard(),
            binder: Arc::new(ClientHandlerBinder),
        }
    }

    #[must_use]
    pub fn cluster(
        mut self,
        cluster_client: Arc<dyn ClusterClient>,
        member_availability: Arc<dyn ClusterMemberAvailability>,
    ) -> Self {
        self.cluster_client = cluster_client;
        self.member_availability = member_availability;
        self
    }

    #[must_use]
    pub fn settings(mut self, settings: ClientSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn table(mut self, table: ProtocolVersionTable) -> Self {
        self.table = table;
        self
    }

    #[must_use]
    pub fn binder(mut self, binder: Arc<dyn HandlerBinder>) -> Self {
        self.binder = binder;
        self
    }

    pub fn build(self) -> MasterClientResolver {
        let selection = Arc::new(ProtocolSelection::new(self.table.newest_index()));
        debug!(
            newest = %self.table.entry(self.table.newest_index()).protocol(),
            versions = self.table.len(),
            "master client resolver ready"
        );
        MasterClientResolver {
            context: ClientContext::new(self.settings, self.response_unpacker, self.transport),
            table: self.table,
            selection,
            cluster_client: self.cluster_client,
            member_availability: self.member_availability,
            binder: self.binder,
        }
    }
}
