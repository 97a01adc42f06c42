//! # 通信异常处理器
//!
//! ## 设计定位（Why）
//! - 客户端在失败路径上只负责“通知”，如何反应由挂载的 [`ComExceptionHandler`] 决定；
//! - 解析器默认挂载的处理器把两种反应组合在一起：协议版本降级与纪元失效时的重新选举。
//!
//! ## 契约说明（What）
//! - 处理器只观察错误，不能吞掉或改写它；
//! - 处理器可能在任意线程、与其他处理器并发执行，因此必须 `Send + Sync`；
//! - 挂载方式经由 [`HandlerBinder`] 抽象，测试可替换为捕获处理器的实现。

use std::{fmt, sync::Arc};

use tracing::{debug, info, trace, warn};

use crate::{
    classifier::{Classification, MismatchSignal, classify},
    client::{
        MasterClient,
        collaborators::{ClusterClient, ClusterMemberAvailability},
    },
    error::ComError,
    protocol::{ProtocolVersion, ProtocolVersionTable},
    selection::{IndexChange, ProtocolSelection},
};

/// 观察客户端通信失败的回调。
pub trait ComExceptionHandler: Send + Sync + 'static {
    fn handle(&self, error: &ComError);
}

impl<F> ComExceptionHandler for F
where
    F: Fn(&ComError) + Send + Sync + 'static,
{
    fn handle(&self, error: &ComError) {
        self(error)
    }
}

/// 把处理器挂载到客户端上的接缝。
pub trait HandlerBinder: Send + Sync + 'static {
    fn bind(&self, client: &dyn MasterClient, handler: Arc<dyn ComExceptionHandler>);
}

/// 直接调用 [`MasterClient::set_com_exception_handler`] 的默认挂载方式。
#[derive(Clone, Copy, Debug, Default)]
pub struct ClientHandlerBinder;

impl HandlerBinder for ClientHandlerBinder {
    fn bind(&self, client: &dyn MasterClient, handler: Arc<dyn ComExceptionHandler>) {
        client.set_com_exception_handler(handler);
    }
}

/// 一次版本不匹配信号带来的决策。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DowngradeDecision {
    /// 选择降到了与主节点匹配的条目。
    Downgraded {
        from: ProtocolVersion,
        to: ProtocolVersion,
    },
    /// 主节点比表中所有版本都旧，选择收敛到最旧条目；该主节点仍然无法通信。
    Floored {
        from: ProtocolVersion,
        to: ProtocolVersion,
    },
    /// 信号不要求降级，或当前选择已经不比目标更新。
    Ignored { current: ProtocolVersion },
}

/// 把版本不匹配信号转化为单调降级的处理器。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - 目标为“应用协议号不大于主节点实际版本的最高条目”，不存在时收敛到最旧条目；
///   - `actual >= assumed` 的信号不会改变选择；
///   - 降级只影响此后 `instantiate` 创建的客户端，已存在的客户端保持原版本；
/// - **执行 (How)**：查表得到目标下标后交给 [`ProtocolSelection::downgrade_to`] 原子取最小。
#[derive(Clone)]
pub struct DowngradeHandler {
    table: ProtocolVersionTable,
    selection: Arc<ProtocolSelection>,
}

impl DowngradeHandler {
    pub fn new(table: ProtocolVersionTable, selection: Arc<ProtocolSelection>) -> Self {
        Self { table, selection }
    }

    /// 应用一条不匹配信号并返回决策。
    pub fn apply(&self, signal: &MismatchSignal) -> DowngradeDecision {
        if !signal.requests_downgrade() {
            let current = self.table.entry(self.selection.current()).protocol();
            debug!(
                assumed = signal.assumed(),
                actual = signal.actual(),
                current = %current,
                "protocol mismatch does not call for a downgrade"
            );
            return DowngradeDecision::Ignored { current };
        }

        let (target, floored) = match self.table.floor_index_for(signal.actual()) {
            Some(index) => (index, false),
            None => (0, true),
        };

        match self.selection.downgrade_to(target) {
            IndexChange::Lowered { from, to } => {
                let from = self.table.entry(from).protocol();
                let to = self.table.entry(to).protocol();
                if floored {
                    warn!(
                        assumed = signal.assumed(),
                        actual = signal.actual(),
                        from = %from,
                        to = %to,
                        reason = signal.description(),
                        "master protocol is older than every supported version, pinned to the oldest"
                    );
                    DowngradeDecision::Floored { from, to }
                } else {
                    info!(
                        assumed = signal.assumed(),
                        actual = signal.actual(),
                        from = %from,
                        to = %to,
                        reason = signal.description(),
                        "downgraded master client protocol"
                    );
                    DowngradeDecision::Downgraded { from, to }
                }
            }
            IndexChange::Unchanged { current } => {
                let current = self.table.entry(current).protocol();
                debug!(
                    assumed = signal.assumed(),
                    actual = signal.actual(),
                    current = %current,
                    "protocol selection already at or below the mismatch target"
                );
                DowngradeDecision::Ignored { current }
            }
        }
    }
}

impl ComExceptionHandler for DowngradeHandler {
    fn handle(&self, error: &ComError) {
        match classify(error) {
            Classification::Mismatch(signal) => {
                self.apply(&signal);
            }
            Classification::Unclassified => {
                trace!(error = %error, "unclassified master client failure");
            }
        }
    }
}

impl fmt::Debug for DowngradeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DowngradeHandler")
            .field("selection", &self.selection.current())
            .field("versions", &self.table.len())
            .finish()
    }
}

/// 纪元失效时宣告本成员不可用并请求重新选举。
#[derive(Clone)]
pub struct InvalidEpochHandler {
    cluster_client: Arc<dyn ClusterClient>,
    member_availability: Arc<dyn ClusterMemberAvailability>,
}

/// 纪元失效后本成员放弃的角色。
pub const SLAVE_ROLE: &str = "slave";

impl InvalidEpochHandler {
    pub fn new(
        cluster_client: Arc<dyn ClusterClient>,
        member_availability: Arc<dyn ClusterMemberAvailability>,
    ) -> Self {
        Self {
            cluster_client,
            member_availability,
        }
    }
}

impl ComExceptionHandler for InvalidEpochHandler {
    fn handle(&self, error: &ComError) {
        if let ComError::InvalidEpoch { epoch } = error {
            warn!(epoch, "master epoch is stale, requesting elections");
            self.member_availability.member_is_unavailable(SLAVE_ROLE);
            self.cluster_client.request_elections();
        }
    }
}

impl fmt::Debug for InvalidEpochHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvalidEpochHandler").finish_non_exhaustive()
    }
}

/// 按顺序把同一个失败分发给多个处理器。
#[derive(Clone, Default)]
pub struct CompositeHandler {
    handlers: Vec<Arc<dyn ComExceptionHandler>>,
}

impl CompositeHandler {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, handler: Arc<dyn ComExceptionHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl ComExceptionHandler for CompositeHandler {
    fn handle(&self, error: &ComError) {
        for handler in &self.handlers {
            handler.handle(error);
        }
    }
}

impl fmt::Debug for CompositeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeHandler")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
