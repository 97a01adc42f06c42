//! # 协议版本表
//!
//! ## 核心意图（Why）
//! - 把“每个受支持的协议版本 → 应用协议号 + 客户端工厂”的映射固化为一张不可变有序表；
//! - 解析器只在这张表上做下标运算：下标越大版本越新，降级即下标单调减小。
//!
//! ## 行为契约（What）
//! - 条目按旧 → 新排列，应用协议号严格递增；
//! - [`ProtocolVersionTable::standard`] 对编译期确定的版本集合是全函数，不会失败；
//! - [`ProtocolVersionTable::new`] 供组合与测试构造自定义表，违反约束时返回
//!   [`HaError::InvalidProtocolTable`]。

use std::{fmt, sync::Arc};

use crate::{
    client::{
        ClientContext, MasterClient, MasterClient210, MasterClient214, collaborators::MetricsSink,
    },
    error::HaError,
    protocol::ProtocolVersion,
    store::StoreId,
};

/// 版本专属客户端的工厂函数签名。
///
/// 工厂负责校验地址并构造客户端，但不启动它；启动由生命周期容器负责。
pub type ClientFactory = fn(
    &str,
    u16,
    Arc<dyn MetricsSink>,
    StoreId,
    &ClientContext,
) -> Result<Arc<dyn MasterClient>, HaError>;

/// 版本表中的单个条目。
#[derive(Clone, Copy)]
pub struct ProtocolVersionEntry {
    protocol: ProtocolVersion,
    release: &'static str,
    factory: ClientFactory,
}

impl ProtocolVersionEntry {
    pub const fn new(protocol: ProtocolVersion, release: &'static str, factory: ClientFactory) -> Self {
        Self {
            protocol,
            release,
            factory,
        }
    }

    pub const fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    /// 人类可读的发行版本标签，例如 `"2.1.4"`。
    pub const fn release(&self) -> &'static str {
        self.release
    }

    /// 调用条目登记的工厂构造客户端。
    pub fn build(
        &self,
        address: &str,
        port: u16,
        metrics: Arc<dyn MetricsSink>,
        store_id: StoreId,
        context: &ClientContext,
    ) -> Result<Arc<dyn MasterClient>, HaError> {
        (self.factory)(address, port, metrics, store_id, context)
    }
}

impl fmt::Debug for ProtocolVersionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolVersionEntry")
            .field("protocol", &self.protocol)
            .field("release", &self.release)
            .finish_non_exhaustive()
    }
}

/// 不可变的有序协议版本表。
#[derive(Clone, Debug)]
pub struct ProtocolVersionTable {
    entries: Arc<[ProtocolVersionEntry]>,
}

impl ProtocolVersionTable {
    /// 当前构建支持的全部协议版本，旧 → 新。
    pub fn standard() -> Self {
        Self {
            entries: Arc::from([MasterClient210::ENTRY, MasterClient214::ENTRY]),
        }
    }

    /// 以自定义条目构造版本表。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：
    ///   - **前置条件**：`entries` 非空，且应用协议号沿顺序严格递增；
    ///   - **后置条件**：成功时返回的表与 [`standard`](Self::standard) 具备相同的下标语义。
    pub fn new(entries: Vec<ProtocolVersionEntry>) -> Result<Self, HaError> {
        if entries.is_empty() {
            return Err(HaError::InvalidProtocolTable {
                reason: "table must contain at least one protocol version".to_owned(),
            });
        }
        if let Some(pair) = entries.windows(2).find(|pair| {
            pair[0].protocol.application_protocol() >= pair[1].protocol.application_protocol()
        }) {
            return Err(HaError::InvalidProtocolTable {
                reason: format!(
                    "application protocols must be strictly increasing, found {} before {}",
                    pair[0].protocol, pair[1].protocol
                ),
            });
        }
        Ok(Self {
            entries: Arc::from(entries),
        })
    }

    pub fn entries(&self) -> &[ProtocolVersionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 构造时已保证非空，恒为 `false`。
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 最新条目的下标，即解析器的初始选择。
    pub fn newest_index(&self) -> usize {
        self.entries.len() - 1
    }

    /// 按下标取条目，越界时收敛到最新条目。
    pub fn entry(&self, index: usize) -> &ProtocolVersionEntry {
        &self.entries[index.min(self.newest_index())]
    }

    /// 找到应用协议号不大于 `actual` 的最高下标。
    ///
    /// - **契约 (What)**：返回 `None` 表示远端比表中所有版本都旧（下限耗尽），
    ///   由调用方决定如何收敛；
    /// - **执行 (How)**：条目按应用协议号有序，使用 `partition_point` 二分定位。
    pub fn floor_index_for(&self, actual: u8) -> Option<usize> {
        let count = self
            .entries
            .partition_point(|entry| entry.protocol.application_protocol() <= actual);
        count.checked_sub(1)
    }
}

impl Default for ProtocolVersionTable {
    fn default() -> Self {
        Self::standard()
    }
}
