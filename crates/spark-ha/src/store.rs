//! 逻辑存储标识。
//!
//! 解析器只负责把 [`StoreId`] 原样透传给客户端工厂；校验从节点与主节点是否属于同一存储
//! 由客户端与主节点在请求层完成。

use core::fmt;

/// 标识一个逻辑数据库实例的不透明令牌。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct StoreId {
    creation_time: u64,
    random_id: u64,
    store_version: u64,
    upgrade_time: u64,
    upgrade_id: u64,
}

impl StoreId {
    /// 未初始化存储使用的默认标识。
    pub const DEFAULT: StoreId = StoreId {
        creation_time: 0,
        random_id: 0,
        store_version: 0,
        upgrade_time: 0,
        upgrade_id: 0,
    };

    /// 以存储创建信息构造标识，升级信息与创建信息保持一致。
    pub const fn new(creation_time: u64, random_id: u64, store_version: u64) -> Self {
        Self {
            creation_time,
            random_id,
            store_version,
            upgrade_time: creation_time,
            upgrade_id: random_id,
        }
    }

    pub const fn creation_time(&self) -> u64 {
        self.creation_time
    }

    pub const fn random_id(&self) -> u64 {
        self.random_id
    }

    pub const fn store_version(&self) -> u64 {
        self.store_version
    }

    pub const fn upgrade_time(&self) -> u64 {
        self.upgrade_time
    }

    pub const fn upgrade_id(&self) -> u64 {
        self.upgrade_id
    }
}

impl Default for StoreId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StoreId{{creation_time={}, random_id={}, store_version={}, upgrade_time={}, upgrade_id={}}}",
            self.creation_time, self.random_id, self.store_version, self.upgrade_time, self.upgrade_id
        )
    }
}
