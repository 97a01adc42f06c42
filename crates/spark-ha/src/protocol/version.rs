use core::fmt;

/// 当前构建使用的内部协议号，版本表中的所有条目共享该值。
pub const INTERNAL_PROTOCOL_VERSION: u8 = 2;

/// 主从通信协议版本。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - `application`：客户端通告/假定的应用协议号，即版本表的排序键；
///   - `internal`：框架内部帧格式的协议号，版本协商不会改变它；
///   - 排序先比较 `application` 再比较 `internal`，与派生的字典序一致；
/// - **风险 (Trade-offs)**：应用协议号只有一个字节，新增版本时需确认未与历史取值冲突。
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ProtocolVersion {
    application: u8,
    internal: u8,
}

impl ProtocolVersion {
    pub const fn new(application: u8, internal: u8) -> Self {
        Self {
            application,
            internal,
        }
    }

    /// 以当前内部协议号构造版本。
    pub const fn application(application: u8) -> Self {
        Self::new(application, INTERNAL_PROTOCOL_VERSION)
    }

    pub const fn application_protocol(&self) -> u8 {
        self.application
    }

    pub const fn internal_protocol(&self) -> u8 {
        self.internal
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app={},internal={}", self.application, self.internal)
    }
}
