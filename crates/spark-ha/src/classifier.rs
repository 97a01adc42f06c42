//! 通信失败分类。
//!
//! 只有携带“客户端假定版本”与“主节点实际版本”两个字段的失败才会被识别为协议版本不匹配；
//! 其余失败一律视为未分类，解析器对其不作任何反应。

use crate::error::ComError;

/// 从失败中提取出的版本不匹配信号。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MismatchSignal {
    assumed: u8,
    actual: u8,
    description: String,
}

impl MismatchSignal {
    pub fn new(assumed: u8, actual: u8, description: impl Into<String>) -> Self {
        Self {
            assumed,
            actual,
            description: description.into(),
        }
    }

    /// 客户端假定的应用协议号。
    pub fn assumed(&self) -> u8 {
        self.assumed
    }

    /// 主节点实际运行的应用协议号。
    pub fn actual(&self) -> u8 {
        self.actual
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// 主节点比客户端假定的更旧时，信号才要求降级。
    pub fn requests_downgrade(&self) -> bool {
        self.actual < self.assumed
    }
}

/// 能够报告自身是否为协议版本不匹配的失败载体。
pub trait ProtocolMismatchSource {
    fn protocol_mismatch(&self) -> Option<MismatchSignal>;
}

impl ProtocolMismatchSource for ComError {
    fn protocol_mismatch(&self) -> Option<MismatchSignal> {
        match self {
            ComError::IllegalProtocolVersion {
                assumed,
                actual,
                message,
            } => Some(MismatchSignal::new(*assumed, *actual, message.as_str())),
            _ => None,
        }
    }
}

/// 分类结果。
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Classification {
    Mismatch(MismatchSignal),
    Unclassified,
}

/// 对一次失败分类。
pub fn classify<E>(failure: &E) -> Classification
where
    E: ProtocolMismatchSource + ?Sized,
{
    match failure.protocol_mismatch() {
        Some(signal) => Classification::Mismatch(signal),
        None => Classification::Unclassified,
    }
}
