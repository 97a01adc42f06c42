//! # 协议选择状态
//!
//! ## 核心意图（Why）
//! - 解析器在版本表上的“当前选择”只是一个下标，所有降级信号都收敛为对它的单调取最小；
//! - 取最小满足交换律与幂等性：并发到达的信号无论以何种顺序生效，最终都停在其中最旧的目标上。
//!
//! ## 行为契约（What）
//! - 下标只减不增；[`ProtocolSelection::downgrade_to`] 对不小于当前值的目标不产生任何效果；
//! - 读取使用 `Acquire`，成功的降级使用 `AcqRel`，保证 `instantiate` 观察到已完成的降级。
//!
//! ## 执行逻辑（How）
//! - 使用 `compare_exchange_weak` 循环实现带报告的原子取最小；
//! - 启用 `--cfg loom`（或 `--cfg spark_loom`）时切换为 Loom 提供的原子类型，供模型检查覆盖所有交错。

#[cfg(not(any(loom, spark_loom)))]
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(any(loom, spark_loom))]
use loom::sync::atomic::{AtomicUsize, Ordering};

/// 一次降级尝试的结果。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IndexChange {
    /// 选择从 `from` 降到了 `to`。
    Lowered { from: usize, to: usize },
    /// 目标不比当前选择更旧，选择保持 `current`。
    Unchanged { current: usize },
}

/// 解析器当前选择的版本表下标。
#[derive(Debug)]
pub struct ProtocolSelection {
    index: AtomicUsize,
}

impl ProtocolSelection {
    /// 以初始下标（通常是最新条目）构造选择状态。
    pub fn new(initial: usize) -> Self {
        Self {
            index: AtomicUsize::new(initial),
        }
    }

    pub fn current(&self) -> usize {
        self.index.load(Ordering::Acquire)
    }

    /// 把选择降到 `target`；目标不更旧时不做任何修改。
    pub fn downgrade_to(&self, target: usize) -> IndexChange {
        let mut current = self.index.load(Ordering::Acquire);
        loop {
            if target >= current {
                return IndexChange::Unchanged { current };
            }
            match self
                .index
                .compare_exchange_weak(current, target, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return IndexChange::Lowered { from: current, to: target },
                Err(observed) => current = observed,
            }
        }
    }
}
