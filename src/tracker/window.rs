use std::num::NonZeroUsize;

/// 淘汰窗口：只保留最新的 `max` 个标识符（FIFO）
/// Eviction window keeping the newest `max` identifiers (FIFO)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionWindow {
    max: NonZeroUsize,
}

impl EvictionWindow {
    pub fn new(max: NonZeroUsize) -> Self {
        Self { max }
    }

    pub fn max(&self) -> usize {
        self.max.get()
    }

    /// 从头部丢弃最旧的条目，返回丢弃数量 / Drop the oldest entries, returning how many
    pub fn apply<I>(&self, ids: &mut Vec<I>) -> usize {
        let excess = ids.len().saturating_sub(self.max.get());
        if excess > 0 {
            ids.drain(..excess);
        }
        excess
    }
}
