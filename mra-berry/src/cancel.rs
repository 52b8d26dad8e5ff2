//! 协作式取消.

use crate::{Result, VesselError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 跨线程共享的取消标志.
///
/// 各阶段在外层循环边界 (逐切片, 逐图, 优先队列批量弹出) 检查该标志,
/// 命中后以 [`VesselError::Cancelled`] 终止. clone 共享同一标志.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// 创建未触发的取消标志.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 触发取消. 已在运行的阶段会在下一个检查点退出.
    #[inline]
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// 是否已触发取消.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// 检查点: 已取消则返回 `Err(Cancelled)`.
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(VesselError::Cancelled)
        } else {
            Ok(())
        }
    }
}
