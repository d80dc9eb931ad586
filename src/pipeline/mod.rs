/// 检测-跟踪-移动流水线 (Detection Pipeline)
///
/// 三线程架构, 通过 crossbeam 通道通信:
/// - DetectLoop: 截图 → 预处理 → 推理 → 提取 → 选择 → 跟踪 → 瞄准点 (检测线程)
/// - Actuation:  消费移动指令, 注入相对指针移动 (最高优先级线程)
/// - Disposal:   回收截图帧 (有界队列, 满时丢弃最旧的一帧)
pub mod actuation;
pub mod aim;
pub mod detect_loop;
pub mod disposal;
pub mod frame_skip;
pub mod memory;
pub mod pool;
pub mod preprocess;
pub mod scheduler;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use actuation::{MoveCommand, MovementProfile, MovementShaper};
pub use aim::{aim_point, AimPointSettings, Alignment};
pub use detect_loop::{capture_region, DetectLoop, LatestTarget, LoopShared, LoopStep};
pub use disposal::{FrameDisposal, FrameWork};
pub use frame_skip::FrameSkipper;
pub use memory::{MemoryMonitor, MemoryProbe, SysinfoProbe};
pub use pool::{BufferPool, PoolStats, PooledBuffer};
pub use scheduler::{Pipeline, PipelineParts};

/// 协作式取消标记 (在迭代边界检查)
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// 输入尺寸切换请求: 调度方置位, 检测线程在迭代开始时取走
#[derive(Debug, Clone, Default)]
pub struct SizeChangeFlag(Arc<AtomicBool>);

impl SizeChangeFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// 取走请求; 返回取走前是否已置位
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_shared() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_size_change_taken_once() {
        let flag = SizeChangeFlag::new();
        let loop_side = flag.clone();
        assert!(!loop_side.take());
        flag.request();
        assert!(loop_side.is_pending());
        assert!(loop_side.take());
        assert!(!flag.is_pending());
        assert!(!loop_side.take());
    }
}
