// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 流水线调度 (Pipeline Scheduler)
//!
//! 启动三个线程并负责有界时间内的关闭:
//! - detect:    [`DetectLoop`]
//! - actuation: [`run_actuation`], 无界队列
//! - disposal:  [`run_disposal`], 容量 3 的丢弃最旧队列
//!
//! 尺寸切换: 更新配置后置位请求, 由检测线程在下一次迭代开始时取走并空转一轮。
//! 关闭顺序: 置"尺寸切换中"标记 → 取消 → 依次限时等待各线程;
//! 超时的线程被分离 (无法强制终止), 只记录告警。

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{info, warn};

use super::actuation::run_actuation;
use super::detect_loop::{DetectLoop, LatestTarget, LoopShared};
use super::disposal::{run_disposal, FrameDisposal, DISPOSAL_CAPACITY};
use super::memory::{MemoryMonitor, MemoryProbe, SysinfoProbe};
use super::pool::{BufferPool, PoolStats};
use super::{CancelToken, SizeChangeFlag};
use crate::benchmark::Benchmark;
use crate::config::{ConfigStore, Toggles};
use crate::detection::Prediction;
use crate::error::{Error, Result};
use crate::events::{EventBus, PipelineEvent};
use crate::input::{CaptureSource, CursorSource, PointerDevice};
use crate::models::{metadata, ModelSlot};

pub const DETECT_JOIN_TIMEOUT: Duration = Duration::from_millis(1000);
pub const ACTUATION_JOIN_TIMEOUT: Duration = Duration::from_millis(500);
pub const DISPOSAL_JOIN_TIMEOUT: Duration = Duration::from_millis(500);

/// 启动流水线所需的协作方
pub struct PipelineParts {
    pub capture: Box<dyn CaptureSource>,
    pub pointer: Box<dyn PointerDevice>,
    pub cursor: Option<Arc<dyn CursorSource>>,
    pub model: Arc<ModelSlot>,
    pub store: Arc<ConfigStore>,
    pub toggles: Arc<Toggles>,
    pub bus: EventBus,
    pub memory_probe: Box<dyn MemoryProbe>,
}

impl PipelineParts {
    pub fn new(
        capture: Box<dyn CaptureSource>,
        pointer: Box<dyn PointerDevice>,
        model: Arc<ModelSlot>,
        store: Arc<ConfigStore>,
        toggles: Arc<Toggles>,
    ) -> Self {
        Self {
            capture,
            pointer,
            cursor: None,
            model,
            store,
            toggles,
            bus: EventBus::new(),
            memory_probe: Box::new(SysinfoProbe::new()),
        }
    }

    pub fn with_cursor(mut self, cursor: Option<Arc<dyn CursorSource>>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_memory_probe(mut self, probe: Box<dyn MemoryProbe>) -> Self {
        self.memory_probe = probe;
        self
    }
}

/// 线程句柄 + 结束通知
struct Worker {
    name: &'static str,
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

/// 线程结束 (包括 panic) 时析构, 通知等待方
struct DoneGuard(Sender<()>);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        let _ = self.0.try_send(());
    }
}

fn spawn_worker<F>(name: &'static str, f: F) -> io::Result<Worker>
where
    F: FnOnce() + Send + 'static,
{
    let (tx, done) = bounded(1);
    let handle = thread::Builder::new().name(name.into()).spawn(move || {
        let _guard = DoneGuard(tx);
        f();
    })?;
    Ok(Worker { name, handle, done })
}

impl Worker {
    /// 限时等待; 超时返回 false 并分离线程
    fn join_timeout(self, timeout: Duration) -> bool {
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    warn!("⚠️  线程 {} 异常退出 (panic)", self.name);
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "⚠️  线程 {} 未在 {:?} 内退出, 已分离",
                    self.name, timeout
                );
                false
            }
        }
    }
}

pub struct Pipeline {
    detect: Option<Worker>,
    actuation: Option<Worker>,
    disposal: Option<Worker>,
    cancel: CancelToken,
    size_change: SizeChangeFlag,
    bench: Benchmark,
    pool: BufferPool<f32>,
    latest: LatestTarget,
    model: Arc<ModelSlot>,
    store: Arc<ConfigStore>,
    bus: EventBus,
}

impl Pipeline {
    pub fn spawn(parts: PipelineParts) -> io::Result<Self> {
        let cancel = CancelToken::new();
        let size_change = SizeChangeFlag::new();
        let bench = Benchmark::new();
        let pool = BufferPool::new();
        let latest = LatestTarget::default();

        let (move_tx, move_rx) = crossbeam_channel::unbounded();
        let (disposal, disposal_rx) = FrameDisposal::new(DISPOSAL_CAPACITY);

        let disposal_worker = {
            let cancel = cancel.clone();
            spawn_worker("frame-disposal", move || run_disposal(disposal_rx, cancel))?
        };

        let actuation_worker = {
            let cancel = cancel.clone();
            let pointer = parts.pointer;
            spawn_worker("actuation", move || run_actuation(move_rx, pointer, cancel))?
        };

        let detect = DetectLoop::new(
            parts.capture,
            parts.cursor,
            LoopShared {
                model: Arc::clone(&parts.model),
                store: Arc::clone(&parts.store),
                toggles: parts.toggles,
                bench: bench.clone(),
                cancel: cancel.clone(),
                size_change: size_change.clone(),
                latest: Arc::clone(&latest),
            },
            move_tx,
            disposal,
            MemoryMonitor::new(parts.memory_probe, pool.clone()),
            pool.clone(),
        );
        let detect_worker = spawn_worker("detect", move || detect.run())?;

        info!("🚀 流水线已启动 (检测 / 移动 / 回收)");
        Ok(Self {
            detect: Some(detect_worker),
            actuation: Some(actuation_worker),
            disposal: Some(disposal_worker),
            cancel,
            size_change,
            bench,
            pool,
            latest,
            model: parts.model,
            store: parts.store,
            bus: parts.bus,
        })
    }

    pub fn benchmark(&self) -> &Benchmark {
        &self.bench
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// 最近一帧的锁定目标
    pub fn latest_target(&self) -> Option<Prediction> {
        self.latest.lock().clone()
    }

    /// 是否有检测线程尚未处理的尺寸切换
    pub fn size_change_pending(&self) -> bool {
        self.size_change.is_pending()
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// 切换输入尺寸 (仅动态模型, 或与固定模型一致时)
    ///
    /// 请求保持置位直到检测线程取走: 该次迭代空转, 之后按新尺寸重建提取器。
    pub fn change_image_size(&self, size: u32) -> Result<()> {
        if !metadata::is_supported_size(size) {
            return Err(Error::UnsupportedInputSize(size));
        }
        if let Some(info) = self.model.info() {
            if !info.dynamic && info.image_size != size {
                return Err(Error::UnsupportedInputSize(size));
            }
        }

        self.store.set_image_size(size);
        self.size_change.request();
        self.bus.post(PipelineEvent::ImageSizeChanged(size));
        info!("📐 输入尺寸切换为 {}x{}", size, size);
        Ok(())
    }

    /// 停止全部线程; 可重复调用
    pub fn shutdown(&mut self) {
        if self.detect.is_none() && self.actuation.is_none() && self.disposal.is_none() {
            return;
        }
        info!("🛑 正在关闭流水线...");
        self.size_change.request();
        self.cancel.cancel();

        let mut clean = true;
        if let Some(w) = self.detect.take() {
            clean &= w.join_timeout(DETECT_JOIN_TIMEOUT);
        }
        if let Some(w) = self.actuation.take() {
            clean &= w.join_timeout(ACTUATION_JOIN_TIMEOUT);
        }
        if let Some(w) = self.disposal.take() {
            clean &= w.join_timeout(DISPOSAL_JOIN_TIMEOUT);
        }

        let freed = self.pool.clear_all();
        if clean {
            info!("✅ 流水线已关闭 (释放缓冲 {} KiB)", freed / 1024);
        } else {
            warn!("⚠️  流水线关闭时有线程超时");
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AimConfig, ToggleState};
    use crate::input::{FrameHandle, NullPointer};
    use crate::detection::ScreenRect;
    use std::time::Instant;

    struct NoCapture;

    impl CaptureSource for NoCapture {
        fn capture(&mut self, _region: ScreenRect) -> Option<Box<dyn FrameHandle>> {
            None
        }
    }

    struct NoMemory;

    impl MemoryProbe for NoMemory {
        fn resident_bytes(&mut self) -> Option<u64> {
            None
        }
    }

    fn parts() -> PipelineParts {
        PipelineParts::new(
            Box::new(NoCapture),
            Box::new(NullPointer::default()),
            Arc::new(ModelSlot::new()),
            Arc::new(ConfigStore::new(AimConfig::default())),
            Arc::new(Toggles::new(ToggleState::default())),
        )
        .with_memory_probe(Box::new(NoMemory))
    }

    #[test]
    fn test_spawn_and_shutdown_promptly() {
        let mut pipeline = Pipeline::spawn(parts()).unwrap();
        assert!(pipeline.is_running());
        std::thread::sleep(Duration::from_millis(20));

        let t = Instant::now();
        pipeline.shutdown();
        assert!(!pipeline.is_running());
        assert!(t.elapsed() < Duration::from_millis(1500));
        // 第二次调用无操作
        pipeline.shutdown();
    }

    #[test]
    fn test_idle_loop_records_iterations() {
        let pipeline = Pipeline::spawn(parts()).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        let bench = pipeline.benchmark().clone();
        drop(pipeline);
        assert!(bench.stats(crate::benchmark::ITERATION_STAGE).is_some());
    }

    #[test]
    fn test_change_image_size() {
        let bus = EventBus::new();
        let (_sub, rx) = bus.subscribe_channel();
        let p = parts().with_bus(bus);
        let store = Arc::clone(&p.store);
        let pipeline = Pipeline::spawn(p).unwrap();

        assert!(matches!(
            pipeline.change_image_size(300),
            Err(Error::UnsupportedInputSize(300))
        ));
        pipeline.change_image_size(320).unwrap();
        assert_eq!(store.image_size(), 320);
        assert_eq!(rx.try_recv().unwrap(), PipelineEvent::ImageSizeChanged(320));
    }

    #[test]
    fn test_size_change_consumed_by_detect_loop() {
        let pipeline = Pipeline::spawn(parts()).unwrap();
        for _ in 0..20 {
            pipeline.change_image_size(320).unwrap();
            let deadline = Instant::now() + Duration::from_secs(1);
            while pipeline.size_change_pending() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(1));
            }
            assert!(!pipeline.size_change_pending());
        }
    }

    #[test]
    fn test_size_change_waits_for_detect_loop() {
        // 检测线程已停止: 请求在被取走前一直保持置位
        let mut pipeline = Pipeline::spawn(parts()).unwrap();
        pipeline.shutdown();
        pipeline.size_change.take();
        assert!(!pipeline.size_change_pending());
        pipeline.change_image_size(320).unwrap();
        assert!(pipeline.size_change_pending());
        assert_eq!(pipeline.store.image_size(), 320);
    }

    #[test]
    fn test_worker_timeout_detaches() {
        let w = spawn_worker("sleepy", || std::thread::sleep(Duration::from_millis(300))).unwrap();
        assert!(!w.join_timeout(Duration::from_millis(10)));

        let w = spawn_worker("quick", || {}).unwrap();
        assert!(w.join_timeout(Duration::from_millis(500)));
    }
}
