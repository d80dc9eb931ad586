// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 检测线程 (Detect / Track Loop)
//!
//! 每次迭代:
//! 1. 取消 / 尺寸切换检查, 内存检查, 取配置快照
//! 2. 开关判断 (是否处理 / 是否计算目标), 模型就绪判断
//! 3. 自适应跳帧: 跳过时只用上一帧目标重新发出瞄准
//! 4. 截图 → 预处理 → 推理 → 提取 → 选择 → 跟踪 → 瞄准点 → 移动队列
//!
//! 跟踪器与预测器只属于本线程。

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::actuation::MoveCommand;
use super::aim::aim_point;
use super::disposal::{FrameDisposal, FrameWork};
use super::frame_skip::FrameSkipper;
use super::memory::MemoryMonitor;
use super::pool::BufferPool;
use super::preprocess::{frame_to_tensor, tensor_view};
use super::{CancelToken, SizeChangeFlag};
use crate::benchmark::{Benchmark, ITERATION_STAGE};
use crate::config::{ConfigStore, DetectionArea, FrameConfig, ToggleState, Toggles};
use crate::detection::{
    CandidateExtractor, Point2, Prediction, ScreenRect, StickyAimTracker, TargetSelector,
    TrackState,
};
use crate::error::Result;
use crate::input::{CaptureSource, CursorSource};
use crate::models::ModelSlot;
use crate::prediction::PredictorBank;

const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// 一次迭代的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStep {
    Cancelled,
    /// 正在切换输入尺寸, 本次迭代空转
    SizeChangePending,
    /// 开关未开启
    Idle,
    ModelNotReady,
    /// 目标稳定, 复用上一帧结果
    Skipped,
    /// 截图失败
    NoFrame,
    /// 单帧错误 (已记录并吞掉)
    FrameError,
    Processed { target: bool },
}

/// 最近一帧的锁定目标 (供界面显示)
pub type LatestTarget = Arc<Mutex<Option<Prediction>>>;

pub struct DetectLoop {
    capture: Box<dyn CaptureSource>,
    cursor: Option<Arc<dyn CursorSource>>,
    model: Arc<ModelSlot>,
    store: Arc<ConfigStore>,
    toggles: Arc<Toggles>,
    moves: Sender<MoveCommand>,
    disposal: FrameDisposal,
    memory: MemoryMonitor,
    pool: BufferPool<f32>,
    bench: Benchmark,
    cancel: CancelToken,
    size_change: SizeChangeFlag,
    latest: LatestTarget,

    extractor: Option<CandidateExtractor>,
    selector: TargetSelector,
    tracker: StickyAimTracker,
    predictor: PredictorBank,
    skipper: FrameSkipper,
    candidates: Vec<Prediction>,
    last_state: TrackState,
}

/// DetectLoop 需要的共享部件
pub struct LoopShared {
    pub model: Arc<ModelSlot>,
    pub store: Arc<ConfigStore>,
    pub toggles: Arc<Toggles>,
    pub bench: Benchmark,
    pub cancel: CancelToken,
    pub size_change: SizeChangeFlag,
    pub latest: LatestTarget,
}

impl DetectLoop {
    pub fn new(
        capture: Box<dyn CaptureSource>,
        cursor: Option<Arc<dyn CursorSource>>,
        shared: LoopShared,
        moves: Sender<MoveCommand>,
        disposal: FrameDisposal,
        memory: MemoryMonitor,
        pool: BufferPool<f32>,
    ) -> Self {
        let snapshot = shared.store.snapshot();
        Self {
            capture,
            cursor,
            model: shared.model,
            store: shared.store,
            toggles: shared.toggles,
            moves,
            disposal,
            memory,
            pool,
            bench: shared.bench,
            cancel: shared.cancel,
            size_change: shared.size_change,
            latest: shared.latest,
            extractor: None,
            selector: TargetSelector::new(snapshot.image_size),
            tracker: StickyAimTracker::new(),
            predictor: PredictorBank::new(&snapshot.prediction),
            skipper: FrameSkipper::new(),
            candidates: Vec::new(),
            last_state: TrackState::Unlocked,
        }
    }

    pub fn tracker(&self) -> &StickyAimTracker {
        &self.tracker
    }

    pub fn last_state(&self) -> TrackState {
        self.last_state
    }

    /// 线程主循环, 直到取消
    pub fn run(mut self) {
        info!("🔍 检测线程启动");
        while self.iterate() != LoopStep::Cancelled {}
        info!("🛑 检测线程退出, 已丢弃 {} 帧", self.disposal.displaced());
    }

    pub fn iterate(&mut self) -> LoopStep {
        if self.cancel.is_cancelled() {
            return LoopStep::Cancelled;
        }
        if self.size_change.take() {
            // 丢弃旧尺寸的提取器, 下一帧按新尺寸重建
            self.extractor = None;
            thread::sleep(IDLE_SLEEP);
            return LoopStep::SizeChangePending;
        }

        let _iteration = self.bench.scope(ITERATION_STAGE);
        self.memory.check(Instant::now());

        let cfg = self.store.snapshot();
        let toggles = self.toggles.snapshot();
        self.predictor.configure(&cfg.prediction);

        if !toggles.should_process() || !toggles.should_predict() {
            thread::sleep(IDLE_SLEEP);
            return LoopStep::Idle;
        }
        if !self.model.is_ready() {
            thread::sleep(IDLE_SLEEP);
            return LoopStep::ModelNotReady;
        }

        if self.skipper.should_skip(toggles.aim_assist) {
            if let Some(last) = self.skipper.last_target().cloned() {
                let origin = self.move_origin(&cfg);
                self.dispatch(&last, origin, &cfg, toggles);
            }
            thread::sleep(IDLE_SLEEP);
            return LoopStep::Skipped;
        }

        self.process_frame(&cfg, toggles)
    }

    fn process_frame(&mut self, cfg: &FrameConfig, toggles: ToggleState) -> LoopStep {
        let size = self.input_size(cfg);
        let cursor = self.cursor_on_screen(cfg);
        let region = capture_region(cfg, size, cursor);

        let frame = {
            let _t = self.bench.scope("Capture");
            self.capture.capture(region)
        };
        let Some(frame) = frame else {
            self.skipper.observe(None);
            *self.latest.lock() = None;
            return LoopStep::NoFrame;
        };

        let work = FrameWork::new(frame, region);
        let detected = self.detect(&work, size, cfg);
        self.disposal.submit(work);

        if let Err(e) = detected {
            debug!("frame dropped: {}", e);
            return LoopStep::FrameError;
        }

        let outcome = {
            let _t = self.bench.scope("Track");
            let pick = self.selector.select(&self.candidates);
            self.tracker.update(pick, &cfg.sticky)
        };
        if outcome.state.is_unlocked() && !self.last_state.is_unlocked() {
            self.predictor.reset_active();
        }
        self.last_state = outcome.state;

        let _t = self.bench.scope("Aim");
        self.skipper.observe(outcome.target.as_ref());
        *self.latest.lock() = outcome.target.clone();

        match outcome.target {
            Some(target) => {
                let origin = match (cfg.detection_area, cursor) {
                    (DetectionArea::ClosestToMouse, Some(c)) => c,
                    _ => cfg.screen.center(),
                };
                self.dispatch(&target, origin, cfg, toggles);
                LoopStep::Processed { target: true }
            }
            None => LoopStep::Processed { target: false },
        }
    }

    /// 预处理 → 推理 → 提取, 结果写入 self.candidates
    fn detect(&mut self, work: &FrameWork, size: u32, cfg: &FrameConfig) -> Result<()> {
        let input = {
            let _t = self.bench.scope("Preprocess");
            frame_to_tensor(work.frame.as_ref(), size, &self.pool)?
        };
        let output = {
            let _t = self.bench.scope("ModelInference");
            self.model.infer(tensor_view(&input, size)?)?
        };
        drop(input);

        let _t = self.bench.scope("Extract");
        match &self.extractor {
            Some(extractor) => {
                extractor.extract_into(output.view(), work.rect, &cfg.extractor, &mut self.candidates)
            }
            None => {
                self.candidates.clear();
                Ok(())
            }
        }
    }

    /// 当前输入尺寸; 尺寸变化时重建提取器与选择器
    fn input_size(&mut self, cfg: &FrameConfig) -> u32 {
        let info = self.model.info();
        let size = match info {
            Some(i) if !i.dynamic => i.image_size,
            _ => cfg.image_size,
        };
        let stale = self
            .extractor
            .as_ref()
            .map_or(true, |e| e.image_size() != size);
        if stale {
            if let Some(info) = info {
                self.extractor = Some(CandidateExtractor::new(size, &info.class_map));
                self.selector = TargetSelector::new(size);
                self.reset_tracking();
                info!("📐 输入尺寸 {}x{}", size, size);
            }
        }
        size
    }

    /// 跟踪器 / 预测器 / 跳帧状态全部回到未锁定
    fn reset_tracking(&mut self) {
        self.tracker.reset();
        self.predictor.reset_active();
        self.skipper.reset();
        self.last_state = TrackState::Unlocked;
        *self.latest.lock() = None;
    }

    fn cursor_on_screen(&self, cfg: &FrameConfig) -> Option<Point2> {
        if cfg.detection_area != DetectionArea::ClosestToMouse {
            return None;
        }
        self.cursor
            .as_ref()
            .and_then(|c| c.cursor_position())
            .filter(|p| cfg.screen.contains(*p))
    }

    fn move_origin(&self, cfg: &FrameConfig) -> Point2 {
        self.cursor_on_screen(cfg)
            .unwrap_or_else(|| cfg.screen.center())
    }

    /// 瞄准点 (可选预测) → 移动队列
    fn dispatch(
        &mut self,
        target: &Prediction,
        origin: Point2,
        cfg: &FrameConfig,
        toggles: ToggleState,
    ) {
        if !toggles.aim_active() {
            return;
        }
        let mut point = aim_point(target, &cfg.aim);
        if cfg.predictions_enabled {
            point = self.predictor.update_and_estimate(point, Instant::now());
        }
        let cmd = MoveCommand {
            target: point,
            origin,
            profile: cfg.movement,
        };
        if self.moves.send(cmd).is_err() {
            debug!("actuation queue closed");
        }
    }
}

/// 截图区域: 以屏幕中心 (或屏幕内的光标) 为中心的 size×size 正方形
pub fn capture_region(cfg: &FrameConfig, size: u32, cursor: Option<Point2>) -> ScreenRect {
    let center = match cfg.detection_area {
        DetectionArea::ClosestToMouse => cursor.unwrap_or_else(|| cfg.screen.center()),
        DetectionArea::ClosestToCenter => cfg.screen.center(),
    };
    ScreenRect::centered_at(center, size)
}
