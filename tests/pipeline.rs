// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 端到端场景: 模拟截图 / 推理 / 指针

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ndarray::{Array3, ArrayD, ArrayViewD, IxDyn};
use parking_lot::Mutex;

use lockon::config::{AimConfig, ConfigStore, ToggleState, Toggles};
use lockon::detection::{
    CandidateExtractor, ExtractorSettings, Point2, Prediction, Rect, ScreenRect,
    StickyAimTracker, StickySettings, TargetSelector,
};
use lockon::input::{CaptureSource, FrameHandle, PointerDevice};
use lockon::models::{metadata, InferenceEngine, ModelInfo, ModelSlot};
use lockon::pipeline::{MemoryProbe, Pipeline, PipelineParts};
use lockon::Result;

const SIZE: u32 = 160;

/// 记录每帧被释放的次数
#[derive(Clone, Default)]
struct Ledger {
    captured: Arc<AtomicU32>,
    released: Arc<Mutex<Vec<u32>>>,
}

struct CountedFrame {
    id: u32,
    data: Vec<u8>,
    size: u32,
    ledger: Ledger,
}

impl FrameHandle for CountedFrame {
    fn width(&self) -> u32 {
        self.size
    }

    fn height(&self) -> u32 {
        self.size
    }

    fn rgba(&self) -> &[u8] {
        &self.data
    }

    fn release(self: Box<Self>) {
        self.ledger.released.lock().push(self.id);
    }
}

struct MockCapture(Ledger);

impl CaptureSource for MockCapture {
    fn capture(&mut self, region: ScreenRect) -> Option<Box<dyn FrameHandle>> {
        let id = self.0.captured.fetch_add(1, Ordering::SeqCst);
        Some(Box::new(CountedFrame {
            id,
            data: vec![0; (region.width * region.height * 4) as usize],
            size: region.width,
            ledger: self.0.clone(),
        }))
    }
}

/// 固定在截图中心右侧 40px 的目标
struct RightOfCenter(ModelInfo);

impl InferenceEngine for RightOfCenter {
    fn info(&self) -> &ModelInfo {
        &self.0
    }

    fn infer(&mut self, input: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>> {
        assert_eq!(input.shape(), &[1, 3, SIZE as usize, SIZE as usize]);
        let n = self.0.num_detections;
        let mut out = ArrayD::zeros(IxDyn(&[1, 5, n]));
        let c = SIZE as f32 / 2.;
        out[[0, 0, 7]] = c + 40.;
        out[[0, 1, 7]] = c;
        out[[0, 2, 7]] = 24.;
        out[[0, 3, 7]] = 48.;
        out[[0, 4, 7]] = 0.88;
        Ok(out)
    }
}

#[derive(Clone, Default)]
struct RecordingPointer(Arc<Mutex<Vec<(i32, i32)>>>);

impl PointerDevice for RecordingPointer {
    fn move_relative(&mut self, dx: i32, dy: i32) -> Result<()> {
        self.0.lock().push((dx, dy));
        Ok(())
    }
}

struct NoMemory;

impl MemoryProbe for NoMemory {
    fn resident_bytes(&mut self) -> Option<u64> {
        None
    }
}

fn loaded_slot() -> Arc<ModelSlot> {
    let slot = Arc::new(ModelSlot::new());
    slot.install(Box::new(RightOfCenter(ModelInfo {
        image_size: SIZE,
        num_detections: metadata::num_detections(SIZE),
        num_classes: 1,
        class_map: metadata::default_class_map(),
        dynamic: false,
    })));
    slot
}

fn wait_until<F: Fn() -> bool>(timeout: Duration, f: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if f() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    f()
}

#[test]
fn test_target_right_of_center_moves_pointer_right() {
    let ledger = Ledger::default();
    let pointer = RecordingPointer::default();
    let config = AimConfig {
        image_size: SIZE,
        sensitivity: 0.5,
        aspect_correction: false,
        ..Default::default()
    };
    let toggles = Arc::new(Toggles::new(ToggleState {
        aim_assist: true,
        constant_tracking: true,
        ..Default::default()
    }));

    let parts = PipelineParts::new(
        Box::new(MockCapture(ledger.clone())),
        Box::new(pointer.clone()),
        loaded_slot(),
        Arc::new(ConfigStore::new(config)),
        toggles,
    )
    .with_memory_probe(Box::new(NoMemory));
    let mut pipeline = Pipeline::spawn(parts).unwrap();

    assert!(wait_until(Duration::from_secs(5), || pointer.0.lock().len() >= 5));
    let latest = pipeline.latest_target().unwrap();
    assert_eq!(latest.screen_center(), Point2::new(1000., 540.));

    pipeline.shutdown();

    // 目标在中心右侧 40px, 灵敏度 0.5 → 每次 +20
    let moves = pointer.0.lock().clone();
    assert!(moves.iter().all(|&m| m == (20, 0)), "{:?}", moves);

    let bench = pipeline.benchmark();
    assert!(bench.stats("ModelInference").unwrap().count >= 1);
    assert!(bench.report().contains("ModelInference"));

    // 每一帧都恰好释放一次
    let captured = ledger.captured.load(Ordering::SeqCst);
    let mut released = ledger.released.lock().clone();
    released.sort_unstable();
    assert_eq!(released, (0..captured).collect::<Vec<_>>());
}

#[test]
fn test_model_not_ready_never_captures() {
    let ledger = Ledger::default();
    let pointer = RecordingPointer::default();
    let toggles = Arc::new(Toggles::new(ToggleState {
        aim_assist: true,
        constant_tracking: true,
        ..Default::default()
    }));
    let parts = PipelineParts::new(
        Box::new(MockCapture(ledger.clone())),
        Box::new(pointer.clone()),
        Arc::new(ModelSlot::new()),
        Arc::new(ConfigStore::default()),
        toggles,
    )
    .with_memory_probe(Box::new(NoMemory));
    let pipeline = Pipeline::spawn(parts).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    drop(pipeline);

    assert_eq!(ledger.captured.load(Ordering::SeqCst), 0);
    assert!(pointer.0.lock().is_empty());
}

#[test]
fn test_sticky_disabled_is_pass_through() {
    let selector = TargetSelector::new(640);
    let mut tracker = StickyAimTracker::new();
    let settings = StickySettings::default();

    let frames: Vec<Vec<(f32, f32)>> = vec![
        vec![(300., 300.), (500., 100.)],
        vec![],
        vec![(100., 600.)],
        vec![(330., 320.), (320., 330.)],
    ];
    for boxes in frames {
        let candidates: Vec<Prediction> = boxes
            .iter()
            .map(|&(cx, cy)| {
                Prediction::new(
                    Rect::from_cxcywh(cx, cy, 30., 60.),
                    0.7,
                    0,
                    Arc::from("enemy"),
                    640,
                    ScreenRect::new(640, 220, 640, 640),
                )
            })
            .collect();
        let pick = selector.select(&candidates);
        let expected = pick.map(|(p, _)| p.clone());
        let outcome = tracker.update(pick, &settings);
        assert_eq!(outcome.target, expected);
        assert!(tracker.current().is_none());
    }
}

#[test]
fn test_centered_detection_passes_through() {
    let size = 640u32;
    let n = metadata::num_detections(size);
    let origin = ScreenRect::new(640, 220, size, size);
    let half = size as f32 / 2.;

    // 单类别输出, 只有第 k 个槽位在截图正中心
    let k = 123;
    let mut output = Array3::<f32>::zeros((1, 5, n));
    output[[0, 0, k]] = half;
    output[[0, 1, k]] = half;
    output[[0, 2, k]] = 40.;
    output[[0, 3, k]] = 80.;
    output[[0, 4, k]] = 0.9;

    let extractor = CandidateExtractor::new(size, &metadata::default_class_map());
    let candidates = extractor
        .extract(output.into_dyn().view(), origin, &ExtractorSettings::default())
        .unwrap();
    assert_eq!(candidates.len(), 1);
    let candidate = candidates[0].clone();
    assert_eq!(candidate.confidence(), 0.9);
    assert_eq!(candidate.screen_center(), Point2::new(960., 540.));

    let selector = TargetSelector::new(size);
    let pick = selector.select(&candidates);
    let (picked, d2) = pick.unwrap();
    assert_eq!(picked, &candidate);
    assert_eq!(d2, 0.);

    let mut tracker = StickyAimTracker::new();
    let outcome = tracker.update(pick, &StickySettings::default());
    assert_eq!(outcome.target, Some(candidate));
}
