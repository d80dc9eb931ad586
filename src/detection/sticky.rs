// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 粘性瞄准跟踪器 (Sticky-Aim Tracker)
//!
//! 在选择器的逐帧结果之上加一层滞回状态机:
//! - 同一目标 → 保持锁定, 平滑速度, 累积锁定分数
//! - 不同目标 → 连续 3 帧或新目标非常居中时才切换, 否则本帧不输出 (防止来回跳)
//! - 无检测 → 最多外推 3 帧 (Coasting), 之后放弃锁定
//!
//! 状态只由检测线程持有, 不需要同步。

use super::types::{Point2, Prediction};

/// 丢失目标后最多外推的帧数
pub const MAX_FRAMES_WITHOUT_TARGET: u32 = 3;
/// 外推期间锁定分数的衰减系数
pub const LOCK_SCORE_DECAY: f32 = 0.85;
/// 每次匹配成功增加的锁定分数 (也是新锁定的初始分数)
pub const LOCK_SCORE_GAIN: f32 = 15.;
pub const MAX_LOCK_SCORE: f32 = 100.;
/// 尺寸系数的参考面积 (px²)
pub const REFERENCE_TARGET_SIZE: f32 = 10000.;
/// 连续不匹配多少帧后强制切换
const SWITCH_AFTER_MISSES: u32 = 3;
/// 外推置信度每帧衰减比例
const COAST_CONFIDENCE_STEP: f32 = 0.2;

/// 每帧跟踪参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StickySettings {
    pub enabled: bool,
    /// 快速切换阈值 (模型像素): 新目标离参考点 < threshold/2 时立即切换
    pub threshold: f32,
}

impl Default for StickySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 50.,
        }
    }
}

/// 每帧上报的跟踪状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// 没有目标
    Unlocked,
    /// 有锁定目标 (本帧可能因防抖而不输出)
    Locked,
    /// 无检测, 正在外推第 k 帧
    Coasting(u32),
    /// 外推用尽, 本帧放弃锁定
    LostCommit,
}

impl TrackState {
    /// 是否处于"无锁定"状态 (流水线据此重置预测器)
    pub fn is_unlocked(&self) -> bool {
        matches!(self, TrackState::Unlocked | TrackState::LostCommit)
    }
}

#[derive(Debug, Clone)]
pub struct TrackOutcome {
    pub target: Option<Prediction>,
    pub state: TrackState,
}

impl TrackOutcome {
    fn new(target: Option<Prediction>, state: TrackState) -> Self {
        Self { target, state }
    }
}

#[derive(Debug, Default)]
pub struct StickyAimTracker {
    current: Option<Prediction>,
    /// 平滑速度 (屏幕像素/帧)
    velocity: Point2,
    lock_score: f32,
    frames_without_match: u32,
    frames_without_detection: u32,
}

/// 小目标 (远处) 系数更大, 跟踪更"粘"
fn size_factor(area: f32) -> f32 {
    (REFERENCE_TARGET_SIZE / area.max(100.)).clamp(1., 3.)
}

impl StickyAimTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Prediction> {
        self.current.as_ref()
    }

    pub fn velocity(&self) -> Point2 {
        self.velocity
    }

    pub fn lock_score(&self) -> f32 {
        self.lock_score
    }

    pub fn frames_without_match(&self) -> u32 {
        self.frames_without_match
    }

    pub fn frames_without_detection(&self) -> u32 {
        self.frames_without_detection
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// 处理一帧
    ///
    /// `pick` 是选择器的结果 (候选, 到参考点的平方距离); None 表示本帧没有候选。
    pub fn update(
        &mut self,
        pick: Option<(&Prediction, f32)>,
        settings: &StickySettings,
    ) -> TrackOutcome {
        if !settings.enabled {
            self.reset();
            return match pick {
                Some((p, _)) => TrackOutcome::new(Some(p.clone()), TrackState::Locked),
                None => TrackOutcome::new(None, TrackState::Unlocked),
            };
        }

        let Some((aim, aim_dist_sq)) = pick else {
            return self.handle_no_detection();
        };
        self.frames_without_detection = 0;

        let Some(current) = self.current.as_ref() else {
            return self.acquire(aim);
        };

        let current_area = current.area();
        let radius = current_area.sqrt() * 3.;
        let aim_area = aim.area();
        let size_ratio = current_area.min(aim_area) / current_area.max(aim_area);
        let dist_sq = aim.screen_center().distance_sq(&current.screen_center());

        if dist_sq < radius * radius && size_ratio > 0.5 {
            let smoothing = (0.6 + size_factor(current_area) * 0.1).clamp(0.7, 0.9);
            let step_x = aim.screen_center().x - current.screen_center().x;
            let step_y = aim.screen_center().y - current.screen_center().y;
            self.velocity = Point2::new(
                self.velocity.x * smoothing + step_x * (1. - smoothing),
                self.velocity.y * smoothing + step_y * (1. - smoothing),
            );
            self.frames_without_match = 0;
            self.lock_score = (self.lock_score + LOCK_SCORE_GAIN).min(MAX_LOCK_SCORE);
            self.current = Some(aim.clone());
            return TrackOutcome::new(Some(aim.clone()), TrackState::Locked);
        }

        self.frames_without_match += 1;
        let very_centered = aim_dist_sq < settings.threshold * settings.threshold * 0.25;
        if very_centered || self.frames_without_match >= SWITCH_AFTER_MISSES {
            return self.acquire(aim);
        }

        // 还不确定用户换了目标: 本帧不输出
        TrackOutcome::new(None, TrackState::Locked)
    }

    fn acquire(&mut self, target: &Prediction) -> TrackOutcome {
        self.velocity = Point2::default();
        self.lock_score = LOCK_SCORE_GAIN;
        self.frames_without_match = 0;
        self.current = Some(target.clone());
        TrackOutcome::new(Some(target.clone()), TrackState::Locked)
    }

    fn handle_no_detection(&mut self) -> TrackOutcome {
        let Some(current) = self.current.as_ref() else {
            self.reset();
            return TrackOutcome::new(None, TrackState::Unlocked);
        };

        self.frames_without_detection += 1;
        let k = self.frames_without_detection;
        if k > MAX_FRAMES_WITHOUT_TARGET {
            self.reset();
            return TrackOutcome::new(None, TrackState::LostCommit);
        }

        let coasted = current.coasted(
            Point2::new(self.velocity.x * k as f32, self.velocity.y * k as f32),
            current.confidence() * (1. - k as f32 * COAST_CONFIDENCE_STEP),
        );
        self.lock_score *= LOCK_SCORE_DECAY;
        TrackOutcome::new(Some(coasted), TrackState::Coasting(k))
    }
}
