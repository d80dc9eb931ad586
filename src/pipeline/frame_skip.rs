//! 自适应跳帧
//!
//! 目标连续多帧几乎不动 (位移 < 5px) 时, 稳定度 EMA 超过 0.95,
//! 之后每 3 帧中跳过 2 帧的完整检测, 只用上一帧结果重新发出瞄准。

use crate::detection::Prediction;

/// 稳定度 EMA 系数
pub const STABILITY_ALPHA: f32 = 0.3;
pub const STABILITY_THRESHOLD: f32 = 0.95;
/// 位移 (|dx| + |dy|) 低于该值视为"稳定"
pub const STABLE_DELTA_PX: f32 = 5.;
/// 每 N 帧完整处理一次
pub const SKIP_CYCLE: u32 = 3;

#[derive(Debug, Default)]
pub struct FrameSkipper {
    last: Option<Prediction>,
    stability: f32,
    frames_since_process: u32,
}

impl FrameSkipper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stability(&self) -> f32 {
        self.stability
    }

    pub fn last_target(&self) -> Option<&Prediction> {
        self.last.as_ref()
    }

    /// 本帧是否跳过完整检测 (只在瞄准辅助开启且有上一帧目标时跳)
    pub fn should_skip(&mut self, aim_assist: bool) -> bool {
        if !aim_assist || self.last.is_none() {
            return false;
        }
        if self.stability > STABILITY_THRESHOLD {
            self.frames_since_process += 1;
            if self.frames_since_process < SKIP_CYCLE {
                return true;
            }
            self.frames_since_process = 0;
        }
        false
    }

    /// 清空稳定度与上一帧目标
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// 记录一次完整处理的结果
    pub fn observe(&mut self, target: Option<&Prediction>) {
        let Some(target) = target else {
            self.last = None;
            self.stability = 0.;
            return;
        };

        match &self.last {
            Some(prev) => {
                let a = target.screen_center();
                let b = prev.screen_center();
                let delta = (a.x - b.x).abs() + (a.y - b.y).abs();
                let sample = if delta < STABLE_DELTA_PX { 1. } else { 0. };
                self.stability = STABILITY_ALPHA * sample + (1. - STABILITY_ALPHA) * self.stability;
            }
            None => self.stability = 0.,
        }
        self.last = Some(target.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Rect, ScreenRect};
    use std::sync::Arc;

    fn at(x: f32) -> Prediction {
        Prediction::new(
            Rect::new(x, 100., 20., 20.),
            0.9,
            0,
            Arc::from("enemy"),
            640,
            ScreenRect::default(),
        )
    }

    #[test]
    fn test_moving_target_never_skips() {
        let mut s = FrameSkipper::new();
        for i in 0..50 {
            assert!(!s.should_skip(true));
            s.observe(Some(&at(i as f32 * 10.)));
        }
        assert_eq!(s.stability(), 0.);
    }

    #[test]
    fn test_stable_target_skips_two_of_three() {
        let mut s = FrameSkipper::new();
        for _ in 0..20 {
            s.observe(Some(&at(100.)));
        }
        assert!(s.stability() > STABILITY_THRESHOLD);

        let pattern: Vec<bool> = (0..6).map(|_| s.should_skip(true)).collect();
        assert_eq!(pattern, vec![true, true, false, true, true, false]);
        assert!(!s.should_skip(false));
    }

    #[test]
    fn test_lost_target_resets() {
        let mut s = FrameSkipper::new();
        for _ in 0..20 {
            s.observe(Some(&at(100.)));
        }
        s.observe(None);
        assert_eq!(s.stability(), 0.);
        assert!(s.last_target().is_none());
        assert!(!s.should_skip(true));
    }

    #[test]
    fn test_reset_clears_stability() {
        let mut s = FrameSkipper::new();
        for _ in 0..20 {
            s.observe(Some(&at(100.)));
        }
        s.reset();
        assert_eq!(s.stability(), 0.);
        assert!(!s.should_skip(true));
    }
}
